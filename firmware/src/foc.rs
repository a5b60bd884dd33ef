// FOC (Field Oriented Control) module
// Encoder-based voltage-mode FOC: dq → αβ → space vector duty

pub mod filter;
pub mod phase_detect;
pub mod svpwm;
pub mod transforms;

pub use filter::LowPassFilter;
pub use phase_detect::{PhaseDetectError, PhaseDetector};
pub use svpwm::space_vector_duty;
pub use transforms::{inverse_park, limit_voltage};
