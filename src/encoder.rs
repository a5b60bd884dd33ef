//! エンコーダ読み取り・角度追跡・速度推定・ゼロ点合わせ
//!
//! データの流れ:
//! `EncoderReader` → `AngleTracker` → {電気角（FOC）, `MotionState`} → `VelocityEstimator`

pub mod angle_tracker;
pub mod reader;
pub mod velocity;
pub mod zeroing;

pub use angle_tracker::{positive_mod, signed_travel, AngleTracker};
pub use reader::EncoderReader;
pub use velocity::{Unfiltered, VelocityEstimator, VelocityFilter};
pub use zeroing::{AxisMapping, PhaseDuty, ZeroingConfig, ZeroingController};

/// Source of raw angle counts in `[0, ENCODER_RESOLUTION)` (status bits already
/// shifted out).
pub trait AngleSensor {
    fn read_counts(&mut self) -> u16;
}
