//! Closed-loop sensing and command layer for a FOC motor controller.
//!
//! Turns magnetic encoder reads into a multi-turn mechanical/electrical angle
//! and a velocity estimate, and turns 8-byte command packets into parameter
//! updates and control-mode transitions handled by a polling loop.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod mode;
pub mod peripherals;
pub mod protocol;
pub mod regulator;
pub mod state;
pub mod supervisor;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use decoder::{CommandDecoder, Outcome};
pub use encoder::{
    AngleSensor, AngleTracker, AxisMapping, EncoderReader, PhaseDuty, VelocityEstimator,
    ZeroingConfig, ZeroingController,
};
pub use mode::{ControlMode, ModeBusy, ModeSlot};
pub use peripherals::{LoopGate, LoopTriggers, ParameterStore, PhaseCalibrator, PhaseDriver};
pub use protocol::CommandPacket;
pub use regulator::PidRegulator;
pub use state::{ControlParameters, LoopSelect, MotionState, ParameterSnapshot, PidGains};
pub use supervisor::{Shared, Supervisor, SupervisorIo};
