//! 外部コラボレータのインターフェース
//!
//! PWM出力・相順検出・パラメータ保存・制御ループのトリガはボード側で実装し、
//! ポーリングループからはこれらのトレイト越しに操作します。

use core::sync::atomic::{AtomicBool, Ordering};

use crate::encoder::{AngleSensor, PhaseDuty};
use crate::state::ParameterSnapshot;

/// FOC duty computation plus PWM output
pub trait PhaseDriver {
    /// Duty for a voltage vector (`d`, `q`, normalized) at electrical `angle` [rad]
    fn duty_cycle(&self, angle: f32, d: f32, q: f32) -> PhaseDuty;

    /// Write the compare values to the PWM channels
    fn apply(&mut self, duty: PhaseDuty);

    /// Zero excitation
    fn release(&mut self) {
        let duty = self.duty_cycle(0.0, 0.0, 0.0);
        self.apply(duty);
    }
}

/// Phase-sequence auto detection
#[allow(async_fn_in_trait)]
pub trait PhaseCalibrator<P: PhaseDriver> {
    type Error;

    /// Detect the phase sequence of the connected motor
    ///
    /// # Returns
    /// Phase sequence code, persisted and reported at start-up
    async fn calibrate<S: AngleSensor>(
        &mut self,
        driver: &mut P,
        sensor: &mut S,
    ) -> Result<u8, Self::Error>;
}

/// Non-volatile parameter storage
///
/// `save` must return only once the write is durable.
#[allow(async_fn_in_trait)]
pub trait ParameterStore {
    type Error;

    async fn load(&mut self) -> Result<ParameterSnapshot, Self::Error>;

    async fn save(&mut self, snapshot: &ParameterSnapshot) -> Result<(), Self::Error>;
}

/// Enable/disable of the two periodic control-loop triggers
///
/// Both calls are idempotent.
pub trait LoopTriggers {
    /// 一次ループ（トルク）
    fn set_primary(&mut self, enabled: bool);
    /// 外側ループ（速度・角度）
    fn set_secondary(&mut self, enabled: bool);
}

/// Trigger flags polled by the periodic loop tasks
pub struct LoopGate {
    primary: AtomicBool,
    secondary: AtomicBool,
}

impl LoopGate {
    pub const fn new() -> Self {
        Self {
            primary: AtomicBool::new(false),
            secondary: AtomicBool::new(false),
        }
    }

    pub fn primary_enabled(&self) -> bool {
        self.primary.load(Ordering::Acquire)
    }

    pub fn secondary_enabled(&self) -> bool {
        self.secondary.load(Ordering::Acquire)
    }
}

impl Default for LoopGate {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopTriggers for &LoopGate {
    fn set_primary(&mut self, enabled: bool) {
        self.primary.store(enabled, Ordering::Release);
    }

    fn set_secondary(&mut self, enabled: bool) {
        self.secondary.store(enabled, Ordering::Release);
    }
}
