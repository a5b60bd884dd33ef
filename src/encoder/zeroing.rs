//! ゼロ点合わせ
//!
//! d軸方向に固定磁界をかけてロータを静定させ、その時の生カウントを
//! キャリブレーションオフセットとして採用します。制御ループ停止中に
//! ポーリングループからのみ実行してください。

use embedded_hal_async::delay::DelayNs;

use super::{AngleSensor, AngleTracker};
use crate::config::zeroing;
use crate::peripherals::PhaseDriver;

/// Compare values of the three PWM phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseDuty {
    pub u: u16,
    pub v: u16,
    pub w: u16,
}

/// Phase wiring convention of the motor leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisMapping {
    /// U-V-W
    Direct,
    /// U/W入れ替え
    Swapped,
}

impl AxisMapping {
    pub fn map(self, duty: PhaseDuty) -> PhaseDuty {
        match self {
            Self::Direct => duty,
            Self::Swapped => PhaseDuty {
                u: duty.w,
                v: duty.v,
                w: duty.u,
            },
        }
    }
}

/// Timings and excitation of one zeroing run
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZeroingConfig {
    /// 電源安定待ち [ms]
    pub power_settle_ms: u32,
    /// ロータ静定待ち [ms]
    pub excitation_settle_ms: u32,
    /// 励磁解除後の待ち [ms]
    pub release_settle_ms: u32,
    /// d軸励磁の大きさ
    pub excitation: f32,
    pub axes: AxisMapping,
}

impl ZeroingConfig {
    pub const fn standard() -> Self {
        Self {
            power_settle_ms: zeroing::POWER_SETTLE_MS,
            excitation_settle_ms: zeroing::EXCITATION_SETTLE_MS,
            release_settle_ms: zeroing::RELEASE_SETTLE_MS,
            excitation: zeroing::EXCITATION,
            axes: AxisMapping::Direct,
        }
    }

    pub const fn swapped() -> Self {
        Self {
            power_settle_ms: zeroing::SWAPPED_POWER_SETTLE_MS,
            excitation_settle_ms: zeroing::SWAPPED_EXCITATION_SETTLE_MS,
            release_settle_ms: zeroing::RELEASE_SETTLE_MS,
            excitation: zeroing::EXCITATION,
            axes: AxisMapping::Swapped,
        }
    }
}

impl Default for ZeroingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

pub struct ZeroingController {
    config: ZeroingConfig,
}

impl ZeroingController {
    pub const fn new(config: ZeroingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZeroingConfig {
        &self.config
    }

    /// Run the zeroing sequence and return the captured offset [counts]
    ///
    /// # Arguments
    /// * `tracker` - Angle tracker whose offset and rotation counter are reset
    /// * `driver` - Phase driver, must not be driven by a control loop meanwhile
    /// * `delay` - Settle delays
    pub async fn zero<S, P, D>(
        &self,
        tracker: &mut AngleTracker<'_, S>,
        driver: &mut P,
        delay: &mut D,
    ) -> u16
    where
        S: AngleSensor,
        P: PhaseDriver,
        D: DelayNs,
    {
        let config = &self.config;

        delay.delay_ms(config.power_settle_ms).await;

        // 電気角0でd軸励磁
        let duty = driver.duty_cycle(0.0, config.excitation, 0.0);
        driver.apply(config.axes.map(duty));
        delay.delay_ms(config.excitation_settle_ms).await;

        let offset = tracker.capture_offset();

        let duty = driver.duty_cycle(0.0, 0.0, 0.0);
        driver.apply(config.axes.map(duty));
        delay.delay_ms(config.release_settle_ms).await;

        info!("Zeroing done: offset={}", offset);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MotionState;
    use crate::testing::{FakeDelay, FakeDriver, FakeSensor};
    use embassy_futures::block_on;

    #[test]
    fn test_axis_mapping() {
        let duty = PhaseDuty { u: 1, v: 2, w: 3 };
        assert_eq!(AxisMapping::Direct.map(duty), duty);
        assert_eq!(AxisMapping::Swapped.map(duty), PhaseDuty { u: 3, v: 2, w: 1 });
    }

    #[test]
    fn test_zero_sequence() {
        let motion = MotionState::new();
        let mut tracker = AngleTracker::new(FakeSensor::new([812]), 7, &motion);
        let mut driver = FakeDriver::default();
        let mut delay = FakeDelay::default();

        let controller = ZeroingController::new(ZeroingConfig::standard());
        let offset = block_on(controller.zero(&mut tracker, &mut driver, &mut delay));

        assert_eq!(offset, 812);
        assert_eq!(tracker.offset(), 812);
        assert_eq!(motion.calibration_offset(), 812);
        assert_eq!(*driver.commands.borrow(), vec![(0.0, 0.5, 0.0), (0.0, 0.0, 0.0)]);
        assert_eq!(driver.applied.len(), 2);
        assert_eq!(delay.elapsed_ms(), 2_000 + 300 + 300);
    }

    #[test]
    fn test_swapped_wiring_applies_mapped_duty() {
        let motion = MotionState::new();
        let mut tracker = AngleTracker::new(FakeSensor::new([5]), 7, &motion);
        let mut driver = FakeDriver::default();
        let mut delay = FakeDelay::default();

        let controller = ZeroingController::new(ZeroingConfig::swapped());
        block_on(controller.zero(&mut tracker, &mut driver, &mut delay));

        let expected = AxisMapping::Swapped.map(FakeDriver::duty_for(0.0, 0.5, 0.0));
        assert_eq!(driver.applied[0], expected);
        assert_eq!(delay.elapsed_ms(), 1_000 + 500 + 300);
    }

    #[test]
    fn test_zero_twice_keeps_second_capture() {
        let motion = MotionState::new();
        let mut tracker = AngleTracker::new(FakeSensor::new([100, 2222]), 7, &motion);
        let mut driver = FakeDriver::default();
        let mut delay = FakeDelay::default();
        let controller = ZeroingController::new(ZeroingConfig::standard());

        assert_eq!(block_on(controller.zero(&mut tracker, &mut driver, &mut delay)), 100);
        assert_eq!(block_on(controller.zero(&mut tracker, &mut driver, &mut delay)), 2222);
        assert_eq!(tracker.offset(), 2222);
        assert_eq!(motion.calibration_offset(), 2222);
    }
}
