//! 速度推定
//!
//! 固定周期で `MotionState` の累積位置をサンプリングし、後退差分で角速度を
//! 求めます。呼び出し周期がずれると精度が落ちるため、周期タスクから
//! 呼び出してください。

use core::f32::consts::TAU;

use crate::state::{MotionState, Position};

/// Low-pass stage applied to each raw finite-difference sample
pub trait VelocityFilter {
    fn filter(&mut self, raw: f32) -> f32;
}

/// Pass-through filter
#[derive(Debug, Clone, Copy, Default)]
pub struct Unfiltered;

impl VelocityFilter for Unfiltered {
    #[inline]
    fn filter(&mut self, raw: f32) -> f32 {
        raw
    }
}

/// Fixed-cadence velocity estimator
pub struct VelocityEstimator<'a, F = Unfiltered> {
    motion: &'a MotionState,
    filter: F,
    /// サンプリング周波数 [Hz]
    sample_hz: f32,
    last: Position,
    /// ゼロ点合わせの世代（変化したら再同期）
    generation: u32,
}

impl<'a> VelocityEstimator<'a, Unfiltered> {
    pub fn new(motion: &'a MotionState, sample_hz: f32) -> Self {
        Self::with_filter(motion, sample_hz, Unfiltered)
    }
}

impl<'a, F: VelocityFilter> VelocityEstimator<'a, F> {
    pub fn with_filter(motion: &'a MotionState, sample_hz: f32, filter: F) -> Self {
        let (last, generation) = motion.position_with_generation();
        Self {
            motion,
            filter,
            sample_hz,
            last,
            generation,
        }
    }

    /// Take one sample and publish the filtered velocity [rad/s]
    ///
    /// After a zeroing reset the first sample only resynchronizes and
    /// reports zero.
    pub fn update(&mut self) -> f32 {
        let (position, generation) = self.motion.position_with_generation();

        let raw = if generation != self.generation {
            self.generation = generation;
            0.0
        } else {
            let turns = (position.rotations - self.last.rotations) as f32;
            (turns * TAU + (position.radians - self.last.radians)) * self.sample_hz
        };
        self.last = position;

        let velocity = self.filter.filter(raw);
        self.motion.publish_velocity(velocity);
        velocity
    }

    pub fn sample_hz(&self) -> f32 {
        self.sample_hz
    }
}
