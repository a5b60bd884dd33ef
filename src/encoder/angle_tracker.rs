//! 角度トラッカ
//!
//! 生カウントとキャリブレーションオフセットから機械角を求め、
//! 0/2π境界のジャンプから回転数を追跡して電気角を計算します。
//! オフセット・回転数の書き込みはこの構造体だけが行い、他のコンテキストへは
//! `MotionState` を通して公開します。

use core::f32::consts::TAU;

use super::AngleSensor;
use crate::config::{COUNTS_TO_RADIANS, ENCODER_RESOLUTION, WRAP_THRESHOLD};
use crate::state::{MotionState, Position};

/// Remainder of `value / modulus` in `[0, modulus)`, also for negative values
#[inline]
pub fn positive_mod(value: i32, modulus: u16) -> u16 {
    value.rem_euclid(i32::from(modulus)) as u16
}

/// Shortest travel from `start` to `end` [counts], in `[-RES/2, RES/2)`
pub fn signed_travel(start: u16, end: u16) -> i32 {
    let half = i32::from(ENCODER_RESOLUTION / 2);
    let diff = i32::from(end) - i32::from(start) + half;
    i32::from(positive_mod(diff, ENCODER_RESOLUTION)) - half
}

/// Multi-turn angle tracker
pub struct AngleTracker<'a, S> {
    sensor: S,
    motion: &'a MotionState,
    /// キャリブレーションオフセット [counts]
    offset: u16,
    /// 前回の機械角 [rad]
    prev_radians: f32,
    /// 回転数
    rotations: i64,
    pole_pairs: u8,
}

impl<'a, S: AngleSensor> AngleTracker<'a, S> {
    pub fn new(sensor: S, pole_pairs: u8, motion: &'a MotionState) -> Self {
        Self {
            sensor,
            motion,
            offset: 0,
            prev_radians: 0.0,
            rotations: 0,
            pole_pairs,
        }
    }

    /// Current raw sample [counts]
    pub fn raw_sample(&mut self) -> u16 {
        self.sensor.read_counts()
    }

    /// Mechanical angle [counts], always in `[0, ENCODER_RESOLUTION)`
    pub fn mechanical_angle(&mut self) -> u16 {
        let raw = i32::from(self.raw_sample());
        positive_mod(raw - i32::from(self.offset), ENCODER_RESOLUTION)
    }

    /// Electrical angle [rad], updating the rotation counter
    ///
    /// Must be called more often than the rotor can travel `WRAP_THRESHOLD`
    /// between two calls, otherwise genuine motion is read as a wrap.
    pub fn electrical_angle(&mut self) -> f32 {
        let mechanical = self.mechanical_angle();
        let radians = f32::from(mechanical) * COUNTS_TO_RADIANS;

        let delta = radians - self.prev_radians;
        if libm::fabsf(delta) > WRAP_THRESHOLD {
            // 6.2 → 0.1 は正転、0.1 → 6.2 は逆転
            self.rotations += if delta > 0.0 { -1 } else { 1 };
        }
        self.prev_radians = radians;

        self.motion.publish_angle(
            Position {
                rotations: self.rotations,
                radians,
            },
            mechanical,
        );

        radians * f32::from(self.pole_pairs)
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn rotations(&self) -> i64 {
        self.rotations
    }

    pub fn previous_radians(&self) -> f32 {
        self.prev_radians
    }

    /// 累積機械角 [rad]
    pub fn total_radians(&self) -> f32 {
        self.rotations as f32 * TAU + self.prev_radians
    }

    pub fn pole_pairs(&self) -> u8 {
        self.pole_pairs
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Adopt the current raw sample as the new zero
    ///
    /// Clears the rotation counter and the previous-angle cache first, so the
    /// captured raw value is an absolute angle.
    pub(crate) fn capture_offset(&mut self) -> u16 {
        self.offset = 0;
        self.rotations = 0;
        self.prev_radians = 0.0;

        self.offset = self.raw_sample();
        self.motion.publish_zeroing(self.offset);
        self.offset
    }
}
