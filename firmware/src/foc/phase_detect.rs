//! 相順の自動検出
//!
//! d軸励磁で電気角を1周正方向に回し、エンコーダが進んだ方向から
//! 相順（0: U-V-W, 1: U-W-V）を決めます。

use core::f32::consts::TAU;

use embassy_time::{Duration, Timer};
use minifoc::encoder::signed_travel;
use minifoc::{AngleSensor, PhaseCalibrator, PhaseDriver};

use crate::config::phase_detect::{ALIGN_MS, EXCITATION, MIN_TRAVEL_COUNTS, STEPS, STEP_MS};
use crate::motor_driver::MotorDriver;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseDetectError {
    /// ロータが動かなかった（電源・配線・センサー）
    NoMotion { travel: i32 },
}

pub struct PhaseDetector;

impl PhaseCalibrator<MotorDriver> for PhaseDetector {
    type Error = PhaseDetectError;

    async fn calibrate<S: AngleSensor>(
        &mut self,
        driver: &mut MotorDriver,
        sensor: &mut S,
    ) -> Result<u8, PhaseDetectError> {
        info!("Phase detection started");
        driver.set_phase_sequence(0);

        let duty = driver.duty_cycle(0.0, EXCITATION, 0.0);
        driver.apply(duty);
        Timer::after(Duration::from_millis(ALIGN_MS)).await;
        let start = sensor.read_counts();

        for step in 1..=STEPS {
            let angle = TAU * step as f32 / STEPS as f32;
            let duty = driver.duty_cycle(angle, EXCITATION, 0.0);
            driver.apply(duty);
            Timer::after(Duration::from_millis(STEP_MS)).await;
        }
        let end = sensor.read_counts();
        driver.release();

        let travel = signed_travel(start, end);
        let phase_sequence = if travel >= MIN_TRAVEL_COUNTS {
            0
        } else if travel <= -MIN_TRAVEL_COUNTS {
            1
        } else {
            error!("Phase detection: rotor did not move (travel={})", travel);
            return Err(PhaseDetectError::NoMotion { travel });
        };

        driver.set_phase_sequence(phase_sequence);
        info!(
            "Phase detection done: travel={} counts, sequence={}",
            travel, phase_sequence
        );
        Ok(phase_sequence)
    }
}
