//! 一次（トルク）ループタスク
//!
//! 2.5kHzで角度を更新し、一次ループが有効なときだけq軸電圧を出力します。
//! 角度の更新は無効時も続けるため、回転数と速度は常に最新です。

use embassy_time::{Duration, Ticker};
use minifoc::{LoopSelect, PhaseDriver};

use crate::config::TORQUE_LOOP_PERIOD_US;
use crate::state::{SharedDriver, SharedTracker, GATE, OUTER_OUTPUT, PARAMS};

#[embassy_executor::task]
pub async fn torque_loop_task(tracker: &'static SharedTracker, driver: &'static SharedDriver) {
    info!(
        "Torque loop started: {}Hz",
        1_000_000 / TORQUE_LOOP_PERIOD_US
    );

    let mut ticker = Ticker::every(Duration::from_micros(TORQUE_LOOP_PERIOD_US));

    loop {
        ticker.next().await;

        // ロック順: エンコーダ → PWM
        let mut tracker = tracker.lock().await;
        let angle = tracker.electrical_angle();

        if !GATE.primary_enabled() {
            continue;
        }

        let q = match PARAMS.active_loop() {
            LoopSelect::Torque => PARAMS.user_expect(),
            LoopSelect::Speed | LoopSelect::Angle => OUTER_OUTPUT.load(),
        };

        let mut driver = driver.lock().await;
        driver.set_phase_sequence(PARAMS.phase_sequence());
        let duty = driver.duty_cycle(angle, 0.0, q);
        driver.apply(duty);
    }
}
