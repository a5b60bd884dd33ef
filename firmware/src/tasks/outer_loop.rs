//! 外側（速度・角度）ループタスク
//!
//! 500Hzで速度を推定し、外側ループが有効なときはアクティブなPIDの出力を
//! トルクループのq軸指令として公開します。

use embassy_time::{Duration, Ticker};
use minifoc::config::VELOCITY_SAMPLE_HZ;
use minifoc::{LoopSelect, PidRegulator, VelocityEstimator};

use crate::config::{MAX_Q_VOLTAGE, OUTER_LOOP_PERIOD_US, VELOCITY_FILTER_ALPHA};
use crate::foc::LowPassFilter;
use crate::state::{GATE, MOTION, OUTER_OUTPUT, PARAMS};

#[embassy_executor::task]
pub async fn outer_loop_task() {
    info!("Outer loop started: {}Hz", 1_000_000 / OUTER_LOOP_PERIOD_US);

    let mut ticker = Ticker::every(Duration::from_micros(OUTER_LOOP_PERIOD_US));
    let mut velocity = VelocityEstimator::with_filter(
        &MOTION,
        VELOCITY_SAMPLE_HZ,
        LowPassFilter::new(VELOCITY_FILTER_ALPHA),
    );
    let mut regulator = PidRegulator::new(MAX_Q_VOLTAGE);

    loop {
        ticker.next().await;

        let speed = velocity.update();

        if !GATE.secondary_enabled() {
            regulator.reset();
            OUTER_OUTPUT.store(0.0);
            continue;
        }

        let select = PARAMS.active_loop();
        let Some(pid) = PARAMS.pid(select) else {
            continue;
        };
        let measured = match select {
            LoopSelect::Speed => speed,
            LoopSelect::Angle | LoopSelect::Torque => MOTION.position().total_radians(),
        };

        let output = regulator.update(&pid.gains(), measured);
        OUTER_OUTPUT.store(output);
    }
}
