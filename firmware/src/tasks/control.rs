//! ポーリングループタスク
//!
//! 起動シーケンス（パラメータ復元・ゼロ点合わせ）の後、要求されたモードを
//! 1件ずつ処理します。

use embassy_stm32::gpio::Output;
use embassy_time::Delay;
use minifoc::{Shared, Supervisor, SupervisorIo, ZeroingConfig, ZeroingController};

use crate::flash_store::FlashStore;
use crate::foc::PhaseDetector;
use crate::state::{SharedDriver, SharedTracker, GATE, MODES, MOTION, PARAMS};
use crate::telemetry_port::TelemetryPort;

#[embassy_executor::task]
pub async fn control_task(
    tracker: &'static SharedTracker,
    driver: &'static SharedDriver,
    store: FlashStore,
    telemetry: TelemetryPort,
    led: Output<'static>,
) {
    info!("Control task started");

    let shared = Shared {
        modes: &MODES,
        params: &PARAMS,
        motion: &MOTION,
        tracker,
        driver,
    };
    let io = SupervisorIo {
        calibrator: PhaseDetector,
        triggers: &GATE,
        store,
        telemetry,
        led,
        delay: Delay,
    };

    Supervisor::new(shared, io, ZeroingController::new(ZeroingConfig::standard()))
        .run()
        .await;
}
