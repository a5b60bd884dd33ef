#![no_std]
#![no_main]

#[macro_use]
mod fmt;

mod config;
mod flash_store;
mod foc;
mod hardware;
mod motor_driver;
mod state;
mod tasks;
mod telemetry_port;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    flash::Flash,
    gpio::{Level, Output, Speed},
    usart::{self, UartTx},
};
use embassy_sync::mutex::Mutex;
use minifoc::config::DEFAULT_POLE_PAIRS;
use minifoc::AngleTracker;
use static_cell::StaticCell;

use flash_store::FlashStore;
use motor_driver::MotorDriver;
use state::{SharedDriver, SharedTracker, MOTION};
use tasks::{command_task, control_task, outer_loop_task, torque_loop_task};
use telemetry_port::TelemetryPort;

static TRACKER: StaticCell<SharedTracker> = StaticCell::new();
static DRIVER: StaticCell<SharedDriver> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let config = hardware::create_clock_config();
    let p = embassy_stm32::init(config);

    info!("═══════════════════════════════════════════════════════");
    info!("    minifoc • encoder FOC driver • STM32G431VB @ 170MHz");
    info!("═══════════════════════════════════════════════════════");

    // エンコーダ（SPI1）
    let encoder = hardware::init_encoder(p.SPI1, p.PB3, p.PB5, p.PB4, p.PA15);
    let tracker: &'static SharedTracker = TRACKER.init(Mutex::new(AngleTracker::new(
        encoder,
        DEFAULT_POLE_PAIRS,
        &MOTION,
    )));

    // PWM（TIM1、3相相補PWM）
    let pwm = hardware::init_pwm(p.TIM1, p.PE9, p.PE8, p.PE11, p.PE10, p.PE13, p.PE12);
    let mut motor = MotorDriver::new(pwm);
    motor.enable_all_channels();
    let driver: &'static SharedDriver = DRIVER.init(Mutex::new(motor));

    // パラメータ保存（最終フラッシュページ）
    let store = FlashStore::new(Flash::new_blocking(p.FLASH));

    // テレメトリ（USART2 TX = PA2）
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = config::uart::BAUDRATE;
    let telemetry = TelemetryPort::new(UartTx::new_blocking(p.USART2, p.PA2, uart_config).unwrap());

    // ハートビートLED
    let led = Output::new(p.PC13, Level::High, Speed::Low);

    // CAN（コマンド受信）
    let can = hardware::init_can(p.FDCAN1, p.PA11, p.PA12);

    spawner.spawn(command_task(can)).unwrap();
    spawner.spawn(torque_loop_task(tracker, driver)).unwrap();
    spawner.spawn(outer_loop_task()).unwrap();
    spawner
        .spawn(control_task(tracker, driver, store, telemetry, led))
        .unwrap();

    info!("All tasks spawned");
}
