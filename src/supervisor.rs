//! ポーリングループ（制御モードの状態機械）
//!
//! 要求されたモードのアクションを最後まで実行してから Idle に戻します。
//! ゼロ点合わせなど数秒かかる処理もここで実行するため、周期タスクからは
//! 呼び出さないでください。

use core::fmt::{self, Write};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::StatefulOutputPin;
use embedded_hal_async::delay::DelayNs;

use crate::config::supervisor::{ENABLE_SETTLE_MS, IDLE_PERIOD_MS};
use crate::encoder::{AngleSensor, AngleTracker, ZeroingController};
use crate::mode::{ControlMode, ModeSlot};
use crate::peripherals::{LoopTriggers, ParameterStore, PhaseCalibrator, PhaseDriver};
use crate::state::{ControlParameters, MotionState};
use crate::telemetry;

/// State shared with the periodic loops and the command decoder
///
/// The angle tracker and the phase driver are locked tracker first, then driver.
pub struct Shared<'a, M: RawMutex, S, P> {
    pub modes: &'a ModeSlot,
    pub params: &'a ControlParameters,
    pub motion: &'a MotionState,
    pub tracker: &'a Mutex<M, AngleTracker<'a, S>>,
    pub driver: &'a Mutex<M, P>,
}

/// Peripherals owned by the polling loop
pub struct SupervisorIo<C, T, St, W, L, D> {
    pub calibrator: C,
    pub triggers: T,
    pub store: St,
    /// テレメトリ出力
    pub telemetry: W,
    /// ハートビートLED
    pub led: L,
    pub delay: D,
}

pub struct Supervisor<'a, M: RawMutex, S, P, C, T, St, W, L, D> {
    shared: Shared<'a, M, S, P>,
    io: SupervisorIo<C, T, St, W, L, D>,
    zeroing: ZeroingController,
}

impl<'a, M, S, P, C, T, St, W, L, D> Supervisor<'a, M, S, P, C, T, St, W, L, D>
where
    M: RawMutex,
    S: AngleSensor,
    P: PhaseDriver,
    C: PhaseCalibrator<P>,
    T: LoopTriggers,
    St: ParameterStore,
    W: Write,
    L: StatefulOutputPin,
    D: DelayNs,
{
    pub fn new(
        shared: Shared<'a, M, S, P>,
        io: SupervisorIo<C, T, St, W, L, D>,
        zeroing: ZeroingController,
    ) -> Self {
        Self {
            shared,
            io,
            zeroing,
        }
    }

    /// Start-up sequence
    ///
    /// Restores persisted parameters (defaults when none are valid), prints
    /// the greeting, the parameters and the calibration state, then zeroes
    /// the encoder once.
    pub async fn boot(&mut self) {
        match self.io.store.load().await {
            Ok(snapshot) => {
                self.shared.params.restore(&snapshot);
                info!("Parameters restored from storage");
            }
            Err(_) => warn!("No valid stored parameters, using defaults"),
        }

        let params = self.shared.params;
        emit(telemetry::write_greeting(&mut self.io.telemetry));
        emit(telemetry::write_parameters(
            &mut self.io.telemetry,
            &params.snapshot(),
        ));
        emit(telemetry::write_startup(
            &mut self.io.telemetry,
            params.phase_sequence(),
            self.shared.motion.calibration_offset(),
        ));

        self.zero().await;
    }

    /// Handle the pending mode once
    ///
    /// # Returns
    /// The mode that was handled; the slot is back to `Idle` afterwards.
    pub async fn poll(&mut self) -> ControlMode {
        let mode = self.shared.modes.pending();
        match mode {
            ControlMode::Idle => self.idle().await,
            ControlMode::Calibrate => self.calibrate().await,
            ControlMode::Enable => self.enable().await,
            ControlMode::Disable => self.disable().await,
            ControlMode::Report => self.report(),
            ControlMode::Persist => self.persist().await,
        }

        if mode != ControlMode::Idle {
            self.shared.modes.complete();
            info!("Mode {} handled", mode as u8);
        }
        mode
    }

    /// Boot, then poll forever
    pub async fn run(mut self) {
        self.boot().await;
        loop {
            self.poll().await;
        }
    }

    pub fn io(&self) -> &SupervisorIo<C, T, St, W, L, D> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut SupervisorIo<C, T, St, W, L, D> {
        &mut self.io
    }

    async fn idle(&mut self) {
        emit(telemetry::write_motion(
            &mut self.io.telemetry,
            &self.shared.motion.snapshot(),
        ));
        if self.io.led.toggle().is_err() {
            warn!("Heartbeat LED toggle failed");
        }
        self.io.delay.delay_ms(IDLE_PERIOD_MS).await;
    }

    async fn calibrate(&mut self) {
        self.stop_loops();

        let detected = {
            let mut tracker = self.shared.tracker.lock().await;
            let mut driver = self.shared.driver.lock().await;
            let result = self
                .io
                .calibrator
                .calibrate(&mut *driver, tracker.sensor_mut())
                .await;
            if result.is_err() {
                driver.release();
            }
            result
        };

        match detected {
            Ok(phase_sequence) => {
                self.shared.params.set_phase_calibration(phase_sequence);
                info!("Phase sequence detected: {}", phase_sequence);
            }
            Err(_) => {
                error!("Phase calibration failed");
                return;
            }
        }

        self.zero().await;
        self.save().await;
    }

    async fn enable(&mut self) {
        self.io.delay.delay_ms(ENABLE_SETTLE_MS).await;

        self.io.triggers.set_primary(true);
        // トルク制御では外側ループを止める（前回のEnableで有効なままの場合がある）
        let outer = self.shared.params.active_loop().uses_outer_loop();
        self.io.triggers.set_secondary(outer);
    }

    async fn disable(&mut self) {
        self.stop_loops();
        self.shared.driver.lock().await.release();
    }

    fn report(&mut self) {
        emit(telemetry::write_parameters(
            &mut self.io.telemetry,
            &self.shared.params.snapshot(),
        ));
        emit(telemetry::write_motion(
            &mut self.io.telemetry,
            &self.shared.motion.snapshot(),
        ));
    }

    async fn persist(&mut self) {
        self.stop_loops();
        self.shared.driver.lock().await.release();
        self.save().await;
    }

    fn stop_loops(&mut self) {
        self.io.triggers.set_primary(false);
        self.io.triggers.set_secondary(false);
    }

    async fn zero(&mut self) {
        let mut tracker = self.shared.tracker.lock().await;
        let mut driver = self.shared.driver.lock().await;
        self.zeroing
            .zero(&mut *tracker, &mut *driver, &mut self.io.delay)
            .await;
    }

    async fn save(&mut self) {
        match self.io.store.save(&self.shared.params.snapshot()).await {
            Ok(()) => info!("Parameters saved"),
            Err(_) => error!("Parameter store write failed"),
        }
    }
}

fn emit(result: fmt::Result) {
    if result.is_err() {
        warn!("Telemetry write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::CommandDecoder;
    use crate::encoder::ZeroingConfig;
    use crate::peripherals::LoopGate;
    use crate::protocol::{opcode, CommandPacket};
    use crate::state::{LoopSelect, ParameterSnapshot};
    use crate::testing::{FakeDelay, FakeDriver, FakeSensor};
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[derive(Default)]
    struct MemoryStore {
        stored: Option<ParameterSnapshot>,
        saves: usize,
    }

    impl ParameterStore for MemoryStore {
        type Error = ();

        async fn load(&mut self) -> Result<ParameterSnapshot, ()> {
            self.stored.ok_or(())
        }

        async fn save(&mut self, snapshot: &ParameterSnapshot) -> Result<(), ()> {
            self.stored = Some(*snapshot);
            self.saves += 1;
            Ok(())
        }
    }

    /// 固定の相順を返す（失敗も指定可能）
    struct FixedCalibrator(Result<u8, ()>);

    impl PhaseCalibrator<FakeDriver> for FixedCalibrator {
        type Error = ();

        async fn calibrate<S: AngleSensor>(
            &mut self,
            driver: &mut FakeDriver,
            sensor: &mut S,
        ) -> Result<u8, ()> {
            sensor.read_counts();
            driver.release();
            self.0
        }
    }

    #[derive(Default)]
    struct FakeLed {
        high: bool,
        toggles: usize,
    }

    impl embedded_hal::digital::ErrorType for FakeLed {
        type Error = Infallible;
    }

    impl embedded_hal::digital::OutputPin for FakeLed {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }
    }

    impl StatefulOutputPin for FakeLed {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }

        fn toggle(&mut self) -> Result<(), Infallible> {
            self.high = !self.high;
            self.toggles += 1;
            Ok(())
        }
    }

    struct Rig {
        modes: ModeSlot,
        params: ControlParameters,
        gate: LoopGate,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                modes: ModeSlot::new(),
                params: ControlParameters::new(),
                gate: LoopGate::new(),
            }
        }

        fn decoder(&self) -> CommandDecoder<'_> {
            CommandDecoder::new(&self.params, &self.modes)
        }
    }

    type TestSupervisor<'a> = Supervisor<
        'a,
        NoopRawMutex,
        FakeSensor,
        FakeDriver,
        FixedCalibrator,
        &'a LoopGate,
        MemoryStore,
        String,
        FakeLed,
        FakeDelay,
    >;

    fn supervisor<'a>(
        rig: &'a Rig,
        motion: &'a MotionState,
        tracker: &'a Mutex<NoopRawMutex, AngleTracker<'a, FakeSensor>>,
        driver: &'a Mutex<NoopRawMutex, FakeDriver>,
        calibrator: FixedCalibrator,
    ) -> TestSupervisor<'a> {
        Supervisor::new(
            Shared {
                modes: &rig.modes,
                params: &rig.params,
                motion,
                tracker,
                driver,
            },
            SupervisorIo {
                calibrator,
                triggers: &rig.gate,
                store: MemoryStore::default(),
                telemetry: String::new(),
                led: FakeLed::default(),
                delay: FakeDelay::default(),
            },
            ZeroingController::new(ZeroingConfig::standard()),
        )
    }

    #[test]
    fn test_idle_emits_telemetry_and_heartbeat() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([100]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        assert_eq!(block_on(sup.poll()), ControlMode::Idle);
        assert_eq!(block_on(sup.poll()), ControlMode::Idle);

        let io = sup.io();
        assert_eq!(io.telemetry, "angle:0, 0, 0.0\r\nangle:0, 0, 0.0\r\n");
        assert_eq!(io.led.toggles, 2);
        assert_eq!(io.delay.elapsed_ms(), 2 * u64::from(IDLE_PERIOD_MS));
    }

    #[test]
    fn test_calibrate_packet_runs_calibration_zeroing_and_persist() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([777]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));
        (&rig.gate).set_primary(true);
        (&rig.gate).set_secondary(true);

        let packet = CommandPacket::new(0, [0x0F, 0, 0, 0, 0, 0, 0, 0]);
        rig.decoder().handle(&packet).unwrap();
        assert_eq!(block_on(sup.poll()), ControlMode::Calibrate);

        assert_eq!(rig.modes.pending(), ControlMode::Idle);
        assert!(rig.params.phase_params_available());
        assert_eq!(rig.params.phase_sequence(), 1);
        assert_eq!(motion.calibration_offset(), 777);
        assert!(!rig.gate.primary_enabled());
        assert!(!rig.gate.secondary_enabled());

        let store = &sup.io().store;
        assert_eq!(store.saves, 1);
        let saved = store.stored.unwrap();
        assert!(saved.phase_params_available);
        assert_eq!(saved.phase_sequence, 1);
    }

    #[test]
    fn test_failed_calibration_skips_zeroing() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([777]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Err(())));

        rig.decoder()
            .handle(&CommandPacket::control(opcode::CALIBRATE))
            .unwrap();
        block_on(sup.poll());

        assert_eq!(rig.modes.pending(), ControlMode::Idle);
        assert!(!rig.params.phase_params_available());
        assert_eq!(motion.calibration_offset(), 0);
        assert_eq!(sup.io().store.saves, 0);
    }

    #[test]
    fn test_enable_then_disable_outer_loop() {
        let rig = Rig::new();
        rig.params.set_phase_calibration(1);
        rig.params.set_loop_params_available(true);
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([0]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        rig.decoder()
            .handle(&CommandPacket::enable(LoopSelect::Speed))
            .unwrap();
        assert_eq!(block_on(sup.poll()), ControlMode::Enable);
        assert!(rig.gate.primary_enabled());
        assert!(rig.gate.secondary_enabled());
        assert_eq!(sup.io().delay.elapsed_ms(), u64::from(ENABLE_SETTLE_MS));

        rig.decoder()
            .handle(&CommandPacket::control(opcode::DISABLE))
            .unwrap();
        assert_eq!(block_on(sup.poll()), ControlMode::Disable);
        assert!(!rig.gate.primary_enabled());
        assert!(!rig.gate.secondary_enabled());
        assert_eq!(block_on(driver.lock()).released, 1);
    }

    #[test]
    fn test_switch_to_torque_then_disable_stops_outer_loop() {
        let rig = Rig::new();
        rig.params.set_phase_calibration(1);
        rig.params.set_loop_params_available(true);
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([0]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));
        let decoder = rig.decoder();

        decoder.handle(&CommandPacket::enable(LoopSelect::Speed)).unwrap();
        block_on(sup.poll());
        assert!(rig.gate.secondary_enabled());

        // 速度 → トルクへの切り替えで外側ループは止まる
        decoder.handle(&CommandPacket::enable(LoopSelect::Torque)).unwrap();
        block_on(sup.poll());
        assert_eq!(rig.params.active_loop(), LoopSelect::Torque);
        assert!(rig.gate.primary_enabled());
        assert!(!rig.gate.secondary_enabled());

        // 別経路で外側ループが残っていてもDisableで必ず止める
        (&rig.gate).set_secondary(true);
        decoder.handle(&CommandPacket::control(opcode::DISABLE)).unwrap();
        assert_eq!(block_on(sup.poll()), ControlMode::Disable);
        assert!(!rig.gate.primary_enabled());
        assert!(!rig.gate.secondary_enabled());
    }

    #[test]
    fn test_torque_enable_keeps_outer_loop_off() {
        let rig = Rig::new();
        rig.params.set_phase_calibration(1);
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([0]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        // ループパラメータ未保存ならトルク制御
        rig.decoder()
            .handle(&CommandPacket::enable(LoopSelect::Angle))
            .unwrap();
        block_on(sup.poll());
        assert!(rig.gate.primary_enabled());
        assert!(!rig.gate.secondary_enabled());
    }

    #[test]
    fn test_report_dumps_parameters() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([0]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        rig.decoder()
            .handle(&CommandPacket::parameter(opcode::SET_SPEED_KP, 0.25))
            .unwrap();
        rig.decoder()
            .handle(&CommandPacket::control(opcode::REPORT))
            .unwrap();
        assert_eq!(block_on(sup.poll()), ControlMode::Report);

        let out = &sup.io().telemetry;
        assert!(out.contains("speed_pid.kp:0.25\r\n"));
        assert!(out.ends_with("angle:0, 0, 0.0\r\n"));
        assert_eq!(rig.modes.pending(), ControlMode::Idle);
    }

    #[test]
    fn test_persist_stops_loops_and_saves() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([0]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));
        (&rig.gate).set_primary(true);
        (&rig.gate).set_secondary(true);

        rig.decoder()
            .handle(&CommandPacket::control(opcode::PERSIST))
            .unwrap();
        assert_eq!(block_on(sup.poll()), ControlMode::Persist);

        assert!(!rig.gate.primary_enabled());
        assert!(!rig.gate.secondary_enabled());
        let saved = sup.io().store.stored.unwrap();
        assert!(saved.loop_params_available);
    }

    #[test]
    fn test_request_during_handling_is_rejected() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([0]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        let decoder = rig.decoder();
        decoder.handle(&CommandPacket::control(opcode::REPORT)).unwrap();
        assert!(decoder
            .handle(&CommandPacket::control(opcode::DISABLE))
            .is_err());

        block_on(sup.poll());
        assert!(decoder
            .handle(&CommandPacket::control(opcode::DISABLE))
            .is_ok());
    }

    #[test]
    fn test_boot_restores_and_zeroes() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([1500]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        let mut stored = ParameterSnapshot::default();
        stored.phase_params_available = true;
        stored.phase_sequence = 1;
        stored.speed.expect = 12.0;
        sup.io_mut().store.stored = Some(stored);

        block_on(sup.boot());

        assert_eq!(rig.params.snapshot(), stored);
        assert_eq!(motion.calibration_offset(), 1500);
        let out = &sup.io().telemetry;
        assert!(out.starts_with("hello world!\r\n"));
        assert!(out.contains("speed_pid.expect:12\r\n"));
        assert!(out.ends_with("phase_sequence:1\r\nmachine_angle_offset:0\r\n"));
    }

    #[test]
    fn test_boot_without_stored_parameters_uses_defaults() {
        let rig = Rig::new();
        let motion = MotionState::new();
        let tracker = Mutex::new(AngleTracker::new(FakeSensor::new([9]), 7, &motion));
        let driver = Mutex::new(FakeDriver::default());
        let mut sup = supervisor(&rig, &motion, &tracker, &driver, FixedCalibrator(Ok(1)));

        block_on(sup.boot());
        assert_eq!(rig.params.snapshot(), ParameterSnapshot::default());
        assert_eq!(motion.calibration_offset(), 9);
    }
}
