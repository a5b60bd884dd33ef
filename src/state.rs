//! 共有状態
//!
//! 割り込み的コンテキスト（周期ループ、コマンド受信）とポーリングループの間で
//! 共有される値。各フィールドの書き込み側は1つだけで、書き込みメソッドは
//! クレート内部（デコーダ・角度トラッカ・速度推定）にのみ公開します。

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::{self, DEFAULT_USER_EXPECT};

/// Tear-free `f32` cell built on `AtomicU32` bit patterns.
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub const fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// 有効な制御ループ
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopSelect {
    /// トルク制御（一次ループのみ）
    Torque = 0,
    /// 速度制御（一次 + 外側ループ）
    Speed = 1,
    /// 角度制御（一次 + 外側ループ）
    Angle = 2,
}

impl LoopSelect {
    /// Unknown selector bytes fall back to torque control.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Speed,
            2 => Self::Angle,
            _ => Self::Torque,
        }
    }

    /// Whether the secondary (outer) loop trigger takes part in this mode.
    pub fn uses_outer_loop(self) -> bool {
        self != Self::Torque
    }
}

/// PIDゲインと目標値のスナップショット
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// 積分項の上限
    pub sum_maximum: f32,
    /// 目標値
    pub expect: f32,
}

impl PidGains {
    pub const fn speed_default() -> Self {
        Self {
            kp: config::speed::DEFAULT_KP,
            ki: config::speed::DEFAULT_KI,
            kd: config::speed::DEFAULT_KD,
            sum_maximum: config::speed::DEFAULT_SUM_MAXIMUM,
            expect: config::speed::DEFAULT_EXPECT,
        }
    }

    pub const fn angle_default() -> Self {
        Self {
            kp: config::angle::DEFAULT_KP,
            ki: config::angle::DEFAULT_KI,
            kd: config::angle::DEFAULT_KD,
            sum_maximum: config::angle::DEFAULT_SUM_MAXIMUM,
            expect: config::angle::DEFAULT_EXPECT,
        }
    }
}

/// PIDパラメータのフィールド識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PidField {
    Kp,
    Ki,
    Kd,
    SumMaximum,
    Expect,
}

/// 1つのPIDループの共有パラメータ
pub struct PidParameters {
    kp: AtomicF32,
    ki: AtomicF32,
    kd: AtomicF32,
    sum_maximum: AtomicF32,
    expect: AtomicF32,
}

impl PidParameters {
    const fn new(gains: PidGains) -> Self {
        Self {
            kp: AtomicF32::new(gains.kp),
            ki: AtomicF32::new(gains.ki),
            kd: AtomicF32::new(gains.kd),
            sum_maximum: AtomicF32::new(gains.sum_maximum),
            expect: AtomicF32::new(gains.expect),
        }
    }

    fn field(&self, field: PidField) -> &AtomicF32 {
        match field {
            PidField::Kp => &self.kp,
            PidField::Ki => &self.ki,
            PidField::Kd => &self.kd,
            PidField::SumMaximum => &self.sum_maximum,
            PidField::Expect => &self.expect,
        }
    }

    pub fn get(&self, field: PidField) -> f32 {
        self.field(field).load()
    }

    pub(crate) fn set(&self, field: PidField, value: f32) {
        self.field(field).store(value);
    }

    /// Each field is read atomically; fields updated in between two reads
    /// may mix old and new values, which the regulators tolerate.
    pub fn gains(&self) -> PidGains {
        PidGains {
            kp: self.kp.load(),
            ki: self.ki.load(),
            kd: self.kd.load(),
            sum_maximum: self.sum_maximum.load(),
            expect: self.expect.load(),
        }
    }

    fn store_gains(&self, gains: &PidGains) {
        self.kp.store(gains.kp);
        self.ki.store(gains.ki);
        self.kd.store(gains.kd);
        self.sum_maximum.store(gains.sum_maximum);
        self.expect.store(gains.expect);
    }
}

/// 永続化・レポート用のパラメータ一式
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParameterSnapshot {
    pub user_expect: f32,
    pub speed: PidGains,
    pub angle: PidGains,
    pub active_loop: LoopSelect,
    /// 相順・オフセットのキャリブレーション済みフラグ
    pub phase_params_available: bool,
    /// PIDパラメータ保存済みフラグ
    pub loop_params_available: bool,
    /// 検出された相順
    pub phase_sequence: u8,
}

impl ParameterSnapshot {
    pub const fn default() -> Self {
        Self {
            user_expect: DEFAULT_USER_EXPECT,
            speed: PidGains::speed_default(),
            angle: PidGains::angle_default(),
            active_loop: LoopSelect::Torque,
            phase_params_available: false,
            loop_params_available: false,
            phase_sequence: 0,
        }
    }
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self::default()
    }
}

/// レギュレータが読み、コマンドデコーダだけが書く制御パラメータ
pub struct ControlParameters {
    user_expect: AtomicF32,
    speed: PidParameters,
    angle: PidParameters,
    active_loop: AtomicU8,
    phase_params_available: AtomicBool,
    loop_params_available: AtomicBool,
    phase_sequence: AtomicU8,
}

impl ControlParameters {
    pub const fn new() -> Self {
        Self {
            user_expect: AtomicF32::new(DEFAULT_USER_EXPECT),
            speed: PidParameters::new(PidGains::speed_default()),
            angle: PidParameters::new(PidGains::angle_default()),
            active_loop: AtomicU8::new(LoopSelect::Torque as u8),
            phase_params_available: AtomicBool::new(false),
            loop_params_available: AtomicBool::new(false),
            phase_sequence: AtomicU8::new(0),
        }
    }

    pub fn user_expect(&self) -> f32 {
        self.user_expect.load()
    }

    pub(crate) fn set_user_expect(&self, value: f32) {
        self.user_expect.store(value);
    }

    pub fn speed(&self) -> &PidParameters {
        &self.speed
    }

    pub fn angle(&self) -> &PidParameters {
        &self.angle
    }

    /// Parameters of the regulator selected by `select`; torque has none.
    pub fn pid(&self, select: LoopSelect) -> Option<&PidParameters> {
        match select {
            LoopSelect::Torque => None,
            LoopSelect::Speed => Some(&self.speed),
            LoopSelect::Angle => Some(&self.angle),
        }
    }

    pub fn active_loop(&self) -> LoopSelect {
        LoopSelect::from_u8(self.active_loop.load(Ordering::Relaxed))
    }

    pub(crate) fn set_active_loop(&self, select: LoopSelect) {
        self.active_loop.store(select as u8, Ordering::Relaxed);
    }

    /// Current target of the active loop: torque command, speed or position.
    pub fn active_target(&self) -> f32 {
        match self.pid(self.active_loop()) {
            Some(pid) => pid.get(PidField::Expect),
            None => self.user_expect(),
        }
    }

    pub fn phase_params_available(&self) -> bool {
        self.phase_params_available.load(Ordering::Acquire)
    }

    pub fn loop_params_available(&self) -> bool {
        self.loop_params_available.load(Ordering::Acquire)
    }

    pub(crate) fn set_loop_params_available(&self, available: bool) {
        self.loop_params_available.store(available, Ordering::Release);
    }

    pub fn phase_sequence(&self) -> u8 {
        self.phase_sequence.load(Ordering::Relaxed)
    }

    /// Recorded by a successful phase calibration.
    pub(crate) fn set_phase_calibration(&self, phase_sequence: u8) {
        self.phase_sequence.store(phase_sequence, Ordering::Relaxed);
        self.phase_params_available.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            user_expect: self.user_expect(),
            speed: self.speed.gains(),
            angle: self.angle.gains(),
            active_loop: self.active_loop(),
            phase_params_available: self.phase_params_available(),
            loop_params_available: self.loop_params_available(),
            phase_sequence: self.phase_sequence(),
        }
    }

    /// Boot-time load of persisted parameters, before any decoder runs.
    pub(crate) fn restore(&self, snapshot: &ParameterSnapshot) {
        self.user_expect.store(snapshot.user_expect);
        self.speed.store_gains(&snapshot.speed);
        self.angle.store_gains(&snapshot.angle);
        self.set_active_loop(snapshot.active_loop);
        self.phase_sequence
            .store(snapshot.phase_sequence, Ordering::Relaxed);
        self.phase_params_available
            .store(snapshot.phase_params_available, Ordering::Release);
        self.set_loop_params_available(snapshot.loop_params_available);
    }
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// 多回転位置（回転数 + 前回機械角[rad]）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    pub rotations: i64,
    pub radians: f32,
}

impl Position {
    pub const ZERO: Self = Self {
        rotations: 0,
        radians: 0.0,
    };

    /// 累積位置 [rad]
    pub fn total_radians(&self) -> f32 {
        self.rotations as f32 * core::f32::consts::TAU + self.radians
    }
}

/// テレメトリ用の角度・速度スナップショット
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionSnapshot {
    pub rotations: i64,
    pub mechanical_angle: u16,
    pub velocity: f32,
    pub calibration_offset: u16,
}

/// 角度トラッカ・速度推定の結果を他コンテキストへ公開する
pub struct MotionState {
    /// rotations and radians change together, so they share one lock
    position: Mutex<CriticalSectionRawMutex, Cell<Position>>,
    /// bumped whenever zeroing resets the rotation counter
    generation: AtomicU32,
    mechanical_angle: AtomicU16,
    calibration_offset: AtomicU16,
    velocity: AtomicF32,
}

impl MotionState {
    pub const fn new() -> Self {
        Self {
            position: Mutex::new(Cell::new(Position::ZERO)),
            generation: AtomicU32::new(0),
            mechanical_angle: AtomicU16::new(0),
            calibration_offset: AtomicU16::new(0),
            velocity: AtomicF32::new(0.0),
        }
    }

    pub fn position(&self) -> Position {
        self.position.lock(Cell::get)
    }

    /// Position together with the zeroing generation it belongs to.
    pub fn position_with_generation(&self) -> (Position, u32) {
        self.position
            .lock(|cell| (cell.get(), self.generation.load(Ordering::Acquire)))
    }

    pub fn rotations(&self) -> i64 {
        self.position().rotations
    }

    pub fn mechanical_angle(&self) -> u16 {
        self.mechanical_angle.load(Ordering::Relaxed)
    }

    pub fn calibration_offset(&self) -> u16 {
        self.calibration_offset.load(Ordering::Relaxed)
    }

    /// 低域通過後の角速度 [rad/s]
    pub fn velocity(&self) -> f32 {
        self.velocity.load()
    }

    pub fn snapshot(&self) -> MotionSnapshot {
        MotionSnapshot {
            rotations: self.rotations(),
            mechanical_angle: self.mechanical_angle(),
            velocity: self.velocity(),
            calibration_offset: self.calibration_offset(),
        }
    }

    pub(crate) fn publish_angle(&self, position: Position, mechanical_angle: u16) {
        self.position.lock(|cell| cell.set(position));
        self.mechanical_angle
            .store(mechanical_angle, Ordering::Relaxed);
    }

    pub(crate) fn publish_zeroing(&self, offset: u16) {
        self.position.lock(|cell| {
            cell.set(Position::ZERO);
            self.generation.fetch_add(1, Ordering::AcqRel);
        });
        self.calibration_offset.store(offset, Ordering::Relaxed);
    }

    pub(crate) fn publish_velocity(&self, velocity: f32) {
        self.velocity.store(velocity);
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new()
    }
}
