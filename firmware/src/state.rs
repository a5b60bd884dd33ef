//! グローバル共有状態管理
//!
//! コマンド受信・ポーリングループ・周期ループの間で共有される状態。
//! スカラー値はアトミック、エンコーダとPWMはMutexで保護します
//! （ロック順: エンコーダ → PWM）。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;
use minifoc::state::AtomicF32;
use minifoc::{AngleTracker, ControlParameters, LoopGate, ModeSlot, MotionState};

use crate::hardware::Encoder;
use crate::motor_driver::MotorDriver;

/// 要求中の制御モード
pub static MODES: ModeSlot = ModeSlot::new();

/// 制御パラメータ（目標値・PIDゲイン・キャリブレーション状態）
pub static PARAMS: ControlParameters = ControlParameters::new();

/// 角度・回転数・速度
pub static MOTION: MotionState = MotionState::new();

/// 周期ループの有効/無効
pub static GATE: LoopGate = LoopGate::new();

/// 外側ループの出力（q軸電圧指令）
pub static OUTER_OUTPUT: AtomicF32 = AtomicF32::new(0.0);

pub type SharedTracker = Mutex<ThreadModeRawMutex, AngleTracker<'static, Encoder>>;

pub type SharedDriver = Mutex<ThreadModeRawMutex, MotorDriver>;
