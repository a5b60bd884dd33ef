//! 角度検出・速度推定・モード制御のパラメータ

use core::f32::consts::TAU;

/// エンコーダ分解能 [counts/rev]（12ビット角度フィールド）
pub const ENCODER_RESOLUTION: u16 = 4096;

/// バスワードから角度フィールドを取り出す右シフト量（下位4ビットはステータス）
pub const ENCODER_ANGLE_SHIFT: u32 = 4;

/// 角度読み出し時に送信するワード
pub const ENCODER_READ_COMMAND: u16 = 0x0000;

/// チップセレクト前後のセトリング時間 [ns]
pub const ENCODER_CS_SETTLE_NS: u32 = 2_000;

/// カウント → ラジアン変換係数
pub const COUNTS_TO_RADIANS: f32 = TAU / ENCODER_RESOLUTION as f32;

/// 回転数を補正するジャンプ量のしきい値 [rad]
///
/// Must exceed the largest mechanical travel between two angle updates at the
/// highest supported speed; anything above it is read as a 0/2π crossing.
/// At 2.5 kHz updates this allows genuine motion up to ~2000 rev/s.
pub const WRAP_THRESHOLD: f32 = 0.8 * TAU;

/// 速度推定の更新周波数 [Hz]（2ms周期）
pub const VELOCITY_SAMPLE_HZ: f32 = 500.0;

/// モーターの極対数（ポール数14 / 2 = 7）（デフォルト値）
pub const DEFAULT_POLE_PAIRS: u8 = 7;

/// ユーザートルク指令（デフォルト値）
pub const DEFAULT_USER_EXPECT: f32 = 0.1;

/// 速度ループPIDゲイン（デフォルト値）
pub mod speed {
    pub const DEFAULT_KP: f32 = 0.002;
    pub const DEFAULT_KI: f32 = 0.0001;
    pub const DEFAULT_KD: f32 = 0.0001;
    /// 積分項の上限
    pub const DEFAULT_SUM_MAXIMUM: f32 = 4000.0;
    /// 目標速度 [rad/s]
    pub const DEFAULT_EXPECT: f32 = 88.0;
}

/// 角度ループPIDゲイン（デフォルト値）
pub mod angle {
    pub const DEFAULT_KP: f32 = 0.5;
    pub const DEFAULT_KI: f32 = 0.0;
    pub const DEFAULT_KD: f32 = 0.0;
    /// 積分項の上限
    pub const DEFAULT_SUM_MAXIMUM: f32 = 100.0;
    /// 目標位置 [rad]（多回転）
    pub const DEFAULT_EXPECT: f32 = 0.0;
}

/// ゼロ点合わせ（d軸励磁）のタイミング
pub mod zeroing {
    /// d軸励磁の大きさ（正規化電圧）
    pub const EXCITATION: f32 = 0.5;

    /// 標準配線: 電源安定待ち [ms]
    pub const POWER_SETTLE_MS: u32 = 2_000;
    /// 標準配線: ロータ静定待ち [ms]
    pub const EXCITATION_SETTLE_MS: u32 = 300;

    /// U/W入れ替え配線: 電源安定待ち [ms]
    pub const SWAPPED_POWER_SETTLE_MS: u32 = 1_000;
    /// U/W入れ替え配線: ロータ静定待ち [ms]
    pub const SWAPPED_EXCITATION_SETTLE_MS: u32 = 500;

    /// 励磁解除後の待ち [ms]
    pub const RELEASE_SETTLE_MS: u32 = 300;
}

/// ポーリングループのタイミング
pub mod supervisor {
    /// Enable後、制御ループ起動までの待ち [ms]
    pub const ENABLE_SETTLE_MS: u32 = 1_000;
    /// Idle時のテレメトリ・ハートビート周期 [ms]
    pub const IDLE_PERIOD_MS: u32 = 500;
}
