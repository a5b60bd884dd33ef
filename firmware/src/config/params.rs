//! ボード・周期タスクの設定パラメータ

/// 一次（トルク）ループ周期 [μs]（2.5kHz = 400μs）
pub const TORQUE_LOOP_PERIOD_US: u64 = 400;

/// 外側（速度・角度）ループ周期 [μs]（速度推定と同じ 500Hz）
pub const OUTER_LOOP_PERIOD_US: u64 = 2_000;

/// 外側ループ出力（q軸電圧指令）の上限（正規化）
pub const MAX_Q_VOLTAGE: f32 = 0.9;

/// 速度推定のローパスフィルタ係数（0 < α ≤ 1）
pub const VELOCITY_FILTER_ALPHA: f32 = 0.1;

/// PWM設定
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// PWM周波数（20kHz）
    pub const FREQUENCY: Hertz = Hertz(20_000);

    /// デッドタイム
    pub const DEAD_TIME: u16 = 50;
}

/// CAN設定
pub mod can {
    /// CANビットレート（1Mbps）
    pub const BITRATE: u32 = 1_000_000;

    /// コマンドパケットの先頭ID（パケットID 0 = 0x100）
    pub const COMMAND_BASE_ID: u16 = 0x100;

    /// 受け付けるパケットIDの数
    pub const COMMAND_ID_COUNT: u16 = 0x10;
}

/// テレメトリUART設定
pub mod uart {
    pub const BAUDRATE: u32 = 115_200;
}

/// エンコーダSPI設定
pub mod encoder {
    use embassy_stm32::time::Hertz;

    /// SPIクロック（1MHz）
    pub const SPI_FREQUENCY: Hertz = Hertz(1_000_000);
}

/// 相順検出
pub mod phase_detect {
    /// d軸励磁の大きさ（正規化電圧）
    pub const EXCITATION: f32 = 0.4;

    /// 電気角1周あたりのステップ数
    pub const STEPS: u32 = 64;

    /// 1ステップの待ち時間 [ms]
    pub const STEP_MS: u64 = 5;

    /// 初期位置への吸着待ち [ms]
    pub const ALIGN_MS: u64 = 500;

    /// 有効とみなす最小移動量 [counts]
    pub const MIN_TRAVEL_COUNTS: i32 = 20;
}

/// フラッシュ（パラメータ保存ページ）
pub mod flash {
    /// STM32G431VBのフラッシュページサイズ（2KB）
    pub const PAGE_SIZE: u32 = 2048;

    /// 最終ページのフラッシュ先頭からのオフセット（128KB - 2KB）
    pub const PARAMETER_PAGE_OFFSET: u32 = 0x1F800;
}
