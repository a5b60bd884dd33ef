//! テレメトリ出力（USART2 TX、PA2）

use core::fmt;

use embassy_stm32::{mode::Blocking, usart::UartTx};

/// `core::fmt::Write` をブロッキングUART送信に橋渡しする
pub struct TelemetryPort {
    tx: UartTx<'static, Blocking>,
}

impl TelemetryPort {
    pub fn new(tx: UartTx<'static, Blocking>) -> Self {
        Self { tx }
    }
}

impl fmt::Write for TelemetryPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.tx.blocking_write(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
