//! SPI磁気エンコーダの読み取り
//!
//! チップセレクトで囲んだ16ビットの半二重転送を1回行います。
//! バスが0を返した場合は一時的な欠落とみなし、前回の値を返します。

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::AngleSensor;
use crate::config::{ENCODER_ANGLE_SHIFT, ENCODER_CS_SETTLE_NS, ENCODER_READ_COMMAND};

/// Chip-select gated encoder reader
pub struct EncoderReader<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
    /// 最後に読めた0以外の値
    last_sample: u16,
}

impl<SPI, CS, D> EncoderReader<SPI, CS, D>
where
    SPI: SpiBus<u16>,
    CS: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self {
            spi,
            cs,
            delay,
            last_sample: 0,
        }
    }

    /// Read one raw bus word
    ///
    /// # Returns
    /// The received word, or the last non-zero word when the bus returned
    /// zero or failed. Zero until the first non-zero word has been seen.
    pub fn read(&mut self) -> u16 {
        let mut word = [ENCODER_READ_COMMAND];

        if self.cs.set_low().is_err() {
            warn!("Encoder: chip select assert failed");
        }
        self.delay.delay_ns(ENCODER_CS_SETTLE_NS);
        let result = self
            .spi
            .transfer_in_place(&mut word)
            .and_then(|_| self.spi.flush());
        self.delay.delay_ns(ENCODER_CS_SETTLE_NS);
        if self.cs.set_high().is_err() {
            warn!("Encoder: chip select release failed");
        }

        match result {
            Ok(()) if word[0] != 0 => {
                self.last_sample = word[0];
                word[0]
            }
            // ゼロはバスの瞬断
            Ok(()) => self.last_sample,
            Err(_) => {
                warn!("Encoder: SPI transfer failed, keeping last sample");
                self.last_sample
            }
        }
    }

    pub fn last_sample(&self) -> u16 {
        self.last_sample
    }

    /// Give the bus, select pin and delay back
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }
}

impl<SPI, CS, D> AngleSensor for EncoderReader<SPI, CS, D>
where
    SPI: SpiBus<u16>,
    CS: OutputPin,
    D: DelayNs,
{
    fn read_counts(&mut self) -> u16 {
        self.read() >> ENCODER_ANGLE_SHIFT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use embedded_hal::spi::{ErrorKind, ErrorType};

    #[derive(Debug)]
    struct BusFault;

    impl embedded_hal::spi::Error for BusFault {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// 応答キューを順に返すSPIバス
    struct FakeSpi {
        responses: VecDeque<Result<u16, BusFault>>,
        sent: Vec<u16>,
    }

    impl FakeSpi {
        fn new(responses: impl IntoIterator<Item = Result<u16, BusFault>>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl ErrorType for FakeSpi {
        type Error = BusFault;
    }

    impl SpiBus<u16> for FakeSpi {
        fn read(&mut self, words: &mut [u16]) -> Result<(), BusFault> {
            self.transfer_in_place(words)
        }

        fn write(&mut self, words: &[u16]) -> Result<(), BusFault> {
            self.sent.extend_from_slice(words);
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u16], write: &[u16]) -> Result<(), BusFault> {
            self.sent.extend_from_slice(write);
            self.transfer_in_place(read)
        }

        fn transfer_in_place(&mut self, words: &mut [u16]) -> Result<(), BusFault> {
            for word in words.iter_mut() {
                self.sent.push(*word);
                *word = self.responses.pop_front().unwrap_or(Ok(0))?;
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<(), BusFault> {
            Ok(())
        }
    }

    /// 状態遷移を記録するCSピン
    #[derive(Default)]
    struct FakeCs {
        transitions: Vec<bool>,
    }

    impl embedded_hal::digital::ErrorType for FakeCs {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for FakeCs {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.transitions.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.transitions.push(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    fn reader(
        responses: impl IntoIterator<Item = Result<u16, BusFault>>,
    ) -> EncoderReader<FakeSpi, FakeCs, CountingDelay> {
        EncoderReader::new(
            FakeSpi::new(responses),
            FakeCs::default(),
            CountingDelay::default(),
        )
    }

    #[test]
    fn test_read_is_chip_select_gated() {
        let mut encoder = reader([Ok(0x1230)]);
        assert_eq!(encoder.read(), 0x1230);

        let (spi, cs, delay) = encoder.release();
        assert_eq!(spi.sent, vec![ENCODER_READ_COMMAND]);
        assert_eq!(cs.transitions, vec![false, true]);
        assert_eq!(delay.total_ns, 2 * u64::from(ENCODER_CS_SETTLE_NS));
    }

    #[test]
    fn test_first_zero_read_returns_zero() {
        let mut encoder = reader([Ok(0)]);
        assert_eq!(encoder.read(), 0);
        assert_eq!(encoder.last_sample(), 0);
    }

    #[test]
    fn test_zero_word_returns_last_sample() {
        let mut encoder = reader([Ok(0x8000), Ok(0), Ok(0), Ok(0x4010)]);
        assert_eq!(encoder.read(), 0x8000);
        assert_eq!(encoder.read(), 0x8000);
        assert_eq!(encoder.read(), 0x8000);
        assert_eq!(encoder.read(), 0x4010);
    }

    #[test]
    fn test_bus_error_returns_last_sample() {
        let mut encoder = reader([Ok(0x0FF0), Err(BusFault)]);
        assert_eq!(encoder.read(), 0x0FF0);
        assert_eq!(encoder.read(), 0x0FF0);

        // 失敗してもCSは解放される
        let (_, cs, _) = encoder.release();
        assert_eq!(cs.transitions, vec![false, true, false, true]);
    }

    #[test]
    fn test_read_counts_drops_status_bits() {
        let mut encoder = reader([Ok(0xFFFF), Ok(0x001F)]);
        assert_eq!(encoder.read_counts(), 4095);
        assert_eq!(encoder.read_counts(), 1);
    }
}
