//! 制御モードと単一スロットのモード要求
//!
//! コマンドデコーダは Idle のときだけモードを要求でき、ポーリングループは
//! 処理を完了してから Idle に戻します。処理中の要求は `ModeBusy` で拒否され、
//! 上書きされることはありません。

use core::sync::atomic::{AtomicU8, Ordering};

/// ポーリングループが処理する制御モード
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    /// 定常状態（テレメトリ + ハートビート）
    Idle = 0,
    /// 相順検出 + ゼロ点合わせ + 保存
    Calibrate = 1,
    /// 制御ループ起動
    Enable = 2,
    /// 制御ループ停止
    Disable = 3,
    /// パラメータレポート
    Report = 4,
    /// パラメータ保存
    Persist = 5,
}

impl ControlMode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Idle),
            1 => Some(Self::Calibrate),
            2 => Some(Self::Enable),
            3 => Some(Self::Disable),
            4 => Some(Self::Report),
            5 => Some(Self::Persist),
            _ => None,
        }
    }
}

/// Mode request rejected because `pending` has not been handled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeBusy {
    pub pending: ControlMode,
}

impl core::fmt::Display for ModeBusy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "mode {:?} still pending", self.pending)
    }
}

/// Single-slot mode request shared by the decoder and the polling loop.
pub struct ModeSlot {
    state: AtomicU8,
}

impl ModeSlot {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ControlMode::Idle as u8),
        }
    }

    /// Claims the slot for `mode` if it is idle.
    ///
    /// Requesting `Idle` is a no-op and always succeeds.
    pub fn request(&self, mode: ControlMode) -> Result<(), ModeBusy> {
        if mode == ControlMode::Idle {
            return Ok(());
        }

        match self.state.compare_exchange(
            ControlMode::Idle as u8,
            mode as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!("Mode requested: {}", mode as u8);
                Ok(())
            }
            Err(current) => {
                let pending = ControlMode::from_u8(current).unwrap_or(ControlMode::Idle);
                warn!(
                    "Mode request {} rejected, {} still pending",
                    mode as u8, current
                );
                Err(ModeBusy { pending })
            }
        }
    }

    /// Mode the polling loop has to handle next.
    pub fn pending(&self) -> ControlMode {
        ControlMode::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(ControlMode::Idle)
    }

    /// Called by the polling loop once the pending action has finished.
    pub fn complete(&self) {
        self.state
            .store(ControlMode::Idle as u8, Ordering::Release);
    }
}

impl Default for ModeSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_idle() {
        let slot = ModeSlot::new();
        assert_eq!(slot.pending(), ControlMode::Idle);
        assert_eq!(slot.request(ControlMode::Calibrate), Ok(()));
        assert_eq!(slot.pending(), ControlMode::Calibrate);
    }

    #[test]
    fn test_request_while_pending_is_rejected() {
        let slot = ModeSlot::new();
        slot.request(ControlMode::Enable).unwrap();

        let busy = slot.request(ControlMode::Disable).unwrap_err();
        assert_eq!(busy.pending, ControlMode::Enable);
        // 先の要求は上書きされない
        assert_eq!(slot.pending(), ControlMode::Enable);

        slot.complete();
        assert_eq!(slot.request(ControlMode::Disable), Ok(()));
    }

    #[test]
    fn test_request_idle_is_noop() {
        let slot = ModeSlot::new();
        slot.request(ControlMode::Report).unwrap();
        assert_eq!(slot.request(ControlMode::Idle), Ok(()));
        assert_eq!(slot.pending(), ControlMode::Report);
    }

    #[test]
    fn test_mode_codes() {
        for code in 0..=5u8 {
            let mode = ControlMode::from_u8(code).unwrap();
            assert_eq!(mode as u8, code);
        }
        assert_eq!(ControlMode::from_u8(6), None);
    }
}
