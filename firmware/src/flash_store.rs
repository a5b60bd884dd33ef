//! フラッシュメモリへのパラメータ保存
//!
//! STM32G431VBの最終フラッシュページ（ページ63）にパラメータレコードを1件だけ
//! 保存します。レコードの形式と検証は `minifoc::config::StoredParameters` が担当します。

use embassy_stm32::flash::{Blocking, Error as FlashError, Flash};
use minifoc::config::{StorageError, StoredParameters, STORED_LEN};
use minifoc::{ParameterSnapshot, ParameterStore};

use crate::config::flash::{PAGE_SIZE, PARAMETER_PAGE_OFFSET};

/// パラメータ保存のエラー型
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashStoreError {
    /// フラッシュ消去エラー
    Erase(FlashError),

    /// フラッシュ書き込みエラー
    Write(FlashError),

    /// フラッシュ読み取りエラー
    Read(FlashError),

    /// レコードが無効（未書き込み・CRC・バージョン）
    Storage(StorageError),
}

pub struct FlashStore {
    flash: Flash<'static, Blocking>,
}

impl FlashStore {
    pub fn new(flash: Flash<'static, Blocking>) -> Self {
        Self { flash }
    }
}

impl ParameterStore for FlashStore {
    type Error = FlashStoreError;

    async fn load(&mut self) -> Result<ParameterSnapshot, FlashStoreError> {
        info!("Reading parameters from flash offset 0x{:05X}", PARAMETER_PAGE_OFFSET);

        let mut buffer = [0u8; STORED_LEN];
        self.flash
            .blocking_read(PARAMETER_PAGE_OFFSET, &mut buffer)
            .map_err(|e| {
                error!("Flash read failed: {:?}", e);
                FlashStoreError::Read(e)
            })?;

        let stored = StoredParameters::from_bytes(&buffer).map_err(|e| {
            warn!("Stored parameters rejected: {:?}", e);
            FlashStoreError::Storage(e)
        })?;

        info!("Parameters loaded: version={}", stored.version);
        Ok(stored.parameters)
    }

    async fn save(&mut self, snapshot: &ParameterSnapshot) -> Result<(), FlashStoreError> {
        let stored = StoredParameters::new(*snapshot);
        info!("Writing parameters: crc=0x{:08X}", stored.crc32);

        self.flash
            .blocking_erase(PARAMETER_PAGE_OFFSET, PARAMETER_PAGE_OFFSET + PAGE_SIZE)
            .map_err(|e| {
                error!("Flash erase failed: {:?}", e);
                FlashStoreError::Erase(e)
            })?;

        self.flash
            .blocking_write(PARAMETER_PAGE_OFFSET, &stored.to_bytes())
            .map_err(|e| {
                error!("Flash write failed: {:?}", e);
                FlashStoreError::Write(e)
            })?;

        info!("Parameters saved");
        Ok(())
    }
}
