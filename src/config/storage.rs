//! 制御パラメータの永続化フォーマット
//!
//! フラッシュ1ページに保存する固定長レコード。フィールドは明示的な
//! リトルエンディアン配置で、末尾のCRC32で破損を検出します。
//!
//! | offset | 内容 |
//! |---|---|
//! | 0 | magic (u32) |
//! | 4 | version (u16) |
//! | 6 | flags (bit0: 相順パラメータ有効, bit1: ループパラメータ有効) |
//! | 7 | phase_sequence (u8) |
//! | 8 | active_loop (u8) + 3 byte padding |
//! | 12 | user_expect (f32) |
//! | 16 | speed kp, ki, kd, sum_maximum, expect (f32 × 5) |
//! | 36 | angle kp, ki, kd, sum_maximum, expect (f32 × 5) |
//! | 56 | crc32 (bytes 0..56) |
//! | 60 | padding (ダブルワード書き込み境界) |

use crate::state::{LoopSelect, ParameterSnapshot, PidGains};

/// レコードのマジックナンバー（"MFC1"のASCII）
pub const STORAGE_MAGIC: u32 = 0x3143_464D;

/// 現在のレコードバージョン
pub const STORAGE_VERSION: u16 = 1;

/// レコード長 [bytes]（8バイト単位）
pub const STORED_LEN: usize = 64;

const FLAGS_OFFSET: usize = 6;
const PHASE_SEQUENCE_OFFSET: usize = 7;
const ACTIVE_LOOP_OFFSET: usize = 8;
const USER_EXPECT_OFFSET: usize = 12;
const SPEED_OFFSET: usize = 16;
const ANGLE_OFFSET: usize = 36;
const CRC_OFFSET: usize = 56;

const FLAG_PHASE_PARAMS: u8 = 1 << 0;
const FLAG_LOOP_PARAMS: u8 = 1 << 1;

/// Validation failures of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// データサイズエラー
    InvalidSize,
    /// マジックナンバー不一致（未書き込みページを含む）
    InvalidMagic,
    /// バージョン不一致
    VersionMismatch,
    /// CRC検証エラー
    CrcMismatch,
}

/// Persisted parameter record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredParameters {
    pub magic: u32,
    pub version: u16,
    pub parameters: ParameterSnapshot,
    pub crc32: u32,
}

impl StoredParameters {
    pub fn new(parameters: ParameterSnapshot) -> Self {
        let mut stored = Self {
            magic: STORAGE_MAGIC,
            version: STORAGE_VERSION,
            parameters,
            crc32: 0,
        };
        let bytes = stored.to_bytes();
        stored.crc32 = calculate_crc(&bytes[..CRC_OFFSET]);
        stored
    }

    /// Serialize into the on-flash layout (CRC field taken as is)
    pub fn to_bytes(&self) -> [u8; STORED_LEN] {
        let mut bytes = [0u8; STORED_LEN];
        let p = &self.parameters;

        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());

        let mut flags = 0;
        if p.phase_params_available {
            flags |= FLAG_PHASE_PARAMS;
        }
        if p.loop_params_available {
            flags |= FLAG_LOOP_PARAMS;
        }
        bytes[FLAGS_OFFSET] = flags;
        bytes[PHASE_SEQUENCE_OFFSET] = p.phase_sequence;
        bytes[ACTIVE_LOOP_OFFSET] = p.active_loop as u8;

        write_f32(&mut bytes, USER_EXPECT_OFFSET, p.user_expect);
        write_gains(&mut bytes, SPEED_OFFSET, &p.speed);
        write_gains(&mut bytes, ANGLE_OFFSET, &p.angle);

        bytes[CRC_OFFSET..CRC_OFFSET + 4].copy_from_slice(&self.crc32.to_le_bytes());
        bytes
    }

    /// Parse and validate a record read back from flash
    ///
    /// # Returns
    /// * `Ok(StoredParameters)` - header and CRC valid
    /// * `Err(StorageError)` - the first check that failed
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < STORED_LEN {
            return Err(StorageError::InvalidSize);
        }

        let magic = read_u32(bytes, 0);
        if magic != STORAGE_MAGIC {
            return Err(StorageError::InvalidMagic);
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != STORAGE_VERSION {
            error!("Stored parameters: version {} unsupported", version);
            return Err(StorageError::VersionMismatch);
        }

        let crc32 = read_u32(bytes, CRC_OFFSET);
        if calculate_crc(&bytes[..CRC_OFFSET]) != crc32 {
            error!("Stored parameters: CRC mismatch, stored=0x{:08X}", crc32);
            return Err(StorageError::CrcMismatch);
        }

        let flags = bytes[FLAGS_OFFSET];
        let parameters = ParameterSnapshot {
            user_expect: read_f32(bytes, USER_EXPECT_OFFSET),
            speed: read_gains(bytes, SPEED_OFFSET),
            angle: read_gains(bytes, ANGLE_OFFSET),
            active_loop: LoopSelect::from_u8(bytes[ACTIVE_LOOP_OFFSET]),
            phase_params_available: flags & FLAG_PHASE_PARAMS != 0,
            loop_params_available: flags & FLAG_LOOP_PARAMS != 0,
            phase_sequence: bytes[PHASE_SEQUENCE_OFFSET],
        };

        Ok(Self {
            magic,
            version,
            parameters,
            crc32,
        })
    }

    /// マジックナンバーとバージョンを検証
    pub fn validate_header(&self) -> bool {
        self.magic == STORAGE_MAGIC && self.version == STORAGE_VERSION
    }
}

fn calculate_crc(body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    hasher.finalize()
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_bits(read_u32(bytes, at))
}

fn write_f32(bytes: &mut [u8], at: usize, value: f32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_gains(bytes: &[u8], at: usize) -> PidGains {
    PidGains {
        kp: read_f32(bytes, at),
        ki: read_f32(bytes, at + 4),
        kd: read_f32(bytes, at + 8),
        sum_maximum: read_f32(bytes, at + 12),
        expect: read_f32(bytes, at + 16),
    }
}

fn write_gains(bytes: &mut [u8], at: usize, gains: &PidGains) {
    write_f32(bytes, at, gains.kp);
    write_f32(bytes, at + 4, gains.ki);
    write_f32(bytes, at + 8, gains.kd);
    write_f32(bytes, at + 12, gains.sum_maximum);
    write_f32(bytes, at + 16, gains.expect);
}

// レイアウトがレコード長に収まることを確認
const _: () = assert!(CRC_OFFSET + 4 <= STORED_LEN && STORED_LEN % 8 == 0);
