//! Configuration module
//!
//! 制御パラメータの定数と、パラメータの永続化フォーマットを提供します。

pub mod params;
pub mod storage;

// params.rsから主要な定数を再エクスポート
pub use params::*;

// storage.rsから構造体を再エクスポート
pub use storage::{StorageError, StoredParameters};
