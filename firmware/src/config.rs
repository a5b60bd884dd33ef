//! Configuration module
//!
//! ボード固有の設定値。角度検出・制御パラメータは `minifoc::config` にあります。

pub mod params;

pub use params::*;
