//! claw-mesh 共通ライブラリ
//!
//! Coordinator / Node間で共有する型・プロトコル・エラー・設定

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;
