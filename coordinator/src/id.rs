//! 識別子・トークン生成
//!
//! ノードID（"node-" + 16桁hex）とノードトークン（32桁hex）を乱数から生成する。

use rand::Rng;

/// ID衝突時の再試行上限
pub const MAX_ID_RETRIES: usize = 3;

/// ランダムなIDを生成する（例: "node-a1b2c3d4e5f6a7b8"）
pub fn generate_id() -> String {
    let bytes: u64 = rand::thread_rng().gen();
    format!("node-{bytes:016x}")
}

/// ノード認証用のランダムトークンを生成する（32桁hex）
pub fn generate_token() -> String {
    let bytes: u128 = rand::thread_rng().gen();
    format!("{bytes:032x}")
}
