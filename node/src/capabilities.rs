//! ケイパビリティ組み立て
//!
//! 実行環境の定数と運用者入力からCapabilitiesを構成する。
//! GPU・メモリ・スキルの自動検出は外部コンポーネントの責務。

use claw_mesh_common::types::Capabilities;

/// ローカルマシンのケイパビリティを組み立てる。
/// `tags` / `skills` / `gpu` / `memory_gb` は運用者入力をそのまま使う。
pub fn detect_capabilities(
    tags: Vec<String>,
    skills: Vec<String>,
    gpu: bool,
    memory_gb: u64,
) -> Capabilities {
    Capabilities {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        gpu,
        memory_gb,
        tags,
        skills,
    }
}
