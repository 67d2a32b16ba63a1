//! claw-mesh Nodeエージェント
//!
//! Coordinatorへの登録・ハートビート・メッセージ受信と
//! Gatewayへのパススルーを担うノード側サイドカー。

pub mod agent;
pub mod capabilities;
pub mod client;
pub mod gateway;
pub mod handler;
pub mod logging;
