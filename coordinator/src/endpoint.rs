//! エンドポイント検証
//!
//! 登録時に提示されたエンドポイントが host:port 形式であること、
//! また（許可されていない限り）プライベート/ループバックアドレスを
//! 指していないことを検証する。SSRF対策。

use std::net::IpAddr;

use claw_mesh_common::error::{CoordinatorError, CoordinatorResult};

/// エンドポイント文字列を検証する。
///
/// `allow_private` がtrueの場合は形式チェックのみ行う。
/// ホスト名はすべての解決先アドレスが検査対象になる。解決に失敗した
/// 場合は通す（Coordinator側からのみ到達可能な名前がありうる）。
pub async fn validate_endpoint(endpoint: &str, allow_private: bool) -> CoordinatorResult<()> {
    if endpoint.contains('/') {
        return Err(CoordinatorError::Validation(
            "endpoint must be host:port, not a URL".to_string(),
        ));
    }

    let Some((host, port)) = endpoint.rsplit_once(':') else {
        return Err(CoordinatorError::Validation(
            "endpoint must be host:port format".to_string(),
        ));
    };
    if host.is_empty() || port.is_empty() {
        return Err(CoordinatorError::Validation(
            "endpoint must have both host and port".to_string(),
        ));
    }

    if allow_private {
        return Ok(());
    }

    // IPv6リテラルの角括弧を剥がしてから判定する
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(CoordinatorError::Validation(
                "private/loopback endpoints not allowed (set allow_private to permit)".to_string(),
            ));
        }
        return Ok(());
    }

    match tokio::net::lookup_host((bare_host, 0u16)).await {
        Ok(addrs) => {
            for addr in addrs {
                if is_private_ip(addr.ip()) {
                    return Err(CoordinatorError::Validation(format!(
                        "endpoint resolves to private/loopback IP {} (set allow_private to permit)",
                        addr.ip()
                    )));
                }
            }
            Ok(())
        }
        // 解決不能なホスト名は許容する
        Err(_) => Ok(()),
    }
}

/// ループバック・リンクローカル・RFC1918プライベート帯か
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local() || v4.is_private(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}
