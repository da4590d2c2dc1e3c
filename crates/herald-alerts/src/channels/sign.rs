//! Robot webhook request signing.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AlertError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Base64 of HMAC-SHA256(`key`, `message`).
pub(super) fn hmac_sha256_base64(key: &[u8], message: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| AlertError::NotificationFailed {
        reason: format!("sign: {e}"),
    })?;
    mac.update(message);
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// DingTalk: the secret keys an HMAC over `"{timestamp}\n{secret}"`.
pub(super) fn dingtalk_sign(timestamp_ms: i64, secret: &str) -> Result<String> {
    hmac_sha256_base64(secret.as_bytes(), format!("{timestamp_ms}\n{secret}").as_bytes())
}

/// Feishu: `"{timestamp}\n{secret}"` is the key and the message is empty.
pub(super) fn feishu_sign(timestamp_secs: i64, secret: &str) -> Result<String> {
    hmac_sha256_base64(format!("{timestamp_secs}\n{secret}").as_bytes(), b"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4231_case_2() {
        let sign = hmac_sha256_base64(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(sign, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn signatures_depend_on_timestamp() {
        let a = dingtalk_sign(1_700_000_000_000, "SEC123").unwrap();
        let b = dingtalk_sign(1_700_000_000_001, "SEC123").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 44);
        assert_ne!(feishu_sign(1_700_000_000, "s").unwrap(), feishu_sign(1_700_000_001, "s").unwrap());
    }
}
