//! Webhook 签名验证与事件解析
//!
//! 签名方案 (Stripe v1)：请求头 `Stripe-Signature: t=<unix>,v1=<hex>`，
//! 签名是对 `"{t}.{raw_body}"` 的 HMAC-SHA256。验证必须在原始字节上
//! 进行，任何失败都拒绝 (400) 且不触碰状态。

use std::collections::HashMap;

use ring::hmac;
use serde::Deserialize;
use thiserror::Error;

/// 事件类型常量
pub const EVENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_FAILED: &str = "payment_intent.payment_failed";

/// 签名验证错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,
}

/// 网关事件 (只反序列化用到的字段)
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: IntentObject,
}

/// 事件携带的支付意向对象
#[derive(Debug, Clone, Deserialize)]
pub struct IntentObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl IntentObject {
    /// metadata 里的订单 ID (创建意向时写入)
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get("order_id").map(String::as_str)
    }
}

/// Webhook 签名验证器
pub struct WebhookVerifier {
    key: hmac::Key,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: &str, tolerance_secs: i64) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            tolerance_secs,
        }
    }

    /// Verify the signature header against the raw payload.
    ///
    /// `now_unix` is injected for testability.
    pub fn verify(
        &self,
        payload: &[u8],
        header: &str,
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<Vec<u8>> = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(SignatureError::Malformed);
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
                }
                "v1" => {
                    candidates.push(hex::decode(value).map_err(|_| SignatureError::Malformed)?);
                }
                // Unknown schemes (v0 etc.) are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }

        if (now_unix - timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::Expired);
        }

        let mut signed_payload = Vec::with_capacity(payload.len() + 12);
        signed_payload.extend_from_slice(timestamp.to_string().as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(payload);

        // ring::hmac::verify is constant-time
        for candidate in &candidates {
            if hmac::verify(&self.key, &signed_payload, candidate).is_ok() {
                return Ok(());
            }
        }

        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Produce a valid signature header for `payload` at `timestamp`.
    pub fn sign(secret: &str, payload: &[u8], timestamp: i64) -> String {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let mut signed_payload = Vec::new();
        signed_payload.extend_from_slice(timestamp.to_string().as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(payload);
        let tag = hmac::sign(&key, &signed_payload);
        format!("t={},v1={}", timestamp, hex::encode(tag.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::sign;
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, payload, NOW);
        let verifier = WebhookVerifier::new(SECRET, 300);
        assert!(verifier.verify(payload, &header, NOW).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let header = sign(SECRET, br#"{"id":"evt_1"}"#, NOW);
        let verifier = WebhookVerifier::new(SECRET, 300);
        assert_eq!(
            verifier.verify(br#"{"id":"evt_2"}"#, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign("whsec_other", payload, NOW);
        let verifier = WebhookVerifier::new(SECRET, 300);
        assert_eq!(
            verifier.verify(payload, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(SECRET, payload, NOW - 3600);
        let verifier = WebhookVerifier::new(SECRET, 300);
        assert_eq!(
            verifier.verify(payload, &header, NOW),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn rejects_malformed_header() {
        let verifier = WebhookVerifier::new(SECRET, 300);
        assert_eq!(
            verifier.verify(b"{}", "not-a-signature", NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier.verify(b"{}", "t=123", NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier.verify(b"{}", "t=abc,v1=00", NOW),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn parses_event_metadata() {
        let raw = br#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {"id": "pi_1", "metadata": {"order_id": "o1"}}}
        }"#;
        let event: GatewayEvent = serde_json::from_slice(raw).unwrap();
        assert_eq!(event.event_type, EVENT_SUCCEEDED);
        assert_eq!(event.data.object.id, "pi_1");
        assert_eq!(event.data.object.order_id(), Some("o1"));
    }
}
