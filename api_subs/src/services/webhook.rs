use chrono::Utc;
use common::error::{AppError, Res};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::event::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Authenticates provider callbacks and decodes them into [`WebhookEvent`]s.
#[derive(Clone)]
pub struct WebhookIngress {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookIngress {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    /// Verifies the `stripe-signature` header and decodes the payload.
    /// Every failure is a `BadRequest`; nothing is decoded before the
    /// signature checks out.
    pub fn construct_event(&self, payload: &[u8], signature: Option<&str>) -> Res<WebhookEvent> {
        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("Stripe signature missing".to_string()))?;
        if self.secret.is_empty() {
            return Err(AppError::BadRequest(
                "Webhook secret not configured".to_string(),
            ));
        }

        verify_signature(
            payload,
            signature,
            &self.secret,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )
        .inspect_err(|e| log::warn!("Rejected webhook: {}", e))?;

        WebhookEvent::from_slice(payload)
    }
}

/// Checks a `t=<unix ts>,v1=<hex hmac>[,v1=...]` header. The expected MAC is
/// HMAC-SHA256 over `"{t}.{payload}"`; any matching `v1` entry is accepted.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Res<()> {
    let mut timestamp: Option<&str> = None;
    let mut candidates = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::BadRequest("Missing timestamp in signature".to_string()))?;
    if candidates.is_empty() {
        return Err(AppError::BadRequest("Missing v1 signature".to_string()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid signature timestamp".to_string()))?;
    if (now - ts).abs() > tolerance_secs {
        return Err(AppError::BadRequest(
            "Signature timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC key rejected".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let verified = candidates.into_iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if verified {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Signature verification failed".to_string(),
        ))
    }
}

/// Builds a header the way the provider does. Used by tests across crates.
#[cfg(any(test, feature = "testing"))]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, SECRET, NOW);
        assert!(verify_signature(payload, &header, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = br#"{"id":"evt_1"}"#;
        let valid = sign(payload, SECRET, NOW);
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), v1);
        assert!(verify_signature(payload, &header, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn rejects_wrong_secret_and_tampered_body() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign(payload, "whsec_other", NOW);
        assert!(verify_signature(payload, &header, SECRET, 300, NOW).is_err());

        let header = sign(payload, SECRET, NOW);
        assert!(verify_signature(br#"{"id":"evt_2"}"#, &header, SECRET, 300, NOW).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = br#"{}"#;
        let header = sign(payload, SECRET, NOW - 600);
        let err = verify_signature(payload, &header, SECRET, 300, NOW).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", &format!("t={}", NOW)] {
            assert!(verify_signature(b"{}", header, SECRET, 300, NOW).is_err());
        }
    }

    #[test]
    fn ingress_requires_signature_and_secret() {
        let ingress = WebhookIngress::new(SECRET, 300);
        assert!(matches!(
            ingress.construct_event(b"{}", None),
            Err(AppError::BadRequest(_))
        ));

        let unconfigured = WebhookIngress::new("", 300);
        let header = sign(b"{}", "", Utc::now().timestamp());
        assert!(matches!(
            unconfigured.construct_event(b"{}", Some(&header)),
            Err(AppError::BadRequest(_))
        ));
    }
}
