//! HMAC-SHA256 webhook signature verification.
//!
//! Each provider signs the raw request body with the webhook's secret but
//! transports the signature differently:
//! - GitHub: `x-hub-signature-256: sha256=<hex>`
//! - Slack: `x-slack-signature: v0=<hex>` over `v0:{timestamp}:{body}`
//! - Stripe: `stripe-signature: t=<ts>,v1=<hex>` over `{t}.{body}`
//! - everything else: `x-webhook-signature: <hex>`

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a Slack or Stripe signature timestamp.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Request headers with lowercase names.
pub type WebhookHeaders = HashMap<String, String>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header: {0}")]
    MissingHeader(&'static str),

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verify `body` for `provider` against the headers it was delivered with.
pub fn verify_signature(
    provider: &str,
    secret: &str,
    body: &[u8],
    headers: &WebhookHeaders,
) -> Result<(), SignatureError> {
    match provider {
        "github" => {
            let signature = header(headers, "x-hub-signature-256")?;
            let hex = signature
                .strip_prefix("sha256=")
                .ok_or_else(|| SignatureError::Malformed("expected sha256= prefix".to_string()))?;
            verify_hmac(secret.as_bytes(), body, hex)
        }
        "slack" => {
            let signature = header(headers, "x-slack-signature")?;
            let timestamp = header(headers, "x-slack-request-timestamp")?;
            check_timestamp(timestamp)?;
            let hex = signature
                .strip_prefix("v0=")
                .ok_or_else(|| SignatureError::Malformed("expected v0= prefix".to_string()))?;
            let mut signed = format!("v0:{timestamp}:").into_bytes();
            signed.extend_from_slice(body);
            verify_hmac(secret.as_bytes(), &signed, hex)
        }
        "stripe" => {
            let header_value = header(headers, "stripe-signature")?;
            let (timestamp, candidates) = parse_stripe_header(header_value)?;
            check_timestamp(timestamp)?;
            let mut signed = format!("{timestamp}.").into_bytes();
            signed.extend_from_slice(body);
            if candidates
                .iter()
                .any(|hex| verify_hmac(secret.as_bytes(), &signed, hex).is_ok())
            {
                Ok(())
            } else {
                Err(SignatureError::Mismatch)
            }
        }
        _ => {
            let signature = header(headers, "x-webhook-signature")?;
            let hex = signature.strip_prefix("sha256=").unwrap_or(signature);
            verify_hmac(secret.as_bytes(), body, hex)
        }
    }
}

/// Hex HMAC-SHA256 of `body`, as a sender would compute it.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex_encode(&mac.finalize().into_bytes())
}

fn header<'h>(headers: &'h WebhookHeaders, name: &'static str) -> Result<&'h str, SignatureError> {
    headers
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}

fn check_timestamp(timestamp: &str) -> Result<(), SignatureError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::Malformed(format!("invalid timestamp '{timestamp}'")))?;
    // The stamp is sender-controlled; abs_diff cannot overflow on extreme values.
    if Utc::now().timestamp().abs_diff(ts) > TIMESTAMP_TOLERANCE_SECS as u64 {
        return Err(SignatureError::StaleTimestamp);
    }
    Ok(())
}

fn parse_stripe_header(value: &str) -> Result<(&str, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in value.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = Some(t),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or_else(|| SignatureError::Malformed("missing t= in stripe-signature".to_string()))?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed("missing v1= in stripe-signature".to_string()));
    }
    Ok((timestamp, signatures))
}

/// Constant-time check via `Mac::verify_slice`.
fn verify_hmac(secret: &[u8], message: &[u8], signature_hex: &str) -> Result<(), SignatureError> {
    let expected = hex_decode(signature_hex).map_err(SignatureError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| SignatureError::Malformed(e.to_string()))?;
    mac.update(message);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, String> {
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return Err("not an even-length hex string".to_string());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid hex at {i}: {e}")))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"action":"opened"}"#;

    fn headers(pairs: &[(&str, String)]) -> WebhookHeaders {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_generic_signature() {
        let sig = sign(SECRET.as_bytes(), BODY);
        assert!(verify_signature("gmail", SECRET, BODY, &headers(&[("x-webhook-signature", sig.clone())])).is_ok());
        assert_eq!(
            verify_signature("gmail", SECRET, b"tampered", &headers(&[("x-webhook-signature", sig)])),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature("gmail", SECRET, BODY, &WebhookHeaders::new()),
            Err(SignatureError::MissingHeader("x-webhook-signature"))
        );
    }

    #[test]
    fn test_github_requires_prefix() {
        let sig = sign(SECRET.as_bytes(), BODY);
        let ok = headers(&[("x-hub-signature-256", format!("sha256={sig}"))]);
        assert!(verify_signature("github", SECRET, BODY, &ok).is_ok());

        let bare = headers(&[("x-hub-signature-256", sig)]);
        assert!(matches!(verify_signature("github", SECRET, BODY, &bare), Err(SignatureError::Malformed(_))));
    }

    #[test]
    fn test_slack_signs_timestamped_basestring() {
        let ts = Utc::now().timestamp().to_string();
        let mut base = format!("v0:{ts}:").into_bytes();
        base.extend_from_slice(BODY);
        let sig = sign(SECRET.as_bytes(), &base);

        let ok = headers(&[
            ("x-slack-signature", format!("v0={sig}")),
            ("x-slack-request-timestamp", ts),
        ]);
        assert!(verify_signature("slack", SECRET, BODY, &ok).is_ok());

        let stale = headers(&[
            ("x-slack-signature", format!("v0={sig}")),
            ("x-slack-request-timestamp", "1000".to_string()),
        ]);
        assert_eq!(verify_signature("slack", SECRET, BODY, &stale), Err(SignatureError::StaleTimestamp));
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        for ts in [i64::MIN, i64::MAX] {
            let slack = headers(&[
                ("x-slack-signature", "v0=00".to_string()),
                ("x-slack-request-timestamp", ts.to_string()),
            ]);
            assert_eq!(verify_signature("slack", SECRET, BODY, &slack), Err(SignatureError::StaleTimestamp));

            let stripe = headers(&[("stripe-signature", format!("t={ts},v1=00"))]);
            assert_eq!(verify_signature("stripe", SECRET, BODY, &stripe), Err(SignatureError::StaleTimestamp));
        }
    }

    #[test]
    fn test_stripe_accepts_any_v1() {
        let ts = Utc::now().timestamp().to_string();
        let mut signed = format!("{ts}.").into_bytes();
        signed.extend_from_slice(BODY);
        let sig = sign(SECRET.as_bytes(), &signed);

        let value = format!("t={ts},v1={},v1={sig}", "00".repeat(32));
        assert!(verify_signature("stripe", SECRET, BODY, &headers(&[("stripe-signature", value)])).is_ok());

        let wrong = format!("t={ts},v1={}", "00".repeat(32));
        assert_eq!(
            verify_signature("stripe", SECRET, BODY, &headers(&[("stripe-signature", wrong)])),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_hex_roundtrip_rejects_garbage() {
        assert_eq!(hex_decode("00ff").unwrap(), vec![0x00, 0xff]);
        assert!(hex_decode("abc").is_err());
        assert!(hex_decode("zz").is_err());
    }
}
