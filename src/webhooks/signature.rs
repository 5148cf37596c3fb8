//! `Stripe-Signature` header verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The
//! signed payload is `"{t}.{raw body}"` keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    Missing,

    #[error("malformed Stripe-Signature header")]
    Malformed,

    #[error("timestamp outside tolerance ({age_secs}s)")]
    Stale { age_secs: i64 },

    #[error("no matching signature")]
    Mismatch,
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            // Unparseable v1 entries cannot match anything
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(ParsedHeader { timestamp, signatures }),
        _ => Err(SignatureError::Malformed),
    }
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length")
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Verify `header` against `payload` at time `now` (unix seconds).
pub fn verify(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let parsed = parse_header(header)?;

    let age_secs = now - parsed.timestamp;
    if age_secs.unsigned_abs() > tolerance_secs {
        return Err(SignatureError::Stale { age_secs });
    }

    let mac = mac_for(secret, parsed.timestamp, payload);
    // verify_slice compares in constant time
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a header value for `payload`, as Stripe would send it.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = hex::encode(mac_for(secret, timestamp, payload).finalize().into_bytes());
    format!("t={},v1={}", timestamp, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, SECRET, NOW);
        assert_eq!(verify(body, Some(&header), SECRET, 300, NOW + 10), Ok(()));
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let body = b"{}";
        let good = sign(body, SECRET, NOW);
        let v1 = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), v1);
        assert!(verify(body, Some(&header), SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_rejections() {
        let body = b"{}";
        let header = sign(body, SECRET, NOW);

        assert_eq!(verify(body, None, SECRET, 300, NOW), Err(SignatureError::Missing));
        assert_eq!(verify(body, Some("garbage"), SECRET, 300, NOW), Err(SignatureError::Malformed));
        assert_eq!(verify(body, Some("t=abc,v1=00"), SECRET, 300, NOW), Err(SignatureError::Malformed));
        assert_eq!(verify(b"{ }", Some(&header), SECRET, 300, NOW), Err(SignatureError::Mismatch));
        assert_eq!(verify(body, Some(&header), "whsec_other", 300, NOW), Err(SignatureError::Mismatch));
        assert_eq!(
            verify(body, Some(&header), SECRET, 300, NOW + 301),
            Err(SignatureError::Stale { age_secs: 301 })
        );
    }
}
