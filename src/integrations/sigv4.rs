//! AWS Signature Version 4 for single JSON POST requests.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host;x-amz-date";

pub struct Credentials<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers to attach to the signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub amz_date: String,
    pub authorization: String,
}

fn hmac(key: &[u8], data: &str) -> Vec<u8> {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC accepts keys of any length")
    };
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Sign a `POST` of `body` (content type `application/json`) to `host` + `path`.
pub fn sign_post(
    creds: &Credentials<'_>,
    host: &str,
    path: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let canonical_request = format!(
        "POST\n{path}\n\ncontent-type:application/json\nhost:{host}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{}",
        sha256_hex(body)
    );
    let scope = format!("{date}/{}/{}/aws4_request", creds.region, creds.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac(format!("AWS4{}", creds.secret_access_key).as_bytes(), &date);
    let k_region = hmac(&k_date, creds.region);
    let k_service = hmac(&k_region, creds.service);
    let k_signing = hmac(&k_service, "aws4_request");
    let signature = hex::encode(hmac(&k_signing, &string_to_sign));

    SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            creds.access_key_id
        ),
        amz_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> Credentials<'static> {
        Credentials {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            region: "us-east-1",
            service: "ses",
        }
    }

    #[test]
    fn test_authorization_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap();
        let signed = sign_post(&creds(), "email.us-east-1.amazonaws.com", "/v2/email/outbound-emails", b"{}", now);

        assert_eq!(signed.amz_date, "20240309T123000Z");
        assert!(signed
            .authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240309/us-east-1/ses/aws4_request, "));
        assert!(signed.authorization.contains("SignedHeaders=content-type;host;x-amz-date"));
        let signature = signed.authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_signature_depends_on_body_and_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap();
        let host = "email.us-east-1.amazonaws.com";
        let a = sign_post(&creds(), host, "/p", b"{\"a\":1}", now);
        let b = sign_post(&creds(), host, "/p", b"{\"a\":2}", now);
        let c = sign_post(&creds(), host, "/p", b"{\"a\":1}", now + chrono::Duration::seconds(1));

        assert_eq!(a, sign_post(&creds(), host, "/p", b"{\"a\":1}", now));
        assert_ne!(a.authorization, b.authorization);
        assert_ne!(a.authorization, c.authorization);
    }
}
