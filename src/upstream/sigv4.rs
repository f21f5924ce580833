//! AWS Signature Version 4 for single-shot JSON POSTs.
//!
//! Only what `InvokeModel` needs: no query string, a fixed set of signed
//! headers, and a payload hashed up front.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{RelayError, Result};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&aws_credential_types::Credentials> for Credentials {
    fn from(creds: &aws_credential_types::Credentials) -> Self {
        Self {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds
                .session_token()
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        }
    }
}

/// The parts of a request that go into the signature.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// `host[:port]` exactly as sent in the `Host` header.
    pub host: &'a str,
    /// Path as sent on the wire (already percent-encoded).
    pub path: &'a str,
    pub content_type: &'a str,
    pub payload: &'a [u8],
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

pub fn sign(req: &SigningRequest<'_>, creds: &Credentials) -> Result<SignedHeaders> {
    let amz_date = req.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = req.time.format("%Y%m%d").to_string();
    let scope = format!("{}/{}/{}/aws4_request", date_stamp, req.region, req.service);

    let canonical = canonical_request(req, &amz_date, creds.session_token.as_deref());
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        sha256_hex(canonical.text.as_bytes())
    );

    let key = derive_signing_key(&creds.secret_access_key, &date_stamp, req.region, req.service)?;
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, creds.access_key_id, scope, canonical.signed_headers, signature
        ),
        amz_date,
        security_token: creds.session_token.clone(),
    })
}

pub(crate) struct CanonicalRequest {
    pub text: String,
    pub signed_headers: String,
}

pub(crate) fn canonical_request(
    req: &SigningRequest<'_>,
    amz_date: &str,
    session_token: Option<&str>,
) -> CanonicalRequest {
    // sorted by header name
    let mut headers = vec![
        ("content-type", req.content_type.trim()),
        ("host", req.host.trim()),
        ("x-amz-date", amz_date),
    ];
    if let Some(token) = session_token {
        headers.push(("x-amz-security-token", token.trim()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let text = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        req.method,
        canonical_uri(req.path),
        canonical_headers,
        signed_headers,
        sha256_hex(req.payload)
    );

    CanonicalRequest {
        text,
        signed_headers,
    }
}

/// Non-S3 services sign the path with every segment encoded a second time.
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| uri_encode(segment, true))
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-encode everything except the RFC 3986 unreserved characters.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub fn derive_signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| RelayError::signing(format!("invalid HMAC key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn creds(token: Option<&str>) -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: EXAMPLE_SECRET.to_string(),
            session_token: token.map(str::to_string),
        }
    }

    fn request(payload: &[u8]) -> SigningRequest<'_> {
        SigningRequest {
            method: "POST",
            host: "bedrock-runtime.us-east-1.amazonaws.com",
            path: "/model/anthropic.claude-3-sonnet-20240229-v1%3A0/invoke",
            content_type: "application/json",
            payload,
            region: "us-east-1",
            service: "bedrock",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        }
    }

    #[test]
    fn test_signing_key_matches_documented_vector() {
        let key = derive_signing_key(EXAMPLE_SECRET, "20150830", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("abc-_.~", true), "abc-_.~");
        assert_eq!(uri_encode("v1:0", true), "v1%3A0");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
        assert_eq!(uri_encode("a/b", false), "a/b");
        assert_eq!(uri_encode("a b", true), "a%20b");
    }

    #[test]
    fn test_canonical_uri_double_encodes() {
        assert_eq!(
            canonical_uri("/model/anthropic.claude-3-sonnet-20240229-v1%3A0/invoke"),
            "/model/anthropic.claude-3-sonnet-20240229-v1%253A0/invoke"
        );
        assert_eq!(canonical_uri(""), "/");
    }

    #[test]
    fn test_canonical_request_layout() {
        let payload = b"{}";
        let req = request(payload);
        let canonical = canonical_request(&req, "20150830T123600Z", None);

        let lines: Vec<&str> = canonical.text.split('\n').collect();
        assert_eq!(lines[0], "POST");
        assert_eq!(
            lines[1],
            "/model/anthropic.claude-3-sonnet-20240229-v1%253A0/invoke"
        );
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "content-type:application/json");
        assert_eq!(lines[4], "host:bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(lines[5], "x-amz-date:20150830T123600Z");
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "content-type;host;x-amz-date");
        assert_eq!(lines[8], sha256_hex(payload));
    }

    #[test]
    fn test_sign_is_deterministic_and_scoped() {
        let payload = br#"{"messages":[]}"#;
        let first = sign(&request(payload), &creds(None)).unwrap();
        let second = sign(&request(payload), &creds(None)).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.amz_date, "20150830T123600Z");
        assert!(first.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/bedrock/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, Signature="
        ));
        let signature = first.authorization.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);

        let other = sign(&request(b"{}"), &creds(None)).unwrap();
        assert_ne!(first.authorization, other.authorization);
    }

    #[test]
    fn test_known_signature() {
        let signed = sign(&request(b"{}"), &creds(None)).unwrap();
        assert!(signed
            .authorization
            .ends_with("Signature=6853f5a5e3751886d2f8e58bccfde2223f00d794a48ba840c42ff47dbe0948ab"));
    }

    #[test]
    fn test_session_token_is_signed() {
        let signed = sign(&request(b"{}"), &creds(Some("token"))).unwrap();
        assert!(signed
            .authorization
            .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-security-token,"));
        assert_eq!(signed.security_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_credentials_from_provider_output() {
        let resolved = aws_credential_types::Credentials::new(
            "AKID",
            "s3cr3t-value",
            Some(String::new()),
            None,
            "test",
        );
        let creds = Credentials::from(&resolved);
        assert_eq!(creds.access_key_id, "AKID");
        assert_eq!(creds.secret_access_key, "s3cr3t-value");
        assert!(creds.session_token.is_none());
        assert!(!format!("{:?}", creds).contains("s3cr3t-value"));
    }
}
