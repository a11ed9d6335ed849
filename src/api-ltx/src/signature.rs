//! HMAC-SHA256 signatures on crawl provider callbacks.
//!
//! The provider signs the raw request body with the shared secret and sends
//! `X-Crawl-Signature: sha256=<base64 signature>`.

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-crawl-signature";

const SCHEME_PREFIX: &str = "sha256=";

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing {} header", SIGNATURE_HEADER)]
    Missing,

    #[error("Invalid signature format")]
    InvalidFormat,

    #[error("Invalid signature")]
    Mismatch,

    #[error("HMAC error: {0}")]
    HmacError(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
}

fn mac(secret: &str) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| SignatureError::HmacError(e.to_string()))
}

/// Header value for `body` signed with `secret`.
pub fn sign(body: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac = mac(secret)?;
    mac.update(body);
    let signature = mac.finalize().into_bytes();
    Ok(format!("{}{}", SCHEME_PREFIX, general_purpose::STANDARD.encode(signature)))
}

/// Checks the header value against the body. The comparison is constant-time.
pub fn verify(body: &[u8], header_value: Option<&str>, secret: &str) -> Result<(), SignatureError> {
    let header_value = header_value.ok_or(SignatureError::Missing)?;
    let encoded = header_value
        .trim()
        .strip_prefix(SCHEME_PREFIX)
        .ok_or(SignatureError::InvalidFormat)?;
    let provided = general_purpose::STANDARD.decode(encoded)?;

    let mut mac = mac(secret)?;
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
}
