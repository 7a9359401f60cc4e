//! EventSub webhook signature verification using HMAC-SHA256.
//!
//! The platform signs each delivery with the secret supplied when the
//! subscription was created. The signed message is the message-id header,
//! the message-timestamp header, and the raw body, concatenated with no
//! separators. The signature arrives as `sha256=<lower-case hex>`.
//!
//! Verification is the first step in webhook processing; nothing in the body
//! is looked at until it passes.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::headers::{MESSAGE_ID, MESSAGE_SIGNATURE, MESSAGE_TIMESTAMP, header_str};

type HmacSha256 = Hmac<Sha256>;

/// Parses a signature header (e.g., "sha256=abc123...") into raw bytes.
///
/// Only lower-case hex is accepted, so every distinct header string maps to
/// a distinct signature. Returns `None` for malformed headers. Never panics.
///
/// # Examples
///
/// ```
/// use en_passant::webhooks::parse_signature_header;
///
/// assert!(parse_signature_header("sha256=abcd1234").is_some());
/// assert!(parse_signature_header("abcd1234").is_none());
/// assert!(parse_signature_header("sha1=abcd1234").is_none());
/// assert!(parse_signature_header("sha256=ABCD1234").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    if !hex_sig
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    hex::decode(hex_sig).ok()
}

fn keyed_mac(message_id: &str, timestamp: &str, body: &[u8], secret: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    mac
}

/// Computes the HMAC-SHA256 of `message_id + timestamp + body`.
pub fn compute_signature(message_id: &str, timestamp: &str, body: &[u8], secret: &[u8]) -> Vec<u8> {
    keyed_mac(message_id, timestamp, body, secret)
        .finalize()
        .into_bytes()
        .to_vec()
}

/// Formats a signature as a header value: "sha256=<hex>".
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a signature header against the signed parts and secret.
///
/// Uses constant-time comparison to prevent timing attacks.
///
/// # Examples
///
/// ```
/// use en_passant::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let sig = compute_signature("id-1", "2024-01-01T00:00:00Z", b"{}", b"secret");
/// let header = format_signature_header(&sig);
///
/// assert!(verify_signature("id-1", "2024-01-01T00:00:00Z", b"{}", &header, b"secret"));
/// assert!(!verify_signature("id-2", "2024-01-01T00:00:00Z", b"{}", &header, b"secret"));
/// ```
pub fn verify_signature(
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    signature_header: &str,
    secret: &[u8],
) -> bool {
    let Some(provided) = parse_signature_header(signature_header) else {
        return false;
    };
    keyed_mac(message_id, timestamp, body, secret)
        .verify_slice(&provided)
        .is_ok()
}

/// Verifies a delivery from its headers and raw body.
///
/// A missing message-id, timestamp, or signature header is a verification
/// failure, not an error.
pub fn verify(headers: &HeaderMap, body: &[u8], secret: &[u8]) -> bool {
    let (Some(message_id), Some(timestamp), Some(signature)) = (
        header_str(headers, MESSAGE_ID),
        header_str(headers, MESSAGE_TIMESTAMP),
        header_str(headers, MESSAGE_SIGNATURE),
    ) else {
        return false;
    };
    verify_signature(message_id, timestamp, body, signature, secret)
}
