//! `X-Hub-Signature` parsing and HMAC-SHA1 verification.
//!
//! Only the body is authenticated. Headers of a correctly signed request can
//! still have been tampered with.

use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

const SHA1_PREFIX: &str = "sha1=";

type HmacSha1 = Hmac<Sha1>;

/// Why a signature header could not be read.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignatureError {
    #[error("The X-Hub-Signature header is missing")]
    Missing,

    #[error("The X-Hub-Signature header was invalid: expected a sha1= digest")]
    UnsupportedAlgorithm,

    #[error("The X-Hub-Signature digest is not hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Extract the raw digest from an `X-Hub-Signature` value.
pub fn parse_signature(header: Option<&str>) -> Result<Vec<u8>, SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let digest = header
        .strip_prefix(SHA1_PREFIX)
        .ok_or(SignatureError::UnsupportedAlgorithm)?;

    Ok(hex::decode(digest)?)
}

/// Check `digest` against the HMAC-SHA1 of `body` keyed with `secret`.
///
/// The comparison is constant time.
pub fn verify_signature(secret: &[u8], body: &[u8], digest: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha1::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(digest).is_ok()
}

/// The `X-Hub-Signature` value a hub would send for `body`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("{SHA1_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}
