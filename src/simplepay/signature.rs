use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha384;
use thiserror::Error;

type HmacSha384 = Hmac<Sha384>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("secret key cannot be used as an HMAC key")]
    InvalidKey,
    #[error("signature is not valid base64")]
    InvalidEncoding,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Base64-encoded HMAC-SHA384 of `payload`, the value of the `Signature` header.
pub fn sign(secret_key: &[u8], payload: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha384::new_from_slice(secret_key).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(payload);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Checks a `Signature` header against the exact payload bytes in constant time.
pub fn verify(secret_key: &[u8], payload: &[u8], signature: &str) -> Result<(), SignatureError> {
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|_| SignatureError::InvalidEncoding)?;

    let mut mac =
        HmacSha384::new_from_slice(secret_key).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}
