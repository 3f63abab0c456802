//! base64 primitives

use crate::utils::Result;
use ::base64::Engine;
use ::base64::engine::general_purpose::STANDARD;

/// Encode bytes with the standard alphabet and padding
pub fn btoa(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64
pub fn atob(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded.trim())?)
}
