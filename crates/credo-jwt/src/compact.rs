//! JOSE compact serialization helpers.

use crate::{Error, Result};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Segments in a signed token (`header.payload.signature`).
pub const SIGNED_SEGMENTS: usize = 3;

/// Segments in an encrypted token (`header.key.iv.ciphertext.tag`).
pub const ENCRYPTED_SEGMENTS: usize = 5;

/// Shape of a compact token, decided by segment count alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// Three segments: a JWS.
    Signed,
    /// Five segments: a JWE wrapping a JWS.
    Encrypted,
}

impl TokenShape {
    /// Classify `token`, failing with [`Error::MalformedToken`] for any other
    /// segment count.
    pub fn of(token: &str) -> Result<Self> {
        match token.split('.').count() {
            SIGNED_SEGMENTS => Ok(TokenShape::Signed),
            ENCRYPTED_SEGMENTS => Ok(TokenShape::Encrypted),
            n => Err(Error::MalformedToken(format!(
                "expected {SIGNED_SEGMENTS} or {ENCRYPTED_SEGMENTS} segments, got {n}"
            ))),
        }
    }
}

pub(crate) fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).ok()
}
