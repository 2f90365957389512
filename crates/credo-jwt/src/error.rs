//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Authentication callers going through [`credo_api::Authenticator`] only ever
/// see a generic error; these kinds are for in-process callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Profile attribute holds a value that cannot be carried as a claim.
    #[error("unsupported value type for attribute {0:?}")]
    UnsupportedAttributeType(String),

    /// Profile kind discriminator is missing, unknown, or not registered.
    #[error("unknown profile type: {0}")]
    UnknownProfileType(String),

    /// Token does not have the expected compact structure.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature does not match header and payload.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Header algorithm is not allowed for the configured key.
    #[error("algorithm {0:?} is not allowed for the configured key")]
    AlgorithmMismatch(String),

    /// The encrypted envelope could not be opened.
    #[error("token decryption failed")]
    DecryptionFailed,

    /// `exp` is in the past.
    #[error("token expired")]
    TokenExpired,

    /// `nbf` is in the future.
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// A claim is present but has the wrong shape or value.
    #[error("invalid claim: {0}")]
    InvalidClaim(String),

    /// Key material is unusable for the requested operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// JSON serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short stable label, suitable as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedAttributeType(_) => "unsupported_attribute_type",
            Error::UnknownProfileType(_) => "unknown_profile_type",
            Error::MalformedToken(_) => "malformed_token",
            Error::InvalidSignature => "invalid_signature",
            Error::AlgorithmMismatch(_) => "algorithm_mismatch",
            Error::DecryptionFailed => "decryption_failed",
            Error::TokenExpired => "token_expired",
            Error::TokenNotYetValid => "token_not_yet_valid",
            Error::InvalidClaim(_) => "invalid_claim",
            Error::InvalidKey(_) => "invalid_key",
            Error::Json(_) => "json",
        }
    }
}
