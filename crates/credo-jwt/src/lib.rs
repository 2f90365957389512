//! credo-jwt
//!
//! Issues and verifies JWTs that carry a [`credo_api::Profile`].
//!
//! - **Generation**: profile -> claim set -> signed JWS (HMAC, RSA or EC) ->
//!   optionally a direct AES-GCM JWE around it (on by default).
//! - **Authentication**: 3 segments are verified directly, 5 segments are
//!   decrypted first. The header algorithm must belong to the configured key's
//!   family, `exp`/`nbf` are enforced, and the profile kind must be registered.
//!
//! ## Quick start
//! ```no_run
//! use credo_api::{Authenticator, Profile, ProfileKind, TokenCredentials};
//! use credo_jwt::{JwtAuthenticator, JwtGenerator};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let secret = "12345678901234567890123456789012";
//!
//! let mut profile = Profile::new(ProfileKind::Facebook, "technicalId")?;
//! profile.add_attribute("name", "fakeName");
//!
//! let token = JwtGenerator::from_secret(secret)?.generate(&profile)?;
//!
//! let mut credentials = TokenCredentials::new(token, "my-client");
//! JwtAuthenticator::from_secret(secret)?.validate(&mut credentials)?;
//! assert_eq!(credentials.profile(), Some(&profile));
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod authenticator;
pub mod claims;
mod compact;
mod error;
mod generator;
pub mod jwe;
pub mod jws;
mod keys;
mod time;

pub use authenticator::{AUTHENTICATION_FAILED, JwtAuthenticator};
pub use claims::{ClaimOptions, ClaimSet, ProfileConstructor, ProfileRegistry};
pub use compact::{ENCRYPTED_SEGMENTS, SIGNED_SEGMENTS, TokenShape};
pub use error::{Error, Result};
pub use generator::{GenerationOptions, JwtGenerator};
pub use jsonwebtoken::Algorithm;
pub use jws::ValidationOptions;
pub use keys::{ContentEncryption, EncryptionKey, KeyFamily, KeyMaterial, SigningKey};
pub use time::{Clock, FixedClock, SystemClock};
