//! Token generation: profile -> claims -> JWS -> optional JWE.

use crate::claims::{self, ClaimOptions};
use crate::keys::KeyMaterial;
use crate::time::{Clock, SystemClock};
use crate::{Error, Result, jwe, jws};

use credo_api::Profile;
use std::sync::Arc;

/// Registered claims added to every generated token.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Lifetime in seconds; sets `exp = iat + expires_in`.
    pub expires_in_seconds: Option<u64>,

    /// Sets `nbf = iat - skew`, to tolerate relying parties whose clocks lag.
    pub not_before_skew_seconds: Option<u64>,

    /// `iss` claim.
    pub issuer: Option<String>,

    /// `aud` claim.
    pub audience: Option<String>,
}

/// Turns profiles into compact tokens.
///
/// Encryption is on unless turned off with [`JwtGenerator::encrypted`].
#[derive(Debug, Clone)]
pub struct JwtGenerator {
    keys: KeyMaterial,
    encrypt: bool,
    options: GenerationOptions,
    clock: Arc<dyn Clock>,
}

impl JwtGenerator {
    pub fn new(keys: KeyMaterial) -> Self {
        Self {
            keys,
            encrypt: true,
            options: GenerationOptions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Shortcut for `JwtGenerator::new(KeyMaterial::from_secret(secret)?)`.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self::new(KeyMaterial::from_secret(secret)?))
    }

    #[must_use]
    pub fn encrypted(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt
    }

    /// Generate a token for `profile`. Nothing is returned unless every
    /// stage succeeds.
    pub fn generate(&self, profile: &Profile) -> Result<String> {
        let encryption = if self.encrypt {
            Some(self.keys.encryption().ok_or_else(|| {
                Error::InvalidKey(
                    "encryption is enabled but no encryption key is configured".to_string(),
                )
            })?)
        } else {
            None
        };

        let claims = claims::encode(profile, &self.claim_options())?;
        let signed = jws::sign(&claims, self.keys.signing())?;
        let token = match encryption {
            Some(key) => jwe::encrypt(&signed, key)?,
            None => signed,
        };

        tracing::debug!(
            kind = %profile.kind(),
            alg = ?self.keys.signing().algorithm(),
            encrypted = encryption.is_some(),
            "generated token"
        );
        Ok(token)
    }

    fn claim_options(&self) -> ClaimOptions {
        let now = self.clock.now();
        let offset = |secs: u64| i64::try_from(secs).unwrap_or(i64::MAX);
        ClaimOptions {
            issued_at: now,
            expiration: self
                .options
                .expires_in_seconds
                .map(|secs| now.saturating_add(offset(secs))),
            not_before: self
                .options
                .not_before_skew_seconds
                .map(|secs| now.saturating_sub(offset(secs))),
            issuer: self.options.issuer.clone(),
            audience: self.options.audience.clone(),
        }
    }
}
