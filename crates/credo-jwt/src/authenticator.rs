//! Token authentication: compact string -> optional JWE -> JWS -> profile.

use crate::claims::{self, ProfileRegistry};
use crate::compact::TokenShape;
use crate::jws::ValidationOptions;
use crate::keys::KeyMaterial;
use crate::time::{Clock, SystemClock};
use crate::{Error, Result, jwe, jws};

use credo_api::{Authenticator, CredoError, Profile, TokenCredentials};
use std::sync::Arc;

/// Message every rejected token is reported with through [`Authenticator`].
pub const AUTHENTICATION_FAILED: &str = "invalid token";

/// Verifies tokens produced by [`crate::JwtGenerator`] (or compatible issuers).
///
/// Signed and encrypted tokens are told apart by their segment count, so the
/// same authenticator accepts both.
#[derive(Debug, Clone)]
pub struct JwtAuthenticator {
    keys: KeyMaterial,
    registry: ProfileRegistry,
    options: ValidationOptions,
    clock: Arc<dyn Clock>,
}

impl JwtAuthenticator {
    pub fn new(keys: KeyMaterial) -> Self {
        Self {
            keys,
            registry: ProfileRegistry::default(),
            options: ValidationOptions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Shortcut for `JwtAuthenticator::new(KeyMaterial::from_secret(secret)?)`.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self::new(KeyMaterial::from_secret(secret)?))
    }

    #[must_use]
    pub fn with_registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Verify `token` and rebuild its profile.
    ///
    /// The error tells which check failed. Do not hand it to the party that
    /// presented the token; [`Authenticator::validate`] reports a single
    /// generic error instead.
    pub fn authenticate(&self, token: &str) -> Result<Profile> {
        let signed = match TokenShape::of(token)? {
            TokenShape::Signed => token.to_string(),
            TokenShape::Encrypted => {
                let key = self.keys.encryption().ok_or(Error::DecryptionFailed)?;
                let inner = jwe::decrypt(token, key)?;
                if TokenShape::of(&inner)? != TokenShape::Signed {
                    return Err(Error::MalformedToken(
                        "encrypted payload is not a signed token".to_string(),
                    ));
                }
                inner
            }
        };

        let claims = jws::verify(&signed, self.keys.signing(), &self.options, self.clock.now())?;
        claims::decode(&claims, &self.registry)
    }
}

impl Authenticator for JwtAuthenticator {
    fn validate(&self, credentials: &mut TokenCredentials) -> std::result::Result<(), CredoError> {
        match self.authenticate(credentials.token()) {
            Ok(profile) => {
                tracing::debug!(
                    client = credentials.client_name(),
                    kind = %profile.kind(),
                    "token accepted"
                );
                credentials.set_profile(profile);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(
                    client = credentials.client_name(),
                    reason = err.kind(),
                    "token rejected"
                );
                Err(CredoError::Authentication(AUTHENTICATION_FAILED.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerationOptions, JwtGenerator};
    use crate::time::FixedClock;
    use credo_api::ProfileKind;

    const KEY: &str = "12345678901234567890123456789012";
    const CLIENT_NAME: &str = "clientName";

    fn profile() -> Profile {
        let mut profile = Profile::new(ProfileKind::Facebook, "technicalId").unwrap();
        profile.add_attribute("name", "fakeName");
        profile.add_attribute("verified", true);
        profile
    }

    #[test]
    fn encrypted_and_plain_tokens_are_both_accepted() {
        let authenticator = JwtAuthenticator::from_secret(KEY).unwrap();
        for encrypt in [true, false] {
            let generator = JwtGenerator::from_secret(KEY).unwrap().encrypted(encrypt);
            let token = generator.generate(&profile()).unwrap();
            assert_eq!(authenticator.authenticate(&token).unwrap(), profile());
        }
    }

    #[test]
    fn validate_populates_credentials() {
        let token = JwtGenerator::from_secret(KEY)
            .unwrap()
            .generate(&profile())
            .unwrap();
        let mut credentials = TokenCredentials::new(token, CLIENT_NAME);
        JwtAuthenticator::from_secret(KEY)
            .unwrap()
            .validate(&mut credentials)
            .unwrap();

        let resolved = credentials.profile().unwrap();
        assert_eq!(resolved.kind(), ProfileKind::Facebook);
        assert_eq!(resolved.typed_id(), "facebook#technicalId");
        assert_eq!(resolved.attribute("verified"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn fake_token_is_malformed() {
        let authenticator = JwtAuthenticator::from_secret(KEY).unwrap();
        assert!(matches!(
            authenticator.authenticate("fakeToken"),
            Err(Error::MalformedToken(_))
        ));

        let mut credentials = TokenCredentials::new("fakeToken", CLIENT_NAME);
        let err = authenticator.validate(&mut credentials).unwrap_err();
        assert!(matches!(err, CredoError::Authentication(msg) if msg == AUTHENTICATION_FAILED));
        assert!(credentials.profile().is_none());
    }

    #[test]
    fn failures_are_indistinguishable_through_validate() {
        let authenticator = JwtAuthenticator::from_secret(KEY)
            .unwrap()
            .with_clock(Arc::new(FixedClock(2_000_000_000)));
        let expired = JwtGenerator::from_secret(KEY)
            .unwrap()
            .with_clock(Arc::new(FixedClock(1_000_000_000)))
            .with_options(GenerationOptions {
                expires_in_seconds: Some(60),
                ..Default::default()
            })
            .generate(&profile())
            .unwrap();
        let wrong_key = JwtGenerator::from_secret("abcdefghijabcdefghijabcdefghijab")
            .unwrap()
            .encrypted(false)
            .generate(&profile())
            .unwrap();

        assert!(matches!(
            authenticator.authenticate(&expired),
            Err(Error::TokenExpired)
        ));
        assert!(matches!(
            authenticator.authenticate(&wrong_key),
            Err(Error::InvalidSignature)
        ));

        let messages: Vec<String> = ["fakeToken", expired.as_str(), wrong_key.as_str()]
            .into_iter()
            .map(|token| {
                let mut credentials = TokenCredentials::new(token, CLIENT_NAME);
                authenticator
                    .validate(&mut credentials)
                    .unwrap_err()
                    .to_string()
            })
            .collect();
        assert!(messages.iter().all(|m| m == &messages[0]));
    }

    #[test]
    fn encrypted_token_without_decryption_key() {
        let token = JwtGenerator::from_secret(KEY)
            .unwrap()
            .generate(&profile())
            .unwrap();
        let signing = KeyMaterial::from_secret(KEY).unwrap().signing().clone();
        let authenticator = JwtAuthenticator::new(KeyMaterial::new(signing));
        assert!(matches!(
            authenticator.authenticate(&token),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn registry_restricts_kinds() {
        let token = JwtGenerator::from_secret(KEY)
            .unwrap()
            .generate(&profile())
            .unwrap();
        let authenticator = JwtAuthenticator::from_secret(KEY)
            .unwrap()
            .with_registry(ProfileRegistry::empty().register(ProfileKind::Google));
        assert!(matches!(
            authenticator.authenticate(&token),
            Err(Error::UnknownProfileType(_))
        ));
    }
}
