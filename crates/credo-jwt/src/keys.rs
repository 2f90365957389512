//! Signing and encryption key material.

use crate::{Error, Result};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use std::fmt;
use zeroize::Zeroizing;

/// Family of a signing key. The header algorithm of every verified token must
/// belong to the family of the configured key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Shared secret (HS*).
    Hmac,
    /// RSA key pair (RS*, PS*).
    Rsa,
    /// P-256 / P-384 key pair (ES*).
    Ec,
}

impl KeyFamily {
    /// Algorithms accepted for keys of this family.
    pub fn allowed_algorithms(self) -> &'static [Algorithm] {
        match self {
            KeyFamily::Hmac => &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512],
            KeyFamily::Rsa => &[
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            KeyFamily::Ec => &[Algorithm::ES256, Algorithm::ES384],
        }
    }

    /// Family of `alg`, if supported.
    pub fn of(alg: Algorithm) -> Option<Self> {
        [KeyFamily::Hmac, KeyFamily::Rsa, KeyFamily::Ec]
            .into_iter()
            .find(|family| family.allowed_algorithms().contains(&alg))
    }
}

/// Key used to sign and verify the inner JWS.
#[derive(Clone)]
pub struct SigningKey {
    algorithm: Algorithm,
    family: KeyFamily,
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
}

impl SigningKey {
    /// HMAC key. The secret must be at least as long as the hash output
    /// (32 bytes for HS256).
    pub fn hmac(algorithm: Algorithm, secret: &[u8]) -> Result<Self> {
        let min_len = match algorithm {
            Algorithm::HS256 => 32,
            Algorithm::HS384 => 48,
            Algorithm::HS512 => 64,
            other => {
                return Err(Error::InvalidKey(format!("{other:?} is not an HMAC algorithm")));
            }
        };
        if secret.len() < min_len {
            return Err(Error::InvalidKey(format!(
                "{algorithm:?} requires a secret of at least {min_len} bytes"
            )));
        }
        Ok(Self {
            algorithm,
            family: KeyFamily::Hmac,
            encoding: Some(EncodingKey::from_secret(secret)),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    /// RSA or EC key pair from PEM. The family follows `algorithm`.
    pub fn pem_pair(algorithm: Algorithm, private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        let mut key = Self::pem_public(algorithm, public_pem)?;
        let encoding = match key.family {
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(private_pem),
            KeyFamily::Ec => EncodingKey::from_ec_pem(private_pem),
            KeyFamily::Hmac => hmac_needs_secret(algorithm)?,
        }
        .map_err(|e| Error::InvalidKey(format!("private key: {e}")))?;
        key.encoding = Some(encoding);
        Ok(key)
    }

    /// Verification-only RSA or EC key from a public PEM.
    pub fn pem_public(algorithm: Algorithm, public_pem: &[u8]) -> Result<Self> {
        let family = KeyFamily::of(algorithm)
            .ok_or_else(|| Error::InvalidKey(format!("unsupported algorithm {algorithm:?}")))?;
        let decoding = match family {
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(public_pem),
            KeyFamily::Ec => DecodingKey::from_ec_pem(public_pem),
            KeyFamily::Hmac => hmac_needs_secret(algorithm)?,
        }
        .map_err(|e| Error::InvalidKey(format!("public key: {e}")))?;
        Ok(Self {
            algorithm,
            family,
            encoding: None,
            decoding,
        })
    }

    /// Algorithm used when signing.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// True if this key can produce signatures.
    pub fn can_sign(&self) -> bool {
        self.encoding.is_some()
    }

    pub(crate) fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding.as_ref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn hmac_needs_secret<T>(algorithm: Algorithm) -> Result<T> {
    Err(Error::InvalidKey(format!(
        "{algorithm:?} needs a shared secret, not a PEM key"
    )))
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .field("family", &self.family)
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

/// Content encryption method of the outer JWE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncryption {
    /// AES-128-GCM, 16 byte key.
    A128Gcm,
    /// AES-256-GCM, 32 byte key.
    A256Gcm,
}

impl ContentEncryption {
    /// `enc` header value.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentEncryption::A128Gcm => "A128GCM",
            ContentEncryption::A256Gcm => "A256GCM",
        }
    }

    fn for_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(ContentEncryption::A128Gcm),
            32 => Some(ContentEncryption::A256Gcm),
            _ => None,
        }
    }
}

/// Direct (`alg: dir`) content encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: Zeroizing<Vec<u8>>,
    method: ContentEncryption,
}

impl EncryptionKey {
    /// 16 bytes select A128GCM, 32 bytes A256GCM.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let method = ContentEncryption::for_key_len(bytes.len()).ok_or_else(|| {
            Error::InvalidKey(format!(
                "encryption key must be 16 or 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
            method,
        })
    }

    pub fn method(&self) -> ContentEncryption {
        self.method
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Everything a generator or authenticator needs to build or open tokens.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    signing: SigningKey,
    encryption: Option<EncryptionKey>,
}

impl KeyMaterial {
    pub fn new(signing: SigningKey) -> Self {
        Self {
            signing,
            encryption: None,
        }
    }

    /// HS256 signing with `secret`, and direct A256GCM encryption with the
    /// same secret when it is exactly 32 bytes long.
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        let signing = SigningKey::hmac(Algorithm::HS256, secret)?;
        let encryption = match EncryptionKey::from_bytes(secret) {
            Ok(key) => Some(key),
            Err(_) => {
                tracing::debug!(
                    secret_len = secret.len(),
                    "secret length unsuitable for AES-GCM, no encryption key derived"
                );
                None
            }
        };
        Ok(Self {
            signing,
            encryption,
        })
    }

    #[must_use]
    pub fn with_encryption(mut self, key: EncryptionKey) -> Self {
        self.encryption = Some(key);
        self
    }

    pub fn signing(&self) -> &SigningKey {
        &self.signing
    }

    pub fn encryption(&self) -> Option<&EncryptionKey> {
        self.encryption.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "12345678901234567890123456789012";

    #[test]
    fn hmac_secret_length_is_enforced() {
        assert!(SigningKey::hmac(Algorithm::HS256, KEY.as_bytes()).is_ok());
        assert!(matches!(
            SigningKey::hmac(Algorithm::HS256, b"short"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            SigningKey::hmac(Algorithm::HS512, KEY.as_bytes()),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            SigningKey::hmac(Algorithm::RS256, KEY.as_bytes()),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn families() {
        assert_eq!(KeyFamily::of(Algorithm::PS384), Some(KeyFamily::Rsa));
        assert_eq!(KeyFamily::of(Algorithm::ES256), Some(KeyFamily::Ec));
        assert_eq!(KeyFamily::of(Algorithm::EdDSA), None);
    }

    #[test]
    fn secret_material_derives_encryption() {
        let keys = KeyMaterial::from_secret(KEY).unwrap();
        assert_eq!(keys.signing().algorithm(), Algorithm::HS256);
        assert_eq!(
            keys.encryption().map(EncryptionKey::method),
            Some(ContentEncryption::A256Gcm)
        );

        let long = "x".repeat(48);
        let keys = KeyMaterial::from_secret(&long).unwrap();
        assert!(keys.encryption().is_none());
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let keys = KeyMaterial::from_secret(KEY).unwrap();
        let out = format!("{keys:?}");
        assert!(!out.contains(KEY));
        assert!(!out.contains("49, 50, 51"));
    }

    #[test]
    fn public_only_keys_cannot_sign() {
        let public = include_bytes!("../tests/keys/rsa_public.pem");
        let private = include_bytes!("../tests/keys/rsa_private.pem");

        let verifier = SigningKey::pem_public(Algorithm::RS256, public).unwrap();
        assert!(!verifier.can_sign());

        let signer = SigningKey::pem_pair(Algorithm::RS256, private, public).unwrap();
        assert!(signer.can_sign());
        assert!(SigningKey::hmac(Algorithm::HS256, KEY.as_bytes()).unwrap().can_sign());
    }

    #[test]
    fn pem_public_rejects_hmac_algorithms() {
        assert!(matches!(
            SigningKey::pem_public(Algorithm::HS256, b"-----BEGIN PUBLIC KEY-----"),
            Err(Error::InvalidKey(_))
        ));
    }
}
