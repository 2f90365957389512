use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use credo_api::{CredoError, ProfileKind, SecretStore};
use credo_jwt::{
    Algorithm, EncryptionKey, GenerationOptions, JwtAuthenticator, JwtGenerator, KeyFamily,
    KeyMaterial, ProfileRegistry, SigningKey, ValidationOptions,
};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "jwt.toml";

const BASE64_PREFIX: &str = "base64:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub signing: SigningConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub algorithm: Algorithm,
    pub secret_ref: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub secret_ref: Option<String>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            secret_ref: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub leeway_seconds: u64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    #[serde(default)]
    pub accept_untyped: bool,
    pub kinds: Option<Vec<ProfileKind>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub expires_in_seconds: Option<u64>,
    pub not_before_skew_seconds: Option<u64>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

fn default_true() -> bool {
    true
}

pub fn validate_config(config: &JwtConfig) -> Result<(), CredoError> {
    let signing = &config.signing;
    let family = KeyFamily::of(signing.algorithm).ok_or_else(|| {
        CredoError::Validation(format!("unsupported algorithm {:?}", signing.algorithm))
    })?;

    match family {
        KeyFamily::Hmac => {
            if signing.secret_ref.is_none() {
                return Err(CredoError::Validation(format!(
                    "{:?} requires signing.secret_ref",
                    signing.algorithm
                )));
            }
            if signing.private_key_path.is_some() || signing.public_key_path.is_some() {
                return Err(CredoError::Validation(
                    "HMAC signing does not use key files".to_string(),
                ));
            }
        }
        KeyFamily::Rsa | KeyFamily::Ec => {
            if signing.public_key_path.is_none() {
                return Err(CredoError::Validation(format!(
                    "{:?} requires signing.public_key_path",
                    signing.algorithm
                )));
            }
            if signing.secret_ref.is_some() {
                return Err(CredoError::Validation(
                    "signing.secret_ref is only used by HMAC algorithms".to_string(),
                ));
            }
            if config.encryption.enabled && config.encryption.secret_ref.is_none() {
                return Err(CredoError::Validation(
                    "encryption with an asymmetric signing key requires encryption.secret_ref"
                        .to_string(),
                ));
            }
        }
    }

    if matches!(&config.validation.kinds, Some(kinds) if kinds.is_empty()) {
        return Err(CredoError::Validation(
            "validation.kinds must not be empty when set".to_string(),
        ));
    }

    Ok(())
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("credo")
    } else {
        PathBuf::from(".credo")
    }
}

pub fn load_config_from_dir(dir: &Path) -> Result<JwtConfig, CredoError> {
    load_config_from_file(&dir.join(CONFIG_FILE_NAME))
}

pub fn load_config_from_file(path: &Path) -> Result<JwtConfig, CredoError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CredoError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&content)
        .map_err(|e| CredoError::Validation(format!("{}: {e}", path.display())))
}

pub fn parse_config(content: &str) -> Result<JwtConfig, CredoError> {
    let config: JwtConfig = toml::from_str(content)
        .map_err(|e| CredoError::Validation(format!("invalid TOML: {e}")))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn write_default_config_file(dir: &Path) -> Result<PathBuf, CredoError> {
    fs::create_dir_all(dir)
        .map_err(|e| CredoError::Internal(format!("failed to create {}: {e}", dir.display())))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        fs::write(&path, include_str!("../../../docs/credo/jwt.toml.example")).map_err(|e| {
            CredoError::Internal(format!("failed to write {}: {e}", path.display()))
        })?;
    }
    Ok(path)
}

/// Reads secrets from environment variables named by `secret_ref`.
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, secret_ref: &str) -> Result<String, CredoError> {
        std::env::var(secret_ref)
            .map_err(|_| CredoError::NotFound(format!("missing secret env var {secret_ref}")))
    }
}

/// Secret bytes: raw UTF-8, or base64 after a `base64:` prefix.
fn decode_secret(raw: &str) -> Result<Vec<u8>, CredoError> {
    let Some(encoded) = raw.strip_prefix(BASE64_PREFIX) else {
        return Ok(raw.as_bytes().to_vec());
    };
    let encoded = encoded.trim();
    URL_SAFE_NO_PAD
        .decode(encoded)
        .or_else(|_| STANDARD.decode(encoded))
        .map_err(|e| CredoError::Validation(format!("invalid base64 secret: {e}")))
}

fn resolve_secret(secrets: &dyn SecretStore, secret_ref: &str) -> Result<Vec<u8>, CredoError> {
    decode_secret(&secrets.get(secret_ref)?)
}

fn read_key_file(base_dir: &Path, path: &Path) -> Result<Vec<u8>, CredoError> {
    let path = base_dir.join(path);
    fs::read(&path)
        .map_err(|e| CredoError::NotFound(format!("failed to read {}: {e}", path.display())))
}

fn jwt_error(err: credo_jwt::Error) -> CredoError {
    CredoError::Validation(err.to_string())
}

/// Build key material from `config`. Key file paths are resolved against
/// `base_dir`. With `need_private_key`, asymmetric configs must name a
/// private key.
pub fn build_key_material(
    config: &JwtConfig,
    secrets: &dyn SecretStore,
    base_dir: &Path,
    need_private_key: bool,
) -> Result<KeyMaterial, CredoError> {
    validate_config(config)?;
    let signing_cfg = &config.signing;
    let algorithm = signing_cfg.algorithm;

    let (signing, hmac_secret) = match (&signing_cfg.secret_ref, &signing_cfg.public_key_path) {
        (Some(secret_ref), _) => {
            let secret = resolve_secret(secrets, secret_ref)?;
            let key = SigningKey::hmac(algorithm, &secret).map_err(jwt_error)?;
            (key, Some(secret))
        }
        (None, Some(public_path)) => {
            let public = read_key_file(base_dir, public_path)?;
            let key = match &signing_cfg.private_key_path {
                Some(private_path) => {
                    let private = read_key_file(base_dir, private_path)?;
                    SigningKey::pem_pair(algorithm, &private, &public)
                }
                None if need_private_key => {
                    return Err(CredoError::Validation(format!(
                        "{algorithm:?} token generation requires signing.private_key_path"
                    )));
                }
                None => SigningKey::pem_public(algorithm, &public),
            }
            .map_err(jwt_error)?;
            (key, None)
        }
        (None, None) => {
            return Err(CredoError::Validation(
                "signing key is not configured".to_string(),
            ));
        }
    };

    let mut keys = KeyMaterial::new(signing);
    if let Some(secret_ref) = &config.encryption.secret_ref {
        let secret = resolve_secret(secrets, secret_ref)?;
        keys = keys.with_encryption(EncryptionKey::from_bytes(&secret).map_err(jwt_error)?);
    } else if let Some(secret) = hmac_secret {
        match EncryptionKey::from_bytes(&secret) {
            Ok(key) => keys = keys.with_encryption(key),
            Err(_) if config.encryption.enabled => {
                return Err(CredoError::Validation(
                    "signing secret cannot double as an AES-GCM key (needs 16 or 32 bytes); set encryption.secret_ref"
                        .to_string(),
                ));
            }
            Err(_) => {
                tracing::warn!(
                    "signing secret is not a valid AES-GCM key; encrypted tokens will be rejected"
                );
            }
        }
    }

    Ok(keys)
}

pub fn build_generator(
    config: &JwtConfig,
    secrets: &dyn SecretStore,
    base_dir: &Path,
) -> Result<JwtGenerator, CredoError> {
    let keys = build_key_material(config, secrets, base_dir, true)?;
    let generation = &config.generation;
    Ok(JwtGenerator::new(keys)
        .encrypted(config.encryption.enabled)
        .with_options(GenerationOptions {
            expires_in_seconds: generation.expires_in_seconds,
            not_before_skew_seconds: generation.not_before_skew_seconds,
            issuer: generation.issuer.clone(),
            audience: generation.audience.clone(),
        }))
}

pub fn build_authenticator(
    config: &JwtConfig,
    secrets: &dyn SecretStore,
    base_dir: &Path,
) -> Result<JwtAuthenticator, CredoError> {
    let keys = build_key_material(config, secrets, base_dir, false)?;
    let validation = &config.validation;

    let mut registry = match &validation.kinds {
        Some(kinds) => kinds
            .iter()
            .copied()
            .fold(ProfileRegistry::empty(), ProfileRegistry::register),
        None => ProfileRegistry::default(),
    };
    if validation.accept_untyped {
        registry = registry.accept_untyped();
    }

    Ok(JwtAuthenticator::new(keys)
        .with_registry(registry)
        .with_options(ValidationOptions {
            leeway_seconds: validation.leeway_seconds,
            issuer: validation.issuer.clone(),
            audience: validation.audience.clone(),
        }))
}
