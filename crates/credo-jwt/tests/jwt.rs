use std::sync::Arc;

use credo_api::{Authenticator, CredoError, Profile, ProfileKind, TokenCredentials};
use credo_jwt::{
    Algorithm, EncryptionKey, Error, FixedClock, GenerationOptions, JwtAuthenticator,
    JwtGenerator, KeyMaterial, ProfileRegistry, SigningKey,
};
use serde_json::json;

const KEY: &str = "12345678901234567890123456789012";
const ID: &str = "technicalId";
const NAME: &str = "fakeName";
const VERIFIED: bool = true;
const CLIENT_NAME: &str = "clientName";

const RSA_PRIVATE: &[u8] = include_bytes!("keys/rsa_private.pem");
const RSA_PUBLIC: &[u8] = include_bytes!("keys/rsa_public.pem");
const EC_PRIVATE: &[u8] = include_bytes!("keys/ec_private.pem");
const EC_PUBLIC: &[u8] = include_bytes!("keys/ec_public.pem");

fn create_profile() -> Profile {
    let mut profile = Profile::new(ProfileKind::Facebook, ID).unwrap();
    profile.add_attribute("name", NAME);
    profile.add_attribute("verified", VERIFIED);
    profile
}

fn assert_token(profile: &Profile, token: &str, authenticator: &JwtAuthenticator) {
    let mut credentials = TokenCredentials::new(token, CLIENT_NAME);
    authenticator.validate(&mut credentials).unwrap();
    let resolved = credentials.profile().unwrap();
    assert_eq!(resolved.kind(), ProfileKind::Facebook);
    assert_eq!(resolved.typed_id(), profile.typed_id());
    assert_eq!(resolved.attribute("name"), Some(&json!(NAME)));
    assert_eq!(resolved.attribute("verified"), Some(&json!(VERIFIED)));
    assert_eq!(resolved, profile);
}

#[test]
fn generate_authenticate() {
    let generator = JwtGenerator::from_secret(KEY).unwrap();
    let profile = create_profile();
    let token = generator.generate(&profile).unwrap();
    assert_eq!(token.split('.').count(), 5);
    assert_token(&profile, &token, &JwtAuthenticator::from_secret(KEY).unwrap());
}

#[test]
fn generate_authenticate_not_encrypted() {
    let generator = JwtGenerator::from_secret(KEY).unwrap().encrypted(false);
    let profile = create_profile();
    let token = generator.generate(&profile).unwrap();
    assert_eq!(token.split('.').count(), 3);
    assert_token(&profile, &token, &JwtAuthenticator::from_secret(KEY).unwrap());
}

#[test]
fn float_attributes_survive_exactly() {
    let generator = JwtGenerator::from_secret(KEY).unwrap().encrypted(false);
    let authenticator = JwtAuthenticator::from_secret(KEY).unwrap();
    let mut profile = create_profile();
    profile.add_attribute("tiny", 1.071_566_039_146_582_6e-75);
    profile.add_attribute("negative", -1.819_967_304_027_17e-179);
    profile.add_attribute("huge", -1.603_964_615_428_183e143);

    let token = generator.generate(&profile).unwrap();
    assert_eq!(authenticator.authenticate(&token).unwrap(), profile);
}

#[test]
fn authenticate_failed() {
    let authenticator = JwtAuthenticator::from_secret(KEY).unwrap();
    let mut credentials = TokenCredentials::new("fakeToken", CLIENT_NAME);
    assert!(matches!(
        authenticator.validate(&mut credentials),
        Err(CredoError::Authentication(_))
    ));
    assert!(credentials.profile().is_none());
}

#[test]
fn generic_third_party_jwt() {
    // HS256 token from another issuer: no profile kind claim, plain claims.
    let signing = SigningKey::hmac(Algorithm::HS256, KEY.as_bytes()).unwrap();
    let claims = serde_json::from_value(json!({
        "iss": "Custom JWT Builder",
        "iat": 1_450_164_455,
        "sub": "user@pac4j.org",
        "email": "user@pac4j.org",
    }))
    .unwrap();
    let token = credo_jwt::jws::sign(&claims, &signing).unwrap();

    let strict = JwtAuthenticator::from_secret(KEY).unwrap();
    assert!(matches!(
        strict.authenticate(&token),
        Err(Error::UnknownProfileType(_))
    ));

    let lenient = JwtAuthenticator::from_secret(KEY)
        .unwrap()
        .with_registry(ProfileRegistry::default().accept_untyped());
    let profile = lenient.authenticate(&token).unwrap();
    assert_eq!(profile.kind(), ProfileKind::Generic);
    assert_eq!(profile.id(), "user@pac4j.org");
    assert_eq!(profile.attribute("email"), Some(&json!("user@pac4j.org")));
}

#[test]
fn rsa_signed_and_encrypted() {
    let enc = EncryptionKey::from_bytes(KEY.as_bytes()).unwrap();
    let signing = SigningKey::pem_pair(Algorithm::RS256, RSA_PRIVATE, RSA_PUBLIC).unwrap();
    let generator = JwtGenerator::new(KeyMaterial::new(signing).with_encryption(enc.clone()));

    let verifying = SigningKey::pem_public(Algorithm::RS256, RSA_PUBLIC).unwrap();
    let authenticator = JwtAuthenticator::new(KeyMaterial::new(verifying).with_encryption(enc));

    let profile = create_profile();
    let token = generator.generate(&profile).unwrap();
    assert_token(&profile, &token, &authenticator);
}

#[test]
fn ec_signed() {
    let signing = SigningKey::pem_pair(Algorithm::ES256, EC_PRIVATE, EC_PUBLIC).unwrap();
    let generator = JwtGenerator::new(KeyMaterial::new(signing)).encrypted(false);
    let verifying = SigningKey::pem_public(Algorithm::ES256, EC_PUBLIC).unwrap();
    let authenticator = JwtAuthenticator::new(KeyMaterial::new(verifying));

    let profile = create_profile();
    let token = generator.generate(&profile).unwrap();
    assert_token(&profile, &token, &authenticator);

    // An ES256 header is never accepted by an HMAC-configured authenticator.
    let hmac_authenticator = JwtAuthenticator::from_secret(KEY).unwrap();
    assert!(matches!(
        hmac_authenticator.authenticate(&token),
        Err(Error::AlgorithmMismatch(alg)) if alg == "ES256"
    ));
}

#[test]
fn expiry_boundary_through_the_full_pipeline() {
    const ISSUED: i64 = 1_700_000_000;
    let generator = JwtGenerator::from_secret(KEY)
        .unwrap()
        .with_clock(Arc::new(FixedClock(ISSUED)))
        .with_options(GenerationOptions {
            expires_in_seconds: Some(600),
            ..Default::default()
        });
    let token = generator.generate(&create_profile()).unwrap();

    let at = |now: i64| {
        JwtAuthenticator::from_secret(KEY)
            .unwrap()
            .with_clock(Arc::new(FixedClock(now)))
    };
    assert!(at(ISSUED + 599).authenticate(&token).is_ok());
    assert!(matches!(
        at(ISSUED + 600).authenticate(&token),
        Err(Error::TokenExpired)
    ));
}

#[test]
fn authenticator_is_shareable_across_threads() {
    let authenticator = Arc::new(JwtAuthenticator::from_secret(KEY).unwrap());
    let generator = Arc::new(JwtGenerator::from_secret(KEY).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let authenticator = Arc::clone(&authenticator);
            let generator = Arc::clone(&generator);
            std::thread::spawn(move || {
                let mut profile = create_profile();
                profile.add_attribute("worker", i);
                let token = generator.generate(&profile).unwrap();
                assert_eq!(authenticator.authenticate(&token).unwrap(), profile);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
