//! Signed tokens (JWS compact serialization).

use crate::claims::{AUDIENCE, ClaimSet, EXPIRATION, ISSUER, NOT_BEFORE};
use crate::compact::{TokenShape, decode_segment};
use crate::keys::{KeyFamily, SigningKey};
use crate::{Error, Result};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

/// Checks applied to a token after its signature has been verified.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Clock skew tolerated on `exp` and `nbf`, in seconds.
    pub leeway_seconds: u64,

    /// Expected issuer (`iss`).
    pub issuer: Option<String>,

    /// Expected audience (`aud`).
    pub audience: Option<String>,
}

/// Sign `claims` with `key`, producing `header.payload.signature`.
pub fn sign(claims: &ClaimSet, key: &SigningKey) -> Result<String> {
    let encoding = key
        .encoding_key()
        .ok_or_else(|| Error::InvalidKey("signing key is verification-only".to_string()))?;
    let header = Header::new(key.algorithm());
    jsonwebtoken::encode(&header, claims, encoding)
        .map_err(|e| Error::InvalidKey(format!("signing failed: {e}")))
}

/// Verify a signed token and return its claims.
///
/// The header algorithm is checked against the key family before any
/// signature work; `exp`/`nbf` are checked against `now` (unix seconds).
pub fn verify(
    token: &str,
    key: &SigningKey,
    opts: &ValidationOptions,
    now: i64,
) -> Result<ClaimSet> {
    if TokenShape::of(token)? != TokenShape::Signed {
        return Err(Error::MalformedToken("expected a signed token".to_string()));
    }

    let alg = header_algorithm(token, key.family())?;

    let mut validation = Validation::new(alg);
    validation.algorithms = key.family().allowed_algorithms().to_vec();
    validation.required_spec_claims = HashSet::new();
    // Time and audience checks are done below against the injected clock.
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<ClaimSet>(token, key.decoding_key(), &validation)
        .map_err(map_jwt_error)?;
    let claims = data.claims;

    check_validity_window(&claims, opts.leeway_seconds, now)?;
    check_issuer_audience(&claims, opts)?;
    Ok(claims)
}

fn header_algorithm(token: &str, family: KeyFamily) -> Result<Algorithm> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = decode_segment(segment)
        .ok_or_else(|| Error::MalformedToken("header is not base64url".to_string()))?;
    let header: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("header is not JSON: {e}")))?;
    let name = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedToken("header has no alg".to_string()))?;

    let alg = Algorithm::from_str(name).map_err(|_| Error::AlgorithmMismatch(name.to_string()))?;
    if !family.allowed_algorithms().contains(&alg) {
        return Err(Error::AlgorithmMismatch(name.to_string()));
    }
    Ok(alg)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> Error {
    match err.kind() {
        ErrorKind::InvalidSignature => Error::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            Error::AlgorithmMismatch(err.to_string())
        }
        ErrorKind::ExpiredSignature => Error::TokenExpired,
        ErrorKind::ImmatureSignature => Error::TokenNotYetValid,
        _ => Error::MalformedToken(err.to_string()),
    }
}

fn check_validity_window(claims: &ClaimSet, leeway_seconds: u64, now: i64) -> Result<()> {
    let leeway = i64::try_from(leeway_seconds).unwrap_or(i64::MAX);

    if let Some(exp) = numeric_claim(claims, EXPIRATION, f64::floor)? {
        if now >= exp.saturating_add(leeway) {
            return Err(Error::TokenExpired);
        }
    }
    if let Some(nbf) = numeric_claim(claims, NOT_BEFORE, f64::ceil)? {
        if now.saturating_add(leeway) < nbf {
            return Err(Error::TokenNotYetValid);
        }
    }
    Ok(())
}

/// NumericDate claim in whole seconds. Fractional values are rounded towards
/// the stricter bound by `round`.
#[allow(clippy::cast_possible_truncation)]
fn numeric_claim(claims: &ClaimSet, name: &str, round: fn(f64) -> f64) -> Result<Option<i64>> {
    let Some(value) = claims.get(name) else {
        return Ok(None);
    };
    if let Some(seconds) = value.as_i64() {
        return Ok(Some(seconds));
    }
    match value.as_f64() {
        Some(seconds) if seconds.is_finite() => Ok(Some(round(seconds) as i64)),
        _ => Err(Error::InvalidClaim(format!("{name} is not a number"))),
    }
}

fn check_issuer_audience(claims: &ClaimSet, opts: &ValidationOptions) -> Result<()> {
    if let Some(expected_iss) = &opts.issuer {
        let iss = claims
            .get(ISSUER)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidClaim("missing iss".to_string()))?;
        if iss != expected_iss {
            return Err(Error::InvalidClaim(format!(
                "issuer mismatch: expected {expected_iss}, got {iss}"
            )));
        }
    }

    if let Some(expected_aud) = &opts.audience {
        let aud = claims
            .get(AUDIENCE)
            .ok_or_else(|| Error::InvalidClaim("missing aud".to_string()))?;
        let ok = match aud {
            Value::String(s) => s == expected_aud,
            Value::Array(arr) => arr
                .iter()
                .any(|v| v.as_str() == Some(expected_aud.as_str())),
            _ => false,
        };
        if !ok {
            return Err(Error::InvalidClaim(format!(
                "audience mismatch: expected {expected_aud}"
            )));
        }
    }

    Ok(())
}
