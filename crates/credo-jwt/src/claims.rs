//! Mapping between profiles and JWT claim sets.
//!
//! A profile is carried as:
//!
//! | claim          | content                                  |
//! |----------------|------------------------------------------|
//! | `sub`          | typed id, `<discriminator>#<id>`         |
//! | `iat`          | issue time                               |
//! | `exp`, `nbf`   | optional validity window                 |
//! | `iss`, `aud`   | optional issuer / audience               |
//! | `$int_kind`    | profile kind discriminator               |
//! | `$int_ver`     | claim format version                     |
//! | `$int_roles`   | roles (omitted when empty)               |
//! | `$int_perms`   | permissions (omitted when empty)         |
//! | `$int_rme`     | remember-me flag (omitted when false)    |
//! | `attr:<name>`  | one claim per profile attribute          |

use crate::{Error, Result};

use credo_api::{CredoError, Profile, ProfileKind, TYPED_ID_SEPARATOR};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// A flat JWT claim set.
pub type ClaimSet = Map<String, Value>;

/// Version written to `$int_ver`. Decoding rejects any other value.
pub const CLAIM_FORMAT_VERSION: u64 = 1;

pub const SUBJECT: &str = "sub";
pub const ISSUED_AT: &str = "iat";
pub const EXPIRATION: &str = "exp";
pub const NOT_BEFORE: &str = "nbf";
pub const ISSUER: &str = "iss";
pub const AUDIENCE: &str = "aud";
pub const JWT_ID: &str = "jti";

pub const KIND: &str = "$int_kind";
pub const VERSION: &str = "$int_ver";
pub const ROLES: &str = "$int_roles";
pub const PERMISSIONS: &str = "$int_perms";
pub const REMEMBER_ME: &str = "$int_rme";
pub const ATTRIBUTE_PREFIX: &str = "attr:";

const REGISTERED: [&str; 7] = [
    SUBJECT, ISSUED_AT, EXPIRATION, NOT_BEFORE, ISSUER, AUDIENCE, JWT_ID,
];

/// Registered claims written alongside the profile.
#[derive(Debug, Clone, Default)]
pub struct ClaimOptions {
    pub issued_at: i64,
    pub expiration: Option<i64>,
    pub not_before: Option<i64>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Build the claim set for `profile`.
///
/// Attribute values must be strings, booleans or numbers.
pub fn encode(profile: &Profile, opts: &ClaimOptions) -> Result<ClaimSet> {
    if profile.id().is_empty() {
        return Err(Error::InvalidClaim("profile id must not be empty".to_string()));
    }

    let mut claims = ClaimSet::new();
    claims.insert(SUBJECT.to_string(), Value::from(profile.typed_id()));
    claims.insert(ISSUED_AT.to_string(), Value::from(opts.issued_at));
    if let Some(exp) = opts.expiration {
        claims.insert(EXPIRATION.to_string(), Value::from(exp));
    }
    if let Some(nbf) = opts.not_before {
        claims.insert(NOT_BEFORE.to_string(), Value::from(nbf));
    }
    if let Some(iss) = &opts.issuer {
        claims.insert(ISSUER.to_string(), Value::from(iss.as_str()));
    }
    if let Some(aud) = &opts.audience {
        claims.insert(AUDIENCE.to_string(), Value::from(aud.as_str()));
    }

    claims.insert(KIND.to_string(), Value::from(profile.kind().discriminator()));
    claims.insert(VERSION.to_string(), Value::from(CLAIM_FORMAT_VERSION));

    if !profile.roles().is_empty() {
        claims.insert(ROLES.to_string(), string_array(profile.roles()));
    }
    if !profile.permissions().is_empty() {
        claims.insert(PERMISSIONS.to_string(), string_array(profile.permissions()));
    }
    if profile.is_remembered() {
        claims.insert(REMEMBER_ME.to_string(), Value::Bool(true));
    }

    for (name, value) in profile.attributes() {
        if !is_primitive(value) {
            return Err(Error::UnsupportedAttributeType(name.clone()));
        }
        claims.insert(format!("{ATTRIBUTE_PREFIX}{name}"), value.clone());
    }

    Ok(claims)
}

/// Rebuild a profile from a verified claim set.
pub fn decode(claims: &ClaimSet, registry: &ProfileRegistry) -> Result<Profile> {
    let Some(kind) = claims.get(KIND) else {
        if registry.accepts_untyped() {
            return decode_untyped(claims);
        }
        return Err(Error::UnknownProfileType(format!("missing {KIND} claim")));
    };
    let discriminator = kind
        .as_str()
        .ok_or_else(|| Error::UnknownProfileType(format!("{KIND} is not a string")))?;

    match claims.get(VERSION).and_then(Value::as_u64) {
        Some(CLAIM_FORMAT_VERSION) => {}
        Some(other) => {
            return Err(Error::UnknownProfileType(format!(
                "unsupported claim format version {other}"
            )));
        }
        None => {
            return Err(Error::UnknownProfileType(format!(
                "missing or invalid {VERSION} claim"
            )));
        }
    }

    let construct = registry
        .constructor(discriminator)
        .ok_or_else(|| Error::UnknownProfileType(discriminator.to_string()))?;

    let subject = string_claim(claims, SUBJECT)?;
    let id = subject
        .strip_prefix(discriminator)
        .and_then(|rest| rest.strip_prefix(TYPED_ID_SEPARATOR))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            Error::InvalidClaim(format!("{SUBJECT} does not match profile type {discriminator}"))
        })?;

    let mut profile = construct(id.to_string()).map_err(credo_to_claim_error)?;

    for role in string_set(claims, ROLES)? {
        profile.add_role(role);
    }
    for permission in string_set(claims, PERMISSIONS)? {
        profile.add_permission(permission);
    }
    match claims.get(REMEMBER_ME) {
        None => {}
        Some(Value::Bool(remembered)) => profile.set_remembered(*remembered),
        Some(_) => {
            return Err(Error::InvalidClaim(format!("{REMEMBER_ME} is not a boolean")));
        }
    }

    for (name, value) in claims {
        let Some(attribute) = name.strip_prefix(ATTRIBUTE_PREFIX) else {
            continue;
        };
        if !is_primitive(value) {
            return Err(Error::InvalidClaim(format!(
                "attribute {attribute:?} is not a primitive value"
            )));
        }
        profile.add_attribute(attribute, value.clone());
    }

    Ok(profile)
}

/// Tokens issued by third parties: the whole subject is the id and every
/// non-registered claim becomes an attribute.
fn decode_untyped(claims: &ClaimSet) -> Result<Profile> {
    let subject = string_claim(claims, SUBJECT)?;
    let mut profile =
        Profile::new(ProfileKind::Generic, subject).map_err(credo_to_claim_error)?;
    for (name, value) in claims {
        if !REGISTERED.contains(&name.as_str()) {
            profile.add_attribute(name.as_str(), value.clone());
        }
    }
    Ok(profile)
}

fn is_primitive(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Bool(_) | Value::Number(_))
}

fn string_array(values: &BTreeSet<String>) -> Value {
    Value::Array(values.iter().map(|v| Value::from(v.as_str())).collect())
}

fn string_claim<'a>(claims: &'a ClaimSet, name: &str) -> Result<&'a str> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidClaim(format!("missing or non-string {name} claim")))
}

fn string_set(claims: &ClaimSet, name: &str) -> Result<Vec<String>> {
    match claims.get(name) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::InvalidClaim(format!("{name} must hold strings")))
            })
            .collect(),
        Some(_) => Err(Error::InvalidClaim(format!("{name} is not an array"))),
    }
}

fn credo_to_claim_error(err: CredoError) -> Error {
    Error::InvalidClaim(err.to_string())
}

/// Builds the profile for a given id.
pub type ProfileConstructor = fn(String) -> std::result::Result<Profile, CredoError>;

/// Discriminator -> constructor table consulted when decoding.
///
/// Anything not registered is rejected with [`Error::UnknownProfileType`].
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    constructors: HashMap<String, ProfileConstructor>,
    accept_untyped: bool,
}

impl Default for ProfileRegistry {
    /// Every [`ProfileKind`] under its own discriminator.
    fn default() -> Self {
        ProfileKind::ALL
            .into_iter()
            .fold(Self::empty(), ProfileRegistry::register)
    }
}

impl ProfileRegistry {
    /// A registry that accepts nothing.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
            accept_untyped: false,
        }
    }

    /// Accept `kind` under its discriminator.
    #[must_use]
    pub fn register(self, kind: ProfileKind) -> Self {
        self.register_with(kind.discriminator(), constructor_for(kind))
    }

    /// Accept `discriminator` and build profiles with `constructor`. Useful for
    /// aliases kept while migrating a discriminator.
    #[must_use]
    pub fn register_with(
        mut self,
        discriminator: impl Into<String>,
        constructor: ProfileConstructor,
    ) -> Self {
        self.constructors.insert(discriminator.into(), constructor);
        self
    }

    /// Also accept tokens with no `$int_kind` claim, decoded as
    /// [`ProfileKind::Generic`].
    #[must_use]
    pub fn accept_untyped(mut self) -> Self {
        self.accept_untyped = true;
        self
    }

    pub fn accepts_untyped(&self) -> bool {
        self.accept_untyped
    }

    pub fn constructor(&self, discriminator: &str) -> Option<ProfileConstructor> {
        self.constructors.get(discriminator).copied()
    }
}

fn constructor_for(kind: ProfileKind) -> ProfileConstructor {
    match kind {
        ProfileKind::Generic => |id| Profile::new(ProfileKind::Generic, id),
        ProfileKind::Facebook => |id| Profile::new(ProfileKind::Facebook, id),
        ProfileKind::Google => |id| Profile::new(ProfileKind::Google, id),
        ProfileKind::Github => |id| Profile::new(ProfileKind::Github, id),
        ProfileKind::Twitter => |id| Profile::new(ProfileKind::Twitter, id),
        ProfileKind::Oidc => |id| Profile::new(ProfileKind::Oidc, id),
        ProfileKind::Saml => |id| Profile::new(ProfileKind::Saml, id),
        ProfileKind::Cas => |id| Profile::new(ProfileKind::Cas, id),
    }
}
