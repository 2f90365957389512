use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between the kind discriminator and the id in a typed id.
pub const TYPED_ID_SEPARATOR: char = '#';

/// Profile kinds understood on the wire.
///
/// The discriminator strings are part of the token format and must never be
/// renamed; add a new variant instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Generic,
    Facebook,
    Google,
    Github,
    Twitter,
    Oidc,
    Saml,
    Cas,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 8] = [
        ProfileKind::Generic,
        ProfileKind::Facebook,
        ProfileKind::Google,
        ProfileKind::Github,
        ProfileKind::Twitter,
        ProfileKind::Oidc,
        ProfileKind::Saml,
        ProfileKind::Cas,
    ];

    pub fn discriminator(self) -> &'static str {
        match self {
            ProfileKind::Generic => "generic",
            ProfileKind::Facebook => "facebook",
            ProfileKind::Google => "google",
            ProfileKind::Github => "github",
            ProfileKind::Twitter => "twitter",
            ProfileKind::Oidc => "oidc",
            ProfileKind::Saml => "saml",
            ProfileKind::Cas => "cas",
        }
    }

    pub fn from_discriminator(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.discriminator() == value)
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

/// An authenticated identity, independent of the provider it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile")]
pub struct Profile {
    kind: ProfileKind,
    id: String,
    attributes: BTreeMap<String, Value>,
    roles: BTreeSet<String>,
    permissions: BTreeSet<String>,
    remembered: bool,
}

#[derive(Deserialize)]
struct RawProfile {
    kind: ProfileKind,
    id: String,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default)]
    permissions: BTreeSet<String>,
    #[serde(default)]
    remembered: bool,
}

impl TryFrom<RawProfile> for Profile {
    type Error = CredoError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: raw.kind,
            id: non_empty_id(raw.id)?,
            attributes: raw.attributes,
            roles: raw.roles,
            permissions: raw.permissions,
            remembered: raw.remembered,
        })
    }
}

impl Profile {
    /// Create an empty profile of `kind`. The id must be non-empty.
    pub fn new(kind: ProfileKind, id: impl Into<String>) -> Result<Self, CredoError> {
        let id = non_empty_id(id.into())?;
        Ok(Self {
            kind,
            id,
            attributes: BTreeMap::new(),
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
            remembered: false,
        })
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) -> Result<(), CredoError> {
        self.id = non_empty_id(id.into())?;
        Ok(())
    }

    /// `<discriminator>#<id>`, e.g. `facebook#123`.
    pub fn typed_id(&self) -> String {
        format!("{}{TYPED_ID_SEPARATOR}{}", self.kind.discriminator(), self.id)
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn add_permission(&mut self, permission: impl Into<String>) {
        self.permissions.insert(permission.into());
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn set_remembered(&mut self, remembered: bool) {
        self.remembered = remembered;
    }

    pub fn is_remembered(&self) -> bool {
        self.remembered
    }
}

fn non_empty_id(id: String) -> Result<String, CredoError> {
    if id.is_empty() {
        return Err(CredoError::Validation("profile id must not be empty".to_string()));
    }
    Ok(id)
}

/// A raw token presented by a client, and the profile it resolves to.
#[derive(Clone)]
pub struct TokenCredentials {
    token: String,
    client_name: String,
    profile: Option<Profile>,
}

impl TokenCredentials {
    pub fn new(token: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client_name: client_name.into(),
            profile: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = Some(profile);
    }

    pub fn take_profile(&mut self) -> Option<Profile> {
        self.profile.take()
    }
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token", &"<redacted>")
            .field("client_name", &self.client_name)
            .field("profile", &self.profile)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredoError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Resolves a token into a profile and stores it on the credentials.
///
/// Implementations must leave `credentials` untouched on failure.
pub trait Authenticator: Send + Sync {
    fn validate(&self, credentials: &mut TokenCredentials) -> Result<(), CredoError>;
}

pub trait SecretStore: Send + Sync {
    fn get(&self, secret_ref: &str) -> Result<String, CredoError>;
}
