use std::collections::BTreeMap;
use std::fmt;

use oak_core::openapi::{ApiKeyLocation, HttpAuthScheme, OAuthFlowType};

use crate::auth::SecretValue;

/// Canonical credential slots. Each maps to one environment variable per
/// scheme (and per flow, for OAuth2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvVarKey {
    ApiKey,
    Token,
    Username,
    Password,
    ClientId,
    ClientSecret,
}

impl EnvVarKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "apiKey",
            Self::Token => "token",
            Self::Username => "username",
            Self::Password => "password",
            Self::ClientId => "client_id",
            Self::ClientSecret => "client_secret",
        }
    }
}

impl fmt::Display for EnvVarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthType {
    ApiKey,
    Http(HttpAuthScheme),
    OAuth2,
    OpenIdConnect,
}

/// Where a resolved credential is attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthLocation {
    Header,
    Query,
    Cookie,
}

impl AuthLocation {
    /// Unknown locations fall back to `Header`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "query" => Self::Query,
            "cookie" => Self::Cookie,
            _ => Self::Header,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Query => "query",
            Self::Cookie => "cookie",
        }
    }
}

impl From<ApiKeyLocation> for AuthLocation {
    fn from(l: ApiKeyLocation) -> Self {
        match l {
            ApiKeyLocation::Header => Self::Header,
            ApiKeyLocation::Query => Self::Query,
            ApiKeyLocation::Cookie => Self::Cookie,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthUrls {
    pub authorization: Option<String>,
    pub token: Option<String>,
    pub refresh: Option<String>,
}

/// One declared scheme occurrence, de-referenced. OAuth2 schemes yield one
/// requirement per declared flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequirement {
    pub auth_type: AuthType,
    /// Parameter name for `apiKey` schemes.
    pub name: Option<String>,
    pub location: Option<AuthLocation>,
    pub security_scheme_name: String,
    pub api_title: Option<String>,
    pub source_description_id: String,
    pub flow_type: Option<OAuthFlowType>,
    pub auth_urls: AuthUrls,
    pub description: Option<String>,
}

/// Environment variable names for one scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeEnvVars {
    pub slots: BTreeMap<EnvVarKey, String>,
    /// OAuth2 only: per-flow slots.
    pub flows: BTreeMap<OAuthFlowType, BTreeMap<EnvVarKey, String>>,
}

impl SchemeEnvVars {
    pub fn slot(&self, key: EnvVarKey) -> Option<&str> {
        self.slots.get(&key).map(String::as_str)
    }

    pub fn flow_slot(&self, flow: OAuthFlowType, key: EnvVarKey) -> Option<&str> {
        self.flows.get(&flow)?.get(&key).map(String::as_str)
    }
}

/// Scheme names declared by exactly one source live in `single`; names
/// declared by several sources are only reachable through `scoped`, keyed by
/// source name first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMappings {
    pub single: BTreeMap<String, SchemeEnvVars>,
    pub scoped: BTreeMap<String, BTreeMap<String, SchemeEnvVars>>,
}

impl EnvMappings {
    pub fn lookup(&self, scheme_name: &str, source_name: Option<&str>) -> Option<&SchemeEnvVars> {
        if let Some(vars) = self.single.get(scheme_name) {
            return Some(vars);
        }
        match source_name {
            Some(source) => self.scoped.get(source)?.get(scheme_name),
            None => {
                if self.scoped.values().any(|m| m.contains_key(scheme_name)) {
                    tracing::warn!(
                        scheme = scheme_name,
                        "scheme name is declared by several sources; a source name is required"
                    );
                }
                None
            }
        }
    }
}

/// A credential ready to attach to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAuthValue {
    pub name: String,
    pub location: AuthLocation,
    pub auth_value: SecretValue,
}

impl RequestAuthValue {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: AuthLocation::Header,
            auth_value: SecretValue::new(value),
        }
    }
}
