use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// A `securitySchemes` entry. Unknown `type`s fail to deserialize, which
/// callers surface as a warning rather than silently mis-indexing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "http")]
    Http {
        scheme: String,
        #[serde(default, rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
        bearer_format: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2 {
        flows: OAuthFlows,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        open_id_connect_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl SecurityScheme {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::ApiKey { description, .. }
            | Self::Http { description, .. }
            | Self::OAuth2 { description, .. }
            | Self::OpenIdConnect { description, .. } => description.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// The `scheme` of an `http` security scheme (case-insensitive per RFC 7235).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuthScheme {
    Basic,
    Bearer,
    Other(String),
}

impl HttpAuthScheme {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("basic") {
            Self::Basic
        } else if s.eq_ignore_ascii_case("bearer") {
            Self::Bearer
        } else {
            Self::Other(s.to_ascii_lowercase())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum OAuthFlowType {
    #[serde(rename = "implicit")]
    Implicit,
    #[serde(rename = "password")]
    Password,
    #[serde(rename = "clientCredentials")]
    ClientCredentials,
    #[serde(rename = "authorizationCode")]
    AuthorizationCode,
}

impl OAuthFlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Implicit => "implicit",
            Self::Password => "password",
            Self::ClientCredentials => "clientCredentials",
            Self::AuthorizationCode => "authorizationCode",
        }
    }
}

impl fmt::Display for OAuthFlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OAuthFlows {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit: Option<OAuthFlow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<OAuthFlow>,
    #[serde(default, rename = "clientCredentials", skip_serializing_if = "Option::is_none")]
    pub client_credentials: Option<OAuthFlow>,
    #[serde(default, rename = "authorizationCode", skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<OAuthFlow>,
}

impl OAuthFlows {
    /// Declared flows in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (OAuthFlowType, &OAuthFlow)> {
        [
            (OAuthFlowType::ClientCredentials, self.client_credentials.as_ref()),
            (OAuthFlowType::AuthorizationCode, self.authorization_code.as_ref()),
            (OAuthFlowType::Password, self.password.as_ref()),
            (OAuthFlowType::Implicit, self.implicit.as_ref()),
        ]
        .into_iter()
        .filter_map(|(t, f)| f.map(|f| (t, f)))
    }

    pub fn get(&self, flow_type: OAuthFlowType) -> Option<&OAuthFlow> {
        match flow_type {
            OAuthFlowType::Implicit => self.implicit.as_ref(),
            OAuthFlowType::Password => self.password.as_ref(),
            OAuthFlowType::ClientCredentials => self.client_credentials.as_ref(),
            OAuthFlowType::AuthorizationCode => self.authorization_code.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OAuthFlow {
    #[serde(default, rename = "authorizationUrl", skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, rename = "tokenUrl", skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, rename = "refreshUrl", skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(default)]
    pub scopes: BTreeMap<String, String>,
}

/// One scheme reference inside a security option, with the scopes it asks for.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SecurityRequirement {
    pub scheme_name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl SecurityRequirement {
    pub fn new(scheme_name: impl Into<String>) -> Self {
        Self {
            scheme_name: scheme_name.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// Requirements that must all be satisfied together. An empty option means
/// anonymous access is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SecurityOption {
    pub requirements: Vec<SecurityRequirement>,
}

impl SecurityOption {
    pub fn new(requirements: Vec<SecurityRequirement>) -> Self {
        Self { requirements }
    }

    pub fn single(requirement: SecurityRequirement) -> Self {
        Self {
            requirements: vec![requirement],
        }
    }
}

/// Parse an OpenAPI `security` array.
///
/// Returns `None` when `value` is not an array, so callers can tell
/// "no override" apart from an explicit empty list.
pub fn parse_security(value: &Value) -> Option<Vec<SecurityOption>> {
    let arr = value.as_array()?;
    let options = arr
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let requirements = obj
                .iter()
                .map(|(name, scopes)| SecurityRequirement {
                    scheme_name: name.clone(),
                    scopes: scopes
                        .as_array()
                        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default(),
                })
                .collect();
            SecurityOption { requirements }
        })
        .collect();
    Some(options)
}
