use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use oak_core::openapi::{
    HttpAuthScheme, OAuthFlowType, OAuthFlows, SecurityOption, SecurityRequirement, SecurityScheme,
};
use serde_json::Value;

use crate::auth::{
    AuthConfig, CredentialError, EnvVarKey, RequestAuthValue, SchemeEnvVars, SecretValue,
    TokenEndpoint,
};
use crate::env::EnvSource;

/// Resolves security options to concrete request credentials.
pub struct CredentialProvider {
    config: AuthConfig,
    env: Arc<dyn EnvSource>,
    token_endpoint: Arc<dyn TokenEndpoint>,
}

impl CredentialProvider {
    pub fn new(
        config: AuthConfig,
        env: Arc<dyn EnvSource>,
        token_endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        Self {
            config,
            env,
            token_endpoint,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Every option is resolved on its own; an option contributes either one
    /// value per requirement or nothing. Values from all satisfiable options
    /// are concatenated in option order.
    pub async fn resolve_credentials(
        &self,
        options: &[SecurityOption],
        source_name: Option<&str>,
    ) -> Result<Vec<RequestAuthValue>, CredentialError> {
        let mut out = Vec::new();
        for (idx, option) in options.iter().enumerate() {
            match self.resolve_option(option, source_name).await? {
                Some(values) => out.extend(values),
                None => tracing::debug!(option = idx, "security option not satisfiable; skipped"),
            }
        }
        Ok(out)
    }

    async fn resolve_option(
        &self,
        option: &SecurityOption,
        source_name: Option<&str>,
    ) -> Result<Option<Vec<RequestAuthValue>>, CredentialError> {
        let mut values = Vec::with_capacity(option.requirements.len());
        for req in &option.requirements {
            match self.resolve_requirement(req, source_name).await? {
                Some(v) => values.push(v),
                None => {
                    tracing::debug!(scheme = %req.scheme_name, "credential not available");
                    return Ok(None);
                }
            }
        }
        Ok(Some(values))
    }

    async fn resolve_requirement(
        &self,
        req: &SecurityRequirement,
        source_name: Option<&str>,
    ) -> Result<Option<RequestAuthValue>, CredentialError> {
        let Some(scheme) = self.config.scheme(&req.scheme_name, source_name) else {
            tracing::warn!(scheme = %req.scheme_name, "security requirement names an unknown scheme");
            return Ok(None);
        };
        let Some(vars) = self
            .config
            .env_mappings
            .lookup(&req.scheme_name, source_name)
        else {
            return Ok(None);
        };

        let value = match scheme {
            SecurityScheme::ApiKey { name, location, .. } => {
                self.read(vars.slot(EnvVarKey::ApiKey)).map(|v| RequestAuthValue {
                    name: name.clone(),
                    location: (*location).into(),
                    auth_value: SecretValue::new(v),
                })
            }
            SecurityScheme::Http { scheme, .. } => match HttpAuthScheme::parse(scheme) {
                HttpAuthScheme::Basic => {
                    let user = self.read(vars.slot(EnvVarKey::Username));
                    let pass = self.read(vars.slot(EnvVarKey::Password));
                    user.zip(pass).map(|(u, p)| {
                        let encoded = BASE64.encode(format!("{u}:{p}"));
                        RequestAuthValue::header("Authorization", format!("Basic {encoded}"))
                    })
                }
                HttpAuthScheme::Bearer => self
                    .read(vars.slot(EnvVarKey::Token))
                    .map(|t| bearer(&t)),
                HttpAuthScheme::Other(name) => self
                    .read(vars.slot(EnvVarKey::Token))
                    .map(|t| RequestAuthValue::header("Authorization", format!("{name} {t}"))),
            },
            SecurityScheme::OAuth2 { flows, .. } => self.resolve_oauth2(flows, vars, req).await?,
            SecurityScheme::OpenIdConnect { .. } => {
                self.read(vars.slot(EnvVarKey::Token)).map(|t| bearer(&t))
            }
        };
        Ok(value)
    }

    /// A static per-flow token wins; otherwise the client-credentials flow is
    /// exchanged at its token URL when a client id and secret are configured.
    async fn resolve_oauth2(
        &self,
        flows: &OAuthFlows,
        vars: &SchemeEnvVars,
        req: &SecurityRequirement,
    ) -> Result<Option<RequestAuthValue>, CredentialError> {
        for (flow_type, _) in flows.iter() {
            if let Some(token) = self.read(vars.flow_slot(flow_type, EnvVarKey::Token)) {
                return Ok(Some(bearer(&token)));
            }
        }

        let flow_type = OAuthFlowType::ClientCredentials;
        let Some(token_url) = flows.get(flow_type).and_then(|f| f.token_url.as_deref()) else {
            return Ok(None);
        };
        let client_id = self.read(vars.flow_slot(flow_type, EnvVarKey::ClientId));
        let client_secret = self.read(vars.flow_slot(flow_type, EnvVarKey::ClientSecret));
        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Ok(None);
        };

        let form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), client_id),
            ("client_secret".to_string(), client_secret),
            ("scope".to_string(), format!("\"{}\"", req.scopes.join(" "))),
        ];
        tracing::debug!(scheme = %req.scheme_name, token_url, "requesting client-credentials token");
        let resp = self.token_endpoint.request_token(token_url, &form).await?;
        if resp.status >= 400 {
            return Err(CredentialError::TokenEndpoint {
                token_url: token_url.to_string(),
                status: resp.status,
            });
        }
        let token = resp
            .body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CredentialError::MissingAccessToken {
                token_url: token_url.to_string(),
            })?;
        Ok(Some(bearer(token)))
    }

    fn read(&self, var: Option<&str>) -> Option<String> {
        self.env.get(var?)
    }
}

fn bearer(token: &str) -> RequestAuthValue {
    RequestAuthValue::header("Authorization", format!("Bearer {token}"))
}
