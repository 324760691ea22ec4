//! Server URL template resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use oak_core::openapi::ServerObject;
use regex::Regex;

use crate::env::{api_title_prefix, env_token, EnvSource};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid regex"));

/// Call-time overrides keyed `OAK_SERVER_<VARNAME>`.
pub type RuntimeParams = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server variable '{name}' in '{template}' has no value (runtime, environment or default)")]
    UnresolvedVariable { name: String, template: String },
    #[error("source '{0}' declares no servers")]
    NoServers(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVariable {
    pub default_value: Option<String>,
    pub enum_values: Option<Vec<String>>,
    pub description: Option<String>,
}

/// One server URL template and what is needed to resolve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfiguration {
    pub url_template: String,
    pub variables: BTreeMap<String, ServerVariable>,
    pub api_title_prefix: Option<String>,
}

impl ServerConfiguration {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            variables: BTreeMap::new(),
            api_title_prefix: None,
        }
    }

    pub fn from_server(server: &ServerObject, api_title: Option<&str>) -> Self {
        Self {
            url_template: server.url.clone(),
            variables: server
                .variables
                .iter()
                .map(|(name, v)| {
                    (
                        name.clone(),
                        ServerVariable {
                            default_value: v.default.clone(),
                            enum_values: v.enum_values.clone(),
                            description: v.description.clone(),
                        },
                    )
                })
                .collect(),
            api_title_prefix: api_title.and_then(api_title_prefix),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, var: ServerVariable) -> Self {
        self.variables.insert(name.into(), var);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_title_prefix = Some(prefix.into());
        self
    }

    /// Placeholder names in template order, without repeats.
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        PLACEHOLDER_RE
            .captures_iter(&self.url_template)
            .map(|c| c[1].to_string())
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }
}

/// `OAK_SERVER_<VARNAME>`.
pub fn runtime_key(var_name: &str) -> String {
    format!("OAK_SERVER_{}", env_token(var_name))
}

/// `[<PREFIX>_]OAK_SERVER_<VARNAME>`.
pub fn env_key(prefix: Option<&str>, var_name: &str) -> String {
    match prefix.filter(|p| !p.is_empty()) {
        Some(p) => format!("{}_{}", env_token(p), runtime_key(var_name)),
        None => runtime_key(var_name),
    }
}

pub struct ServerProcessor {
    env: Arc<dyn EnvSource>,
}

impl ServerProcessor {
    pub fn new(env: Arc<dyn EnvSource>) -> Self {
        Self { env }
    }

    /// Substitute every `{name}` in the template. Each variable is resolved
    /// through runtime params, then the environment, then its default; the
    /// first non-empty value wins.
    pub fn resolve_server_base_url(
        &self,
        config: &ServerConfiguration,
        runtime_params: Option<&RuntimeParams>,
    ) -> Result<String, ServerError> {
        let prefix = config.api_title_prefix.as_deref();
        let from_runtime = |name: &str| {
            runtime_params?
                .get(&runtime_key(name))
                .filter(|v| !v.is_empty())
                .cloned()
        };
        let from_env = |name: &str| self.env.get(&env_key(prefix, name));
        let from_default = |name: &str| {
            config
                .variables
                .get(name)?
                .default_value
                .clone()
                .filter(|v| !v.is_empty())
        };
        let tiers: [(&str, &dyn Fn(&str) -> Option<String>); 3] = [
            ("runtime", &from_runtime),
            ("environment", &from_env),
            ("default", &from_default),
        ];

        let mut resolved: BTreeMap<String, String> = BTreeMap::new();
        for name in config.placeholders() {
            let Some((tier, value)) = tiers
                .iter()
                .find_map(|(tier, resolve)| resolve(&name).map(|v| (*tier, v)))
            else {
                return Err(ServerError::UnresolvedVariable {
                    name,
                    template: config.url_template.clone(),
                });
            };
            if let Some(allowed) = config.variables.get(&name).and_then(|v| v.enum_values.as_ref()) {
                if !allowed.is_empty() && !allowed.contains(&value) {
                    tracing::warn!(variable = %name, %value, "server variable value is outside its declared enum");
                }
            }
            tracing::debug!(variable = %name, tier, "resolved server variable");
            resolved.insert(name, value);
        }

        if resolved.is_empty() {
            return Ok(config.url_template.clone());
        }
        let url = PLACEHOLDER_RE.replace_all(&config.url_template, |c: &regex::Captures<'_>| {
            resolved.get(&c[1]).cloned().unwrap_or_else(|| c[0].to_string())
        });
        Ok(url.into_owned())
    }
}
