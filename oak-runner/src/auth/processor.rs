use std::collections::{BTreeMap, BTreeSet};

use oak_core::openapi::{HttpAuthScheme, OAuthFlowType, SecurityScheme};
use oak_core::SourceSet;

use crate::auth::{AuthLocation, AuthRequirement, AuthType, AuthUrls, EnvMappings, EnvVarKey, SchemeEnvVars};
use crate::env::{api_title_prefix, env_token};

/// Normalized auth declarations for a set of sources.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub requirements: Vec<AuthRequirement>,
    pub env_mappings: EnvMappings,
    /// source name -> scheme name -> declaration.
    schemes: BTreeMap<String, BTreeMap<String, SecurityScheme>>,
}

impl AuthConfig {
    /// The declaration behind `scheme_name`. Without a source name the scheme
    /// must be declared by exactly one source.
    pub fn scheme(&self, scheme_name: &str, source_name: Option<&str>) -> Option<&SecurityScheme> {
        if let Some(source) = source_name {
            if let Some(s) = self.schemes.get(source).and_then(|m| m.get(scheme_name)) {
                return Some(s);
            }
        }
        let mut found = self.schemes.values().filter_map(|m| m.get(scheme_name));
        let first = found.next()?;
        if found.next().is_some() {
            return None;
        }
        Some(first)
    }
}

/// Turns `components.securitySchemes` of every source into [`AuthConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthProcessor;

impl AuthProcessor {
    pub fn process(&self, sources: &SourceSet) -> AuthConfig {
        let mut config = AuthConfig::default();
        let mut declared_by: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut per_source: Vec<(String, Option<String>, String, SecurityScheme)> = Vec::new();

        for source in sources.iter() {
            for (scheme_name, parsed) in source.security_schemes() {
                let scheme = match parsed {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(
                            source = %source.name,
                            scheme = %scheme_name,
                            error = %e,
                            "ignoring unsupported security scheme"
                        );
                        continue;
                    }
                };
                declared_by
                    .entry(scheme_name.clone())
                    .or_default()
                    .insert(source.name.clone());
                per_source.push((
                    source.name.clone(),
                    source.title().map(str::to_string),
                    scheme_name,
                    scheme,
                ));
            }
        }

        for (source_name, title, scheme_name, scheme) in per_source {
            for req in requirements_for(&source_name, title.as_deref(), &scheme_name, &scheme) {
                let duplicate = config.requirements.iter().any(|r| {
                    r.source_description_id == req.source_description_id
                        && r.security_scheme_name == req.security_scheme_name
                        && r.flow_type == req.flow_type
                });
                if !duplicate {
                    config.requirements.push(req);
                }
            }

            let prefix = title.as_deref().and_then(api_title_prefix);
            let vars = env_vars_for(prefix.as_deref(), &scheme_name, &scheme);
            let collides = declared_by.get(&scheme_name).is_some_and(|s| s.len() > 1);
            if collides {
                config
                    .env_mappings
                    .scoped
                    .entry(source_name.clone())
                    .or_default()
                    .insert(scheme_name.clone(), vars);
            } else {
                config.env_mappings.single.insert(scheme_name.clone(), vars);
            }
            config
                .schemes
                .entry(source_name)
                .or_default()
                .insert(scheme_name, scheme);
        }

        tracing::debug!(
            requirements = config.requirements.len(),
            scoped_sources = config.env_mappings.scoped.len(),
            "processed security schemes"
        );
        config
    }
}

fn requirements_for(
    source_name: &str,
    title: Option<&str>,
    scheme_name: &str,
    scheme: &SecurityScheme,
) -> Vec<AuthRequirement> {
    let base = AuthRequirement {
        auth_type: AuthType::OpenIdConnect,
        name: None,
        location: None,
        security_scheme_name: scheme_name.to_string(),
        api_title: title.map(str::to_string),
        source_description_id: source_name.to_string(),
        flow_type: None,
        auth_urls: AuthUrls::default(),
        description: scheme.description().map(str::to_string),
    };
    match scheme {
        SecurityScheme::ApiKey { name, location, .. } => vec![AuthRequirement {
            auth_type: AuthType::ApiKey,
            name: Some(name.clone()),
            location: Some((*location).into()),
            ..base
        }],
        SecurityScheme::Http { scheme, .. } => vec![AuthRequirement {
            auth_type: AuthType::Http(HttpAuthScheme::parse(scheme)),
            location: Some(AuthLocation::Header),
            ..base
        }],
        SecurityScheme::OAuth2 { flows, .. } => flows
            .iter()
            .map(|(flow_type, flow)| AuthRequirement {
                auth_type: AuthType::OAuth2,
                location: Some(AuthLocation::Header),
                flow_type: Some(flow_type),
                auth_urls: AuthUrls {
                    authorization: flow.authorization_url.clone(),
                    token: flow.token_url.clone(),
                    refresh: flow.refresh_url.clone(),
                },
                ..base.clone()
            })
            .collect(),
        SecurityScheme::OpenIdConnect {
            open_id_connect_url,
            ..
        } => vec![AuthRequirement {
            location: Some(AuthLocation::Header),
            auth_urls: AuthUrls {
                authorization: Some(open_id_connect_url.clone()),
                ..AuthUrls::default()
            },
            ..base
        }],
    }
}

/// `[PREFIX_]SCHEME[_FLOW]_SLOT`, every part folded with [`env_token`].
pub fn env_var_name(
    prefix: Option<&str>,
    scheme_name: &str,
    flow: Option<OAuthFlowType>,
    slot: EnvVarKey,
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);
    if let Some(p) = prefix.filter(|p| !p.is_empty()) {
        parts.push(env_token(p));
    }
    parts.push(env_token(scheme_name));
    if let Some(f) = flow {
        parts.push(env_token(f.as_str()));
    }
    parts.push(env_token(slot.as_str()));
    parts.join("_")
}

fn env_vars_for(prefix: Option<&str>, scheme_name: &str, scheme: &SecurityScheme) -> SchemeEnvVars {
    let slot = |key| (key, env_var_name(prefix, scheme_name, None, key));
    let mut vars = SchemeEnvVars::default();
    match scheme {
        SecurityScheme::ApiKey { .. } => {
            vars.slots.extend([slot(EnvVarKey::ApiKey)]);
        }
        SecurityScheme::Http { scheme, .. } => match HttpAuthScheme::parse(scheme) {
            HttpAuthScheme::Basic => {
                vars.slots
                    .extend([slot(EnvVarKey::Username), slot(EnvVarKey::Password)]);
            }
            HttpAuthScheme::Bearer | HttpAuthScheme::Other(_) => {
                vars.slots.extend([slot(EnvVarKey::Token)]);
            }
        },
        SecurityScheme::OAuth2 { flows, .. } => {
            for (flow_type, _) in flows.iter() {
                let flow_slots = [EnvVarKey::ClientId, EnvVarKey::ClientSecret, EnvVarKey::Token]
                    .into_iter()
                    .map(|key| (key, env_var_name(prefix, scheme_name, Some(flow_type), key)))
                    .collect();
                vars.flows.insert(flow_type, flow_slots);
            }
        }
        SecurityScheme::OpenIdConnect { .. } => {
            vars.slots.extend([slot(EnvVarKey::Token)]);
        }
    }
    vars
}
