//! Environment lookups behind a trait, so resolution can be tested without
//! touching the process environment.

use std::collections::BTreeMap;
use std::sync::Arc;

pub trait EnvSource: Send + Sync {
    /// The value for `key`; empty values count as unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads `std::env`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// A fixed set of values.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    values: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Ordered layers; the first layer with a non-empty value wins.
#[derive(Clone, Default)]
pub struct LayeredEnv {
    layers: Vec<Arc<dyn EnvSource>>,
}

impl LayeredEnv {
    pub fn new(layers: Vec<Arc<dyn EnvSource>>) -> Self {
        Self { layers }
    }

    pub fn push(mut self, layer: Arc<dyn EnvSource>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl EnvSource for LayeredEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|l| l.get(key))
    }
}

/// Upper-case `s` and fold every non-alphanumeric character to `_`.
pub fn env_token(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Env-var prefix for an API: the first whitespace-delimited token of its
/// title, folded with [`env_token`].
pub fn api_title_prefix(title: &str) -> Option<String> {
    title.split_whitespace().next().map(env_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_non_alphanumerics() {
        assert_eq!(env_token("oauth.clientCredentials"), "OAUTH_CLIENTCREDENTIALS");
        assert_eq!(env_token("api-key"), "API_KEY");
    }

    #[test]
    fn prefix_uses_first_title_token() {
        assert_eq!(api_title_prefix("Open-Meteo Weather API").as_deref(), Some("OPEN_METEO"));
        assert_eq!(api_title_prefix("   ").as_deref(), None);
    }

    #[test]
    fn layered_env_first_non_empty_wins() {
        let env = LayeredEnv::default()
            .push(Arc::new(MapEnv::new().with("A", "")))
            .push(Arc::new(MapEnv::new().with("A", "second")));
        assert_eq!(env.get("A").as_deref(), Some("second"));
        assert_eq!(env.get("B"), None);
    }
}
