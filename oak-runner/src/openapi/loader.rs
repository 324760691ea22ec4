use std::path::{Path, PathBuf};

use oak_core::{parse_openapi_str, ArazzoDocument, ParseError, SourceDescription, SourceSet};
use serde_json::Value;

use crate::cache::ResultCache;
use crate::config::CacheConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("source '{0}' not found")]
    NotFound(String),
    #[error("read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fetch {location}: {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch {location}: HTTP {status}")]
    Status { location: String, status: u16 },
    #[error("parse {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: ParseError,
    },
}

/// Loads the OpenAPI documents an Arazzo document names in
/// `sourceDescriptions`, from files or http(s) URLs. Fetched documents are
/// memoized per location.
pub struct SourceLoader {
    client: reqwest::Client,
    base_dir: Option<PathBuf>,
    cache: ResultCache<String, Value>,
}

impl SourceLoader {
    pub fn new(client: reqwest::Client, cache: CacheConfig) -> Self {
        Self {
            client,
            base_dir: None,
            cache: ResultCache::new(cache),
        }
    }

    /// Resolve relative file locations against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub async fn load_sources(&self, doc: &ArazzoDocument) -> Result<SourceSet, LoadError> {
        let mut set = SourceSet::default();
        for sd in &doc.source_descriptions {
            if !sd.is_openapi() {
                tracing::debug!(source = %sd.name, "skipping non-OpenAPI source description");
                continue;
            }
            let document = self.load(&sd.url).await?;
            set.insert(SourceDescription::new(sd.name.clone(), document));
        }
        Ok(set)
    }

    pub async fn load(&self, url_or_path: &str) -> Result<Value, LoadError> {
        let location = self.locate(url_or_path);
        self.cache
            .get_or_set(location.clone(), || self.fetch(location.clone()))
            .await?
            .ok_or(LoadError::NotFound(location))
    }

    fn locate(&self, url_or_path: &str) -> String {
        if is_remote(url_or_path) {
            return url_or_path.to_string();
        }
        let path = Path::new(url_or_path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path).to_string_lossy().into_owned(),
            _ => url_or_path.to_string(),
        }
    }

    async fn fetch(&self, location: String) -> Result<Option<Value>, LoadError> {
        let body = if is_remote(&location) {
            tracing::debug!(%location, "fetching source over HTTP");
            let resp = self
                .client
                .get(&location)
                .send()
                .await
                .map_err(|source| LoadError::Http {
                    location: location.clone(),
                    source,
                })?;
            let status = resp.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(LoadError::Status {
                    location,
                    status: status.as_u16(),
                });
            }
            resp.text().await.map_err(|source| LoadError::Http {
                location: location.clone(),
                source,
            })?
        } else {
            tracing::debug!(%location, "reading source from disk");
            match tokio::fs::read_to_string(&location).await {
                Ok(body) => body,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(source) => return Err(LoadError::Io { location, source }),
            }
        };

        parse_openapi_str(&body)
            .map(Some)
            .map_err(|source| LoadError::Parse { location, source })
    }
}

fn is_remote(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
