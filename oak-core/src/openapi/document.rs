use serde_json::Value;

use crate::openapi::{parse_security, SecurityOption, SecurityScheme, ServerObject};

/// One loaded OpenAPI document, addressed by its source name.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescription {
    pub name: String,
    pub document: Value,
}

impl SourceDescription {
    pub fn new(name: impl Into<String>, document: Value) -> Self {
        Self {
            name: name.into(),
            document,
        }
    }

    /// `info.title`, when present and non-blank.
    pub fn title(&self) -> Option<&str> {
        self.document
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn paths(&self) -> Option<&serde_json::Map<String, Value>> {
        self.document.get("paths").and_then(Value::as_object)
    }

    /// Document-level `servers`; malformed entries are skipped.
    pub fn servers(&self) -> Vec<ServerObject> {
        servers_of(&self.document)
    }

    /// Document-level `security`; `None` when the field is absent.
    pub fn security(&self) -> Option<Vec<SecurityOption>> {
        self.document.get("security").and_then(parse_security)
    }

    /// `components.securitySchemes`, in declaration order. Each entry keeps its
    /// parse result so unsupported shapes can be reported by the caller.
    pub fn security_schemes(&self) -> Vec<(String, Result<SecurityScheme, serde_json::Error>)> {
        let Some(schemes) = self
            .document
            .pointer("/components/securitySchemes")
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };
        schemes
            .iter()
            .map(|(name, raw)| {
                let resolved = match raw.get("$ref").and_then(Value::as_str) {
                    Some(r) => crate::openapi::resolve_ref(&self.document, r).unwrap_or(raw),
                    None => raw,
                };
                (name.clone(), SecurityScheme::from_value(resolved))
            })
            .collect()
    }
}

/// Parse a `servers` array found on a document, path item, or operation.
pub(crate) fn servers_of(value: &Value) -> Vec<ServerObject> {
    value
        .get("servers")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|s| serde_json::from_value::<ServerObject>(s.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// All loaded sources, in the order they were supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSet {
    sources: Vec<SourceDescription>,
}

impl SourceSet {
    pub fn new(sources: impl IntoIterator<Item = SourceDescription>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
        }
    }

    /// Build from `(source name, parsed document)` pairs.
    pub fn from_documents<N: Into<String>>(docs: impl IntoIterator<Item = (N, Value)>) -> Self {
        Self::new(docs.into_iter().map(|(n, d)| SourceDescription::new(n, d)))
    }

    /// Insert or replace a source by name.
    pub fn insert(&mut self, source: SourceDescription) {
        match self.sources.iter_mut().find(|s| s.name == source.name) {
            Some(existing) => *existing = source,
            None => self.sources.push(source),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescription> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescription> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Servers declared on an operation or path item, falling back to the document.
pub fn effective_servers(doc: &Value, path_item: &Value, operation: &Value) -> Vec<ServerObject> {
    let op = servers_of(operation);
    if !op.is_empty() {
        return op;
    }
    let item = servers_of(path_item);
    if !item.is_empty() {
        return item;
    }
    servers_of(doc)
}
