use oak_core::expressions::{parse_runtime_expr, RuntimeExpr};
use oak_core::openapi::{
    effective_servers, parse_security, ParameterSpec, RefError, RequestBodySpec, SecurityOption,
    ServerObject, HTTP_METHODS,
};
use oak_core::{SourceDescription, SourceSet};
use serde_json::Value;

use crate::openapi::op_path::parse_operation_path;

/// How a caller names the operation to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationTarget {
    /// An `operationId`, optionally qualified as `$sourceDescriptions.<name>.<operationId>`.
    Id(String),
    /// An HTTP method plus a concrete or templated path.
    HttpPath { method: String, path: String },
    /// An Arazzo `operationPath` reference.
    OperationPath(String),
}

impl OperationTarget {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn http(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::HttpPath {
            method: method.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for OperationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "operationId '{id}'"),
            Self::HttpPath { method, path } => write!(f, "{} {path}", method.to_uppercase()),
            Self::OperationPath(p) => write!(f, "operationPath '{p}'"),
        }
    }
}

/// A located operation: the owning source, the templated path, and the raw
/// path-item and operation objects.
#[derive(Debug, Clone, Copy)]
pub struct OperationRef<'a> {
    pub source: &'a SourceDescription,
    pub path: &'a str,
    /// Lower-case method key as it appears in the path item.
    pub method: &'static str,
    pub path_item: &'a Value,
    pub operation: &'a Value,
}

impl<'a> OperationRef<'a> {
    pub fn operation_id(&self) -> Option<&'a str> {
        self.operation.get("operationId").and_then(Value::as_str)
    }

    pub fn http_method(&self) -> String {
        self.method.to_ascii_uppercase()
    }

    /// Path-item parameters merged with operation parameters; the operation
    /// wins when both declare the same `(in, name)`. Broken `$ref`s are
    /// skipped with a warning.
    pub fn parameters(&self) -> Vec<ParameterSpec> {
        let mut out: Vec<ParameterSpec> = Vec::new();
        for list in [self.path_item.get("parameters"), self.operation.get("parameters")] {
            let Some(arr) = list.and_then(Value::as_array) else {
                continue;
            };
            for raw in arr {
                match ParameterSpec::from_value(&self.source.document, raw) {
                    Ok(Some(p)) => {
                        out.retain(|e| !(e.name == p.name && e.location == p.location));
                        out.push(p);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(
                        source = %self.source.name,
                        path = self.path,
                        error = %e,
                        "skipping unresolvable parameter"
                    ),
                }
            }
        }
        out
    }

    /// The operation's request body, dereferenced.
    pub fn request_body(&self) -> Result<Option<RequestBodySpec>, RefError> {
        self.operation
            .get("requestBody")
            .map(|rb| RequestBodySpec::from_value(&self.source.document, rb))
            .transpose()
    }

    /// Servers in effect: operation, else path item, else document.
    pub fn servers(&self) -> Vec<ServerObject> {
        effective_servers(&self.source.document, self.path_item, self.operation)
    }
}

/// Locates operations across every loaded source.
#[derive(Debug, Clone, Copy)]
pub struct OperationFinder<'a> {
    sources: &'a SourceSet,
}

impl<'a> OperationFinder<'a> {
    pub fn new(sources: &'a SourceSet) -> Self {
        Self { sources }
    }

    pub fn find(&self, target: &OperationTarget) -> Option<OperationRef<'a>> {
        match target {
            OperationTarget::Id(id) => self.find_by_id(id),
            OperationTarget::HttpPath { method, path } => {
                self.find_by_http_path_and_method(method, path)
            }
            OperationTarget::OperationPath(p) => self.find_by_operation_path(p),
        }
    }

    pub fn find_by_id(&self, operation_id: &str) -> Option<OperationRef<'a>> {
        let trimmed = operation_id.trim();
        if trimmed.starts_with('$') {
            let Ok(RuntimeExpr::SourceDescriptions(np)) = parse_runtime_expr(trimmed) else {
                tracing::debug!(operation_id = trimmed, "unsupported qualified operationId");
                return None;
            };
            let op_id = np.rest.first()?;
            let source = self.sources.get(&np.root)?;
            return operations(source).find(|op| op.operation_id() == Some(op_id.as_str()));
        }

        let mut matches = self
            .sources
            .iter()
            .flat_map(operations)
            .filter(|op| op.operation_id() == Some(trimmed));
        let first = matches.next()?;
        if let Some(other) = matches.next() {
            tracing::warn!(
                operation_id = trimmed,
                chosen = %first.source.name,
                also_in = %other.source.name,
                "operationId declared by several sources; using the first"
            );
        }
        Some(first)
    }

    /// Exact path keys win; otherwise `{...}` segments act as wildcards and the
    /// template with the fewest wildcards is chosen. The templated path is returned.
    pub fn find_by_http_path_and_method(
        &self,
        method: &str,
        path: &str,
    ) -> Option<OperationRef<'a>> {
        let method = method.to_ascii_lowercase();
        let method = method.as_str();
        let path = path.split('?').next().unwrap_or(path);
        let sources = self.sources;
        let candidates = move || {
            sources
                .iter()
                .flat_map(operations)
                .filter(move |op| op.method == method)
        };

        if let Some(exact) = candidates().find(|op| op.path == path) {
            return Some(exact);
        }
        candidates()
            .filter_map(|op| template_wildcards(op.path, path).map(|w| (w, op)))
            .min_by_key(|(w, _)| *w)
            .map(|(_, op)| op)
    }

    pub fn find_by_operation_path(&self, op_path: &str) -> Option<OperationRef<'a>> {
        let parsed = match parse_operation_path(op_path) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(op_path, error = %e, "invalid operationPath");
                return None;
            }
        };
        let source = self.sources.get(&parsed.source_name)?;
        operations(source).find(|op| op.path == parsed.path && op.method == parsed.method)
    }

    /// Effective security for an operation: operation `security`, else path-item
    /// `security`, else the document's. An explicit `[]` at a more specific
    /// level disables security; absence falls through.
    pub fn extract_security_requirements(&self, op: &OperationRef<'_>) -> Vec<SecurityOption> {
        op.operation
            .get("security")
            .and_then(parse_security)
            .or_else(|| op.path_item.get("security").and_then(parse_security))
            .or_else(|| op.source.security())
            .unwrap_or_default()
    }
}

fn operations(source: &SourceDescription) -> impl Iterator<Item = OperationRef<'_>> {
    source.paths().into_iter().flatten().flat_map(move |(path, item)| {
        HTTP_METHODS.iter().filter_map(move |method| {
            let operation = item.get(*method).filter(|o| o.is_object())?;
            Some(OperationRef {
                source,
                path: path.as_str(),
                method: *method,
                path_item: item,
                operation,
            })
        })
    })
}

/// Number of wildcard segments when `template` matches `concrete`, else `None`.
fn template_wildcards(template: &str, concrete: &str) -> Option<usize> {
    let t: Vec<&str> = template.trim_end_matches('/').split('/').collect();
    let c: Vec<&str> = concrete.trim_end_matches('/').split('/').collect();
    if t.len() != c.len() {
        return None;
    }
    let mut wildcards = 0;
    for (ts, cs) in t.iter().zip(&c) {
        if ts.starts_with('{') && ts.ends_with('}') {
            if cs.is_empty() {
                return None;
            }
            wildcards += 1;
        } else if ts != cs {
            return None;
        }
    }
    Some(wildcards)
}

#[cfg(test)]
mod tests {
    use super::template_wildcards;

    #[test]
    fn wildcard_matching() {
        assert_eq!(template_wildcards("/x/{id}", "/x/123"), Some(1));
        assert_eq!(template_wildcards("/x/{id}/y", "/x/123/z"), None);
        assert_eq!(template_wildcards("/x/{id}", "/x/123/extra"), None);
        assert_eq!(template_wildcards("/x/me", "/x/me"), Some(0));
    }
}
