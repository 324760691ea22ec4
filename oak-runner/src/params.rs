//! Marshalling of flat inputs into parameter buckets and a request body.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use oak_core::openapi::{ParameterLocation, ParameterSpec, RefError, RequestBodySpec};
use regex::Regex;
use serde_json::{Map, Value};

use crate::openapi::OperationRef;

static PATH_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}/]+)\}").expect("valid regex"));

const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("missing required {} parameter '{name}'", .location.as_str())]
    MissingRequired {
        name: String,
        location: ParameterLocation,
    },
    #[error("required request body is missing")]
    MissingRequestBody,
    #[error("request body: {0}")]
    RequestBodyRef(#[from] RefError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub payload: Value,
    pub content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationParameters {
    pub path: Map<String, Value>,
    pub query: Map<String, Value>,
    pub header: Map<String, Value>,
    pub cookie: Map<String, Value>,
    /// `None` unless a body value was supplied or one is required.
    pub body: Option<RequestBody>,
}

impl OperationParameters {
    pub fn bucket_mut(&mut self, location: ParameterLocation) -> &mut Map<String, Value> {
        match location {
            ParameterLocation::Path => &mut self.path,
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.header,
            ParameterLocation::Cookie => &mut self.cookie,
        }
    }
}

/// What marshalling needs to know about an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDetails {
    /// Templated path, e.g. `/pets/{petId}`.
    pub path: String,
    pub parameters: Vec<ParameterSpec>,
    pub request_body: Option<RequestBodySpec>,
}

impl OperationDetails {
    pub fn from_operation(op: &OperationRef<'_>) -> Result<Self, ParameterError> {
        Ok(Self {
            path: op.path.to_string(),
            parameters: op.parameters(),
            request_body: op.request_body()?,
        })
    }

    /// Declared parameters plus any `{name}` in the path that is not declared
    /// as a path parameter; the latter are always required.
    pub fn effective_parameters(&self) -> Vec<ParameterSpec> {
        let mut params = self.parameters.clone();
        for cap in PATH_PARAM_RE.captures_iter(&self.path) {
            let name = &cap[1];
            let declared = params
                .iter()
                .any(|p| p.location == ParameterLocation::Path && p.name == name);
            if !declared {
                params.push(ParameterSpec {
                    name: name.to_string(),
                    location: ParameterLocation::Path,
                    required: true,
                });
            }
        }
        params
    }
}

pub fn prepare_operation_parameters(
    details: &OperationDetails,
    inputs: &Map<String, Value>,
) -> Result<OperationParameters, ParameterError> {
    let mut out = OperationParameters::default();
    let mut consumed: BTreeSet<&str> = BTreeSet::new();

    for param in details.effective_parameters() {
        match inputs.get(&param.name) {
            Some(value) => {
                if let Some((key, _)) = inputs.get_key_value(&param.name) {
                    consumed.insert(key.as_str());
                }
                out.bucket_mut(param.location)
                    .insert(param.name.clone(), value.clone());
            }
            None if param.required => {
                return Err(ParameterError::MissingRequired {
                    name: param.name,
                    location: param.location,
                });
            }
            None => {}
        }
    }

    let Some(declared) = &details.request_body else {
        if inputs.len() > consumed.len() {
            tracing::debug!(path = %details.path, "operation takes no request body; extra inputs ignored");
        }
        return Ok(out);
    };

    let payload: Map<String, Value> = inputs
        .iter()
        .filter(|(k, _)| !consumed.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    if payload.is_empty() {
        if declared.required {
            return Err(ParameterError::MissingRequestBody);
        }
        return Ok(out);
    }

    let content_type = declared
        .preferred_content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    out.body = Some(RequestBody {
        payload: Value::Object(payload),
        content_type,
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_path_placeholders_are_required() {
        let details = OperationDetails {
            path: "/pets/{petId}".into(),
            parameters: vec![],
            request_body: None,
        };
        let params = details.effective_parameters();
        assert_eq!(params.len(), 1);
        assert!(params[0].required);
        assert_eq!(params[0].location, ParameterLocation::Path);
    }
}
