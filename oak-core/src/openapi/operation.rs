use serde_json::Value;

use crate::openapi::refs::deref;
use crate::openapi::RefError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// A declared OpenAPI parameter, reduced to what marshalling needs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
}

impl ParameterSpec {
    /// Parse a Parameter Object (dereferencing `$ref` against `doc`).
    ///
    /// Returns `Ok(None)` for objects without a usable `name`/`in`.
    /// Path parameters are always required.
    pub fn from_value(doc: &Value, value: &Value) -> Result<Option<Self>, RefError> {
        let p = deref(doc, value)?;
        let Some(name) = p.get("name").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(location) = p.get("in").and_then(Value::as_str).and_then(ParameterLocation::parse)
        else {
            return Ok(None);
        };
        let required = location == ParameterLocation::Path
            || p.get("required").and_then(Value::as_bool).unwrap_or(false);
        Ok(Some(Self {
            name: name.to_string(),
            location,
            required,
        }))
    }
}

/// A Request Body Object, reduced to requiredness and declared media types.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestBodySpec {
    pub required: bool,
    /// Media types in declaration order.
    pub content_types: Vec<String>,
}

impl RequestBodySpec {
    pub fn from_value(doc: &Value, value: &Value) -> Result<Self, RefError> {
        let rb = deref(doc, value)?;
        let content_types = rb
            .get("content")
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Self {
            required: rb.get("required").and_then(Value::as_bool).unwrap_or(false),
            content_types,
        })
    }

    /// `application/json` when declared, else the first declared media type.
    pub fn preferred_content_type(&self) -> Option<&str> {
        self.content_types
            .iter()
            .find(|ct| ct.as_str() == "application/json")
            .or_else(|| self.content_types.first())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_parameters_are_always_required() {
        let doc = json!({});
        let p = ParameterSpec::from_value(&doc, &json!({ "name": "id", "in": "path" }))
            .unwrap()
            .unwrap();
        assert!(p.required);
    }

    #[test]
    fn preferred_content_type_falls_back_to_first_declared() {
        let doc = json!({});
        let rb = RequestBodySpec::from_value(
            &doc,
            &json!({ "content": { "text/plain": {}, "application/xml": {} } }),
        )
        .unwrap();
        assert_eq!(rb.preferred_content_type(), Some("text/plain"));
    }
}
