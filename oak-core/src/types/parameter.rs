use crate::openapi::ParameterLocation;
use crate::types::{AnyValue, ReusableObject};

/// A step or workflow parameter: a literal or runtime expression bound to a name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#in: Option<ParameterLocation>,

    pub value: AnyValue,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ParameterOrReusable {
    Parameter(Parameter),
    Reusable(ReusableObject),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<AnyValue>,
}
