use crate::types::{AnyValue, Criterion, RuntimeExpression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessActionType {
    End,
    Goto,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SuccessAction {
    pub name: String,

    #[serde(rename = "type")]
    pub action_type: SuccessActionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "stepId")]
    pub step_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Vec<Criterion>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureActionType {
    End,
    Retry,
    Goto,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FailureAction {
    pub name: String,

    #[serde(rename = "type")]
    pub action_type: FailureActionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "stepId")]
    pub step_id: Option<String>,

    /// Seconds to wait before the retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "retryAfter")]
    pub retry_after_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "retryLimit")]
    pub retry_limit: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Vec<Criterion>>,
}

/// `{ reference: $components.<kind>.<name>, value? }`
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReusableObject {
    pub reference: RuntimeExpression,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AnyValue>,
}

impl ReusableObject {
    /// The component name when the reference has the form `$components.<kind>.<name>`.
    pub fn component_name(&self, kind: &str) -> Option<&str> {
        self.reference
            .trim()
            .strip_prefix("$components.")?
            .strip_prefix(kind)?
            .strip_prefix('.')
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum SuccessActionOrReusable {
    Action(SuccessAction),
    Reusable(ReusableObject),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FailureActionOrReusable {
    Action(FailureAction),
    Reusable(ReusableObject),
}
