use std::collections::BTreeMap;

use crate::types::{
    Criterion, FailureActionOrReusable, JsonSchema, ParameterOrReusable, RuntimeExpression,
    StepRequestBody, SuccessActionOrReusable,
};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Workflow {
    #[serde(rename = "workflowId")]
    pub workflow_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema describing the workflow inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<JsonSchema>,

    pub steps: Vec<Step>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, RuntimeExpression>>,
}

impl Workflow {
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.step_id == step_id)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "stepId")]
    pub step_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "operationPath")]
    pub operation_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "workflowId")]
    pub workflow_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterOrReusable>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "requestBody")]
    pub request_body: Option<StepRequestBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "successCriteria")]
    pub success_criteria: Option<Vec<Criterion>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "onSuccess")]
    pub on_success: Option<Vec<SuccessActionOrReusable>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "onFailure")]
    pub on_failure: Option<Vec<FailureActionOrReusable>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, RuntimeExpression>>,
}

/// What a step invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTarget<'a> {
    OperationId(&'a str),
    OperationPath(&'a str),
    Workflow(&'a str),
}

impl Step {
    /// `operationId` wins over `operationPath`, which wins over `workflowId`.
    pub fn target(&self) -> Option<StepTarget<'_>> {
        if let Some(id) = &self.operation_id {
            return Some(StepTarget::OperationId(id));
        }
        if let Some(path) = &self.operation_path {
            return Some(StepTarget::OperationPath(path));
        }
        self.workflow_id.as_deref().map(StepTarget::Workflow)
    }
}
