use std::collections::BTreeMap;

use crate::types::{FailureAction, JsonSchema, Parameter, SuccessAction, Workflow};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArazzoDocument {
    /// The Arazzo Specification version (e.g. "1.0.1").
    pub arazzo: String,

    pub info: Info,

    #[serde(rename = "sourceDescriptions")]
    pub source_descriptions: Vec<SourceDescriptionRef>,

    pub workflows: Vec<Workflow>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl ArazzoDocument {
    pub fn workflow(&self, workflow_id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.workflow_id == workflow_id)
    }

    pub fn component_parameter(&self, name: &str) -> Option<&Parameter> {
        self.components.as_ref()?.parameters.as_ref()?.get(name)
    }

    pub fn component_success_action(&self, name: &str) -> Option<&SuccessAction> {
        self.components.as_ref()?.success_actions.as_ref()?.get(name)
    }

    pub fn component_failure_action(&self, name: &str) -> Option<&FailureAction> {
        self.components.as_ref()?.failure_actions.as_ref()?.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Info {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Openapi,
    Arazzo,
}

/// An entry of `sourceDescriptions`: a named pointer to an OpenAPI (or Arazzo) document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceDescriptionRef {
    pub name: String,
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
}

impl SourceDescriptionRef {
    pub fn is_openapi(&self) -> bool {
        self.source_type.unwrap_or(SourceType::Openapi) == SourceType::Openapi
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<BTreeMap<String, JsonSchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, Parameter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "successActions")]
    pub success_actions: Option<BTreeMap<String, SuccessAction>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "failureActions")]
    pub failure_actions: Option<BTreeMap<String, FailureAction>>,
}
