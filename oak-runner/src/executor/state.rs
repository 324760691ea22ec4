use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub type StepOutputs = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("outputs for step '{0}' are already recorded")]
    OutputsAlreadyRecorded(String),
}

/// Mutable state of one workflow run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    pub workflow_id: String,
    pub step_outputs: BTreeMap<String, StepOutputs>,
    pub inputs: Map<String, Value>,
    pub outputs: Map<String, Value>,
}

impl ExecutionState {
    pub fn new(workflow_id: impl Into<String>, inputs: Map<String, Value>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            inputs,
            ..Self::default()
        }
    }

    /// Record a completed step. A step's outputs are written once per run.
    pub fn record_step_outputs(
        &mut self,
        step_id: &str,
        outputs: StepOutputs,
    ) -> Result<(), StateError> {
        if self.step_outputs.contains_key(step_id) {
            return Err(StateError::OutputsAlreadyRecorded(step_id.to_string()));
        }
        self.step_outputs.insert(step_id.to_string(), outputs);
        Ok(())
    }

    pub fn step(&self, step_id: &str) -> Option<&StepOutputs> {
        self.step_outputs.get(step_id)
    }

    pub fn is_completed(&self, step_id: &str) -> bool {
        self.step_outputs.contains_key(step_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Pending,
    Running,
    WorkflowComplete,
    Error,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkflowComplete | Self::Error)
    }
}

/// Terminal record of a workflow run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WorkflowExecutionResult {
    pub status: WorkflowStatus,
    pub workflow_id: String,
    pub outputs: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_outputs: Option<BTreeMap<String, StepOutputs>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecutionResult {
    pub fn completed(state: ExecutionState) -> Self {
        Self {
            status: WorkflowStatus::WorkflowComplete,
            workflow_id: state.workflow_id,
            outputs: state.outputs,
            step_outputs: Some(state.step_outputs),
            inputs: Some(state.inputs),
            error: None,
        }
    }

    pub fn failed(state: ExecutionState, error: impl Into<String>) -> Self {
        Self {
            status: WorkflowStatus::Error,
            workflow_id: state.workflow_id,
            outputs: state.outputs,
            step_outputs: Some(state.step_outputs),
            inputs: Some(state.inputs),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::WorkflowComplete
    }
}
