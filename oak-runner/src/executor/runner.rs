use std::sync::Arc;
use std::time::Duration;

use oak_core::types::{
    FailureAction, FailureActionOrReusable, FailureActionType, ParameterOrReusable, Step,
    StepTarget, SuccessAction, SuccessActionOrReusable, SuccessActionType, Workflow,
};
use oak_core::ArazzoDocument;
use serde_json::{Map, Value};

use super::criteria::{criteria_hold, evaluate_success};
use super::eval::{EvalError, ExpressionEvaluator, ResponseContext};
use super::outputs::extract_outputs;
use super::state::{ExecutionState, StateError, StepOutputs, WorkflowExecutionResult, WorkflowStatus};
use super::step::{StepError, StepExecutor};
use crate::config::RunnerConfig;
use crate::openapi::OperationTarget;
use crate::server::RuntimeParams;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("missing required workflow input '{0}'")]
    MissingInput(String),
    #[error("step '{step_id}': {source}")]
    Step {
        step_id: String,
        #[source]
        source: StepError,
    },
    #[error("step '{step_id}': {source}")]
    Eval {
        step_id: String,
        #[source]
        source: EvalError,
    },
    #[error("step '{step_id}' failed{}", .status.map(|s| format!(" with HTTP {s}")).unwrap_or_default())]
    StepFailed { step_id: String, status: Option<u16> },
    #[error("step '{step_id}': request body payload must be an object")]
    InvalidPayload { step_id: String },
    #[error("step '{0}' has no operationId, operationPath or workflowId")]
    NoTarget(String),
    #[error("step '{step_id}' references unknown reusable '{reference}'")]
    UnknownReusable { step_id: String, reference: String },
    #[error("step '{step_id}': retryAfter of {seconds}s is not a representable delay")]
    InvalidRetryDelay { step_id: String, seconds: f64 },
    #[error("goto target '{0}' is not a step of this workflow")]
    UnknownStep(String),
    #[error("goto target '{0}' has already completed")]
    StepAlreadyCompleted(String),
    #[error("unknown workflow '{0}'")]
    UnknownWorkflow(String),
    #[error("nested workflow '{workflow_id}' failed: {message}")]
    NestedWorkflow { workflow_id: String, message: String },
    #[error("workflow nesting deeper than {0}")]
    MaxDepth(usize),
    #[error("more than {0} step executions")]
    MaxStepExecutions(usize),
    #[error(transparent)]
    State(#[from] StateError),
}

/// What one step attempt produced.
struct StepOutcome {
    outputs: StepOutputs,
    succeeded: bool,
    status: Option<u16>,
    response: Option<super::step::OperationResponse>,
}

enum Next {
    Continue,
    Goto(usize),
    End,
}

/// Drives workflows of one Arazzo document over a [`StepExecutor`].
pub struct WorkflowRunner {
    document: Arc<ArazzoDocument>,
    steps: StepExecutor,
    config: RunnerConfig,
}

impl WorkflowRunner {
    pub fn new(document: Arc<ArazzoDocument>, steps: StepExecutor, config: RunnerConfig) -> Self {
        Self {
            document,
            steps,
            config,
        }
    }

    pub fn document(&self) -> &ArazzoDocument {
        &self.document
    }

    pub fn step_executor(&self) -> &StepExecutor {
        &self.steps
    }

    /// Run a workflow to completion. `None` when the workflow id is unknown;
    /// every failure after that is reported in the result with `ERROR` status.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        inputs: Map<String, Value>,
        runtime_params: Option<&RuntimeParams>,
    ) -> Option<WorkflowExecutionResult> {
        let workflow = self.document.workflow(workflow_id)?;
        let mut executions = 0;
        Some(
            self.run_workflow(workflow, inputs, runtime_params, 0, &mut executions)
                .await,
        )
    }

    async fn run_workflow(
        &self,
        workflow: &Workflow,
        inputs: Map<String, Value>,
        runtime_params: Option<&RuntimeParams>,
        depth: usize,
        executions: &mut usize,
    ) -> WorkflowExecutionResult {
        let workflow_id = workflow.workflow_id.as_str();
        let mut status = WorkflowStatus::Pending;
        let inputs = with_input_defaults(workflow, inputs);
        let mut state = ExecutionState::new(workflow_id, inputs);

        tracing::info!(workflow_id, from = ?status, to = ?WorkflowStatus::Running, "workflow transition");
        status = WorkflowStatus::Running;

        let run = async {
            if depth > self.config.max_workflow_depth {
                return Err(RunError::MaxDepth(self.config.max_workflow_depth));
            }
            check_required_inputs(workflow, &state.inputs)?;
            self.run_steps(workflow, &mut state, runtime_params, depth, executions)
                .await
        };

        let result = match run.await {
            Ok(()) => {
                let evaluator = ExpressionEvaluator::new(&state).with_document(&self.document);
                let outputs = evaluate_named(workflow.outputs.as_ref(), &evaluator);
                state.outputs = outputs;
                WorkflowExecutionResult::completed(state)
            }
            Err(e) => {
                tracing::warn!(workflow_id, error = %e, "workflow failed");
                WorkflowExecutionResult::failed(state, e.to_string())
            }
        };
        tracing::info!(workflow_id, from = ?status, to = ?result.status, "workflow transition");
        result
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        state: &mut ExecutionState,
        runtime_params: Option<&RuntimeParams>,
        depth: usize,
        executions: &mut usize,
    ) -> Result<(), RunError> {
        let mut idx = 0;
        while let Some(step) = workflow.steps.get(idx) {
            let mut attempts: u32 = 0;
            let next = loop {
                *executions += 1;
                if *executions > self.config.max_step_executions {
                    return Err(RunError::MaxStepExecutions(self.config.max_step_executions));
                }
                tracing::info!(workflow_id = %workflow.workflow_id, step_id = %step.step_id, attempt = attempts, "running step");

                let outcome = self
                    .run_step(step, state, runtime_params, depth, executions)
                    .await?;

                if outcome.succeeded {
                    let action = self.matching_success_action(step, state, &outcome)?;
                    state.record_step_outputs(&step.step_id, outcome.outputs)?;
                    break match action {
                        None => Next::Continue,
                        Some(a) => match a.action_type {
                            SuccessActionType::End => Next::End,
                            SuccessActionType::Goto => {
                                Next::Goto(goto_index(workflow, state, a.step_id.as_deref())?)
                            }
                        },
                    };
                }

                let failed = RunError::StepFailed {
                    step_id: step.step_id.clone(),
                    status: outcome.status,
                };
                let action = self.matching_failure_action(step, state, &outcome)?;
                match action.as_ref().map(|a| a.action_type) {
                    Some(FailureActionType::Retry)
                        if attempts < action.as_ref().and_then(|a| a.retry_limit).unwrap_or(1) =>
                    {
                        attempts += 1;
                        let delay = match action.as_ref().and_then(|a| a.retry_after_seconds) {
                            Some(seconds) if seconds > 0.0 => Some(
                                Duration::try_from_secs_f64(seconds).map_err(|_| {
                                    RunError::InvalidRetryDelay {
                                        step_id: step.step_id.clone(),
                                        seconds,
                                    }
                                })?,
                            ),
                            _ => None,
                        };
                        tracing::info!(step_id = %step.step_id, attempt = attempts, ?delay, "retrying step");
                        if let Some(d) = delay {
                            tokio::time::sleep(d).await;
                        }
                        continue;
                    }
                    Some(FailureActionType::Goto) => {
                        state.record_step_outputs(&step.step_id, outcome.outputs)?;
                        let target = action.as_ref().and_then(|a| a.step_id.as_deref());
                        break Next::Goto(goto_index(workflow, state, target)?);
                    }
                    _ => {
                        state.record_step_outputs(&step.step_id, outcome.outputs)?;
                        return Err(failed);
                    }
                }
            };

            match next {
                Next::Continue => idx += 1,
                Next::Goto(target) => idx = target,
                Next::End => {
                    tracing::info!(step_id = %step.step_id, "workflow ended by step action");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: &Step,
        state: &ExecutionState,
        runtime_params: Option<&RuntimeParams>,
        depth: usize,
        executions: &mut usize,
    ) -> Result<StepOutcome, RunError> {
        let inputs = self.step_inputs(step, state)?;
        let step_err = |source| RunError::Step {
            step_id: step.step_id.clone(),
            source,
        };

        let target = match step.target() {
            Some(StepTarget::OperationId(id)) => OperationTarget::id(id),
            Some(StepTarget::OperationPath(p)) => OperationTarget::OperationPath(p.to_string()),
            Some(StepTarget::Workflow(id)) => {
                return self
                    .run_nested(step, id, inputs, runtime_params, depth, executions)
                    .await;
            }
            None => return Err(RunError::NoTarget(step.step_id.clone())),
        };

        let op = self
            .steps
            .execute_operation(&target, &inputs, runtime_params)
            .await
            .map_err(step_err)?;

        let evaluator = ExpressionEvaluator::new(state)
            .with_document(&self.document)
            .with_response(ResponseContext {
                url: &op.url,
                method: &op.method,
                response: &op.response,
            });
        let succeeded = evaluate_success(step.success_criteria.as_deref().unwrap_or(&[]), &evaluator);
        let outputs = extract_outputs(step.outputs.as_ref(), &op.response, &evaluator);

        Ok(StepOutcome {
            outputs,
            succeeded,
            status: Some(op.response.status_code),
            response: Some(op),
        })
    }

    async fn run_nested(
        &self,
        step: &Step,
        workflow_id: &str,
        inputs: Map<String, Value>,
        runtime_params: Option<&RuntimeParams>,
        depth: usize,
        executions: &mut usize,
    ) -> Result<StepOutcome, RunError> {
        let workflow = self
            .document
            .workflow(workflow_id)
            .ok_or_else(|| RunError::UnknownWorkflow(workflow_id.to_string()))?;
        let nested = Box::pin(self.run_workflow(
            workflow,
            inputs,
            runtime_params,
            depth + 1,
            executions,
        ))
        .await;
        if nested.status != WorkflowStatus::WorkflowComplete {
            return Err(RunError::NestedWorkflow {
                workflow_id: workflow_id.to_string(),
                message: nested.error.unwrap_or_default(),
            });
        }

        tracing::debug!(step_id = %step.step_id, workflow_id, "nested workflow completed");
        Ok(StepOutcome {
            outputs: nested.outputs,
            succeeded: true,
            status: None,
            response: None,
        })
    }

    /// Evaluate step parameters and merge an object request-body payload.
    fn step_inputs(&self, step: &Step, state: &ExecutionState) -> Result<Map<String, Value>, RunError> {
        let evaluator = ExpressionEvaluator::new(state).with_document(&self.document);
        let eval_err = |source| RunError::Eval {
            step_id: step.step_id.clone(),
            source,
        };
        let mut inputs = Map::new();

        for p in step.parameters.iter().flatten() {
            let (name, value) = match p {
                ParameterOrReusable::Parameter(p) => (p.name.clone(), &p.value),
                ParameterOrReusable::Reusable(r) => {
                    let component = r
                        .component_name("parameters")
                        .and_then(|n| self.document.component_parameter(n))
                        .ok_or_else(|| RunError::UnknownReusable {
                            step_id: step.step_id.clone(),
                            reference: r.reference.clone(),
                        })?;
                    (component.name.clone(), r.value.as_ref().unwrap_or(&component.value))
                }
            };
            inputs.insert(name, evaluator.evaluate_value(value).map_err(eval_err)?);
        }

        if let Some(payload) = step.request_body.as_ref().and_then(|b| b.payload.as_ref()) {
            match evaluator.evaluate_value(payload).map_err(eval_err)? {
                Value::Object(fields) => {
                    for (k, v) in fields {
                        inputs.entry(k).or_insert(v);
                    }
                }
                Value::Null => {}
                _ => {
                    return Err(RunError::InvalidPayload {
                        step_id: step.step_id.clone(),
                    })
                }
            }
        }
        Ok(inputs)
    }

    fn matching_success_action(
        &self,
        step: &Step,
        state: &ExecutionState,
        outcome: &StepOutcome,
    ) -> Result<Option<SuccessAction>, RunError> {
        let evaluator = self.outcome_evaluator(state, outcome);
        for entry in step.on_success.iter().flatten() {
            let action = match entry {
                SuccessActionOrReusable::Action(a) => a.clone(),
                SuccessActionOrReusable::Reusable(r) => r
                    .component_name("successActions")
                    .and_then(|n| self.document.component_success_action(n))
                    .cloned()
                    .ok_or_else(|| RunError::UnknownReusable {
                        step_id: step.step_id.clone(),
                        reference: r.reference.clone(),
                    })?,
            };
            if criteria_hold(action.criteria.as_deref().unwrap_or(&[]), &evaluator) {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    fn matching_failure_action(
        &self,
        step: &Step,
        state: &ExecutionState,
        outcome: &StepOutcome,
    ) -> Result<Option<FailureAction>, RunError> {
        let evaluator = self.outcome_evaluator(state, outcome);
        for entry in step.on_failure.iter().flatten() {
            let action = match entry {
                FailureActionOrReusable::Action(a) => a.clone(),
                FailureActionOrReusable::Reusable(r) => r
                    .component_name("failureActions")
                    .and_then(|n| self.document.component_failure_action(n))
                    .cloned()
                    .ok_or_else(|| RunError::UnknownReusable {
                        step_id: step.step_id.clone(),
                        reference: r.reference.clone(),
                    })?,
            };
            if criteria_hold(action.criteria.as_deref().unwrap_or(&[]), &evaluator) {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    fn outcome_evaluator<'s>(
        &'s self,
        state: &'s ExecutionState,
        outcome: &'s StepOutcome,
    ) -> ExpressionEvaluator<'s> {
        let evaluator = ExpressionEvaluator::new(state).with_document(&self.document);
        match &outcome.response {
            Some(op) => evaluator.with_response(ResponseContext {
                url: &op.url,
                method: &op.method,
                response: &op.response,
            }),
            None => evaluator,
        }
    }
}

fn goto_index(
    workflow: &Workflow,
    state: &ExecutionState,
    target: Option<&str>,
) -> Result<usize, RunError> {
    let target = target.ok_or_else(|| RunError::UnknownStep(String::new()))?;
    let idx = workflow
        .step_index(target)
        .ok_or_else(|| RunError::UnknownStep(target.to_string()))?;
    if state.is_completed(target) {
        return Err(RunError::StepAlreadyCompleted(target.to_string()));
    }
    Ok(idx)
}

/// Fill absent inputs from `properties.<name>.default` of the input schema.
fn with_input_defaults(workflow: &Workflow, mut inputs: Map<String, Value>) -> Map<String, Value> {
    let properties = workflow
        .inputs
        .as_ref()
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object);
    for (name, schema) in properties.into_iter().flatten() {
        if let Some(default) = schema.get("default") {
            inputs.entry(name.clone()).or_insert_with(|| default.clone());
        }
    }
    inputs
}

fn check_required_inputs(workflow: &Workflow, inputs: &Map<String, Value>) -> Result<(), RunError> {
    let required = workflow
        .inputs
        .as_ref()
        .and_then(|s| s.get("required"))
        .and_then(Value::as_array);
    for name in required.into_iter().flatten().filter_map(Value::as_str) {
        if !inputs.contains_key(name) {
            return Err(RunError::MissingInput(name.to_string()));
        }
    }
    Ok(())
}

fn evaluate_named(
    declared: Option<&std::collections::BTreeMap<String, String>>,
    evaluator: &ExpressionEvaluator<'_>,
) -> Map<String, Value> {
    declared
        .into_iter()
        .flatten()
        .map(|(name, expr)| {
            let value = evaluator.evaluate_expression(expr).unwrap_or_else(|e| {
                tracing::warn!(output = %name, error = %e, "workflow output did not resolve");
                Value::Null
            });
            (name.clone(), value)
        })
        .collect()
}
