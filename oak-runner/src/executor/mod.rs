//! Operation dispatch and the workflow state machine.

mod criteria;
mod eval;
mod http;
mod outputs;
mod runner;
mod state;
mod step;

pub use criteria::{criteria_hold, evaluate_criterion, evaluate_success};
pub use eval::{evaluate_expression, EvalError, ExpressionEvaluator, ResponseContext};
pub use http::{HttpError, HttpExecutor, HttpRequest, HttpResponse, ReqwestHttpExecutor};
pub use outputs::{extract_outputs, ERROR_CONTEXT_KEY};
pub use runner::{RunError, WorkflowRunner};
pub use state::{ExecutionState, StateError, StepOutputs, WorkflowExecutionResult, WorkflowStatus};
pub use step::{OperationResponse, StepError, StepExecutor};
