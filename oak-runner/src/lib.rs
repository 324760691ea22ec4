#![forbid(unsafe_code)]

//! Resolution and execution engine for OpenAPI operations and Arazzo
//! workflows: operation lookup, credential and server resolution, parameter
//! marshalling, dispatch, and the workflow state machine.

pub mod auth;
pub mod cache;
pub mod config;
pub mod env;
pub mod executor;
pub mod openapi;
pub mod params;
pub mod server;

pub use crate::config::{CacheConfig, RunnerConfig};
pub use crate::executor::{StepExecutor, WorkflowExecutionResult, WorkflowRunner, WorkflowStatus};
pub use crate::openapi::{OperationFinder, OperationTarget, SourceLoader};
