//! Arazzo workflow document types.
//!
//! Only the parts of Arazzo 1.0.x the runner consumes are modelled; unknown
//! fields are ignored during deserialization.

mod actions;
mod criterion;
mod document;
mod parameter;
mod workflow;

pub use actions::{
    FailureAction, FailureActionOrReusable, FailureActionType, ReusableObject, SuccessAction,
    SuccessActionOrReusable, SuccessActionType,
};
pub use criterion::{Criterion, CriterionExpressionLanguage, CriterionType, KnownCriterionType};
pub use document::{ArazzoDocument, Components, Info, SourceDescriptionRef, SourceType};
pub use parameter::{Parameter, ParameterOrReusable, StepRequestBody};
pub use workflow::{Step, StepTarget, Workflow};

pub type AnyValue = serde_json::Value;
pub type JsonSchema = serde_json::Value;
pub type RuntimeExpression = String;
