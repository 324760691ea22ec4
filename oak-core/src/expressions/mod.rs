mod json_pointer;
mod runtime;
mod template;

pub use json_pointer::{JsonPointer, JsonPointerError};
pub use runtime::{normalize_expression, parse_runtime_expr, NamePath, RuntimeExpr, RuntimeExprError, Source};
pub use template::{parse_template, Segment, Template, TemplateError};
