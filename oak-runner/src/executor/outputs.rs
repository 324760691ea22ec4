use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use super::eval::ExpressionEvaluator;
use super::http::HttpResponse;

/// Output key added when a response status is outside 2xx.
pub const ERROR_CONTEXT_KEY: &str = "oak_error_context";

/// Evaluate a step's declared outputs. `evaluator` must carry the step's
/// response context. An expression that fails to resolve yields `null`.
pub fn extract_outputs(
    declared: Option<&BTreeMap<String, String>>,
    response: &HttpResponse,
    evaluator: &ExpressionEvaluator<'_>,
) -> Map<String, Value> {
    let mut outputs = Map::new();
    for (name, expr) in declared.into_iter().flatten() {
        let value = match evaluator.evaluate_expression(expr) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(output = %name, error = %e, "output expression did not resolve");
                Value::Null
            }
        };
        outputs.insert(name.clone(), value);
    }

    if !response.is_success() {
        outputs.insert(
            ERROR_CONTEXT_KEY.to_string(),
            json!({
                "http_code": response.status_code,
                "http_response": response.body,
            }),
        );
    }
    outputs
}
