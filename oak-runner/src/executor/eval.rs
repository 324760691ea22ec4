//! Runtime-expression evaluation against run state and, while a step is
//! being processed, its HTTP exchange.

use oak_core::expressions::{
    parse_runtime_expr, parse_template, NamePath, RuntimeExpr, RuntimeExprError, Segment, Source,
    TemplateError,
};
use oak_core::ArazzoDocument;
use serde_json::{Map, Value};

use super::http::{scalar_string, HttpResponse};
use super::state::ExecutionState;

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("invalid expression '{expression}': {source}")]
    Parse {
        expression: String,
        #[source]
        source: RuntimeExprError,
    },
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
    #[error("cannot resolve '{segment}' in '{expression}'")]
    Lookup { expression: String, segment: String },
    #[error("'{0}' needs a response context")]
    NoResponse(String),
    #[error("'{0}' is not supported here")]
    Unsupported(String),
}

/// The request/response pair a step produced.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext<'a> {
    pub url: &'a str,
    pub method: &'a str,
    pub response: &'a HttpResponse,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpressionEvaluator<'a> {
    state: &'a ExecutionState,
    document: Option<&'a ArazzoDocument>,
    response: Option<ResponseContext<'a>>,
}

/// Evaluate one expression against run state only.
pub fn evaluate_expression(expr: &str, state: &ExecutionState) -> Result<Value, EvalError> {
    ExpressionEvaluator::new(state).evaluate_expression(expr)
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(state: &'a ExecutionState) -> Self {
        Self {
            state,
            document: None,
            response: None,
        }
    }

    /// Enables `$components.parameters.*` and `$sourceDescriptions.*`.
    pub fn with_document(mut self, document: &'a ArazzoDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_response(mut self, response: ResponseContext<'a>) -> Self {
        self.response = Some(response);
        self
    }

    /// Evaluate a parameter or payload value: whole-string expressions yield
    /// the referenced value, `{$...}` templates yield a string, containers are
    /// evaluated element-wise, everything else is returned as-is.
    pub fn evaluate_value(&self, value: &Value) -> Result<Value, EvalError> {
        match value {
            Value::String(s) => self.evaluate_string(s),
            Value::Array(items) => items
                .iter()
                .map(|v| self.evaluate_value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.evaluate_value(v)?)))
                .collect::<Result<Map<_, _>, EvalError>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    fn evaluate_string(&self, s: &str) -> Result<Value, EvalError> {
        if s.trim_start().starts_with('$') {
            return self.evaluate_expression(s);
        }
        let template = parse_template(s)?;
        if !template.has_expressions() {
            return Ok(Value::String(s.to_string()));
        }
        let mut out = String::new();
        for seg in &template.segments {
            match seg {
                Segment::Literal(l) => out.push_str(l),
                Segment::Expr(e) => out.push_str(&scalar_string(&self.evaluate_expression(e)?)),
            }
        }
        Ok(Value::String(out))
    }

    pub fn evaluate_expression(&self, expr: &str) -> Result<Value, EvalError> {
        let parsed = parse_runtime_expr(expr).map_err(|source| EvalError::Parse {
            expression: expr.to_string(),
            source,
        })?;
        let lookup = |segment: &str| EvalError::Lookup {
            expression: expr.to_string(),
            segment: segment.to_string(),
        };

        match parsed {
            RuntimeExpr::Steps(np) => {
                let outputs = self.state.step(&np.root).ok_or_else(|| lookup(&np.root))?;
                // `outputs` is optional unless the step really has an output named so.
                let rest = match np.rest.split_first() {
                    Some((first, tail)) if first == "outputs" && !outputs.contains_key("outputs") => {
                        tail
                    }
                    _ => &np.rest[..],
                };
                resolve_in_map(outputs, rest, &np).map_err(|seg| lookup(&seg))
            }
            RuntimeExpr::Inputs(np) => {
                let (first, tail) = (np.root.as_str(), &np.rest[..]);
                let v = self.state.inputs.get(first).ok_or_else(|| lookup(first))?;
                walk_with_pointer(v, tail, &np).map_err(|seg| lookup(&seg))
            }
            RuntimeExpr::Outputs(np) => {
                let v = self.state.outputs.get(&np.root).ok_or_else(|| lookup(&np.root))?;
                walk_with_pointer(v, &np.rest, &np).map_err(|seg| lookup(&seg))
            }
            RuntimeExpr::SourceDescriptions(np) => {
                let doc = self
                    .document
                    .ok_or_else(|| EvalError::Unsupported(expr.to_string()))?;
                let sd = doc
                    .source_descriptions
                    .iter()
                    .find(|s| s.name == np.root)
                    .ok_or_else(|| lookup(&np.root))?;
                match np.rest.first().map(String::as_str) {
                    Some("url") => Ok(Value::String(sd.url.clone())),
                    Some("name") => Ok(Value::String(sd.name.clone())),
                    Some(other) => Err(lookup(other)),
                    None => Err(EvalError::Unsupported(expr.to_string())),
                }
            }
            RuntimeExpr::ComponentsParameters(name) => {
                let param = self
                    .document
                    .and_then(|d| d.component_parameter(&name))
                    .ok_or_else(|| lookup(&name))?;
                self.evaluate_value(&param.value)
            }
            RuntimeExpr::Url => Ok(Value::String(self.exchange(expr)?.url.to_string())),
            RuntimeExpr::Method => Ok(Value::String(self.exchange(expr)?.method.to_string())),
            RuntimeExpr::StatusCode => {
                Ok(Value::from(self.exchange(expr)?.response.status_code))
            }
            RuntimeExpr::Response(Source::Header(name)) => self
                .exchange(expr)?
                .response
                .header(&name)
                .map(|v| Value::String(v.to_string()))
                .ok_or_else(|| lookup(&name)),
            RuntimeExpr::Response(Source::Body { pointer }) => {
                let body = &self.exchange(expr)?.response.body;
                match pointer {
                    Some(p) => p.resolve(body).cloned().ok_or_else(|| lookup(p.as_str())),
                    None => Ok(body.clone()),
                }
            }
        }
    }

    fn exchange(&self, expr: &str) -> Result<&ResponseContext<'a>, EvalError> {
        self.response
            .as_ref()
            .ok_or_else(|| EvalError::NoResponse(expr.to_string()))
    }
}

fn resolve_in_map(map: &Map<String, Value>, path: &[String], np: &NamePath) -> Result<Value, String> {
    match path.split_first() {
        None => {
            let whole = Value::Object(map.clone());
            apply_pointer(&whole, np).map(Value::clone)
        }
        Some((first, tail)) => {
            let v = map.get(first).ok_or_else(|| first.clone())?;
            walk_with_pointer(v, tail, np)
        }
    }
}

fn walk_with_pointer(root: &Value, path: &[String], np: &NamePath) -> Result<Value, String> {
    let mut cur = root;
    for seg in path {
        cur = step_into(cur, seg).ok_or_else(|| seg.clone())?;
    }
    apply_pointer(cur, np).map(Value::clone)
}

fn apply_pointer<'v>(v: &'v Value, np: &NamePath) -> Result<&'v Value, String> {
    match &np.pointer {
        Some(p) => p.resolve(v).ok_or_else(|| p.as_str().to_string()),
        None => Ok(v),
    }
}

fn step_into<'v>(v: &'v Value, seg: &str) -> Option<&'v Value> {
    match v {
        Value::Object(m) => m.get(seg),
        Value::Array(items) => items.get(seg.parse::<usize>().ok()?),
        _ => None,
    }
}
