use std::sync::LazyLock;

use regex::Regex;

use super::json_pointer::{JsonPointer, JsonPointerError};

static TCHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$").expect("valid regex"));

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-_]+$").expect("valid regex"));

static INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeExpr {
    Url,
    Method,
    StatusCode,
    Response(Source),
    Inputs(NamePath),
    Outputs(NamePath),
    Steps(NamePath),
    SourceDescriptions(NamePath),
    ComponentsParameters(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Header(String),
    Body { pointer: Option<JsonPointer> },
}

/// `<root>.<rest...>` with an optional trailing `#<json-pointer>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePath {
    pub root: String,
    pub rest: Vec<String>,
    pub pointer: Option<JsonPointer>,
}

/// Canonical spelling of an expression: trimmed, `$.` folded to `$`, and
/// `[n]` index suffixes rewritten to `.n`.
pub fn normalize_expression(input: &str) -> String {
    let s = input.trim();
    let s = match s.strip_prefix("$.") {
        Some(rest) => format!("${rest}"),
        None => s.to_string(),
    };
    match s.split_once('#') {
        Some((head, frag)) => format!("{}#{frag}", INDEX_RE.replace_all(head, ".$1")),
        None => INDEX_RE.replace_all(&s, ".$1").into_owned(),
    }
}

pub fn parse_runtime_expr(input: &str) -> Result<RuntimeExpr, RuntimeExprError> {
    let normalized = normalize_expression(input);
    let Some(body) = normalized.strip_prefix('$') else {
        return Err(RuntimeExprError::MissingDollarPrefix);
    };

    let (head, pointer) = split_pointer_suffix(body)?;

    match head.as_str() {
        "url" => return Ok(RuntimeExpr::Url),
        "method" => return Ok(RuntimeExpr::Method),
        "statusCode" => return Ok(RuntimeExpr::StatusCode),
        "response.body" => return Ok(RuntimeExpr::Response(Source::Body { pointer })),
        _ => {}
    }

    if let Some(rest) = head.strip_prefix("response.") {
        return parse_response_source(rest, pointer).map(RuntimeExpr::Response);
    }
    if let Some(rest) = head.strip_prefix("inputs.") {
        return Ok(RuntimeExpr::Inputs(parse_name_path(rest, pointer)?));
    }
    if let Some(rest) = head.strip_prefix("outputs.") {
        return Ok(RuntimeExpr::Outputs(parse_name_path(rest, pointer)?));
    }
    if let Some(rest) = head.strip_prefix("steps.") {
        return Ok(RuntimeExpr::Steps(parse_name_path(rest, pointer)?));
    }
    if let Some(rest) = head.strip_prefix("sourceDescriptions.") {
        return Ok(RuntimeExpr::SourceDescriptions(parse_name_path(rest, pointer)?));
    }
    if let Some(name) = head.strip_prefix("components.parameters.") {
        validate_name(name)?;
        if pointer.is_some() {
            return Err(RuntimeExprError::PointerNotAllowed);
        }
        return Ok(RuntimeExpr::ComponentsParameters(name.to_string()));
    }

    Err(RuntimeExprError::UnknownExpression(head))
}

fn split_pointer_suffix(s: &str) -> Result<(String, Option<JsonPointer>), RuntimeExprError> {
    match s.split_once('#') {
        Some((head, frag)) => Ok((head.to_string(), Some(JsonPointer::parse(frag)?))),
        None => Ok((s.to_string(), None)),
    }
}

fn parse_response_source(
    rest: &str,
    pointer: Option<JsonPointer>,
) -> Result<Source, RuntimeExprError> {
    if let Some(token) = rest.strip_prefix("header.") {
        if token.is_empty() {
            return Err(RuntimeExprError::EmptyName);
        }
        if !TCHAR_RE.is_match(token) {
            return Err(RuntimeExprError::InvalidHeaderToken(token.to_string()));
        }
        return Ok(Source::Header(token.to_string()));
    }
    // `$response.body.a.b` is accepted as shorthand for `$response.body#/a/b`.
    if let Some(dotted) = rest.strip_prefix("body.") {
        if pointer.is_some() {
            return Err(RuntimeExprError::PointerNotAllowed);
        }
        let segments: Vec<&str> = dotted.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(RuntimeExprError::EmptyName);
        }
        return Ok(Source::Body {
            pointer: Some(JsonPointer::from_segments(&segments)),
        });
    }
    Err(RuntimeExprError::InvalidSource(rest.to_string()))
}

fn parse_name_path(rest: &str, pointer: Option<JsonPointer>) -> Result<NamePath, RuntimeExprError> {
    let mut parts = rest.split('.');
    let root = parts.next().unwrap_or_default().to_string();
    validate_name(&root)?;
    let rest = parts
        .map(|p| validate_name(p).map(|_| p.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NamePath {
        root,
        rest,
        pointer,
    })
}

fn validate_name(name: &str) -> Result<(), RuntimeExprError> {
    if name.is_empty() {
        return Err(RuntimeExprError::EmptyName);
    }
    if !NAME_RE.is_match(name) {
        return Err(RuntimeExprError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeExprError {
    #[error("runtime expression must start with '$'")]
    MissingDollarPrefix,
    #[error("unknown runtime expression: {0}")]
    UnknownExpression(String),
    #[error("invalid response source: {0}")]
    InvalidSource(String),
    #[error("name segment must not be empty")]
    EmptyName,
    #[error("invalid name segment: {0}")]
    InvalidName(String),
    #[error("invalid header token: {0}")]
    InvalidHeaderToken(String),
    #[error("invalid json pointer: {0}")]
    InvalidJsonPointer(#[from] JsonPointerError),
    #[error("json pointer is not allowed on this runtime expression")]
    PointerNotAllowed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(expr: &str) -> NamePath {
        match parse_runtime_expr(expr).unwrap() {
            RuntimeExpr::Steps(np) => np,
            other => panic!("expected steps expression, got {other:?}"),
        }
    }

    #[test]
    fn dollar_dot_prefix_is_equivalent() {
        assert_eq!(steps("$.steps.s.outputs.id"), steps("$steps.s.outputs.id"));
    }

    #[test]
    fn bracket_indexes_become_segments() {
        let np = steps("$steps.list.outputs.items[0].id");
        assert_eq!(np.root, "list");
        assert_eq!(np.rest, vec!["outputs", "items", "0", "id"]);
    }

    #[test]
    fn response_body_dotted_shorthand() {
        let expr = parse_runtime_expr("$response.body.data.id").unwrap();
        let RuntimeExpr::Response(Source::Body { pointer: Some(p) }) = expr else {
            panic!("expected body pointer");
        };
        assert_eq!(p.as_str(), "/data/id");
    }

    #[test]
    fn response_body_pointer() {
        let expr = parse_runtime_expr("$response.body#/items/0").unwrap();
        let RuntimeExpr::Response(Source::Body { pointer: Some(p) }) = expr else {
            panic!("expected body pointer");
        };
        assert_eq!(p.as_str(), "/items/0");
    }

    #[test]
    fn rejects_unknown_roots() {
        assert!(matches!(
            parse_runtime_expr("$nope.x"),
            Err(RuntimeExprError::UnknownExpression(_))
        ));
        assert_eq!(
            parse_runtime_expr("steps.a"),
            Err(RuntimeExprError::MissingDollarPrefix)
        );
    }
}
