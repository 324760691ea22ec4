use super::runtime::{parse_runtime_expr, RuntimeExprError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Expr(String),
}

/// A string with embedded `{$expr}` references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub segments: Vec<Segment>,
}

impl Template {
    pub fn has_expressions(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Expr(_)))
    }
}

/// Split `input` into literal text and `{ $... }` expressions.
///
/// A `{` not followed (after whitespace) by `$` is literal text, so JSON-ish
/// strings pass through untouched. Nested braces are not supported.
pub fn parse_template(input: &str) -> Result<Template, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        if !after.trim_start().starts_with('$') {
            literal.push_str(&rest[..=open]);
            rest = after;
            continue;
        }
        let close = after.find('}').ok_or(TemplateError::UnclosedExpression)?;
        let expr = after[..close].trim();
        parse_runtime_expr(expr)?;

        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Expr(expr.to_string()));
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(Template { segments })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("invalid runtime expression: {0}")]
    InvalidRuntimeExpr(#[from] RuntimeExprError),
    #[error("unclosed embedded expression (missing '}}')")]
    UnclosedExpression,
}
