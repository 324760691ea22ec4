use oak_core::types::{Criterion, KnownCriterionType};
use regex::Regex;
use serde_json::Value;
use serde_json_path::JsonPath;

use super::eval::ExpressionEvaluator;

const SIMPLE_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "<", ">"];

/// Step success: every criterion must hold. Without criteria a 2xx status
/// is success.
pub fn evaluate_success(criteria: &[Criterion], eval: &ExpressionEvaluator<'_>) -> bool {
    if criteria.is_empty() {
        return eval
            .evaluate_expression("$statusCode")
            .ok()
            .and_then(|v| v.as_u64())
            .is_some_and(|s| (200..300).contains(&s));
    }
    criteria_hold(criteria, eval)
}

/// Action criteria: an empty list always holds.
pub fn criteria_hold(criteria: &[Criterion], eval: &ExpressionEvaluator<'_>) -> bool {
    criteria.iter().all(|c| evaluate_criterion(c, eval))
}

pub fn evaluate_criterion(c: &Criterion, eval: &ExpressionEvaluator<'_>) -> bool {
    let kind = c.r#type.as_ref().map(|t| t.kind());
    match kind {
        None | Some(KnownCriterionType::Simple) => evaluate_simple(c, eval),
        Some(KnownCriterionType::Jsonpath) => evaluate_jsonpath(c, eval),
        Some(KnownCriterionType::Regex) => evaluate_regex(c, eval),
        Some(KnownCriterionType::Xpath) => {
            tracing::warn!(condition = %c.condition, "xpath criteria are not supported");
            false
        }
    }
}

fn evaluate_simple(c: &Criterion, eval: &ExpressionEvaluator<'_>) -> bool {
    simple_condition(c.condition.trim(), eval)
}

/// `||` binds loosest, then `&&`, then one comparison. Operators inside
/// quoted literals are not operators. Parentheses are not supported.
fn simple_condition(cond: &str, eval: &ExpressionEvaluator<'_>) -> bool {
    if let Some(clauses) = split_outside_quotes(cond, "||") {
        return clauses.iter().any(|c| simple_condition(c.trim(), eval));
    }
    if let Some(clauses) = split_outside_quotes(cond, "&&") {
        return clauses.iter().all(|c| simple_condition(c.trim(), eval));
    }
    if cond.starts_with('(') {
        tracing::warn!(condition = %cond, "grouped conditions are not supported");
        return false;
    }
    for op in SIMPLE_OPS {
        if let Some(at) = find_outside_quotes(cond, op) {
            let lhs = operand(&cond[..at], eval);
            let rhs = operand(&cond[at + op.len()..], eval);
            return compare_values(&lhs, &rhs, op);
        }
    }
    // A bare expression is truthy when it resolves to `true`.
    operand(cond, eval) == Value::Bool(true)
}

/// Byte offset of the first `pat` that is not inside '...' or "...".
fn find_outside_quotes(s: &str, pat: &str) -> Option<usize> {
    let mut quote = None;
    for (i, ch) in s.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if s[i..].starts_with(pat) => return Some(i),
            None => {}
        }
    }
    None
}

/// All clauses around `pat`, or `None` when `pat` does not occur unquoted.
fn split_outside_quotes<'s>(s: &'s str, pat: &str) -> Option<Vec<&'s str>> {
    let mut first = find_outside_quotes(s, pat)?;
    let mut clauses = Vec::new();
    let mut rest = s;
    loop {
        clauses.push(&rest[..first]);
        rest = &rest[first + pat.len()..];
        match find_outside_quotes(rest, pat) {
            Some(at) => first = at,
            None => {
                clauses.push(rest);
                return Some(clauses);
            }
        }
    }
}

fn evaluate_jsonpath(c: &Criterion, eval: &ExpressionEvaluator<'_>) -> bool {
    let Some(context) = c.context.as_deref() else {
        return false;
    };
    let target = resolve(context, eval);
    if target.is_null() {
        return false;
    }

    let condition = c.condition.trim();
    // Filters select among array elements; wrap an object so `$[?..]` applies to it.
    let target = if condition.contains("[?") && !target.is_array() {
        Value::Array(vec![target])
    } else {
        target
    };

    if !condition.starts_with("$[?") {
        for op in ["==", "!="] {
            if let Some((path, expected)) = condition.split_once(op) {
                let Ok(path) = JsonPath::parse(path.trim()) else {
                    return false;
                };
                let nodes = path.query(&target).all();
                let Some(actual) = nodes.first() else {
                    return false;
                };
                return compare_values(actual, &parse_literal(expected), op);
            }
        }
    }

    match JsonPath::parse(condition) {
        Ok(path) => !path.query(&target).all().is_empty(),
        Err(_) => false,
    }
}

fn evaluate_regex(c: &Criterion, eval: &ExpressionEvaluator<'_>) -> bool {
    let Some(context) = c.context.as_deref() else {
        return false;
    };
    let subject = match resolve(context, eval) {
        Value::String(s) => s,
        v => v.to_string(),
    };
    Regex::new(c.condition.trim())
        .map(|re| re.is_match(&subject))
        .unwrap_or(false)
}

fn resolve(expr: &str, eval: &ExpressionEvaluator<'_>) -> Value {
    eval.evaluate_expression(expr.trim()).unwrap_or(Value::Null)
}

fn operand(s: &str, eval: &ExpressionEvaluator<'_>) -> Value {
    let s = s.trim();
    if s.starts_with('$') {
        resolve(s, eval)
    } else {
        parse_literal(s)
    }
}

fn parse_literal(s: &str) -> Value {
    let s = s.trim();
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return v;
    }
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return Value::String(s[1..s.len() - 1].to_string());
    }
    Value::String(s.to_string())
}

fn compare_values(actual: &Value, expected: &Value, op: &str) -> bool {
    match op {
        "==" => json_eq(actual, expected),
        "!=" => !json_eq(actual, expected),
        "<" => json_cmp(actual, expected).is_some_and(|o| o.is_lt()),
        ">" => json_cmp(actual, expected).is_some_and(|o| o.is_gt()),
        "<=" => json_cmp(actual, expected).is_some_and(|o| o.is_le()),
        ">=" => json_cmp(actual, expected).is_some_and(|o| o.is_ge()),
        _ => false,
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| json_eq(v, bv)))
        }
        _ => a == b,
    }
}

fn json_cmp(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}
