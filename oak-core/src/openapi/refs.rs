use std::collections::HashSet;

use serde_json::Value;

/// Follow a local `$ref` (`#/...`) inside `doc`, chasing chained refs until a
/// non-reference object is reached.
pub fn resolve_ref<'a>(doc: &'a Value, ref_str: &str) -> Result<&'a Value, RefError> {
    let mut visited = HashSet::new();
    let mut current = ref_str.to_string();
    loop {
        if !current.starts_with('#') {
            return Err(RefError::ExternalRef(current));
        }
        if !visited.insert(current.clone()) {
            return Err(RefError::Cycle(current));
        }
        let target = doc
            .pointer(current.trim_start_matches('#'))
            .ok_or_else(|| RefError::NotFound(current.clone()))?;
        match target.get("$ref").and_then(Value::as_str) {
            Some(next) => current = next.to_string(),
            None => return Ok(target),
        }
    }
}

/// Return `value` itself, or its `$ref` target when it is a reference object.
pub(crate) fn deref<'a>(doc: &'a Value, value: &'a Value) -> Result<&'a Value, RefError> {
    match value.get("$ref").and_then(Value::as_str) {
        Some(r) => resolve_ref(doc, r),
        None => Ok(value),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefError {
    #[error("unsupported external $ref: {0}")]
    ExternalRef(String),
    #[error("unresolvable $ref: {0}")]
    NotFound(String),
    #[error("cyclic $ref: {0}")]
    Cycle(String),
}
