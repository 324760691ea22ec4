use serde_json::Value;

/// A validated RFC 6901 JSON pointer (`""` or `/a/b`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPointer {
    raw: String,
}

impl JsonPointer {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parse(fragment: &str) -> Result<Self, JsonPointerError> {
        if fragment.is_empty() {
            return Ok(Self { raw: String::new() });
        }
        if !fragment.starts_with('/') {
            return Err(JsonPointerError::InvalidPrefix);
        }
        let mut chars = fragment.chars();
        while let Some(ch) = chars.next() {
            if ch == '~' && !matches!(chars.next(), Some('0' | '1')) {
                return Err(JsonPointerError::InvalidEscape);
            }
        }
        Ok(Self {
            raw: fragment.to_string(),
        })
    }

    /// Build a pointer from unescaped path segments.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let mut raw = String::new();
        for s in segments {
            raw.push('/');
            raw.push_str(&s.as_ref().replace('~', "~0").replace('/', "~1"));
        }
        Self { raw }
    }

    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        value.pointer(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonPointerError {
    #[error("json pointer must start with '/'")]
    InvalidPrefix,
    #[error("json pointer contains invalid escape (only ~0 and ~1 are allowed)")]
    InvalidEscape,
}
