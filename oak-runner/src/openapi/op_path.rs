use oak_core::openapi::decode_pointer_token;

/// A parsed `operationPath` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPathRef {
    pub source_name: String,
    /// JSON pointer into the source document (without the leading `#`).
    pub pointer: String,
    /// Lower-case HTTP method.
    pub method: String,
    /// Templated path, unescaped.
    pub path: String,
}

/// Parse `{$sourceDescriptions.<name>.url}#/paths/<escaped-path>/<method>`.
pub fn parse_operation_path(op_path: &str) -> Result<OperationPathRef, String> {
    let (before_hash, after_hash) = op_path
        .split_once('#')
        .ok_or_else(|| "operationPath must include a '#/paths/..' JSON pointer".to_string())?;

    let source_name = source_name_from_template(before_hash)
        .ok_or_else(|| "operationPath must contain {$sourceDescriptions.<name>.url}".to_string())?;

    if !after_hash.starts_with('/') {
        return Err("invalid JSON pointer fragment in operationPath".to_string());
    }
    let parts: Vec<&str> = after_hash.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 || parts[0] != "paths" {
        return Err("operationPath pointer must point at /paths/<path>/<method>".to_string());
    }

    Ok(OperationPathRef {
        source_name,
        pointer: after_hash.to_string(),
        method: parts[2].to_ascii_lowercase(),
        path: decode_pointer_token(parts[1]),
    })
}

fn source_name_from_template(s: &str) -> Option<String> {
    const OPEN: &str = "{$sourceDescriptions.";
    let start = s.find(OPEN)? + OPEN.len();
    let (name, rest) = s[start..].split_once('.')?;
    rest.starts_with("url}").then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_escaped_path_and_method() {
        let r = parse_operation_path(
            "{$sourceDescriptions.petStore.url}#/paths/~1pet~1{petId}/GET",
        )
        .unwrap();
        assert_eq!(r.source_name, "petStore");
        assert_eq!(r.path, "/pet/{petId}");
        assert_eq!(r.method, "get");
        assert_eq!(r.pointer, "/paths/~1pet~1{petId}/GET");
    }

    #[test]
    fn requires_source_reference() {
        assert!(parse_operation_path("https://x/openapi.json#/paths/~1a/get").is_err());
        assert!(parse_operation_path("{$sourceDescriptions.a.url}#/components/x").is_err());
    }
}
