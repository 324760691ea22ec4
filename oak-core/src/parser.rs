use serde::de::DeserializeOwned;

use crate::error::ParseError;
use crate::types::ArazzoDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedDocument<T> {
    pub document: T,
    /// The concrete format used (never `Auto`).
    pub format: DocumentFormat,
}

pub fn parse_document_str(
    input: &str,
    format: DocumentFormat,
) -> Result<ParsedDocument<ArazzoDocument>, ParseError> {
    parse_str(input, format)
}

/// Parse an OpenAPI document into a JSON value. YAML input goes through
/// `serde_yaml::Value` so non-string keys (e.g. unquoted `200:` response
/// codes) become strings; mapping order is preserved.
pub fn parse_openapi_str(input: &str) -> Result<serde_json::Value, ParseError> {
    if input.trim_start().starts_with('{') {
        return Ok(serde_json::from_str(input)?);
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(input)?;
    Ok(serde_json::to_value(yaml)?)
}

/// Parse `input` as JSON or YAML.
///
/// With [`DocumentFormat::Auto`], input that looks like JSON (`{`/`[`) is
/// tried as JSON first, everything else as YAML first; the other format is the
/// fallback and the error of the first attempt is reported.
pub fn parse_str<T: DeserializeOwned>(
    input: &str,
    format: DocumentFormat,
) -> Result<ParsedDocument<T>, ParseError> {
    match format {
        DocumentFormat::Json => Ok(ParsedDocument {
            document: serde_json::from_str(input)?,
            format,
        }),
        DocumentFormat::Yaml => Ok(ParsedDocument {
            document: serde_yaml::from_str(input)?,
            format,
        }),
        DocumentFormat::Auto => {
            let trimmed = input.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str(input) {
                    Ok(document) => Ok(ParsedDocument {
                        document,
                        format: DocumentFormat::Json,
                    }),
                    Err(e) => {
                        tracing::debug!(error = %e, "JSON parse failed; retrying as YAML");
                        serde_yaml::from_str(input)
                            .map(|document| ParsedDocument {
                                document,
                                format: DocumentFormat::Yaml,
                            })
                            .map_err(|_| ParseError::Json(e))
                    }
                }
            } else {
                match serde_yaml::from_str(input) {
                    Ok(document) => Ok(ParsedDocument {
                        document,
                        format: DocumentFormat::Yaml,
                    }),
                    Err(e) => serde_json::from_str(input)
                        .map(|document| ParsedDocument {
                            document,
                            format: DocumentFormat::Json,
                        })
                        .map_err(|_| ParseError::Yaml(e)),
                }
            }
        }
    }
}
