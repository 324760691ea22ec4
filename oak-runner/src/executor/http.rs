use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::auth::{AuthLocation, RequestAuthValue};
use crate::config::RunnerConfig;
use crate::params::{OperationParameters, RequestBody};

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("timeout")]
    Timeout,
    #[error("connect/dns/tls error: {0}")]
    Network(String),
    #[error("response too large (>{max_bytes} bytes)")]
    ResponseTooLarge { max_bytes: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("http error: {0}")]
    Other(String),
}

/// A fully resolved request. Path parameters are already substituted into
/// `url`; `parameters.path` is kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub parameters: OperationParameters,
    pub auth: Vec<RequestAuthValue>,
}

impl HttpRequest {
    /// Move auth values into the header/query/cookie buckets.
    pub fn apply_auth(&mut self) {
        for value in self.auth.drain(..) {
            let bucket = match value.location {
                AuthLocation::Header => &mut self.parameters.header,
                AuthLocation::Query => &mut self.parameters.query,
                AuthLocation::Cookie => &mut self.parameters.cookie,
            };
            bucket.insert(value.name, Value::String(value.auth_value.expose().to_string()));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON when the body is JSON, else a string; `Null` when empty.
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute_request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

pub struct ReqwestHttpExecutor {
    client: reqwest::Client,
    timeout: Duration,
    max_response_bytes: usize,
}

impl ReqwestHttpExecutor {
    pub fn new(config: &RunnerConfig) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("oak-runner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Other(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &RunnerConfig) -> Self {
        Self {
            client,
            timeout: config.http_timeout,
            max_response_bytes: config.max_response_bytes,
        }
    }
}

#[async_trait]
impl HttpExecutor for ReqwestHttpExecutor {
    async fn execute_request(&self, mut request: HttpRequest) -> Result<HttpResponse, HttpError> {
        request.apply_auth();
        let method: reqwest::Method = request
            .method
            .to_ascii_uppercase()
            .parse()
            .map_err(|e: <reqwest::Method as std::str::FromStr>::Err| {
                HttpError::InvalidRequest(e.to_string())
            })?;

        let mut url = url::Url::parse(&request.url)
            .map_err(|e| HttpError::InvalidRequest(format!("{}: {e}", request.url)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &request.parameters.query {
                for s in query_values(v) {
                    pairs.append_pair(k, &s);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        tracing::debug!(%method, url = %url, "dispatching request");
        let mut rb = self.client.request(method, url).timeout(self.timeout);
        for (k, v) in &request.parameters.header {
            rb = rb.header(k.as_str(), scalar_string(v));
        }
        if !request.parameters.cookie.is_empty() {
            let cookie = request
                .parameters
                .cookie
                .iter()
                .map(|(k, v)| format!("{k}={}", scalar_string(v)))
                .collect::<Vec<_>>()
                .join("; ");
            rb = rb.header(reqwest::header::COOKIE, cookie);
        }
        if let Some(body) = &request.parameters.body {
            rb = encode_body(rb, body)?;
        }

        let resp = rb.send().await.map_err(map_reqwest_error)?;
        let status_code = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_ascii_lowercase(), v.to_str().ok()?.to_string())))
            .collect();

        let bytes = resp.bytes().await.map_err(map_reqwest_error)?;
        if bytes.len() > self.max_response_bytes {
            return Err(HttpError::ResponseTooLarge {
                max_bytes: self.max_response_bytes,
            });
        }

        Ok(HttpResponse {
            status_code,
            headers,
            body: decode_body(&bytes),
        })
    }
}

fn encode_body(
    rb: reqwest::RequestBuilder,
    body: &RequestBody,
) -> Result<reqwest::RequestBuilder, HttpError> {
    let ct = body.content_type.to_ascii_lowercase();
    let rb = rb.header(reqwest::header::CONTENT_TYPE, body.content_type.as_str());
    if ct.contains("json") {
        let bytes = serde_json::to_vec(&body.payload)
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
        return Ok(rb.body(bytes));
    }
    if ct == "application/x-www-form-urlencoded" {
        let form = match &body.payload {
            Value::Object(map) => form_pairs(map),
            other => {
                return Err(HttpError::InvalidRequest(format!(
                    "form body must be an object, got {other}"
                )))
            }
        };
        let encoded = form
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        return Ok(rb.body(encoded));
    }
    // text/* and anything else: a lone string value is sent raw, otherwise JSON text.
    let text = match &body.payload {
        Value::Object(map) if map.len() == 1 => map.values().next().map(scalar_string).unwrap_or_default(),
        other => scalar_string(other),
    };
    Ok(rb.body(text))
}

fn form_pairs(map: &Map<String, Value>) -> Vec<(String, String)> {
    map.iter()
        .flat_map(|(k, v)| query_values(v).into_iter().map(move |s| (k.clone(), s)))
        .collect()
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Arrays explode into repeated values; `null` is dropped.
fn query_values(v: &Value) -> Vec<String> {
    match v {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter(|i| !i.is_null()).map(scalar_string).collect(),
        other => vec![scalar_string(other)],
    }
}

pub(crate) fn scalar_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return HttpError::Network(e.to_string());
    }
    HttpError::Other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_auth_places_values_by_location() {
        let mut req = HttpRequest {
            method: "GET".into(),
            url: "https://api.example.com/pets".into(),
            parameters: OperationParameters::default(),
            auth: vec![
                RequestAuthValue::header("Authorization", "Bearer t"),
                RequestAuthValue {
                    name: "api_key".into(),
                    location: AuthLocation::Query,
                    auth_value: crate::auth::SecretValue::new("k"),
                },
            ],
        };
        req.apply_auth();
        assert!(req.auth.is_empty());
        assert_eq!(req.parameters.header["Authorization"], json!("Bearer t"));
        assert_eq!(req.parameters.query["api_key"], json!("k"));
    }

    #[test]
    fn decodes_json_or_text() {
        assert_eq!(decode_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_body(b"plain"), json!("plain"));
        assert_eq!(decode_body(b""), Value::Null);
    }
}
