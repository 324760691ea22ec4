use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::CredentialError;

/// Raw reply from a token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub status: u16,
    pub body: Value,
}

/// Posts an `application/x-www-form-urlencoded` token request.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn request_token(
        &self,
        token_url: &str,
        form: &[(String, String)],
    ) -> Result<TokenResponse, CredentialError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTokenEndpoint {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTokenEndpoint {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl TokenEndpoint for ReqwestTokenEndpoint {
    async fn request_token(
        &self,
        token_url: &str,
        form: &[(String, String)],
    ) -> Result<TokenResponse, CredentialError> {
        let transport = |e: reqwest::Error| CredentialError::Transport {
            token_url: token_url.to_string(),
            message: e.to_string(),
        };
        let resp = self
            .client
            .post(token_url)
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(transport)?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(TokenResponse { status, body })
    }
}
