#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("token endpoint {token_url} returned HTTP {status}")]
    TokenEndpoint { token_url: String, status: u16 },
    #[error("token endpoint {token_url} response has no access_token")]
    MissingAccessToken { token_url: String },
    #[error("token request to {token_url} failed: {message}")]
    Transport { token_url: String, message: String },
}
