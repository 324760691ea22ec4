use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine as _;
use oak_core::openapi::{SecurityOption, SecurityRequirement};
use oak_core::{parse_openapi_str, SourceSet};
use oak_runner::auth::{
    AuthLocation, AuthProcessor, AuthType, CredentialError, CredentialProvider, EnvVarKey,
    TokenEndpoint, TokenResponse,
};
use oak_runner::env::MapEnv;
use serde_json::json;

const PETSTORE: &str = r#"
openapi: 3.0.3
info:
  title: Petstore API
  version: "1"
paths: {}
components:
  securitySchemes:
    api_key:
      type: apiKey
      name: api_key
      in: query
    bearer:
      type: http
      scheme: bearer
    basic:
      type: http
      scheme: basic
    oauth:
      type: oauth2
      flows:
        clientCredentials:
          tokenUrl: https://auth.example.com/token
          scopes:
            read: read things
    tls:
      type: mutualTLS
"#;

const BILLING: &str = r#"
openapi: 3.0.3
info:
  title: Billing Service
  version: "1"
paths: {}
components:
  securitySchemes:
    bearer:
      type: http
      scheme: bearer
"#;

#[derive(Default)]
struct MockTokenEndpoint {
    status: u16,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn request_token(
        &self,
        token_url: &str,
        form: &[(String, String)],
    ) -> Result<TokenResponse, CredentialError> {
        self.calls
            .lock()
            .unwrap()
            .push((token_url.to_string(), form.to_vec()));
        Ok(TokenResponse {
            status: self.status,
            body: json!({ "access_token": "fetched-token", "token_type": "bearer" }),
        })
    }
}

fn sources() -> SourceSet {
    SourceSet::from_documents([
        ("petstore", parse_openapi_str(PETSTORE).unwrap()),
        ("billing", parse_openapi_str(BILLING).unwrap()),
    ])
}

fn provider(env: MapEnv, endpoint: Arc<MockTokenEndpoint>) -> CredentialProvider {
    let config = AuthProcessor.process(&sources());
    CredentialProvider::new(config, Arc::new(env), endpoint)
}

fn option(names: &[&str]) -> SecurityOption {
    SecurityOption::new(names.iter().map(|n| SecurityRequirement::new(*n)).collect())
}

fn endpoint(status: u16) -> Arc<MockTokenEndpoint> {
    Arc::new(MockTokenEndpoint {
        status,
        ..Default::default()
    })
}

#[test]
fn processor_builds_requirements_and_env_names() {
    let config = AuthProcessor.process(&sources());

    // mutualTLS is skipped; oauth yields one requirement per flow.
    assert_eq!(config.requirements.len(), 5);
    let api_key = config
        .requirements
        .iter()
        .find(|r| r.security_scheme_name == "api_key")
        .unwrap();
    assert_eq!(api_key.auth_type, AuthType::ApiKey);
    assert_eq!(api_key.location, Some(AuthLocation::Query));
    assert_eq!(api_key.api_title.as_deref(), Some("Petstore API"));

    let vars = config.env_mappings.lookup("api_key", None).unwrap();
    assert_eq!(vars.slot(EnvVarKey::ApiKey), Some("PETSTORE_API_KEY_APIKEY"));

    let oauth = config.env_mappings.lookup("oauth", None).unwrap();
    assert_eq!(
        oauth.flow_slot(
            oak_core::openapi::OAuthFlowType::ClientCredentials,
            EnvVarKey::ClientSecret
        ),
        Some("PETSTORE_OAUTH_CLIENTCREDENTIALS_CLIENT_SECRET")
    );
}

#[test]
fn colliding_scheme_names_are_scoped_per_source() {
    let config = AuthProcessor.process(&sources());
    assert!(config.env_mappings.single.get("bearer").is_none());
    assert!(config.env_mappings.lookup("bearer", None).is_none());

    let pet = config.env_mappings.lookup("bearer", Some("petstore")).unwrap();
    let billing = config.env_mappings.lookup("bearer", Some("billing")).unwrap();
    assert_eq!(pet.slot(EnvVarKey::Token), Some("PETSTORE_BEARER_TOKEN"));
    assert_eq!(billing.slot(EnvVarKey::Token), Some("BILLING_BEARER_TOKEN"));
}

#[tokio::test]
async fn and_option_resolves_all_or_nothing() {
    let env = MapEnv::new()
        .with("PETSTORE_API_KEY_APIKEY", "k-123")
        .with("PETSTORE_BASIC_USERNAME", "alice")
        .with("PETSTORE_BASIC_PASSWORD", "s3cret");
    let p = provider(env, endpoint(200));

    let values = p
        .resolve_credentials(&[option(&["api_key", "basic"])], Some("petstore"))
        .await
        .unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].name, "api_key");
    assert_eq!(values[0].location, AuthLocation::Query);
    assert_eq!(values[0].auth_value.expose(), "k-123");

    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("alice:s3cret")
    );
    assert_eq!(values[1].name, "Authorization");
    assert_eq!(values[1].auth_value.expose(), expected);

    // Missing the bearer token drops the whole option.
    let values = p
        .resolve_credentials(&[option(&["api_key", "bearer"])], Some("petstore"))
        .await
        .unwrap();
    assert!(values.is_empty());
}

#[tokio::test]
async fn or_options_are_all_surfaced() {
    let env = MapEnv::new()
        .with("PETSTORE_API_KEY_APIKEY", "k")
        .with("PETSTORE_BEARER_TOKEN", "tok");
    let p = provider(env, endpoint(200));

    let values = p
        .resolve_credentials(
            &[option(&["api_key"]), option(&["basic"]), option(&["bearer"])],
            Some("petstore"),
        )
        .await
        .unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].auth_value.expose(), "k");
    assert_eq!(values[1].auth_value.expose(), "Bearer tok");
}

#[tokio::test]
async fn scoped_scheme_uses_the_source_variable() {
    let env = MapEnv::new()
        .with("PETSTORE_BEARER_TOKEN", "pet")
        .with("BILLING_BEARER_TOKEN", "bill");
    let p = provider(env, endpoint(200));

    let values = p
        .resolve_credentials(&[option(&["bearer"])], Some("billing"))
        .await
        .unwrap();
    assert_eq!(values[0].auth_value.expose(), "Bearer bill");

    let values = p.resolve_credentials(&[option(&["bearer"])], None).await.unwrap();
    assert!(values.is_empty(), "ambiguous without a source name");
}

#[tokio::test]
async fn oauth_static_token_skips_token_endpoint() {
    let env = MapEnv::new().with("PETSTORE_OAUTH_CLIENTCREDENTIALS_TOKEN", "static");
    let ep = endpoint(200);
    let p = provider(env, ep.clone());

    let values = p
        .resolve_credentials(&[option(&["oauth"])], Some("petstore"))
        .await
        .unwrap();
    assert_eq!(values[0].auth_value.expose(), "Bearer static");
    assert!(ep.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn oauth_client_credentials_exchange() {
    let env = MapEnv::new()
        .with("PETSTORE_OAUTH_CLIENTCREDENTIALS_CLIENT_ID", "cid")
        .with("PETSTORE_OAUTH_CLIENTCREDENTIALS_CLIENT_SECRET", "csecret");
    let ep = endpoint(200);
    let p = provider(env, ep.clone());

    let opt = SecurityOption::single(SecurityRequirement::new("oauth").with_scopes(["read", "write"]));
    let values = p.resolve_credentials(&[opt], Some("petstore")).await.unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].auth_value.expose(), "Bearer fetched-token");

    let calls = ep.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (url, form) = &calls[0];
    assert_eq!(url, "https://auth.example.com/token");
    let field = |k: &str| form.iter().find(|(n, _)| n == k).map(|(_, v)| v.as_str());
    assert_eq!(field("grant_type"), Some("client_credentials"));
    assert_eq!(field("client_id"), Some("cid"));
    assert_eq!(field("client_secret"), Some("csecret"));
    assert_eq!(field("scope"), Some("\"read write\""));
}

#[tokio::test]
async fn token_endpoint_error_fails_resolution() {
    let env = MapEnv::new()
        .with("PETSTORE_OAUTH_CLIENTCREDENTIALS_CLIENT_ID", "cid")
        .with("PETSTORE_OAUTH_CLIENTCREDENTIALS_CLIENT_SECRET", "bad");
    let p = provider(env, endpoint(401));

    let err = p
        .resolve_credentials(&[option(&["oauth"])], Some("petstore"))
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialError::TokenEndpoint { status: 401, .. }));
}

#[tokio::test]
async fn empty_option_list_yields_nothing() {
    let p = provider(MapEnv::new(), endpoint(200));
    assert!(p.resolve_credentials(&[], None).await.unwrap().is_empty());
    assert!(p
        .resolve_credentials(&[SecurityOption::default()], None)
        .await
        .unwrap()
        .is_empty());
}
