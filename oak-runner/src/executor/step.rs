use std::sync::Arc;

use oak_core::openapi::SecurityOption;
use oak_core::SourceSet;
use serde_json::{Map, Value};

use super::http::{scalar_string, HttpError, HttpExecutor, HttpRequest, HttpResponse};
use crate::auth::{AuthProcessor, CredentialError, CredentialProvider, TokenEndpoint};
use crate::env::EnvSource;
use crate::openapi::{OperationFinder, OperationTarget};
use crate::params::{prepare_operation_parameters, OperationDetails, ParameterError};
use crate::server::{RuntimeParams, ServerConfiguration, ServerError, ServerProcessor};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("operation not found: {0}")]
    OperationNotFound(String),
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("credential resolution failed: {0}")]
    Credentials(#[from] CredentialError),
    #[error("transport failure: {0}")]
    Http(#[from] HttpError),
}

/// The raw result of one operation call and the security that applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub source_name: String,
    pub operation_id: Option<String>,
    pub method: String,
    pub url: String,
    pub security: Vec<SecurityOption>,
    pub response: HttpResponse,
}

/// Runs single operations: lookup, parameters, server, credentials, dispatch.
pub struct StepExecutor {
    sources: Arc<SourceSet>,
    servers: ServerProcessor,
    credentials: CredentialProvider,
    http: Arc<dyn HttpExecutor>,
}

impl StepExecutor {
    pub fn new(
        sources: Arc<SourceSet>,
        env: Arc<dyn EnvSource>,
        token_endpoint: Arc<dyn TokenEndpoint>,
        http: Arc<dyn HttpExecutor>,
    ) -> Self {
        let auth = AuthProcessor.process(&sources);
        Self {
            servers: ServerProcessor::new(env.clone()),
            credentials: CredentialProvider::new(auth, env, token_endpoint),
            sources,
            http,
        }
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn finder(&self) -> OperationFinder<'_> {
        OperationFinder::new(&self.sources)
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }

    pub async fn execute_operation(
        &self,
        target: &OperationTarget,
        inputs: &Map<String, Value>,
        runtime_params: Option<&RuntimeParams>,
    ) -> Result<OperationResponse, StepError> {
        let finder = self.finder();
        let op = finder
            .find(target)
            .ok_or_else(|| StepError::OperationNotFound(target.to_string()))?;
        tracing::debug!(
            source = %op.source.name,
            method = op.method,
            path = op.path,
            "resolved operation"
        );

        let details = OperationDetails::from_operation(&op)?;
        let parameters = prepare_operation_parameters(&details, inputs)?;

        let server = op
            .servers()
            .into_iter()
            .next()
            .ok_or_else(|| ServerError::NoServers(op.source.name.clone()))?;
        let config = ServerConfiguration::from_server(&server, op.source.title());
        let base = self.servers.resolve_server_base_url(&config, runtime_params)?;

        // Path parameters only touch the path; server variables were substituted above.
        let mut path = op.path.to_string();
        for (name, value) in &parameters.path {
            path = path.replace(
                &format!("{{{name}}}"),
                &urlencoding::encode(&scalar_string(value)),
            );
        }
        let url = format!("{}{}", base.trim_end_matches('/'), path);

        let security = finder.extract_security_requirements(&op);
        let auth = self
            .credentials
            .resolve_credentials(&security, Some(op.source.name.as_str()))
            .await?;
        if !security.is_empty() && auth.is_empty() {
            tracing::warn!(
                source = %op.source.name,
                path = op.path,
                "no security option could be satisfied; sending unauthenticated"
            );
        }

        let method = op.http_method();
        let request = HttpRequest {
            method: method.clone(),
            url: url.clone(),
            parameters,
            auth,
        };
        let response = self.http.execute_request(request).await?;
        tracing::debug!(%method, %url, status = response.status_code, "operation returned");

        Ok(OperationResponse {
            source_name: op.source.name.clone(),
            operation_id: op.operation_id().map(str::to_string),
            method,
            url,
            security,
            response,
        })
    }
}
