//! Security schemes, credential environment mappings, and credential resolution.

mod error;
mod model;
mod oauth;
mod processor;
mod provider;
mod value;

pub use error::CredentialError;
pub use model::{
    AuthLocation, AuthRequirement, AuthType, AuthUrls, EnvMappings, EnvVarKey, RequestAuthValue,
    SchemeEnvVars,
};
pub use oauth::{ReqwestTokenEndpoint, TokenEndpoint, TokenResponse};
pub use processor::{env_var_name, AuthConfig, AuthProcessor};
pub use provider::CredentialProvider;
pub use value::SecretValue;
