//! Typed views over parsed OpenAPI documents.
//!
//! Documents stay as `serde_json::Value` (they are large and mostly irrelevant
//! to execution); only the shapes the runner consumes are lifted into types.

mod document;
mod operation;
mod refs;
mod security;
mod server;

pub use document::{effective_servers, SourceDescription, SourceSet};
pub use operation::{ParameterLocation, ParameterSpec, RequestBodySpec};
pub use refs::{resolve_ref, RefError};
pub use security::{
    parse_security, ApiKeyLocation, HttpAuthScheme, OAuthFlow, OAuthFlowType, OAuthFlows,
    SecurityOption, SecurityRequirement, SecurityScheme,
};
pub use server::{ServerObject, ServerVariableObject};

pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Decode one RFC 6901 reference token.
pub fn decode_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
