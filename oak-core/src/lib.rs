#![forbid(unsafe_code)]

//! Document model for the oak runner: Arazzo workflow types, typed views over
//! OpenAPI documents, and the runtime-expression grammar.

pub mod error;
pub mod expressions;
pub mod openapi;
pub mod parser;
pub mod types;

pub use crate::error::ParseError;
pub use crate::openapi::{SourceDescription, SourceSet};
pub use crate::parser::{
    parse_document_str, parse_openapi_str, parse_str, DocumentFormat, ParsedDocument,
};
pub use crate::types::ArazzoDocument;
