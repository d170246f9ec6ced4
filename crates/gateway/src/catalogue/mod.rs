mod generator;
mod schema_arena;

pub use generator::{generate_catalogue, parse_openapi_document};
pub use schema_arena::SchemaArena;

use toolgate_common::error::ErrorKind;

const MAX_SCHEMA_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogueError {
    #[error("document could not be parsed as OpenAPI 3.x: {0}")]
    ParseFailed(String),
    #[error("$ref points outside the document: {0}")]
    ExternalRef(String),
    #[error("combined schema size exceeds the 10 MiB cap")]
    SchemaTooLarge,
    #[error("$ref cycle exceeded the resolution depth limit")]
    RefCycle,
}

impl CatalogueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseFailed(_) => ErrorKind::SpecParseFailed,
            Self::ExternalRef(_) => ErrorKind::ExternalRefBlocked,
            Self::SchemaTooLarge | Self::RefCycle => ErrorKind::SpecParseFailed,
        }
    }
}
