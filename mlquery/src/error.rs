//! Error types for query operations.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The query text could not be parsed, or it can never match anything.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether this error means "treat the query as unsatisfiable".
    ///
    /// Callers serving search boxes translate these into an empty result
    /// rather than a failure.
    pub fn is_query_syntax(&self) -> bool {
        matches!(self, Error::QuerySyntax(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
