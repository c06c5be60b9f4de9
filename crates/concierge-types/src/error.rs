use thiserror::Error;

/// Errors raised while building the handler registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler '{0}' has no intent patterns")]
    EmptyPatterns(String),

    #[error("handler '{0}' has no usable intent patterns (all were malformed)")]
    NoValidPatterns(String),

    #[error("handler '{0}' is already registered")]
    DuplicateName(String),

    #[error("handler not found: {0}")]
    UnknownHandler(String),
}

/// Errors a capability handler may return. The dispatcher treats any of
/// these as "no match" and falls through to the provider router.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Errors from repository operations (used by collaborator traits in concierge-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors raised while turning configuration into live providers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid provider profile '{id}': {reason}")]
    InvalidProviderProfile { id: String, reason: String },

    #[error("provider '{0}' is configured more than once")]
    DuplicateProvider(String),

    #[error("missing API key: environment variable '{0}' is not set")]
    MissingApiKey(String),
}
