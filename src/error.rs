//! Error types for doc-composer.
//!
//! `StoreError` is what a document store reports. `ComposeError` is what
//! callers of the composer see; store failures are wrapped with their cause.

use thiserror::Error;

/// Failure reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("document '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    /// The store refused the query shape (e.g. range filters on two fields).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Transport or availability failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Authentication or authorization failure.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl StoreError {
    /// Creates a not-found error for the given document.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid-query error with the given message.
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    /// Creates an unavailable error with the given message.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Returns true for the not-found variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Main error type for composer operations.
#[derive(Error, Debug)]
pub enum ComposeError {
    /// A predicate, patch, or id failed static validation. No store call was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single-document operation targeted a missing document.
    #[error("Document '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    /// Any other store failure, with the store's error attached as the source.
    #[error("Backend query error: {0}")]
    Backend(#[source] StoreError),

    /// A stored document could not be decoded into the document shape.
    #[error("Failed to decode document '{id}': {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Caller data could not be encoded as a document.
    #[error("Failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),

    /// Configuration errors (invalid config file, out-of-range options, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ComposeError {
    /// Creates an invalid-argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "Invalid Argument",
            Self::NotFound { .. } => "Not Found",
            Self::Backend(_) => "Backend Error",
            Self::Decode { .. } | Self::Encode(_) => "Serialization Error",
            Self::Config(_) => "Configuration Error",
        }
    }

    /// Returns true if the error means the target document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for ComposeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => Self::NotFound { collection, id },
            other => Self::Backend(other),
        }
    }
}

/// Result type alias using ComposeError.
pub type Result<T> = std::result::Result<T, ComposeError>;
