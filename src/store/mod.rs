//! Document store abstraction for doc-composer.
//!
//! Provides a trait-based interface to the hosted document store, so the
//! composer can run against any backend (or the in-memory store in tests)
//! through an injected handle.

mod memory;
mod types;

pub use memory::{FailingStore, MemoryStore};
pub use types::{compare_values, values_equal, StoreDocument, StoreQuery};

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait defining the capabilities the composer needs from a document store.
///
/// A store may execute several equality filters in one query but is allowed
/// to reject range filters on more than one field. All operations are async;
/// deadlines and retries are the implementation's concern.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Runs a query and returns matching documents in the store's native order.
    async fn run_query(&self, query: &StoreQuery) -> StoreResult<Vec<StoreDocument>>;

    /// Adds a document under a store-assigned id and returns that id.
    async fn add(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<String>;

    /// Creates or overwrites the document with the given id.
    async fn set(&self, collection: &str, id: &str, fields: Map<String, Value>) -> StoreResult<()>;

    /// Applies a partial update. Fails with `NotFound` if the document is absent.
    async fn update(&self, collection: &str, id: &str, patch: Map<String, Value>)
        -> StoreResult<()>;

    /// Reads a single document.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoreDocument>>;

    /// Deletes a document. Fails with `NotFound` if the document is absent.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
