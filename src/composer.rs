//! Typed access to one collection of a document store.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ComposerOptions;
use crate::error::{ComposeError, Result, StoreError};
use crate::model::{encode, Model, Patch, Record};
use crate::query::{validate_all, Predicate, QueryExecutor, QueryPlan};
use crate::store::{DocumentStore, StoreDocument};

/// CRUD and filtered queries over one collection, decoded as `T`.
///
/// The store handle is shared, never closed or reconfigured here. A composer
/// holds no per-call state, so clones and concurrent calls are independent.
pub struct Composer<T> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    options: ComposerOptions,
    _shape: PhantomData<fn() -> T>,
}

impl<T> Clone for Composer<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            options: self.options.clone(),
            _shape: PhantomData,
        }
    }
}

/// Outcome of `delete_matching` / `update_matching`.
///
/// These operations are not atomic: a failure part-way leaves earlier
/// mutations in place, and retrying may apply them again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    /// Documents the filter matched at enumeration time.
    pub matched: usize,
    /// Documents actually deleted or updated.
    pub applied: usize,
    /// Matched documents that were gone by the time they were mutated.
    pub vanished: usize,
}

enum Applied {
    Done,
    Vanished,
}

impl<T: Model> Composer<T> {
    /// Creates a composer with default options.
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            options: ComposerOptions::default(),
            _shape: PhantomData,
        }
    }

    /// Creates a composer with the given options.
    pub fn with_options(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        options: ComposerOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            store,
            collection: collection.into(),
            options,
            _shape: PhantomData,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn options(&self) -> &ComposerOptions {
        &self.options
    }

    /// Adds a document. A missing or blank id lets the store assign one.
    /// Returns the document's id.
    pub async fn create(&self, data: &T, id: Option<&str>) -> Result<String> {
        let fields = encode(data)?;
        match id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                self.store.set(&self.collection, id, fields).await?;
                Ok(id.to_string())
            }
            None => Ok(self.store.add(&self.collection, fields).await?),
        }
    }

    /// Reads one document.
    pub async fn get(&self, id: &str) -> Result<Record<T>> {
        let id = require_id(id)?;
        let doc = self
            .store
            .get(&self.collection, id)
            .await?
            .ok_or_else(|| StoreError::not_found(&self.collection, id))?;
        Record::decode(doc)
    }

    /// Creates or overwrites a document under `id`.
    pub async fn set(&self, id: &str, data: &T) -> Result<()> {
        let id = require_id(id)?;
        let fields = encode(data)?;
        self.store.set(&self.collection, id, fields).await?;
        Ok(())
    }

    /// Applies a partial update to an existing document.
    pub async fn update(&self, id: &str, patch: &Patch) -> Result<()> {
        let id = require_id(id)?;
        patch.validate::<T>()?;
        self.store
            .update(&self.collection, id, patch.fields().clone())
            .await?;
        Ok(())
    }

    /// Deletes one document.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = require_id(id)?;
        self.store.delete(&self.collection, id).await?;
        Ok(())
    }

    /// Returns the documents matching every predicate.
    ///
    /// Range predicates (`<`, `<=`, `>`, `>=`) each run as a separate store
    /// query alongside the equality-only base query, and the results are
    /// intersected. Without range predicates the result order is the store's;
    /// with them it follows the first range predicate's query. Either way it
    /// is store-dependent. A limit of `None` or `Some(0)` is unbounded.
    pub async fn query(
        &self,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> Result<Vec<Record<T>>> {
        self.fetch(predicates, limit)
            .await?
            .into_iter()
            .map(Record::decode)
            .collect()
    }

    /// Returns the first matching document, or `None` when nothing matches.
    ///
    /// With range predicates the full intersection is computed before taking
    /// the first element, which costs more than limiting each branch but
    /// cannot miss a match.
    pub async fn query_first(&self, predicates: &[Predicate]) -> Result<Option<Record<T>>> {
        Ok(self.query(predicates, Some(1)).await?.into_iter().next())
    }

    /// Deletes every document matching the predicates.
    ///
    /// Matches are enumerated first, then deleted concurrently. Documents
    /// that disappear in between count as `vanished`. Any other failure fails
    /// the call without undoing deletes that already happened.
    pub async fn delete_matching(&self, predicates: &[Predicate]) -> Result<MutationReport> {
        let store = &self.store;
        let collection = self.collection.as_str();
        self.apply_to_matches(predicates, "delete", |id| async move {
            store.delete(collection, &id).await
        })
        .await
    }

    /// Applies `patch` to every document matching the predicates.
    ///
    /// Same enumeration and failure semantics as [`delete_matching`].
    ///
    /// [`delete_matching`]: Self::delete_matching
    pub async fn update_matching(
        &self,
        predicates: &[Predicate],
        patch: &Patch,
    ) -> Result<MutationReport> {
        patch.validate::<T>()?;
        let store = &self.store;
        let collection = self.collection.as_str();
        self.apply_to_matches(predicates, "update", |id| async move {
            store.update(collection, &id, patch.fields().clone()).await
        })
        .await
    }

    async fn fetch(
        &self,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> Result<Vec<StoreDocument>> {
        validate_all::<T>(predicates, self.options.max_value_set)?;

        let plan = QueryPlan::build(&self.collection, predicates, limit);
        debug!(
            collection = %self.collection,
            equality = plan.base.filters.len(),
            ranges = plan.ranges.len(),
            limit = ?plan.limit,
            "planned query"
        );

        let executor = QueryExecutor::new(self.store.as_ref(), self.options.join_key);
        Ok(executor.execute(&plan).await?.documents)
    }

    async fn apply_to_matches<F, Fut>(
        &self,
        predicates: &[Predicate],
        action: &'static str,
        mutate: F,
    ) -> Result<MutationReport>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = std::result::Result<(), StoreError>>,
    {
        let matched = self.fetch(predicates, None).await?;
        let mut report = MutationReport {
            matched: matched.len(),
            ..MutationReport::default()
        };

        let outcomes = stream::iter(matched)
            .map(|doc| {
                let pending = mutate(doc.id.clone());
                async move {
                    match pending.await {
                        Ok(()) => Ok(Applied::Done),
                        Err(e) if e.is_not_found() => {
                            warn!(
                                collection = %self.collection,
                                id = %doc.id,
                                "document vanished before {action}"
                            );
                            Ok(Applied::Vanished)
                        }
                        Err(e) => Err(ComposeError::Backend(e)),
                    }
                }
            })
            .buffer_unordered(self.options.mutation_concurrency)
            .try_collect::<Vec<Applied>>()
            .await?;

        for outcome in outcomes {
            match outcome {
                Applied::Done => report.applied += 1,
                Applied::Vanished => report.vanished += 1,
            }
        }

        debug!(
            collection = %self.collection,
            action,
            matched = report.matched,
            applied = report.applied,
            vanished = report.vanished,
            "mutation finished"
        );
        Ok(report)
    }
}

fn require_id(id: &str) -> Result<&str> {
    if id.trim().is_empty() {
        Err(ComposeError::invalid_argument("'id' is required"))
    } else {
        Ok(id)
    }
}
