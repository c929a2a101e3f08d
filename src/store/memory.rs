//! In-memory document stores for tests and local development.
//!
//! `MemoryStore` follows the hosted store's query semantics, including its
//! refusal of range filters on more than one field, and records every query
//! it receives. `FailingStore` wraps it to inject failures.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use super::types::{compare_values, matches};
use super::{DocumentStore, StoreDocument, StoreQuery, StoreResult};
use crate::error::StoreError;

type Collection = BTreeMap<String, Map<String, Value>>;

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<String, Collection>>,
    issued: Mutex<Vec<StoreQuery>>,
    next_id: AtomicU64,
}

/// A document store held in memory. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document from a JSON object, replacing any existing one.
    ///
    /// Non-object values are stored as an empty document.
    pub async fn insert_json(&self, collection: &str, id: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.inner
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Every query received so far, in arrival order.
    pub async fn issued_queries(&self) -> Vec<StoreQuery> {
        self.inner.issued.lock().await.clone()
    }

    /// Forgets the recorded queries.
    pub async fn clear_issued(&self) {
        self.inner.issued.lock().await.clear();
    }

    fn next_id(&self) -> String {
        let n = self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        format!("auto-{n:06}")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn run_query(&self, query: &StoreQuery) -> StoreResult<Vec<StoreDocument>> {
        self.inner.issued.lock().await.push(query.clone());

        let range_fields = query.range_fields();
        if range_fields.len() > 1 {
            return Err(StoreError::invalid_query(format!(
                "range filters on multiple fields: {}",
                range_fields.join(", ")
            )));
        }

        let collections = self.inner.collections.read().await;
        let mut rows: Vec<StoreDocument> = collections
            .get(&query.collection)
            .into_iter()
            .flatten()
            .map(|(id, fields)| StoreDocument::new(id.clone(), fields.clone()))
            .filter(|doc| query.filters.iter().all(|p| matches(doc, p)))
            .collect();
        drop(collections);

        // Range queries come back ordered by the range field, then by id.
        if let Some(field) = range_fields.first() {
            rows.sort_by(|a, b| match (a.field(field), b.field(field)) {
                (Some(x), Some(y)) => {
                    compare_values(x, y).unwrap_or(std::cmp::Ordering::Equal)
                }
                _ => std::cmp::Ordering::Equal,
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<String> {
        let mut collections = self.inner.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        // Generated ids skip keys already taken through `set`.
        loop {
            if let Entry::Vacant(slot) = docs.entry(self.next_id()) {
                let id = slot.key().clone();
                slot.insert(fields);
                return Ok(id);
            }
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.inner
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<()> {
        let mut collections = self.inner.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        for (path, value) in patch {
            set_path(doc, &path, value);
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoreDocument>> {
        Ok(self
            .inner
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| StoreDocument::new(id, fields.clone())))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner
            .collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }
}

/// Writes `value` at a dotted path, creating intermediate maps.
fn set_path(doc: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

/// A [`MemoryStore`] that fails selected operations with `Unavailable`.
pub struct FailingStore {
    inner: MemoryStore,
    all_queries: bool,
    query_fields: HashSet<String>,
    mutation_ids: HashSet<String>,
}

impl FailingStore {
    /// Wraps a store; nothing fails until configured.
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            all_queries: false,
            query_fields: HashSet::new(),
            mutation_ids: HashSet::new(),
        }
    }

    /// Fails every query.
    pub fn fail_all_queries(mut self) -> Self {
        self.all_queries = true;
        self
    }

    /// Fails queries that filter on `field`.
    pub fn fail_queries_on(mut self, field: impl Into<String>) -> Self {
        self.query_fields.insert(field.into());
        self
    }

    /// Fails updates and deletes of the document `id`.
    pub fn fail_mutations_of(mut self, id: impl Into<String>) -> Self {
        self.mutation_ids.insert(id.into());
        self
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check_mutation(&self, id: &str) -> StoreResult<()> {
        if self.mutation_ids.contains(id) {
            Err(StoreError::unavailable(format!("injected failure for '{id}'")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn run_query(&self, query: &StoreQuery) -> StoreResult<Vec<StoreDocument>> {
        let hit = self.all_queries
            || query
                .filters
                .iter()
                .any(|p| self.query_fields.contains(&p.field));
        if hit {
            return Err(StoreError::unavailable(format!("injected failure for {query}")));
        }
        self.inner.run_query(query).await
    }

    async fn add(&self, collection: &str, fields: Map<String, Value>) -> StoreResult<String> {
        self.inner.add(collection, fields).await
    }

    async fn set(&self, collection: &str, id: &str, fields: Map<String, Value>) -> StoreResult<()> {
        self.inner.set(collection, id, fields).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<()> {
        self.check_mutation(id)?;
        self.inner.update(collection, id, patch).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoreDocument>> {
        self.inner.get(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.check_mutation(id)?;
        self.inner.delete(collection, id).await
    }
}
