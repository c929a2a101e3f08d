//! Enumeration-based delete and update tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use doc_composer::store::{FailingStore, StoreResult};
use doc_composer::{
    ComposeError, Composer, ComposerOptions, DocumentStore, MemoryStore, MutationReport, Patch,
    Predicate, StoreDocument, StoreQuery,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use super::common::{bikes, garage_store, ids, Bike, BIKES};

#[tokio::test]
async fn test_delete_matching_then_query_is_empty() {
    let store = garage_store().await;
    let composer = bikes(&store);
    let predicates = [Predicate::eq("BRAND", "Ducati"), Predicate::gt("HP", 80)];

    let report = composer.delete_matching(&predicates).await.unwrap();

    assert_eq!(
        report,
        MutationReport {
            matched: 1,
            applied: 1,
            vanished: 0,
        }
    );
    assert!(composer.query(&predicates, None).await.unwrap().is_empty());

    let left = composer.query(&[], None).await.unwrap();
    assert_eq!(ids(&left), vec!["d1", "k1", "s1"]);
}

#[tokio::test]
async fn test_delete_matching_without_predicates_clears_collection() {
    let store = garage_store().await;

    let report = bikes(&store).delete_matching(&[]).await.unwrap();

    assert_eq!(report.matched, 4);
    assert_eq!(report.applied, 4);
    assert_eq!(store.len(BIKES).await, 0);
}

#[tokio::test]
async fn test_delete_matching_nothing() {
    let store = garage_store().await;

    let report = bikes(&store)
        .delete_matching(&[Predicate::eq("BRAND", "Honda")])
        .await
        .unwrap();

    assert_eq!(report, MutationReport::default());
    assert_eq!(store.len(BIKES).await, 4);
}

#[tokio::test]
async fn test_update_matching_patches_every_match() {
    let store = garage_store().await;
    let composer = bikes(&store);

    let report = composer
        .update_matching(
            &[Predicate::lt("CC", 900)],
            &Patch::new().set("TAGS", json!(["commuter"])),
        )
        .await
        .unwrap();
    assert_eq!(report.applied, 2);

    let commuters = composer
        .query(&[Predicate::new("TAGS", doc_composer::Operator::ArrayContains, "commuter")], None)
        .await
        .unwrap();
    assert_eq!(ids(&commuters), vec!["d1", "k1"]);

    let untouched = composer.get("s1").await.unwrap();
    assert_eq!(untouched.data.tags, vec!["sport", "touring"]);
}

#[tokio::test]
async fn test_update_matching_rejects_unknown_patch_fields_before_querying() {
    let store = garage_store().await;

    let err = bikes(&store)
        .update_matching(&[], &Patch::new().set("COLOR", "red"))
        .await
        .unwrap_err();

    assert!(matches!(err, ComposeError::InvalidArgument(_)));
    assert!(store.issued_queries().await.is_empty());
}

#[tokio::test]
async fn test_failed_delete_keeps_earlier_deletes() {
    let store = FailingStore::new(garage_store().await).fail_mutations_of("d2");
    let memory = store.inner().clone();
    let options = ComposerOptions {
        mutation_concurrency: 1,
        ..ComposerOptions::default()
    };
    let composer = Composer::<Bike>::with_options(Arc::new(store), BIKES, options).unwrap();

    let err = composer.delete_matching(&[]).await.unwrap_err();
    assert_eq!(err.category(), "Backend Error");

    // Deletes run in result order, one at a time: d1 went, d2 failed, the rest never ran.
    let left = bikes(&memory).query(&[], None).await.unwrap();
    assert_eq!(ids(&left), vec!["d2", "k1", "s1"]);
}

/// Deletes `victim` from the backing store right after the first query, as a
/// concurrent writer would.
struct RacingStore {
    inner: MemoryStore,
    victim: &'static str,
    raced: AtomicBool,
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn run_query(&self, query: &StoreQuery) -> StoreResult<Vec<StoreDocument>> {
        let rows = self.inner.run_query(query).await?;
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.delete(BIKES, self.victim).await?;
        }
        Ok(rows)
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
        self.inner.update(collection, id, patch).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoreDocument>> {
        self.inner.get(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }
}

async fn racing(victim: &'static str) -> (MemoryStore, Composer<Bike>) {
    let memory = garage_store().await;
    let store = RacingStore {
        inner: memory.clone(),
        victim,
        raced: AtomicBool::new(false),
    };
    (memory, Composer::new(Arc::new(store), BIKES))
}

#[tokio::test]
async fn test_delete_matching_tolerates_vanished_documents() {
    let (memory, composer) = racing("k1").await;

    let report = composer.delete_matching(&[]).await.unwrap();

    assert_eq!(
        report,
        MutationReport {
            matched: 4,
            applied: 3,
            vanished: 1,
        }
    );
    assert_eq!(memory.len(BIKES).await, 0);
}

#[tokio::test]
async fn test_update_matching_tolerates_vanished_documents() {
    let (memory, composer) = racing("d1").await;

    let report = composer
        .update_matching(&[], &Patch::new().set("HP", 1))
        .await
        .unwrap();

    assert_eq!(report.matched, 4);
    assert_eq!(report.applied, 3);
    assert_eq!(report.vanished, 1);
    assert_eq!(memory.len(BIKES).await, 3);

    let patched = bikes(&memory)
        .query(&[Predicate::eq("HP", 1)], None)
        .await
        .unwrap();
    assert_eq!(ids(&patched), vec!["d2", "k1", "s1"]);
}
