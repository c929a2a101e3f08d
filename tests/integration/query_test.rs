//! Filtered query tests.
//!
//! Checks how predicate lists turn into store queries and how their results
//! are reconciled.

use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use doc_composer::store::{FailingStore, StoreResult};
use doc_composer::{
    ComposeError, Composer, ComposerOptions, DocumentStore, JoinKey, MemoryStore, Operator,
    Predicate, StoreDocument, StoreError, StoreQuery,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use tokio::sync::Barrier;

use super::common::{bikes, garage_store, id_set, ids, scenario_store, Bike, BIKES};

#[tokio::test]
async fn test_equality_and_range_returns_both_ducatis() {
    let store = scenario_store().await;

    let result = bikes(&store)
        .query(
            &[Predicate::eq("BRAND", "Ducati"), Predicate::gte("HP", 70)],
            None,
        )
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["d1", "d2"]);
    assert_eq!(result[1].data.hp, 100);
    assert_eq!(store.issued_queries().await.len(), 2);
}

#[tokio::test]
async fn test_single_range_over_whole_collection() {
    let store = scenario_store().await;

    let result = bikes(&store)
        .query(&[Predicate::gt("HP", 90)], None)
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["d2", "s1"]);

    let issued = store.issued_queries().await;
    assert_eq!(issued.len(), 2);
    assert!(issued.contains(&StoreQuery::collection(BIKES)));
    assert!(issued.contains(&StoreQuery::collection(BIKES).filter(Predicate::gt("HP", 90))));
}

#[tokio::test]
async fn test_no_predicates_with_limit() {
    let store = scenario_store().await;

    let result = bikes(&store).query(&[], Some(2)).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(
        store.issued_queries().await,
        vec![StoreQuery::collection(BIKES).limit(2)]
    );
}

#[tokio::test]
async fn test_equality_only_issues_one_query() {
    let store = garage_store().await;

    let result = bikes(&store)
        .query(
            &[
                Predicate::new("TAGS", Operator::ArrayContains, "sport"),
                Predicate::new("BRAND", Operator::NotIn, json!(["Suzuki"])),
                Predicate::new("BRAND", Operator::Neq, "KTM"),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["d2"]);
    assert_eq!(store.issued_queries().await.len(), 1);
}

#[tokio::test]
async fn test_ranges_on_different_fields_are_split() {
    let store = garage_store().await;

    let result = bikes(&store)
        .query(
            &[
                Predicate::gt("HP", 80),
                Predicate::lt("CC", 950),
                Predicate::new("TAGS", Operator::ArrayContains, "sport"),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["d2", "k1"]);

    let issued = store.issued_queries().await;
    assert_eq!(issued.len(), 3);
    assert!(issued.iter().all(|q| q.range_fields().len() <= 1));
}

#[tokio::test]
async fn test_k_ranges_issue_k_plus_one_queries() {
    let store = garage_store().await;
    let predicates = [
        Predicate::gte("HP", 75),
        Predicate::lte("HP", 120),
        Predicate::gt("CC", 800),
        Predicate::lt("CC", 999),
    ];

    let result = bikes(&store).query(&predicates, None).await.unwrap();

    assert_eq!(store.issued_queries().await.len(), predicates.len() + 1);
    assert_eq!(ids(&result), vec!["d1", "d2", "k1"]);
}

#[tokio::test]
async fn test_result_follows_first_range_query_order() {
    let store = garage_store().await;

    // Ordered by CC: d1 (803), k1 (890), d2 (937), s1 (999).
    let result = bikes(&store)
        .query(&[Predicate::gt("CC", 0), Predicate::gt("HP", 0)], None)
        .await
        .unwrap();

    assert_eq!(ids(&result), vec!["d1", "k1", "d2", "s1"]);
}

#[tokio::test]
async fn test_limit_is_applied_after_intersection() {
    let store = garage_store().await;
    let predicates = [Predicate::gt("CC", 850), Predicate::gt("HP", 90)];

    let all = bikes(&store).query(&predicates, None).await.unwrap();
    assert_eq!(ids(&all), vec!["k1", "d2", "s1"]);

    for limit in 0..=4usize {
        let capped = bikes(&store).query(&predicates, Some(limit)).await.unwrap();
        if limit == 0 {
            assert_eq!(capped.len(), all.len());
        } else {
            assert!(capped.len() <= limit);
            assert_eq!(ids(&capped), ids(&all)[..capped.len()].to_vec());
        }
    }
}

#[tokio::test]
async fn test_query_is_idempotent() {
    let store = garage_store().await;
    let composer = bikes(&store);
    let predicates = [Predicate::gte("HP", 100), Predicate::lt("CC", 1000)];

    let first = composer.query(&predicates, None).await.unwrap();
    let second = composer.query(&predicates, None).await.unwrap();

    assert_eq!(id_set(&first), id_set(&second));
}

#[tokio::test]
async fn test_record_join_key_gives_same_result_on_stable_data() {
    let store = garage_store().await;
    let options = ComposerOptions {
        join_key: JoinKey::Record,
        ..ComposerOptions::default()
    };
    let composer =
        Composer::<Bike>::with_options(Arc::new(store.clone()), BIKES, options).unwrap();
    let predicates = [Predicate::gt("HP", 80), Predicate::lt("CC", 950)];

    let by_record = composer.query(&predicates, None).await.unwrap();
    let by_id = bikes(&store).query(&predicates, None).await.unwrap();

    assert_eq!(by_record, by_id);
}

#[tokio::test]
async fn test_query_first() {
    let store = garage_store().await;
    let composer = bikes(&store);

    let any = composer.query_first(&[]).await.unwrap();
    assert!(any.is_some());

    let first = composer
        .query_first(&[Predicate::gt("CC", 850), Predicate::gt("HP", 90)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.id, "k1");

    let none = composer
        .query_first(&[Predicate::eq("BRAND", "Honda")])
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_query_first_on_empty_collection() {
    let store = MemoryStore::new();
    let first = bikes(&store).query_first(&[]).await.unwrap();
    assert!(first.is_none());
}

#[tokio::test]
async fn test_empty_result_is_not_an_error() {
    let store = scenario_store().await;
    let result = bikes(&store)
        .query(&[Predicate::gt("HP", 500)], None)
        .await
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_invalid_predicate_issues_no_query() {
    let store = scenario_store().await;
    let composer = bikes(&store);

    let unknown = composer
        .query(&[Predicate::gt("HP", 1), Predicate::eq("COLOR", "red")], None)
        .await
        .unwrap_err();
    let scalar_set = composer
        .query(&[Predicate::new("BRAND", Operator::In, "Ducati")], None)
        .await
        .unwrap_err();

    assert!(matches!(unknown, ComposeError::InvalidArgument(_)));
    assert!(matches!(scalar_set, ComposeError::InvalidArgument(_)));
    assert!(store.issued_queries().await.is_empty());
}

#[tokio::test]
async fn test_failing_branch_fails_whole_query_with_cause() {
    let store = FailingStore::new(scenario_store().await).fail_queries_on("HP");
    let composer = Composer::<Bike>::new(Arc::new(store), BIKES);

    let err = composer
        .query(
            &[Predicate::eq("BRAND", "Ducati"), Predicate::gte("HP", 70)],
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Backend Error");
    let cause = err.source().expect("cause is attached");
    assert!(cause.to_string().starts_with("store unavailable"));
}

#[tokio::test]
async fn test_failing_single_query() {
    let store = FailingStore::new(scenario_store().await).fail_all_queries();
    let composer = Composer::<Bike>::new(Arc::new(store), BIKES);

    let err = composer.query(&[], None).await.unwrap_err();
    assert!(matches!(err, ComposeError::Backend(StoreError::Unavailable(_))));
}

/// Holds every query until `parties` queries are in flight at once.
struct BarrierStore {
    inner: MemoryStore,
    barrier: Barrier,
}

#[async_trait]
impl DocumentStore for BarrierStore {
    async fn run_query(&self, query: &StoreQuery) -> StoreResult<Vec<StoreDocument>> {
        self.barrier.wait().await;
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
        self.inner.update(collection, id, patch).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoreDocument>> {
        self.inner.get(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.inner.delete(collection, id).await
    }
}

#[tokio::test]
async fn test_branch_queries_are_in_flight_together() {
    let predicates = [
        Predicate::gt("HP", 80),
        Predicate::lt("CC", 950),
        Predicate::eq("BRAND", "Ducati"),
    ];
    let store = BarrierStore {
        inner: garage_store().await,
        barrier: Barrier::new(3),
    };
    let composer = Composer::<Bike>::new(Arc::new(store), BIKES);

    let result = tokio::time::timeout(Duration::from_secs(5), composer.query(&predicates, None))
        .await
        .expect("queries were issued one at a time")
        .unwrap();

    assert_eq!(ids(&result), vec!["d2"]);
}
