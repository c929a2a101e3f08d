//! Query plan execution.
//!
//! Runs the store queries of a [`QueryPlan`] and reconciles their results.
//! Kept apart from the composer so it can be tested against any store.

use std::time::{Duration, Instant};

use futures::future::{try_join, try_join_all};
use tracing::debug;

use crate::error::{ComposeError, Result};
use crate::store::{DocumentStore, StoreDocument};

use super::{intersect, JoinKey, QueryPlan};

/// Executes query plans against a store.
pub struct QueryExecutor<'a> {
    store: &'a dyn DocumentStore,
    join: JoinKey,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new query executor.
    pub fn new(store: &'a dyn DocumentStore, join: JoinKey) -> Self {
        Self { store, join }
    }

    /// Runs every query of the plan and returns the reconciled documents.
    ///
    /// A single-query plan returns the store's rows untouched. Otherwise the
    /// range queries and the base query run concurrently, all of them are
    /// awaited, and their intersection is truncated to the plan's limit. The
    /// first store failure fails the whole call and discards other results.
    pub async fn execute(&self, plan: &QueryPlan) -> Result<QueryOutcome> {
        let start = Instant::now();

        let documents = if plan.is_single() {
            let query = plan.native_query();
            self.store
                .run_query(&query)
                .await
                .map_err(ComposeError::Backend)?
        } else {
            let ranges = try_join_all(plan.ranges.iter().map(|q| self.store.run_query(q)));
            let base = self.store.run_query(&plan.base);
            let (mut operands, base_rows) =
                try_join(ranges, base).await.map_err(ComposeError::Backend)?;

            // The base rows join as the last operand; the first range query
            // decides the order.
            operands.push(base_rows);
            let mut documents = intersect(operands, self.join);
            if let Some(limit) = plan.limit {
                documents.truncate(limit);
            }
            documents
        };

        let execution_time = start.elapsed();
        debug!(
            collection = %plan.base.collection,
            queries = plan.query_count(),
            rows = documents.len(),
            elapsed_ms = execution_time.as_millis() as u64,
            "query plan executed"
        );

        Ok(QueryOutcome {
            documents,
            queries_issued: plan.query_count(),
            execution_time,
        })
    }
}

/// Successful plan execution outcome.
#[derive(Debug)]
pub struct QueryOutcome {
    /// Reconciled documents, in result order.
    pub documents: Vec<StoreDocument>,
    /// How many store queries the plan issued.
    pub queries_issued: usize,
    /// How long the whole plan took.
    pub execution_time: Duration,
}
