//! Splits a predicate list into store queries.
//!
//! The store runs any number of equality-class filters in one query but only
//! one range field per query. A list with range predicates therefore becomes
//! a base query carrying the equality-class filters plus one derived query per
//! range predicate (base + that predicate).

use crate::store::StoreQuery;

use super::Predicate;

/// The store queries needed to answer one predicate list.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Collection plus every equality-class predicate.
    pub base: StoreQuery,

    /// One query per range predicate, in input order. Empty when the list has
    /// no range predicates.
    pub ranges: Vec<StoreQuery>,

    /// Applied natively to `base` when `ranges` is empty, otherwise after
    /// intersection.
    pub limit: Option<usize>,
}

impl QueryPlan {
    /// Builds the plan for `predicates` over `collection`.
    ///
    /// A limit of zero means unbounded.
    pub fn build(collection: &str, predicates: &[Predicate], limit: Option<usize>) -> Self {
        let (range, equality): (Vec<&Predicate>, Vec<&Predicate>) =
            predicates.iter().partition(|p| p.operator.is_range());

        let base = equality
            .into_iter()
            .fold(StoreQuery::collection(collection), |query, p| {
                query.filter(p.clone())
            });
        let ranges = range.into_iter().map(|p| base.filter(p.clone())).collect();

        Self {
            base,
            ranges,
            limit: limit.filter(|n| *n > 0),
        }
    }

    /// Returns true when the plan needs no intersection.
    pub fn is_single(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of store queries the plan issues.
    pub fn query_count(&self) -> usize {
        if self.is_single() {
            1
        } else {
            self.ranges.len() + 1
        }
    }

    /// The base query with the limit applied, for single-query plans.
    pub fn native_query(&self) -> StoreQuery {
        match self.limit {
            Some(n) => self.base.limit(n),
            None => self.base.clone(),
        }
    }
}
