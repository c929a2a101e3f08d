//! Filtered multi-predicate queries.
//!
//! Predicates are validated, split into store queries by [`QueryPlan`], run by
//! [`QueryExecutor`], and reconciled with [`intersect`].

pub mod executor;
mod intersect;
mod plan;
mod predicate;

pub use executor::{QueryExecutor, QueryOutcome};
pub use intersect::{intersect, JoinKey};
pub use plan::QueryPlan;
pub use predicate::{validate_all, Operator, Predicate};
