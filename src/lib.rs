//! doc-composer - typed CRUD and multi-predicate queries over a document store.
//!
//! A [`Composer`] binds one collection of an injected [`DocumentStore`] to a
//! document shape implementing [`Model`]. Its [`query`](Composer::query)
//! accepts any mix of equality and range predicates, working around stores
//! that only allow range filters on one field per query.

pub mod composer;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod store;

pub use composer::{Composer, MutationReport};
pub use config::{ComposerOptions, Config};
pub use error::{ComposeError, Result, StoreError};
pub use model::{Field, FieldKind, Model, Patch, Record};
pub use query::{JoinKey, Operator, Predicate};
pub use store::{DocumentStore, MemoryStore, StoreDocument, StoreQuery};
