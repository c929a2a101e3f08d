//! Query descriptors and raw documents exchanged with a store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

use crate::query::{Operator, Predicate};

/// A document as the store returns it: its key and its raw fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Store key, unique within the collection.
    pub id: String,

    /// Raw document fields.
    pub fields: Map<String, Value>,
}

impl StoreDocument {
    /// Creates a store document from an id and its fields.
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Looks up a field, following dotted paths into nested maps.
    pub fn field(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

/// An immutable query descriptor: a collection, filters, and an optional limit.
///
/// Builder methods return a new descriptor, leaving `self` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreQuery {
    pub collection: String,
    pub filters: Vec<Predicate>,
    pub limit: Option<usize>,
}

impl StoreQuery {
    /// Starts a query over every document in a collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Returns a copy of this query with one more filter.
    #[must_use]
    pub fn filter(&self, predicate: Predicate) -> Self {
        let mut next = self.clone();
        next.filters.push(predicate);
        next
    }

    /// Returns a copy of this query capped at `n` documents.
    #[must_use]
    pub fn limit(&self, n: usize) -> Self {
        let mut next = self.clone();
        next.limit = Some(n);
        next
    }

    /// Distinct fields carrying a range filter, in first-seen order.
    pub fn range_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for p in self.filters.iter().filter(|p| p.operator.is_range()) {
            if !fields.contains(&p.field.as_str()) {
                fields.push(&p.field);
            }
        }
        fields
    }
}

impl fmt::Display for StoreQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection)?;
        for (i, p) in self.filters.iter().enumerate() {
            let joiner = if i == 0 { "where" } else { "and" };
            write!(f, " {joiner} {p}")?;
        }
        if let Some(n) = self.limit {
            write!(f, " limit {n}")?;
        }
        Ok(())
    }
}

/// Orders two values of the same kind. Values of different kinds, arrays,
/// and maps are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Structural equality that treats `1` and `1.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| values_equal(l, r)))
        }
        _ => a == b,
    }
}

/// Evaluates one predicate against a document, the way the hosted store does.
///
/// `!=` and `not-in` never match a missing or null field, and range
/// comparisons only match values of the same kind.
pub(crate) fn matches(doc: &StoreDocument, predicate: &Predicate) -> bool {
    let Some(actual) = doc.field(&predicate.field) else {
        return false;
    };
    let expected = &predicate.value;
    let in_set = |v: &Value| {
        expected
            .as_array()
            .is_some_and(|set| set.iter().any(|e| values_equal(v, e)))
    };

    match predicate.operator {
        Operator::Eq => values_equal(actual, expected),
        Operator::Neq => !actual.is_null() && !values_equal(actual, expected),
        Operator::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::In => in_set(actual),
        Operator::NotIn => !actual.is_null() && !in_set(actual),
        Operator::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(item, expected))),
        Operator::ArrayContainsAny => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| in_set(item))),
    }
}
