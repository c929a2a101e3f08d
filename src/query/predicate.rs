//! Predicates: one field/operator/value filter condition.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ComposeError, Result};
use crate::model::{value_label, FieldKind, Model};

/// Comparison operators understood by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Operator; 10] = [
        Self::Eq,
        Self::Neq,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::In,
        Self::NotIn,
        Self::ArrayContains,
        Self::ArrayContainsAny,
    ];

    /// Returns the store's spelling of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
        }
    }

    /// Ordering comparisons. The store accepts these on one field per query.
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }

    /// Operators whose value is a set of candidates rather than a scalar.
    pub fn takes_value_set(&self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::ArrayContainsAny)
    }

    /// Operators that look inside an array field.
    pub fn targets_array(&self) -> bool {
        matches!(self, Self::ArrayContains | Self::ArrayContainsAny)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "=" | "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Neq),
            other => Self::ALL
                .into_iter()
                .find(|op| op.as_str().eq_ignore_ascii_case(other))
                .ok_or_else(|| {
                    ComposeError::invalid_argument(format!("unsupported operator '{other}'"))
                }),
        }
    }
}

/// A single filter condition.
///
/// Deserializes from either `["HP", ">=", 70]` or
/// `{"field": "HP", "op": ">=", "value": 70}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PredicateRepr")]
pub struct Predicate {
    pub field: String,
    #[serde(rename = "op")]
    pub operator: Operator,
    pub value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PredicateRepr {
    Tuple(String, Operator, Value),
    Named {
        field: String,
        op: Operator,
        value: Value,
    },
}

impl From<PredicateRepr> for Predicate {
    fn from(repr: PredicateRepr) -> Self {
        match repr {
            PredicateRepr::Tuple(field, operator, value)
            | PredicateRepr::Named {
                field,
                op: operator,
                value,
            } => Self {
                field,
                operator,
                value,
            },
        }
    }
}

impl Predicate {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Gte, value)
    }

    /// Checks the predicate against the shape's declared fields.
    ///
    /// `max_value_set` caps the number of candidates for `in`, `not-in`, and
    /// `array-contains-any`.
    pub fn validate<T: Model>(&self, max_value_set: usize) -> Result<()> {
        let kind = T::resolve_field(&self.field)
            .ok_or_else(|| self.invalid(format!("unknown field '{}'", self.field)))?;

        if self.operator.targets_array() && !matches!(kind, FieldKind::Array | FieldKind::Any) {
            return Err(self.invalid(format!(
                "'{}' needs an array field, '{}' is {}",
                self.operator,
                self.field,
                kind.as_str()
            )));
        }

        if self.operator.takes_value_set() {
            let set = match &self.value {
                Value::Array(set) if !set.is_empty() => set,
                Value::Array(_) => return Err(self.invalid("value set is empty")),
                other => {
                    return Err(self.invalid(format!(
                        "value must be an array of candidates, got {}",
                        value_label(other)
                    )))
                }
            };
            if set.len() > max_value_set {
                return Err(self.invalid(format!(
                    "value set has {} candidates, at most {max_value_set} allowed",
                    set.len()
                )));
            }
            if self.operator != Operator::ArrayContainsAny {
                for candidate in set {
                    self.check_kind(kind, candidate, true)?;
                }
            }
            return Ok(());
        }

        match self.operator {
            Operator::ArrayContains => {
                if self.value.is_array() {
                    return Err(self.invalid("'array-contains' takes a single value"));
                }
                Ok(())
            }
            Operator::Eq | Operator::Neq => self.check_kind(kind, &self.value, true),
            _ => {
                if matches!(self.value, Value::Array(_) | Value::Object(_)) {
                    return Err(self.invalid(format!(
                        "range comparison needs a scalar value, got {}",
                        value_label(&self.value)
                    )));
                }
                // Fractional bounds are valid against whole-number fields.
                if kind == FieldKind::Integer && self.value.is_number() {
                    return Ok(());
                }
                self.check_kind(kind, &self.value, false)
            }
        }
    }

    fn check_kind(&self, kind: FieldKind, value: &Value, allow_null: bool) -> Result<()> {
        if value.is_null() {
            return if allow_null {
                Ok(())
            } else {
                Err(self.invalid("null is not comparable"))
            };
        }
        if kind.accepts(value) {
            Ok(())
        } else {
            Err(self.invalid(format!(
                "'{}' is {}, got {}",
                self.field,
                kind.as_str(),
                value_label(value)
            )))
        }
    }

    fn invalid(&self, reason: impl fmt::Display) -> ComposeError {
        ComposeError::invalid_argument(format!("{self}: {reason}"))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// Validates every predicate in order, stopping at the first failure.
pub fn validate_all<T: Model>(predicates: &[Predicate], max_value_set: usize) -> Result<()> {
    predicates
        .iter()
        .try_for_each(|p| p.validate::<T>(max_value_set))
}
