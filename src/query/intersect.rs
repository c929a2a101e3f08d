//! Order-preserving intersection of query results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::store::StoreDocument;

/// What makes two documents from different queries "the same".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKey {
    /// Same store id.
    #[default]
    Id,
    /// Same id and identical fields. A document updated between two of the
    /// parallel reads drops out of the result.
    Record,
}

impl JoinKey {
    fn key_of(&self, doc: &StoreDocument) -> String {
        match self {
            Self::Id => doc.id.clone(),
            Self::Record => {
                let mut key = doc.id.clone();
                key.push('\u{0}');
                for (name, value) in sorted(&doc.fields) {
                    push_str_value(&mut key, name);
                    key.push(':');
                    push_canonical(&mut key, value);
                    key.push(',');
                }
                key
            }
        }
    }
}

fn sorted(fields: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = fields.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn push_str_value(out: &mut String, s: &str) {
    out.push_str(&Value::from(s).to_string());
}

/// Writes a value so that two values equal under `values_equal` give the
/// same text: map keys sorted, whole floats written as integers.
fn push_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Number(n) if n.as_i64().is_none() && n.as_u64().is_none() => {
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                    out.push_str(&(f as i64).to_string())
                }
                _ => out.push_str(&n.to_string()),
            }
        }
        Value::Array(items) => {
            out.push('[');
            for item in items {
                push_canonical(out, item);
                out.push(',');
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (name, item) in sorted(map) {
                push_str_value(out, name);
                out.push(':');
                push_canonical(out, item);
                out.push(',');
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Keeps the documents of the first operand that appear in every other
/// operand, in the first operand's order, each at most once.
///
/// No operands yields an empty result.
pub fn intersect(operands: Vec<Vec<StoreDocument>>, join: JoinKey) -> Vec<StoreDocument> {
    let mut operands = operands.into_iter();
    let Some(first) = operands.next() else {
        return Vec::new();
    };

    // Count how many of the remaining operands contain each key.
    let mut seen_in: HashMap<String, usize> = HashMap::new();
    let mut others = 0usize;
    for operand in operands {
        others += 1;
        let keys: HashSet<String> = operand.iter().map(|doc| join.key_of(doc)).collect();
        for key in keys {
            *seen_in.entry(key).or_default() += 1;
        }
    }

    let mut emitted: HashSet<String> = HashSet::new();
    first
        .into_iter()
        .filter(|doc| {
            let key = join.key_of(doc);
            let in_all = others == 0 || seen_in.get(&key) == Some(&others);
            in_all && emitted.insert(key)
        })
        .collect()
}
