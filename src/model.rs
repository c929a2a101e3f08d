//! Document shapes, results, and partial updates.
//!
//! A shape is any serde type that also declares its top-level fields through
//! [`Model`]. The declaration is what predicates and patches are checked
//! against before anything reaches the store.

use serde::de::{self, DeserializeOwned};
use serde::ser::{self, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ComposeError, Result};
use crate::store::StoreDocument;

/// Reserved key under which a [`Record`] carries its document id.
pub const ID_KEY: &str = "_id";

/// The declared kind of a document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    /// Whole numbers only.
    Integer,
    /// Any JSON number.
    Number,
    Boolean,
    Array,
    /// Nested object; dotted paths below it are accepted.
    Map,
    /// Unchecked.
    Any,
}

impl FieldKind {
    /// Returns true if a non-null value fits this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Map, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Returns the kind as a lowercase label for error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Map => "map",
            Self::Any => "any",
        }
    }
}

/// A declared top-level field of a document shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A document shape stored in one collection.
///
/// ```
/// use doc_composer::model::{Field, FieldKind, Model};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Bike {
///     #[serde(rename = "BRAND")]
///     brand: String,
///     #[serde(rename = "HP")]
///     hp: i64,
/// }
///
/// impl Model for Bike {
///     fn fields() -> &'static [Field] {
///         const FIELDS: &[Field] = &[
///             Field::new("BRAND", FieldKind::String),
///             Field::new("HP", FieldKind::Integer),
///         ];
///         FIELDS
///     }
/// }
///
/// assert_eq!(Bike::resolve_field("HP"), Some(FieldKind::Integer));
/// assert_eq!(Bike::resolve_field("COLOR"), None);
/// ```
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Top-level fields as they appear in the stored document.
    fn fields() -> &'static [Field];

    /// Resolves a field path to its kind.
    ///
    /// Dotted paths resolve through a `Map` or `Any` root and are unchecked
    /// below it.
    fn resolve_field(path: &str) -> Option<FieldKind> {
        let fields = Self::fields();
        if let Some(field) = fields.iter().find(|f| f.name == path) {
            return Some(field.kind);
        }
        let (root, rest) = path.split_once('.')?;
        if rest.is_empty() {
            return None;
        }
        fields
            .iter()
            .find(|f| f.name == root)
            .filter(|f| matches!(f.kind, FieldKind::Map | FieldKind::Any))
            .map(|_| FieldKind::Any)
    }
}

/// A document read from the store: its decoded fields plus its id.
///
/// Serializes flat, with the id under [`ID_KEY`]. The id is held apart from
/// the fields and always equals the store key of the source document; a
/// field of the shape named [`ID_KEY`] is dropped from the output.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: String,
    pub data: T,
}

impl<T: Serialize> Serialize for Record<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let encoded =
            serde_json::to_value(&self.data).map_err(<S::Error as ser::Error>::custom)?;
        let mut fields = match encoded {
            Value::Object(fields) => fields,
            other => {
                return Err(ser::Error::custom(format!(
                    "record data must serialize to a map, got {}",
                    value_label(&other)
                )))
            }
        };
        fields.remove(ID_KEY);

        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
        map.serialize_entry(ID_KEY, &self.id)?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Record<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let id = match fields.remove(ID_KEY) {
            Some(Value::String(id)) => id,
            Some(other) => {
                return Err(de::Error::custom(format!(
                    "'{ID_KEY}' must be a string, got {}",
                    value_label(&other)
                )))
            }
            None => return Err(de::Error::missing_field(ID_KEY)),
        };
        let data = serde_json::from_value(Value::Object(fields))
            .map_err(<D::Error as de::Error>::custom)?;
        Ok(Self { id, data })
    }
}

impl<T: Model> Record<T> {
    /// Decodes a raw store document into the shape.
    pub fn decode(doc: StoreDocument) -> Result<Self> {
        let StoreDocument { id, fields } = doc;
        match serde_json::from_value(Value::Object(fields)) {
            Ok(data) => Ok(Self { id, data }),
            Err(source) => Err(ComposeError::Decode { id, source }),
        }
    }
}

/// Encodes a document as a field map, rejecting anything that is not an object.
pub(crate) fn encode<T: Serialize>(data: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(data).map_err(ComposeError::Encode)? {
        Value::Object(map) => Ok(map),
        other => Err(ComposeError::invalid_argument(format!(
            "document must serialize to an object, got {}",
            value_label(&other)
        ))),
    }
}

/// Returns a short label for a JSON value's type.
pub(crate) fn value_label(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// A partial update: field paths and their new values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    fields: Map<String, Value>,
}

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to the patch.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Builds a patch from a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ComposeError::invalid_argument(format!(
                "patch must be an object, got {}",
                value_label(&other)
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Checks every key against the shape. Values are not checked.
    pub fn validate<T: Model>(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(ComposeError::invalid_argument("patch has no fields"));
        }
        let unknown: Vec<&str> = self
            .fields
            .keys()
            .filter(|key| T::resolve_field(key).is_none())
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ComposeError::invalid_argument(format!(
                "patch names unknown field(s): {}",
                unknown.join(", ")
            )))
        }
    }
}
