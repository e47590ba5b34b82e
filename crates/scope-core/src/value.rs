//! Dynamic attribute values.
//!
//! Every vigilant attribute stores a [`Value`]: a closed set of scalar and
//! container shapes. Attributes never inspect arbitrary runtime types; the
//! [`Shape`](crate::validate::Shape) derived from a value is what drives
//! validation and text coercion.
//!
//! # Example
//!
//! ```rust
//! use scope_core::value::{SeqKind, Value};
//!
//! let resolution = Value::from((2048, 2048));
//! assert_eq!(resolution.to_string(), "(2048, 2048)");
//!
//! let emissions = Value::from(vec![0.5, 1.0]);
//! assert!(matches!(emissions, Value::Seq(SeqKind::List, _)));
//! ```

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ScopeError;

/// Concrete container kind of a sequence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqKind {
    /// Ordered, growable sequence.
    List,
    /// Ordered, fixed-length record (e.g. a resolution or a position).
    Tuple,
    /// Unordered collection without duplicates.
    Set,
}

/// A value held by an attribute.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value. Only valid for untyped attributes.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered or unordered sequence, see [`SeqKind`].
    Seq(SeqKind, Vec<Value>),
    /// Mapping, kept in insertion order.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Build a list value.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Seq(SeqKind::List, items.into_iter().map(Into::into).collect())
    }

    /// Build a tuple value.
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Seq(SeqKind::Tuple, items.into_iter().map(Into::into).collect())
    }

    /// Build a set value, dropping duplicates while keeping first occurrences.
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Seq(SeqKind::Set, dedup(items.into_iter().map(Into::into)))
    }

    /// Build a mapping value. Later duplicate keys replace earlier ones.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (k, v) in entries {
            let (k, v) = (k.into(), v.into());
            match out.iter_mut().find(|(existing, _)| *existing == k) {
                Some(slot) => slot.1 = v,
                None => out.push((k, v)),
            }
        }
        Value::Map(out)
    }

    /// Human readable name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(SeqKind::List, _) => "list",
            Value::Seq(SeqKind::Tuple, _) => "tuple",
            Value::Seq(SeqKind::Set, _) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Elements of a sequence value.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(_, items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view of an `Int` or `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Look up a key in a mapping value.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Whether `item` is an element of this sequence value.
    pub fn contains(&self, item: &Value) -> bool {
        self.as_seq()
            .map(|items| items.iter().any(|i| i == item))
            .unwrap_or(false)
    }

    /// Convert to a JSON value for a remote transport.
    ///
    /// Tuples and sets become arrays, non-string map keys are rendered as text.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::Seq(_, items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (key_text(k), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Build a value from JSON. Arrays become lists, objects string-keyed maps.
    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::list(items.iter().map(Value::from_json)),
            Json::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (Value::Str(k.clone()), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn dedup(items: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn same_elements(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(SeqKind::Set, a), Value::Seq(SeqKind::Set, b)) => same_elements(a, b),
            (Value::Seq(ka, a), Value::Seq(kb, b)) => ka == kb && a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(self, f, true)
    }
}

fn fmt_value(value: &Value, f: &mut fmt::Formatter<'_>, top: bool) -> fmt::Result {
    match value {
        Value::Null => write!(f, "None"),
        Value::Bool(true) => write!(f, "True"),
        Value::Bool(false) => write!(f, "False"),
        Value::Int(i) => write!(f, "{i}"),
        Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
        Value::Float(x) => write!(f, "{x}"),
        Value::Str(s) if top => write!(f, "{s}"),
        Value::Str(s) => write!(f, "'{s}'"),
        Value::Seq(kind, items) => {
            let (open, close) = match kind {
                SeqKind::List => ("[", "]"),
                SeqKind::Tuple => ("(", ")"),
                SeqKind::Set => ("{", "}"),
            };
            write!(f, "{open}")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_value(item, f, false)?;
            }
            if *kind == SeqKind::Tuple && items.len() == 1 {
                write!(f, ",")?;
            }
            write!(f, "{close}")
        }
        Value::Map(entries) => {
            write!(f, "{{")?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_value(k, f, false)?;
                write!(f, ": ")?;
                fmt_value(v, f, false)?;
            }
            write!(f, "}}")
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Seq(SeqKind::Tuple, vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Seq(SeqKind::Tuple, vec![a.into(), b.into(), c.into()])
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(v: BTreeSet<T>) -> Self {
        Value::set(v)
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(v: BTreeMap<K, V>) -> Self {
        Value::map(v)
    }
}

fn mismatch(expected: &str, got: &Value) -> ScopeError {
    ScopeError::InvalidType(format!("expected {expected}, got {} {got}", got.type_name()))
}

impl TryFrom<Value> for bool {
    type Error = ScopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = ScopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = ScopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| mismatch("float", &value))
    }
}

impl TryFrom<Value> for String {
    type Error = ScopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl<T> TryFrom<Value> for Vec<T>
where
    T: TryFrom<Value, Error = ScopeError>,
{
    type Error = ScopeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Seq(_, items) => items.into_iter().map(T::try_from).collect(),
            other => Err(mismatch("sequence", &other)),
        }
    }
}

// =============================================================================
// Serde (configuration files, snapshots)
// =============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Seq(_, items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(&key_text(k), v)?;
                }
                map.end()
            }
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
    Null(()),
}

impl From<RawValue> for Value {
    fn from(raw: RawValue) -> Self {
        match raw {
            RawValue::Bool(b) => Value::Bool(b),
            RawValue::Int(i) => Value::Int(i),
            RawValue::Float(f) => Value::Float(f),
            RawValue::Str(s) => Value::Str(s),
            RawValue::List(items) => Value::list(items.into_iter().map(Value::from)),
            RawValue::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
            RawValue::Null(()) => Value::Null,
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawValue::deserialize(deserializer).map(Value::from)
    }
}
