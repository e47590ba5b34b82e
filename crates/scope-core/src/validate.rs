//! Typed validation and text coercion.
//!
//! An attribute's type is a [`Shape`], derived once from its initial value.
//! [`validate`] checks (and where lossless, converts) a typed candidate against
//! a shape; [`coerce_str`] rebuilds a value of the same shape as a reference
//! value from free-form text, as typed on a command line.
//!
//! Both are pure functions. The only side effect is a `warn!` event when an
//! empty reference container forces the string fallback.

use std::fmt;

use crate::error::{ScopeError, ScopeResult};
use crate::value::{dedup, SeqKind, Value};

/// Delimiter between elements of a sequence or entries of a mapping.
pub const ITEM_DELIMITER: char = ',';
/// Delimiter between key and value of a mapping entry.
pub const ENTRY_DELIMITER: char = ':';

/// Static type tag of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Untyped: any value is accepted, text coercion is unsupported.
    Any,
    Bool,
    Int,
    Float,
    Str,
    /// Sequence of a container kind. `elem` is `None` when unknown.
    Seq {
        kind: SeqKind,
        elem: Option<Box<Shape>>,
    },
    /// Mapping. Key/value shapes are `None` when unknown.
    Map {
        key: Option<Box<Shape>>,
        value: Option<Box<Shape>>,
    },
}

impl Shape {
    /// Shape of a reference value. Containers take the shape of their first
    /// element (first entry for mappings).
    pub fn of(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Any,
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Float(_) => Shape::Float,
            Value::Str(_) => Shape::Str,
            Value::Seq(kind, items) => Shape::Seq {
                kind: *kind,
                elem: items.first().map(|v| Box::new(Shape::of(v))),
            },
            Value::Map(entries) => Shape::Map {
                key: entries.first().map(|(k, _)| Box::new(Shape::of(k))),
                value: entries.first().map(|(_, v)| Box::new(Shape::of(v))),
            },
        }
    }

    /// Fill the parts of this shape left unknown (`Any`, or an element, key or
    /// value of an initially empty container) from `observed`. Known parts
    /// always win.
    pub fn refined_by(&self, observed: &Shape) -> Shape {
        match (self, observed) {
            (Shape::Any, _) => observed.clone(),
            (Shape::Seq { kind, elem }, Shape::Seq { elem: seen, .. }) => Shape::Seq {
                kind: *kind,
                elem: refine_part(elem, seen),
            },
            (Shape::Map { key, value }, Shape::Map { key: k, value: v }) => Shape::Map {
                key: refine_part(key, k),
                value: refine_part(value, v),
            },
            _ => self.clone(),
        }
    }

    /// Whether values of this shape can be ordered (for ranges).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Shape::Int | Shape::Float)
    }
}

fn refine_part(declared: &Option<Box<Shape>>, observed: &Option<Box<Shape>>) -> Option<Box<Shape>> {
    match (declared, observed) {
        (Some(d), Some(o)) => Some(Box::new(d.refined_by(o))),
        (Some(d), None) => Some(d.clone()),
        (None, o) => o.clone(),
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => write!(f, "any"),
            Shape::Bool => write!(f, "bool"),
            Shape::Int => write!(f, "int"),
            Shape::Float => write!(f, "float"),
            Shape::Str => write!(f, "string"),
            Shape::Seq { kind, elem } => {
                let name = match kind {
                    SeqKind::List => "list",
                    SeqKind::Tuple => "tuple",
                    SeqKind::Set => "set",
                };
                match elem {
                    Some(e) => write!(f, "{name}<{e}>"),
                    None => write!(f, "{name}"),
                }
            }
            Shape::Map { key, value } => match (key, value) {
                (Some(k), Some(v)) => write!(f, "map<{k}, {v}>"),
                _ => write!(f, "map"),
            },
        }
    }
}

fn invalid(shape: &Shape, candidate: &Value) -> ScopeError {
    ScopeError::InvalidType(format!(
        "cannot assign {} {} to a {} attribute",
        candidate.type_name(),
        candidate,
        shape
    ))
}

/// Validate a typed candidate against a shape.
///
/// Returns the candidate converted to the exact representation of the shape:
/// integers widen to floats, and sequences are rebuilt as the shape's container
/// kind. Floats never narrow to integers.
pub fn validate(shape: &Shape, candidate: Value) -> ScopeResult<Value> {
    match (shape, candidate) {
        (Shape::Any, v) => Ok(v),
        (Shape::Bool, v @ Value::Bool(_)) => Ok(v),
        (Shape::Int, v @ Value::Int(_)) => Ok(v),
        (Shape::Float, v @ Value::Float(_)) => Ok(v),
        (Shape::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (Shape::Str, v @ Value::Str(_)) => Ok(v),
        (Shape::Seq { kind, elem }, Value::Seq(_, items)) => {
            let items = match elem {
                Some(elem) => items
                    .into_iter()
                    .map(|item| validate(elem, item))
                    .collect::<ScopeResult<Vec<_>>>()?,
                None => items,
            };
            Ok(rebuild(*kind, items))
        }
        (Shape::Map { key, value }, Value::Map(entries)) => {
            let entries = entries
                .into_iter()
                .map(|(k, v)| -> ScopeResult<(Value, Value)> {
                    let k = match key {
                        Some(shape) => validate(shape, k)?,
                        None => k,
                    };
                    let v = match value {
                        Some(shape) => validate(shape, v)?,
                        None => v,
                    };
                    Ok((k, v))
                })
                .collect::<ScopeResult<Vec<_>>>()?;
            Ok(Value::map(entries))
        }
        (shape, candidate) => Err(invalid(shape, &candidate)),
    }
}

fn rebuild(kind: SeqKind, items: Vec<Value>) -> Value {
    match kind {
        SeqKind::Set => Value::Seq(SeqKind::Set, dedup(items)),
        kind => Value::Seq(kind, items),
    }
}

/// Parse a boolean from one of the canonical truth tokens.
pub fn parse_bool(text: &str) -> ScopeResult<bool> {
    match text {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        _ => Err(ScopeError::InvalidType(format!(
            "not a boolean value: '{text}'"
        ))),
    }
}

/// Coerce free-form text into a value of the same shape as `reference`.
///
/// Sequences are split on [`ITEM_DELIMITER`]; mapping entries additionally on
/// [`ENTRY_DELIMITER`]. Element shapes come from the first element (or entry) of
/// the reference; an empty reference falls back to strings with a warning.
///
/// ```rust
/// use scope_core::validate::coerce_str;
/// use scope_core::value::Value;
///
/// let binning = coerce_str(&Value::tuple([1, 1]), "2,4").unwrap();
/// assert_eq!(binning, Value::tuple([2, 4]));
/// ```
pub fn coerce_str(reference: &Value, text: &str) -> ScopeResult<Value> {
    coerce_shape(&Shape::of(reference), text)
}

/// Same rules as [`coerce_str`], driven by a declared shape instead of a
/// reference value. Only elements of unknown shape fall back to strings.
pub fn coerce_shape(shape: &Shape, text: &str) -> ScopeResult<Value> {
    match shape {
        Shape::Bool => parse_bool(text).map(Value::Bool),
        Shape::Int => text.trim().parse::<i64>().map(Value::Int).map_err(|e| {
            ScopeError::InvalidType(format!("cannot convert '{text}' to an int: {e}"))
        }),
        Shape::Float => text.trim().parse::<f64>().map(Value::Float).map_err(|e| {
            ScopeError::InvalidType(format!("cannot convert '{text}' to a float: {e}"))
        }),
        Shape::Str => Ok(Value::Str(text.to_string())),
        Shape::Seq { kind, elem } => {
            let elem = known_or_string(elem.as_deref());
            let items = split_items(text)
                .map(|part| coerce_shape(&elem, part))
                .collect::<ScopeResult<Vec<_>>>()?;
            Ok(rebuild(*kind, items))
        }
        Shape::Map { key, value } => {
            let (key, value) = match (key, value) {
                (Some(k), Some(v)) => ((**k).clone(), (**v).clone()),
                _ => (known_or_string(None), Shape::Str),
            };
            let entries = split_items(text)
                .map(|entry| -> ScopeResult<(Value, Value)> {
                    let parts: Vec<&str> = entry.split(ENTRY_DELIMITER).collect();
                    match parts.as_slice() {
                        [k, v] => Ok((coerce_shape(&key, k)?, coerce_shape(&value, v)?)),
                        _ => Err(ScopeError::InvalidType(format!(
                            "mapping entry '{entry}' must be of the form key{ENTRY_DELIMITER}value"
                        ))),
                    }
                })
                .collect::<ScopeResult<Vec<_>>>()?;
            Ok(Value::map(entries))
        }
        Shape::Any => Err(ScopeError::UnsupportedType(format!(
            "no conversion from text is known for an untyped value ('{text}')"
        ))),
    }
}

fn known_or_string(shape: Option<&Shape>) -> Shape {
    match shape {
        Some(shape) => shape.clone(),
        None => {
            tracing::warn!("Type of attribute is unknown, using string");
            Shape::Str
        }
    }
}

fn split_items(text: &str) -> impl Iterator<Item = &str> {
    // An empty text is an empty container, not a single empty element.
    let parts = if text.is_empty() {
        None
    } else {
        Some(text.split(ITEM_DELIMITER))
    };
    parts.into_iter().flatten()
}
