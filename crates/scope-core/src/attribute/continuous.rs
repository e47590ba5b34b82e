//! Attribute bounded by an inclusive range.

use super::{forward_attribute, Attribute, Domain};
use crate::error::{ScopeError, ScopeResult};
use crate::validate::{validate, Shape};
use crate::value::Value;

/// An attribute whose value must stay within `[min, max]`.
///
/// Works for numbers and for fixed-length numeric sequences (e.g. a
/// resolution), which are bounded element-wise.
#[derive(Debug)]
pub struct ContinuousAttribute {
    inner: Attribute,
}

impl ContinuousAttribute {
    /// Create a bounded attribute. `range` is a two-element sequence `(min, max)`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedType` if the value cannot be ordered
    /// - `InvalidType` if `range` is not a sequence of two bounds of the value's shape
    /// - `OutOfBound` if `min > max` or `initial` is outside the range
    pub fn new(initial: impl Into<Value>, range: impl Into<Value>) -> ScopeResult<Self> {
        let initial = initial.into();
        let shape = Shape::of(&initial);
        if !is_orderable(&shape) {
            return Err(ScopeError::UnsupportedType(format!(
                "a range cannot bound a {shape} attribute"
            )));
        }
        let (min, max) = parse_range(&shape, range.into())?;
        let inner = Attribute::with_domain(shape, initial, Domain::Range { min, max })?;
        Ok(Self { inner })
    }

    /// Current `(min, max)` bounds.
    pub fn range(&self) -> (Value, Value) {
        match self.inner.domain() {
            Domain::Range { min, max } => (min, max),
            // Only constructed with a range.
            _ => (Value::Null, Value::Null),
        }
    }

    /// Replace the range. Subscribers are not notified.
    ///
    /// Rejected with `OutOfBound` if the current value would fall outside it;
    /// the old range is kept in that case.
    pub fn set_range(&self, range: impl Into<Value>) -> ScopeResult<()> {
        let (min, max) = parse_range(self.inner.shape(), range.into())?;
        self.inner.replace_domain(Domain::Range { min, max })
    }
}

forward_attribute!(ContinuousAttribute);

fn is_orderable(shape: &Shape) -> bool {
    match shape {
        Shape::Seq {
            elem: Some(elem), ..
        } => is_orderable(elem),
        shape => shape.is_numeric(),
    }
}

fn parse_range(shape: &Shape, range: Value) -> ScopeResult<(Value, Value)> {
    let bounds = match range {
        Value::Seq(_, bounds) => bounds,
        other => {
            return Err(ScopeError::InvalidType(format!(
                "range must be a (min, max) pair, got {} {other}",
                other.type_name()
            )))
        }
    };
    let [min, max]: [Value; 2] = bounds.try_into().map_err(|bounds: Vec<Value>| {
        ScopeError::InvalidType(format!(
            "range must have exactly two bounds, got {}",
            bounds.len()
        ))
    })?;
    let min = validate(shape, min)?;
    let max = validate(shape, max)?;
    if !super::within(&min, &min, &max) {
        return Err(ScopeError::OutOfBound(format!(
            "malformed range: min {min} is greater than max {max}"
        )));
    }
    Ok((min, max))
}
