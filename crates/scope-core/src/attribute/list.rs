//! Sequence-valued attribute.

use super::{forward_attribute, Attribute};
use crate::error::{ScopeError, ScopeResult};
use crate::value::Value;

/// An attribute holding a list, tuple or set.
///
/// Elements are validated against the shape of the first initial element.
/// In-place edits go through [`ListAttribute::push`] and
/// [`ListAttribute::remove`], which are atomic and notify like `set`.
#[derive(Debug)]
pub struct ListAttribute {
    inner: Attribute,
}

impl ListAttribute {
    /// Create a sequence attribute. Fails with `InvalidType` if `initial` is
    /// not a sequence.
    pub fn new(initial: impl Into<Value>) -> ScopeResult<Self> {
        let initial = initial.into();
        if initial.as_seq().is_none() {
            return Err(ScopeError::InvalidType(format!(
                "a list attribute needs a sequence, got {} {initial}",
                initial.type_name()
            )));
        }
        Ok(Self {
            inner: Attribute::new(initial)?,
        })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.get().as_seq().map_or(0, <[Value]>::len)
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an element.
    pub fn push(&self, item: impl Into<Value>) -> ScopeResult<()> {
        let item = item.into();
        self.inner.modify(|value| {
            if let Value::Seq(_, items) = value {
                items.push(item);
            }
        })
    }

    /// Remove every element equal to `item`. Returns whether any was removed.
    pub fn remove(&self, item: &Value) -> ScopeResult<bool> {
        let mut removed = false;
        self.inner.modify(|value| {
            if let Value::Seq(_, items) = value {
                let before = items.len();
                items.retain(|i| i != item);
                removed = items.len() != before;
            }
        })?;
        Ok(removed)
    }
}

forward_attribute!(ListAttribute);
