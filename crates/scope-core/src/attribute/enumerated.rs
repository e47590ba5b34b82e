//! Attribute restricted to a set of choices.

use super::{forward_attribute, Attribute, Domain};
use crate::error::{ScopeError, ScopeResult};
use crate::validate::{validate, Shape};
use crate::value::{dedup, SeqKind, Value};

/// An attribute whose value must be one of a set of choices.
///
/// Choices are not required to share the attribute's shape; a candidate is
/// first type-checked, then looked up in the choices. Choices that fit the
/// shape are stored in its form, so an integer choice of a float attribute is
/// kept as the equivalent float.
#[derive(Debug)]
pub struct EnumeratedAttribute {
    inner: Attribute,
}

impl EnumeratedAttribute {
    /// Create an enumerated attribute. `choices` is any sequence; duplicates
    /// are dropped. A mapping is accepted too, its keys being the choices.
    pub fn new(initial: impl Into<Value>, choices: impl Into<Value>) -> ScopeResult<Self> {
        let initial = initial.into();
        let shape = Shape::of(&initial);
        let choices = parse_choices(&shape, choices.into())?;
        let inner = Attribute::with_domain(shape, initial, Domain::Choices(choices))?;
        Ok(Self { inner })
    }

    /// Current choices, as a set.
    pub fn choices(&self) -> Value {
        match self.inner.domain() {
            Domain::Choices(choices) => Value::Seq(SeqKind::Set, choices),
            _ => Value::Seq(SeqKind::Set, Vec::new()),
        }
    }

    /// Replace the choices. Subscribers are not notified.
    ///
    /// Rejected with `OutOfBound` if the current value is not among them.
    pub fn set_choices(&self, choices: impl Into<Value>) -> ScopeResult<()> {
        let choices = parse_choices(self.inner.shape(), choices.into())?;
        self.inner.replace_domain(Domain::Choices(choices))
    }
}

forward_attribute!(EnumeratedAttribute);

fn parse_choices(shape: &Shape, choices: Value) -> ScopeResult<Vec<Value>> {
    let items = match choices {
        Value::Seq(_, items) => items,
        Value::Map(entries) => entries.into_iter().map(|(k, _)| k).collect(),
        other => {
            return Err(ScopeError::InvalidType(format!(
                "choices must be a collection, got {} {other}",
                other.type_name()
            )))
        }
    };
    Ok(dedup(
        items
            .into_iter()
            .map(|choice| validate(shape, choice.clone()).unwrap_or(choice)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_choices_use_keys() {
        let attr = EnumeratedAttribute::new(
            Value::tuple([1, 1]),
            Value::map([
                (Value::tuple([1, 1]), "1x1"),
                (Value::tuple([2, 2]), "2x2"),
            ]),
        )
        .unwrap();
        attr.set(Value::tuple([2, 2])).unwrap();
        assert!(attr.choices().contains(&Value::tuple([1, 1])));
        assert!(matches!(
            attr.set(Value::tuple([3, 3])),
            Err(ScopeError::OutOfBound(_))
        ));
    }

    #[test]
    fn test_choices_must_be_collection() {
        let err = EnumeratedAttribute::new(1, 1).unwrap_err();
        assert!(matches!(err, ScopeError::InvalidType(_)));
    }

    #[test]
    fn test_initial_must_be_a_choice() {
        let err = EnumeratedAttribute::new("x", Value::set(["a", "b"])).unwrap_err();
        assert!(matches!(err, ScopeError::OutOfBound(_)));
    }

    #[test]
    fn test_integer_choices_of_float_attribute() {
        let attr = EnumeratedAttribute::new(0.5, Value::set([Value::from(0.5), Value::from(1)]))
            .unwrap();
        attr.set(1.0).unwrap();
        assert_eq!(attr.get(), Value::Float(1.0));
        attr.set(0.5).unwrap();
        attr.set(1).unwrap();
        assert_eq!(attr.get(), Value::Float(1.0));
        assert!(attr.choices().contains(&Value::Float(1.0)));

        let attr = EnumeratedAttribute::new(1.0, Value::list([1, 2])).unwrap();
        attr.set_from_str("2").unwrap();
        assert_eq!(attr.get(), Value::Float(2.0));

        attr.set_choices(Value::list([1, 2, 3])).unwrap();
        attr.set(3).unwrap();
    }

    #[test]
    fn test_mixed_choices_keep_foreign_values() {
        let attr = EnumeratedAttribute::new("a", Value::set([Value::from("a"), Value::from(5)]))
            .unwrap();
        assert!(attr.choices().contains(&Value::from(5)));
        assert!(matches!(attr.set(5), Err(ScopeError::InvalidType(_))));
    }

    #[test]
    fn test_set_from_str_checks_choices() {
        let attr = EnumeratedAttribute::new(1, Value::set([1, 2, 4])).unwrap();
        attr.set_from_str("4").unwrap();
        assert_eq!(attr.get(), Value::Int(4));
        assert!(matches!(
            attr.set_from_str("3"),
            Err(ScopeError::OutOfBound(_))
        ));
    }
}
