//! Vigilant attributes: typed, validated, observable values.
//!
//! [`Attribute`] is the base container. [`ContinuousAttribute`],
//! [`EnumeratedAttribute`] and [`ListAttribute`] compose it and add a range, a
//! choice set or sequence-specific helpers. All of them implement
//! [`VigilantAttribute`], the type-erased interface through which front-ends
//! (CLI, GUI, remote proxies) reach attributes of a component.
//!
//! # Write path
//!
//! ```text
//! set(v) ──> readonly? ──> validate(shape, v) ──> [writer lock]
//!              │NotSettable      │InvalidType        │
//!                                             domain.check ──> OutOfBound
//!                                             changed? ──no──> Ok (silent)
//!                                             store, notify subscribers
//! ```
//!
//! # Concurrency
//!
//! Each attribute serializes its writers with a reentrant lock held across
//! validation, storage and the notification pass. Writers on other threads wait
//! for the whole pass; a subscriber that writes the same attribute from its
//! callback re-enters on the same thread and its write applies immediately
//! (nested, in order, not coalesced). The outer pass then resumes with the
//! value it started with, so subscribers after the one that wrote receive
//! the newer value first and the older one last; [`Attribute::get`] holds
//! the newer value. Readers only take a short read lock on the stored value
//! and are never held up by a slow subscriber.
//!
//! # Example
//!
//! ```rust
//! use scope_core::attribute::{Attribute, ContinuousAttribute};
//! use scope_core::subscription::Listener;
//! use std::sync::Arc;
//!
//! let exposure = ContinuousAttribute::new(0.1, (1e-6, 10.0))
//!     .unwrap()
//!     .with_unit("s");
//!
//! let listener: Listener = Arc::new(|v| println!("exposure now {v}"));
//! let handle = exposure.subscribe(&listener, false);
//!
//! exposure.set(0.5).unwrap();
//! assert!(exposure.set(20.0).is_err());
//! exposure.unsubscribe(handle);
//! ```

mod continuous;
mod enumerated;
mod list;

pub use continuous::ContinuousAttribute;
pub use enumerated::EnumeratedAttribute;
pub use list::ListAttribute;

use parking_lot::{ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{ScopeError, ScopeResult};
use crate::subscription::{Listener, SubscriptionHandle, SubscriptionRegistry};
use crate::validate::{coerce_shape, validate, Shape};
use crate::value::{SeqKind, Value};

// =============================================================================
// VigilantAttribute Trait - Generic Attribute Access
// =============================================================================

/// Type-erased access to any attribute.
///
/// This is what a component exposes to front-ends. It deliberately has no owner
/// update path: read-only attributes can only be changed by the component that
/// holds the concrete attribute.
pub trait VigilantAttribute: Send + Sync {
    /// Current value.
    fn get(&self) -> Value;

    /// Validate and assign a new value, notifying subscribers if it changed.
    fn set(&self, value: Value) -> ScopeResult<()>;

    /// Coerce `text` to the shape of the current value, then `set` it.
    fn set_from_str(&self, text: &str) -> ScopeResult<()>;

    /// Register a listener; with `init`, deliver the current value once now.
    fn subscribe(&self, listener: &Listener, init: bool) -> SubscriptionHandle;

    /// Remove a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Display metadata.
    fn metadata(&self) -> &AttributeMetadata;

    /// Declared shape.
    fn shape(&self) -> &Shape;

    /// Current domain.
    fn domain(&self) -> Domain;

    /// Number of live subscribers.
    fn subscriber_count(&self) -> usize;

    /// Downcast support for callers that know the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Whether writes from front-ends are refused.
    fn is_readonly(&self) -> bool {
        self.metadata().readonly
    }

    /// Unit, for display only.
    fn unit(&self) -> Option<&str> {
        self.metadata().unit.as_deref()
    }

    /// Current value as JSON, for a remote transport.
    fn get_json(&self) -> serde_json::Value {
        self.get().to_json()
    }

    /// Assign from JSON. The value is validated like any other `set`.
    fn set_json(&self, json: &serde_json::Value) -> ScopeResult<()> {
        self.set(Value::from_json(json))
    }
}

/// Display metadata of an attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Physical unit (e.g. "m", "s", "W").
    pub unit: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Whether front-ends may write the attribute.
    pub readonly: bool,
}

// =============================================================================
// Domain
// =============================================================================

/// The set of values an attribute may hold beyond its shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Any value of the right shape.
    Unbounded,
    /// Inclusive bounds; sequences are bounded element-wise.
    Range { min: Value, max: Value },
    /// Allowed values.
    Choices(Vec<Value>),
}

impl Domain {
    /// Check that `value` lies in this domain.
    pub fn check(&self, value: &Value) -> ScopeResult<()> {
        match self {
            Domain::Unbounded => Ok(()),
            Domain::Range { min, max } => {
                if within(value, min, max) {
                    Ok(())
                } else {
                    Err(ScopeError::OutOfBound(format!(
                        "{value} is not in range [{min}, {max}]"
                    )))
                }
            }
            Domain::Choices(choices) => {
                if choices.contains(value) {
                    Ok(())
                } else {
                    Err(ScopeError::OutOfBound(format!(
                        "{value} is not one of {}",
                        Value::Seq(SeqKind::Set, choices.clone())
                    )))
                }
            }
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

/// `min <= value <= max`, element-wise for sequences of equal length.
pub(crate) fn within(value: &Value, min: &Value, max: &Value) -> bool {
    match (value, min, max) {
        (Value::Seq(_, v), Value::Seq(_, lo), Value::Seq(_, hi)) => {
            v.len() == lo.len()
                && v.len() == hi.len()
                && v
                    .iter()
                    .zip(lo.iter().zip(hi.iter()))
                    .all(|(v, (lo, hi))| within(v, lo, hi))
        }
        _ => matches!(
            (compare(min, value), compare(value, max)),
            (
                Some(Ordering::Less | Ordering::Equal),
                Some(Ordering::Less | Ordering::Equal)
            )
        ),
    }
}

// =============================================================================
// Attribute
// =============================================================================

struct State {
    value: Value,
    domain: Domain,
}

/// A typed, validated, observable value.
pub struct Attribute {
    shape: Shape,
    metadata: AttributeMetadata,
    /// Serializes writers, held across the notification pass.
    writer: ReentrantMutex<()>,
    state: RwLock<State>,
    subscribers: SubscriptionRegistry,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Attribute")
            .field("value", &state.value)
            .field("shape", &self.shape)
            .field("domain", &state.domain)
            .field("metadata", &self.metadata)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Attribute {
    /// Create an attribute whose shape is the shape of `initial`.
    ///
    /// Mixed numeric sequences are normalized to the shape of their first
    /// element (`[2.0, 5, 4]` becomes `[2.0, 5.0, 4.0]`).
    pub fn new(initial: impl Into<Value>) -> ScopeResult<Self> {
        let initial = initial.into();
        let shape = Shape::of(&initial);
        Self::typed(shape, initial)
    }

    /// Create an attribute with an explicitly declared shape.
    pub fn typed(shape: Shape, initial: impl Into<Value>) -> ScopeResult<Self> {
        Self::with_domain(shape, initial.into(), Domain::Unbounded)
    }

    pub(crate) fn with_domain(shape: Shape, initial: Value, domain: Domain) -> ScopeResult<Self> {
        let value = validate(&shape, initial)?;
        domain.check(&value)?;
        Ok(Self {
            shape,
            metadata: AttributeMetadata::default(),
            writer: ReentrantMutex::new(()),
            state: RwLock::new(State { value, domain }),
            subscribers: SubscriptionRegistry::new(),
        })
    }

    /// Add a unit (display only).
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.metadata.unit = Some(unit.into());
        self
    }

    /// Add a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = Some(description.into());
        self
    }

    /// Refuse writes from front-ends. The owner can still use [`Attribute::update`].
    pub fn read_only(mut self) -> Self {
        self.metadata.readonly = true;
        self
    }

    /// Current value.
    pub fn get(&self) -> Value {
        self.state.read().value.clone()
    }

    /// Current value converted to a Rust type.
    pub fn get_as<T>(&self) -> ScopeResult<T>
    where
        T: TryFrom<Value, Error = ScopeError>,
    {
        T::try_from(self.get())
    }

    /// Assign a new value.
    ///
    /// Fails with `NotSettable` on a read-only attribute, `InvalidType` if the
    /// value does not match the shape and `OutOfBound` if it is outside the
    /// domain. Subscribers are notified only if the value changed.
    pub fn set(&self, value: impl Into<Value>) -> ScopeResult<()> {
        self.ensure_settable()?;
        self.write(value.into())
    }

    /// Owner update path: like [`Attribute::set`] but allowed on read-only
    /// attributes. Drivers use it to publish new hardware readings.
    pub fn update(&self, value: impl Into<Value>) -> ScopeResult<()> {
        self.write(value.into())
    }

    /// Coerce `text` to the declared shape and assign it.
    ///
    /// Parts of the shape unknown at construction (elements of an initially
    /// empty list) are taken from the current value; if it does not tell
    /// either, elements are kept as strings.
    pub fn set_from_str(&self, text: &str) -> ScopeResult<()> {
        self.ensure_settable()?;
        let shape = self.shape.refined_by(&Shape::of(&self.get()));
        let value = coerce_shape(&shape, text)?;
        self.write(value)
    }

    /// Atomically read, modify and write the value.
    ///
    /// Other writers cannot interleave between the read and the write.
    pub fn modify<F>(&self, f: F) -> ScopeResult<()>
    where
        F: FnOnce(&mut Value),
    {
        self.ensure_settable()?;
        let _writer = self.writer.lock();
        let mut value = self.get();
        f(&mut value);
        self.write(value)
    }

    fn ensure_settable(&self) -> ScopeResult<()> {
        if self.metadata.readonly {
            return Err(ScopeError::NotSettable(format!(
                "cannot change a read-only {} attribute",
                self.shape
            )));
        }
        Ok(())
    }

    fn write(&self, candidate: Value) -> ScopeResult<()> {
        let value = validate(&self.shape, candidate)?;
        let _writer = self.writer.lock();
        {
            let mut state = self.state.write();
            state.domain.check(&value)?;
            if state.value == value {
                return Ok(());
            }
            state.value = value.clone();
        }
        tracing::trace!(%value, "attribute changed");
        self.subscribers.notify(&value);
        Ok(())
    }

    /// Replace the domain without notifying subscribers.
    ///
    /// Rejected with `OutOfBound` if the current value is not in `domain`.
    pub(crate) fn replace_domain(&self, domain: Domain) -> ScopeResult<()> {
        let _writer = self.writer.lock();
        let mut state = self.state.write();
        domain.check(&state.value)?;
        state.domain = domain;
        Ok(())
    }

    /// Register a listener, held weakly.
    ///
    /// With `init`, the listener receives the current value once before this
    /// returns; that delivery counts like any other notification.
    pub fn subscribe(&self, listener: &Listener, init: bool) -> SubscriptionHandle {
        if !init {
            return self.subscribers.subscribe(listener);
        }
        let _writer = self.writer.lock();
        let handle = self.subscribers.subscribe(listener);
        self.subscribers.notify_one(handle, &self.get());
        handle
    }

    /// Register `method` of `owner`, holding the owner weakly.
    pub fn subscribe_bound<O, F>(&self, owner: &Arc<O>, method: F, init: bool) -> SubscriptionHandle
    where
        O: Send + Sync + 'static,
        F: Fn(&O, &Value) + Send + Sync + 'static,
    {
        if !init {
            return self.subscribers.subscribe_bound(owner, method);
        }
        let _writer = self.writer.lock();
        let handle = self.subscribers.subscribe_bound(owner, method);
        self.subscribers.notify_one(handle, &self.get());
        handle
    }

    /// Remove a subscription. Unknown or already removed handles are ignored.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscribers.unsubscribe(handle);
    }

    /// Display metadata.
    pub fn metadata(&self) -> &AttributeMetadata {
        &self.metadata
    }

    /// Declared shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Current domain.
    pub fn domain(&self) -> Domain {
        self.state.read().domain.clone()
    }

    /// Whether front-end writes are refused.
    pub fn is_readonly(&self) -> bool {
        self.metadata.readonly
    }

    /// Unit, if any.
    pub fn unit(&self) -> Option<&str> {
        self.metadata.unit.as_deref()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl VigilantAttribute for Attribute {
    fn get(&self) -> Value {
        Attribute::get(self)
    }

    fn set(&self, value: Value) -> ScopeResult<()> {
        Attribute::set(self, value)
    }

    fn set_from_str(&self, text: &str) -> ScopeResult<()> {
        Attribute::set_from_str(self, text)
    }

    fn subscribe(&self, listener: &Listener, init: bool) -> SubscriptionHandle {
        Attribute::subscribe(self, listener, init)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        Attribute::unsubscribe(self, handle)
    }

    fn metadata(&self) -> &AttributeMetadata {
        &self.metadata
    }

    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn domain(&self) -> Domain {
        Attribute::domain(self)
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Forward the base attribute API (inherent methods, metadata builders and
/// [`VigilantAttribute`]) to the `inner` attribute of a specialization.
macro_rules! forward_attribute {
    ($ty:ident) => {
        impl $ty {
            /// The underlying base attribute.
            pub fn attribute(&self) -> &$crate::attribute::Attribute {
                &self.inner
            }

            /// Add a unit (display only).
            pub fn with_unit(self, unit: impl Into<String>) -> Self {
                Self {
                    inner: self.inner.with_unit(unit),
                }
            }

            /// Add a description.
            pub fn with_description(self, description: impl Into<String>) -> Self {
                Self {
                    inner: self.inner.with_description(description),
                }
            }

            /// Refuse writes from front-ends.
            pub fn read_only(self) -> Self {
                Self {
                    inner: self.inner.read_only(),
                }
            }

            /// Current value.
            pub fn get(&self) -> $crate::value::Value {
                self.inner.get()
            }

            /// Current value converted to a Rust type.
            pub fn get_as<T>(&self) -> $crate::error::ScopeResult<T>
            where
                T: TryFrom<$crate::value::Value, Error = $crate::error::ScopeError>,
            {
                self.inner.get_as()
            }

            /// Validate and assign a new value, notifying subscribers if it changed.
            pub fn set(&self, value: impl Into<$crate::value::Value>) -> $crate::error::ScopeResult<()> {
                self.inner.set(value)
            }

            /// Owner update path, allowed on read-only attributes.
            pub fn update(&self, value: impl Into<$crate::value::Value>) -> $crate::error::ScopeResult<()> {
                self.inner.update(value)
            }

            /// Coerce `text` to the current shape and assign it.
            pub fn set_from_str(&self, text: &str) -> $crate::error::ScopeResult<()> {
                self.inner.set_from_str(text)
            }

            /// Register a listener, held weakly.
            pub fn subscribe(
                &self,
                listener: &$crate::subscription::Listener,
                init: bool,
            ) -> $crate::subscription::SubscriptionHandle {
                self.inner.subscribe(listener, init)
            }

            /// Register `method` of `owner`, holding the owner weakly.
            pub fn subscribe_bound<O, F>(
                &self,
                owner: &std::sync::Arc<O>,
                method: F,
                init: bool,
            ) -> $crate::subscription::SubscriptionHandle
            where
                O: Send + Sync + 'static,
                F: Fn(&O, &$crate::value::Value) + Send + Sync + 'static,
            {
                self.inner.subscribe_bound(owner, method, init)
            }

            /// Remove a subscription. Unknown handles are ignored.
            pub fn unsubscribe(&self, handle: $crate::subscription::SubscriptionHandle) {
                self.inner.unsubscribe(handle)
            }

            /// Whether front-end writes are refused.
            pub fn is_readonly(&self) -> bool {
                self.inner.is_readonly()
            }

            /// Unit, if any.
            pub fn unit(&self) -> Option<&str> {
                self.inner.unit()
            }

            /// Number of live subscribers.
            pub fn subscriber_count(&self) -> usize {
                self.inner.subscriber_count()
            }
        }

        impl $crate::attribute::VigilantAttribute for $ty {
            fn get(&self) -> $crate::value::Value {
                self.inner.get()
            }

            fn set(&self, value: $crate::value::Value) -> $crate::error::ScopeResult<()> {
                self.inner.set(value)
            }

            fn set_from_str(&self, text: &str) -> $crate::error::ScopeResult<()> {
                self.inner.set_from_str(text)
            }

            fn subscribe(
                &self,
                listener: &$crate::subscription::Listener,
                init: bool,
            ) -> $crate::subscription::SubscriptionHandle {
                self.inner.subscribe(listener, init)
            }

            fn unsubscribe(&self, handle: $crate::subscription::SubscriptionHandle) {
                self.inner.unsubscribe(handle)
            }

            fn metadata(&self) -> &$crate::attribute::AttributeMetadata {
                self.inner.metadata()
            }

            fn shape(&self) -> &$crate::validate::Shape {
                self.inner.shape()
            }

            fn domain(&self) -> $crate::attribute::Domain {
                self.inner.domain()
            }

            fn subscriber_count(&self) -> usize {
                self.inner.subscriber_count()
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}

pub(crate) use forward_attribute;

// =============================================================================
// Tests
// =============================================================================
