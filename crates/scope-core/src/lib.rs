//! Core types for rust-scope.
//!
//! This crate holds the observable attribute model and the component tree
//! every front-end works with:
//!
//! - [`value`]: the dynamic [`Value`] carried by attributes
//! - [`validate`]: shape checks and coercion from text
//! - [`attribute`]: vigilant attributes and their range/choice/list variants
//! - [`subscription`]: weakly-held change listeners
//! - [`component`], [`microscope`]: the instrument tree
//! - [`capabilities`]: traits drivers implement to be classified
//!
//! It does not initialise logging, read configuration or talk to hardware.

pub mod attribute;
pub mod capabilities;
pub mod component;
pub mod error;
pub mod microscope;
pub mod subscription;
pub mod validate;
pub mod value;

pub use attribute::{
    Attribute, AttributeMetadata, ContinuousAttribute, Domain, EnumeratedAttribute,
    ListAttribute, VigilantAttribute,
};
pub use capabilities::{Actuator, AxisShift, Capability, Detector, Emitter, Stoppable};
pub use component::{Component, ComponentBuilder};
pub use error::{ErrorKind, ScopeError, ScopeResult, StopFailure};
pub use microscope::{Microscope, WalkEntry};
pub use subscription::{Listener, SubscriptionHandle};
pub use validate::Shape;
pub use value::{SeqKind, Value};
