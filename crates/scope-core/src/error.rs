//! Error types for the attribute model and the component tree.
//!
//! `ScopeError` is the single error type returned by every operation of this
//! crate. The variants follow the error taxonomy shared by all front-ends:
//!
//! - **`InvalidType`**: a value does not match the declared shape of an attribute,
//!   or could not be coerced from text.
//! - **`UnsupportedType`**: the declared shape has no validation/coercion rule.
//! - **`OutOfBound`**: a value is outside the range/choices, or a new domain would
//!   exclude the current value.
//! - **`NotSettable`**: a write was attempted on a read-only attribute.
//! - **`NotFound`**: a component or attribute lookup failed.
//!
//! Tree construction adds `DuplicateName` and `CyclicTree`, and the stop sweep
//! reports every individual failure through `StopFailed`.
//!
//! A remote transport only needs to carry [`ErrorKind`] and the message to
//! rebuild an equivalent error on the other side, see [`ScopeError::from_kind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience alias for results using the core error type.
pub type ScopeResult<T> = std::result::Result<T, ScopeError>;

/// A component that failed to stop during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopFailure {
    /// Name of the component whose `stop` failed.
    pub component: String,
    /// Rendered error returned by the component.
    pub message: String,
}

impl std::fmt::Display for StopFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.component, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScopeError {
    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Out of bound: {0}")]
    OutOfBound(String),

    #[error("Attribute is read-only: {0}")]
    NotSettable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate component name '{0}' in the tree")]
    DuplicateName(String),

    #[error("Adding '{0}' would create a cycle in the component tree")]
    CyclicTree(String),

    #[error("Failed to stop {} component(s): {}", .0.len(), format_failures(.0))]
    StopFailed(Vec<StopFailure>),
}

fn format_failures(failures: &[StopFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Transport-neutral error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidType,
    UnsupportedType,
    OutOfBound,
    NotSettable,
    NotFound,
    DuplicateName,
    CyclicTree,
    StopFailed,
}

impl ScopeError {
    /// The kind of this error, stable across process boundaries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScopeError::InvalidType(_) => ErrorKind::InvalidType,
            ScopeError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            ScopeError::OutOfBound(_) => ErrorKind::OutOfBound,
            ScopeError::NotSettable(_) => ErrorKind::NotSettable,
            ScopeError::NotFound(_) => ErrorKind::NotFound,
            ScopeError::DuplicateName(_) => ErrorKind::DuplicateName,
            ScopeError::CyclicTree(_) => ErrorKind::CyclicTree,
            ScopeError::StopFailed(_) => ErrorKind::StopFailed,
        }
    }

    /// Rebuild an error from its kind and detail message.
    ///
    /// `StopFailed` has no per-component detail once flattened, so the message is
    /// kept as a single failure entry.
    pub fn from_kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            ErrorKind::InvalidType => ScopeError::InvalidType(detail),
            ErrorKind::UnsupportedType => ScopeError::UnsupportedType(detail),
            ErrorKind::OutOfBound => ScopeError::OutOfBound(detail),
            ErrorKind::NotSettable => ScopeError::NotSettable(detail),
            ErrorKind::NotFound => ScopeError::NotFound(detail),
            ErrorKind::DuplicateName => ScopeError::DuplicateName(detail),
            ErrorKind::CyclicTree => ScopeError::CyclicTree(detail),
            ErrorKind::StopFailed => ScopeError::StopFailed(vec![StopFailure {
                component: String::new(),
                message: detail,
            }]),
        }
    }

    /// The detail message carried by the error, without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            ScopeError::InvalidType(d)
            | ScopeError::UnsupportedType(d)
            | ScopeError::OutOfBound(d)
            | ScopeError::NotSettable(d)
            | ScopeError::NotFound(d)
            | ScopeError::DuplicateName(d)
            | ScopeError::CyclicTree(d) => d.clone(),
            ScopeError::StopFailed(failures) => format_failures(failures),
        }
    }
}
