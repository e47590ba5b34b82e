//! Capability traits for hardware components.
//!
//! A component is classified by the capabilities it declares, not by its
//! concrete type: the microscope groups anything exposing [`Detector`] as a
//! detector, and so on. Driver code implements these traits and returns
//! `anyhow::Result` like any other hardware call.
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_core::capabilities::{Actuator, Stoppable};
//!
//! async fn nudge(stage: &dyn Actuator) -> anyhow::Result<()> {
//!     stage.move_rel([("x".to_string(), 1e-6)].into()).await?;
//!     stage.stop()
//! }
//! ```

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative displacement per axis, in metres.
pub type AxisShift = BTreeMap<String, f64>;

/// Capability for components that can interrupt whatever they are doing.
pub trait Stoppable: Send + Sync {
    /// Stop immediately. Must be safe to call when idle.
    fn stop(&self) -> anyhow::Result<()>;
}

/// Capability for components that move along named axes.
pub trait Actuator: Stoppable {
    /// Names of the axes that can be moved.
    fn axes(&self) -> Vec<String>;

    /// Start a relative move and return a future resolving when it is done.
    ///
    /// Unknown axes are an error of the returned future. The move keeps going
    /// if the future is dropped; use [`Stoppable::stop`] to interrupt it.
    fn move_rel(&self, shift: AxisShift) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Capability for components producing data (cameras, counters, ...).
pub trait Detector: Send + Sync {
    /// Shape of the sensor, e.g. `[width, height, depth]`.
    fn sensor_shape(&self) -> Vec<usize>;
}

/// Capability for components emitting energy onto the sample (light, e-beam).
pub trait Emitter: Send + Sync {
    /// Shape of the emission, e.g. the number of emission sources.
    fn emission_shape(&self) -> Vec<usize>;
}

/// Capability tags, for display and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Detector,
    Emitter,
    Actuator,
    Stoppable,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Capability::Detector => "detector",
            Capability::Emitter => "emitter",
            Capability::Actuator => "actuator",
            Capability::Stoppable => "stoppable",
        };
        f.write_str(name)
    }
}
