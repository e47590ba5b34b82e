//! Simulated hardware
//!
//! Drivers that behave like real instruments without any device attached.
//! Each one owns its vigilant attributes and returns a [`ComponentBuilder`]
//! exposing them along with its capability.
//!
//! # Available Simulators
//!
//! - `SimStage` - actuator with named axes, moves run on their own thread
//! - `SimCamera` - detector with exposure time, binning and resolution
//! - `SimLight` - emitter with power and per-source emissions
//!
//! [`ComponentBuilder`]: scope_core::ComponentBuilder

pub mod camera;
pub mod light;
pub mod stage;

pub use camera::SimCamera;
pub use light::SimLight;
pub use stage::SimStage;
