//! Application library for the rust_scope microscope tools.
//!
//! The attribute model and the component tree live in `scope_core`; this
//! crate adds what a running instrument needs around them: configuration,
//! logging, simulated drivers, the backend that assembles the tree, and the
//! `scopectl` command line front-end.

pub mod backend;
pub mod cli;
pub mod config;
pub mod handles;
pub mod hardware;
pub mod introspect;
pub mod logging;

pub use scope_core;
