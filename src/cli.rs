//! `scopectl`: inspect and drive the microscope from the command line.
//!
//! Every action works on the backend built from the configuration file. The
//! process exit code tells how it went:
//!
//! | code | meaning |
//! |------|---------|
//! | 0    | success |
//! | 127  | failure (lookup, conversion, backend) |
//! | 129  | wrong attribute or axis, or move too large |

use clap::{ArgGroup, Parser};
use futures::executor::block_on;
use scope_core::{AxisShift, Microscope, ScopeError};
use std::io::Write;
use std::path::PathBuf;

use crate::backend::Backend;
use crate::config::DEFAULT_CONFIG_PATH;
use crate::introspect;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 127;
pub const EXIT_WRONG_ARGUMENT: i32 = 129;

/// Largest relative move accepted, in m.
pub const MAX_DISTANCE: f64 = 0.1;

#[derive(Parser, Debug)]
#[command(name = "scopectl", version)]
#[command(about = "Command line interface to the microscope", long_about = None)]
#[command(group(
    ArgGroup::new("action").args(["list", "list_prop", "set_attr", "moves", "stop"])
))]
pub struct Cli {
    /// Configuration file describing the microscope
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Verbosity level (0-2); the configuration's log level if absent
    #[arg(long, value_name = "LEVEL", value_parser = clap::value_parser!(u8).range(0..=2))]
    pub log_level: Option<u8>,

    /// List the components of the microscope
    #[arg(short, long)]
    pub list: bool,

    /// List the properties of a component
    #[arg(short = 'L', long, value_name = "COMPONENT")]
    pub list_prop: Option<String>,

    /// Set the attribute of a component (lists are delimited by commas)
    #[arg(
        short,
        long,
        num_args = 3,
        action = clap::ArgAction::Append,
        allow_negative_numbers = true,
        value_names = ["COMPONENT", "ATTRIBUTE", "VALUE"]
    )]
    pub set_attr: Vec<String>,

    /// Move the axis by the given amount of µm
    #[arg(
        short,
        long = "move",
        num_args = 3,
        action = clap::ArgAction::Append,
        allow_negative_numbers = true,
        value_names = ["COMPONENT", "AXIS", "DISTANCE"]
    )]
    pub moves: Vec<String>,

    /// Immediately stop all the actuators in all directions
    #[arg(short = 'S', long)]
    pub stop: bool,
}

/// The single action requested on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<'a> {
    List,
    ListProp(&'a str),
    SetAttr(Vec<[&'a str; 3]>),
    Move(Vec<[&'a str; 3]>),
    Stop,
}

impl Cli {
    pub fn action(&self) -> Option<Action<'_>> {
        if self.list {
            Some(Action::List)
        } else if let Some(name) = &self.list_prop {
            Some(Action::ListProp(name))
        } else if !self.set_attr.is_empty() {
            Some(Action::SetAttr(triples(&self.set_attr)))
        } else if !self.moves.is_empty() {
            Some(Action::Move(triples(&self.moves)))
        } else if self.stop {
            Some(Action::Stop)
        } else {
            None
        }
    }
}

fn triples(args: &[String]) -> Vec<[&str; 3]> {
    args.chunks_exact(3)
        .map(|c| [c[0].as_str(), c[1].as_str(), c[2].as_str()])
        .collect()
}

/// Perform the requested action and return the process exit code.
pub fn run(cli: &Cli, backend: &Backend, out: &mut impl Write) -> i32 {
    let microscope = backend.microscope();
    let Some(action) = cli.action() else {
        tracing::error!("No action specified.");
        return EXIT_FAILURE;
    };
    match action {
        Action::List => list_components(microscope, out),
        Action::ListProp(name) => list_properties(microscope, name, out),
        Action::SetAttr(items) => items
            .into_iter()
            .map(|[comp, attr, value]| set_attr(microscope, comp, attr, value))
            .find(|code| *code != EXIT_OK)
            .unwrap_or(EXIT_OK),
        Action::Move(items) => items
            .into_iter()
            .map(|[comp, axis, distance]| move_axis(microscope, comp, axis, distance))
            .find(|code| *code != EXIT_OK)
            .unwrap_or(EXIT_OK),
        Action::Stop => stop_move(microscope),
    }
}

pub fn list_components(microscope: &Microscope, out: &mut impl Write) -> i32 {
    match introspect::print_tree(out, microscope) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!(error = %e, "Failed to print the component tree");
            EXIT_FAILURE
        }
    }
}

pub fn list_properties(microscope: &Microscope, name: &str, out: &mut impl Write) -> i32 {
    let Ok(component) = microscope.find_by_name(name) else {
        tracing::error!("Failed to find component '{name}'");
        return EXIT_FAILURE;
    };
    match introspect::print_attributes(out, &component) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!(error = %e, "Failed to print component '{name}'");
            EXIT_FAILURE
        }
    }
}

/// Set `attr` of `comp` from its textual form.
pub fn set_attr(microscope: &Microscope, comp: &str, attr: &str, text: &str) -> i32 {
    let Ok(component) = microscope.find_by_name(comp) else {
        tracing::error!("Failed to find component '{comp}'");
        return EXIT_FAILURE;
    };
    let Ok(attribute) = component.attribute(attr) else {
        tracing::error!("Failed to find attribute '{attr}' on component '{comp}'");
        return EXIT_WRONG_ARGUMENT;
    };

    match attribute.set_from_str(text) {
        Ok(()) => EXIT_OK,
        Err(ScopeError::UnsupportedType(detail)) => {
            tracing::error!("'{attr}' is of unsupported type: {detail}");
            EXIT_FAILURE
        }
        Err(ScopeError::InvalidType(detail)) => {
            tracing::error!("Impossible to convert '{text}': {detail}");
            EXIT_FAILURE
        }
        Err(e) => {
            tracing::error!("Failed to set attribute '{attr}' of component '{comp}': {e}");
            EXIT_FAILURE
        }
    }
}

/// Move `axis` of actuator `comp` by `distance` µm and wait for the end of the move.
pub fn move_axis(microscope: &Microscope, comp: &str, axis: &str, distance: &str) -> i32 {
    let Ok(component) = microscope.find_actuator(comp) else {
        tracing::error!("Failed to find actuator '{comp}'");
        return EXIT_FAILURE;
    };
    let Some(actuator) = component.as_actuator() else {
        tracing::error!("Failed to find actuator '{comp}'");
        return EXIT_FAILURE;
    };
    if !actuator.axes().iter().any(|a| a == axis) {
        tracing::error!("Actuator {comp} has no axis '{axis}'");
        return EXIT_WRONG_ARGUMENT;
    }

    let distance = match distance.trim().parse::<f64>() {
        Ok(d) if d.is_finite() => d * 1e-6,
        _ => {
            tracing::error!("Distance '{distance}' cannot be converted to a number");
            return EXIT_FAILURE;
        }
    };
    if distance.abs() > MAX_DISTANCE {
        tracing::error!("Distance of {distance} m is too big (> {MAX_DISTANCE} m)");
        return EXIT_WRONG_ARGUMENT;
    }

    let shift: AxisShift = [(axis.to_string(), distance)].into_iter().collect();
    match block_on(actuator.move_rel(shift)) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!("Failed to move axis {axis} of component {comp}: {e:#}");
            EXIT_FAILURE
        }
    }
}

/// Stop every actuator of the microscope.
pub fn stop_move(microscope: &Microscope) -> i32 {
    match microscope.stop_all() {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!("{e}");
            EXIT_FAILURE
        }
    }
}
