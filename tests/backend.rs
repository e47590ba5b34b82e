//! Assembling the simulated microscope from a configuration and driving it
//! the way `scopectl` does.

use clap::Parser;
use rust_scope::backend::Backend;
use rust_scope::cli::{self, Cli, EXIT_FAILURE, EXIT_OK, EXIT_WRONG_ARGUMENT};
use rust_scope::config::ScopeConfig;
use rust_scope::handles::InstrumentHandles;
use rust_scope::introspect;
use scope_core::{Capability, EnumeratedAttribute, ScopeError, Value};

const SECOM: &str = r#"
[application]
name = "test"

[microscope]
name = "Optical"
role = "secom"

[[components]]
name = "Camera"
role = "ccd"
kind = "camera"

[components.attributes.exposureTime]
value = 0.05

[[components]]
name = "Lamp"
role = "light"
kind = "light"
affects = ["Camera"]

[components.attributes.emissions]
value = [0.0, 1.0]

[[components]]
name = "StageXY"
role = "stage"
kind = "stage"
axes = ["x", "y"]
affects = ["Camera"]

[components.attributes.speed]
value = 1.0

[[components]]
name = "FilterWheel"
role = "filter"
kind = "container"

[components.attributes.band]
value = "GFP"
choices = ["DAPI", "GFP"]

[[components]]
name = "Piezo"
role = "fine-focus"
kind = "stage"
parent = "FilterWheel"
axes = ["z"]
"#;

fn connect() -> Backend {
    Backend::connect(&ScopeConfig::from_toml_str(SECOM).unwrap()).unwrap()
}

fn run(args: &[&str], backend: &Backend) -> (i32, String) {
    let cli = Cli::try_parse_from(std::iter::once("scopectl").chain(args.iter().copied())).unwrap();
    let mut out = Vec::new();
    let code = cli::run(&cli, backend, &mut out);
    (code, String::from_utf8(out).unwrap())
}

#[test]
fn test_tree_matches_configuration() {
    let backend = connect();
    let microscope = backend.microscope();

    assert_eq!(microscope.name(), "Optical");
    assert_eq!(microscope.components().len(), 6);
    let piezo = microscope.find_by_name("Piezo").unwrap();
    assert_eq!(piezo.parent().unwrap().name(), "FilterWheel");
    assert!(piezo.has_capability(Capability::Actuator));

    let lamp = microscope.find_by_name("Lamp").unwrap();
    let affected: Vec<String> = lamp.affects().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(affected, ["Camera"]);
    assert_eq!(lamp.property("shape"), Some(&Value::tuple([2usize])));
}

#[test]
fn test_configured_attributes() {
    let backend = connect();
    let microscope = backend.microscope();

    assert_eq!(
        microscope.attribute("Camera", "exposureTime").unwrap().get(),
        Value::Float(0.05)
    );
    assert_eq!(
        microscope.attribute("Lamp", "emissions").unwrap().get(),
        Value::list([0.0, 1.0])
    );

    let band = microscope.attribute("FilterWheel", "band").unwrap();
    assert!(band.as_any().is::<EnumeratedAttribute>());
    assert!(matches!(
        band.set(Value::from("Cy5")),
        Err(ScopeError::OutOfBound(_))
    ));
    band.set_from_str("DAPI").unwrap();
    assert_eq!(band.get(), Value::from("DAPI"));
}

#[test]
fn test_out_of_range_initial_value_fails_connect() {
    let text = SECOM.replace("value = 0.05", "value = 50.0");
    let config = ScopeConfig::from_toml_str(&text).unwrap();
    let err = Backend::connect(&config).unwrap_err();
    assert!(format!("{err:#}").contains("exposureTime"));
}

#[test]
fn test_walk_order() {
    let backend = connect();
    let (code, out) = run(&["-l"], &backend);
    assert_eq!(code, EXIT_OK);
    let names: Vec<&str> = out
        .lines()
        .map(|l| l.split('\t').next().unwrap().trim_start_matches([' ', '↳']))
        .collect();
    assert_eq!(
        names,
        ["Optical", "Camera", "Lamp", "StageXY", "Piezo", "FilterWheel"]
    );
}

#[test]
fn test_list_prop() {
    let backend = connect();
    let (code, out) = run(&["-L", "StageXY"], &backend);
    assert_eq!(code, EXIT_OK);
    assert!(out.starts_with("Component 'StageXY':\n\trole: stage\n\taffects: 'Camera'\n"));
    assert!(out.contains("\taxes (RO Attribute)\t value: {'x', 'y'}\n"));
    assert!(out.contains("\tspeed (Vigilant Attribute)\t value: 1.0 (unit: m/s)\n"));

    let (code, _) = run(&["-L", "Nothing"], &backend);
    assert_eq!(code, EXIT_FAILURE);
}

#[test]
fn test_set_and_move_through_cli() {
    let backend = connect();
    let (code, _) = run(
        &["-s", "Camera", "binning", "2,2", "-s", "Camera", "exposureTime", "0.5"],
        &backend,
    );
    assert_eq!(code, EXIT_OK);
    let microscope = backend.microscope();
    assert_eq!(
        microscope.attribute("Camera", "resolution").unwrap().get(),
        Value::tuple([1024, 1024])
    );

    let (code, _) = run(&["-s", "Camera", "shutter", "1"], &backend);
    assert_eq!(code, EXIT_WRONG_ARGUMENT);

    let (code, _) = run(&["-m", "StageXY", "x", "10", "-m", "StageXY", "y", "-5"], &backend);
    assert_eq!(code, EXIT_OK);
    let position = microscope.attribute("StageXY", "position").unwrap().get();
    let x = position.get(&Value::from("x")).and_then(Value::as_f64).unwrap();
    let y = position.get(&Value::from("y")).and_then(Value::as_f64).unwrap();
    assert!((x - 10e-6).abs() < 1e-12);
    assert!((y + 5e-6).abs() < 1e-12);

    let (code, _) = run(&["-S"], &backend);
    assert_eq!(code, EXIT_OK);
}

#[test]
fn test_probe_roles() {
    let backend = connect();
    let handles = InstrumentHandles::probe(backend.microscope()).unwrap();
    assert_eq!(handles.microscope_role(), "secom");
    assert_eq!(handles.ccd().unwrap().name(), "Camera");
    assert_eq!(handles.stage().unwrap().name(), "StageXY");
    assert_eq!(handles.light().unwrap().name(), "Lamp");
    assert!(handles.focus().is_none());
    assert!(handles.get("fine-focus").is_none());
    handles.stop_motion().unwrap();
}

#[test]
fn test_probe_requires_emitter() {
    let text = SECOM.replace("role = \"light\"", "role = \"lamp\"");
    let backend = Backend::connect(&ScopeConfig::from_toml_str(&text).unwrap()).unwrap();
    let err = InstrumentHandles::probe(backend.microscope()).unwrap_err();
    assert!(matches!(err, ScopeError::NotFound(_)));
    assert!(err.to_string().contains("emitter"));
}

#[test]
fn test_release_stops_actuators() {
    let backend = connect();
    let mut out = Vec::new();
    introspect::print_tree(&mut out, backend.microscope()).unwrap();
    assert!(!out.is_empty());
    backend.release().unwrap();
}
