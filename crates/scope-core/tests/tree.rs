//! Component tree lookup, classification and the stop sweep.

use anyhow::bail;
use futures::future::BoxFuture;
use futures::FutureExt;
use scope_core::{
    Actuator, Attribute, AxisShift, Component, Detector, Emitter, Microscope, ScopeError,
    Stoppable, Value,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct FakeStage {
    stops: AtomicUsize,
    jammed: bool,
}

impl FakeStage {
    fn new(jammed: bool) -> Arc<Self> {
        Arc::new(Self {
            stops: AtomicUsize::new(0),
            jammed,
        })
    }
}

impl Stoppable for FakeStage {
    fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.jammed {
            bail!("motor controller not responding");
        }
        Ok(())
    }
}

impl Actuator for FakeStage {
    fn axes(&self) -> Vec<String> {
        vec!["x".into(), "y".into()]
    }

    fn move_rel(&self, _shift: AxisShift) -> BoxFuture<'static, anyhow::Result<()>> {
        async { Ok(()) }.boxed()
    }
}

struct FakeCamera;

impl Detector for FakeCamera {
    fn sensor_shape(&self) -> Vec<usize> {
        vec![640, 480, 4096]
    }
}

struct FakeLight;

impl Emitter for FakeLight {
    fn emission_shape(&self) -> Vec<usize> {
        vec![1]
    }
}

struct Bench {
    microscope: Microscope,
    stages: Vec<Arc<FakeStage>>,
}

fn bench() -> Bench {
    let stages = vec![FakeStage::new(false), FakeStage::new(true), FakeStage::new(false)];
    let camera = Component::builder("Camera", "ccd")
        .detector(Arc::new(FakeCamera))
        .attribute("exposureTime", Arc::new(Attribute::new(0.1).unwrap()))
        .data_flow("data")
        .build();
    let light = Component::builder("Lamp", "light")
        .emitter(Arc::new(FakeLight))
        .affects(&camera)
        .build();

    let mut root = Component::builder("Optical", "optical")
        .child(camera)
        .child(light);
    for (name, stage) in ["StageXY", "Focus", "Aligner"].iter().zip(&stages) {
        let comp = Component::builder(*name, "actuator")
            .actuator(stage.clone())
            .build();
        root = root.child(comp);
    }

    Bench {
        microscope: Microscope::new(root.build()).unwrap(),
        stages,
    }
}

#[test]
fn lookup_by_name_is_unique() {
    let bench = bench();
    let camera = bench.microscope.find_by_name("Camera").unwrap();
    assert_eq!(camera.role(), "ccd");
    assert_eq!(camera.data_flows(), ["data".to_string()]);
    assert_eq!(
        camera.property("shape"),
        Some(&Value::tuple([640usize, 480, 4096]))
    );

    assert!(matches!(
        bench.microscope.find_by_name("Nope"),
        Err(ScopeError::NotFound(_))
    ));
}

#[test]
fn lookup_by_role_returns_all_matches() {
    let bench = bench();
    let names: HashSet<String> = bench
        .microscope
        .find_by_role("actuator")
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let expected: HashSet<String> = ["StageXY", "Focus", "Aligner"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(names, expected);
    assert!(bench.microscope.find_by_role("sem").is_empty());
}

#[test]
fn classification_uses_capabilities() {
    let bench = bench();
    let mic = &bench.microscope;
    assert_eq!(mic.detectors().len(), 1);
    assert_eq!(mic.emitters().len(), 1);
    assert_eq!(mic.actuators().len(), 3);

    let lamp = mic.find_by_name("Lamp").unwrap();
    let affected: Vec<String> = lamp.affects().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(affected, vec!["Camera".to_string()]);

    let stage = mic.find_actuator("StageXY").unwrap();
    assert_eq!(
        stage.property("axes"),
        Some(&Value::set(["x", "y"]))
    );
    assert!(mic.find_actuator("Camera").is_err());
}

#[test]
fn stop_all_continues_past_failures() {
    let bench = bench();
    let err = bench.microscope.stop_all().unwrap_err();

    for stage in &bench.stages {
        assert_eq!(stage.stops.load(Ordering::SeqCst), 1);
    }
    match err {
        ScopeError::StopFailed(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].component, "Focus");
            assert!(failures[0].message.contains("not responding"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn attribute_access_through_the_tree() {
    let bench = bench();
    let exposure = bench
        .microscope
        .attribute("Camera", "exposureTime")
        .unwrap();
    exposure.set_from_str("0.5").unwrap();
    assert_eq!(exposure.get(), Value::Float(0.5));

    assert!(matches!(
        bench.microscope.attribute("Camera", "gain"),
        Err(ScopeError::NotFound(_))
    ));
}

#[test]
fn walk_visits_each_component_once() {
    let bench = bench();
    let walk = bench.microscope.walk();
    let names: Vec<&str> = walk.iter().map(|e| e.component.name()).collect();
    assert_eq!(
        names,
        vec!["Optical", "Camera", "Lamp", "StageXY", "Focus", "Aligner"]
    );
    assert!(walk.iter().skip(1).all(|e| e.depth == 1));
}

#[test]
fn moves_run_to_completion() {
    let bench = bench();
    let stage = bench.microscope.find_actuator("StageXY").unwrap();
    let actuator = stage.as_actuator().unwrap();
    let shift: AxisShift = [("x".to_string(), 1e-6)].into_iter().collect();
    futures::executor::block_on(actuator.move_rel(shift)).unwrap();
}
