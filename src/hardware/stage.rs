//! Simulated motion stage.

use anyhow::anyhow;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use scope_core::{
    Actuator, Attribute, AxisShift, Component, ComponentBuilder, ContinuousAttribute, ScopeResult,
    Stoppable, Value,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default speed, in m/s.
pub const DEFAULT_SPEED: f64 = 0.01;
/// Interval between two position updates of a move.
const TICK: Duration = Duration::from_millis(5);

/// Simulated stage moving along named axes at a configurable speed
///
/// Simulates a stage with:
/// - one position per axis, published through the read-only `position` attribute
/// - a `speed` attribute bounded to [1 µm/s, 1 m/s]
/// - relative moves running on their own thread, interrupted by `stop`
///
/// # Example
///
/// ```rust,ignore
/// let stage = SimStage::new("Stage", vec!["x".into()])?;
/// block_on(stage.move_rel([("x".into(), 1e-6)].into()))?;
/// assert_eq!(stage.axis_position("x"), Some(1e-6));
/// ```
pub struct SimStage {
    name: String,
    axes: Vec<String>,
    position: Arc<Attribute>,
    speed: Arc<ContinuousAttribute>,
    /// Bumped by `stop`; moves started under an older value abort.
    generation: Arc<AtomicU64>,
    /// Serializes position updates of concurrent moves.
    motion: Arc<Mutex<()>>,
}

impl SimStage {
    /// Create a stage at the origin of every axis.
    pub fn new(name: impl Into<String>, axes: Vec<String>) -> ScopeResult<Arc<Self>> {
        let position = Attribute::new(Value::map(axes.iter().map(|a| (a.as_str(), 0.0))))?
            .read_only()
            .with_unit("m")
            .with_description("Current position of each axis");
        let speed = ContinuousAttribute::new(DEFAULT_SPEED, (1e-6, 1.0))?.with_unit("m/s");

        Ok(Arc::new(Self {
            name: name.into(),
            axes,
            position: Arc::new(position),
            speed: Arc::new(speed),
            generation: Arc::new(AtomicU64::new(0)),
            motion: Arc::new(Mutex::new(())),
        }))
    }

    pub fn position(&self) -> &Arc<Attribute> {
        &self.position
    }

    pub fn speed(&self) -> &Arc<ContinuousAttribute> {
        &self.speed
    }

    /// Current position of `axis`, in metres.
    pub fn axis_position(&self, axis: &str) -> Option<f64> {
        self.position
            .get()
            .get(&Value::from(axis))
            .and_then(Value::as_f64)
    }

    /// Component exposing this stage, its attributes and the actuator capability.
    pub fn component(self: &Arc<Self>, role: &str) -> ComponentBuilder {
        Component::builder(self.name.clone(), role)
            .attribute("position", self.position.clone())
            .attribute("speed", self.speed.clone())
            .actuator(self.clone())
    }
}

impl Stoppable for SimStage {
    fn stop(&self) -> anyhow::Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(stage = %self.name, "all moves stopped");
        Ok(())
    }
}

impl Actuator for SimStage {
    fn axes(&self) -> Vec<String> {
        self.axes.clone()
    }

    fn move_rel(&self, shift: AxisShift) -> BoxFuture<'static, anyhow::Result<()>> {
        if let Some(axis) = shift.keys().find(|a| !self.axes.contains(a)) {
            let err = anyhow!("{} has no axis '{}'", self.name, axis);
            return future::ready(Err(err)).boxed();
        }

        let mover = Mover {
            name: self.name.clone(),
            position: self.position.clone(),
            speed: self.speed.clone(),
            token: self.generation.load(Ordering::SeqCst),
            generation: self.generation.clone(),
            motion: self.motion.clone(),
        };
        let (tx, rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name(format!("{}-mover", self.name))
            .spawn(move || {
                // The caller may have dropped the future; the move still completes.
                let _ = tx.send(mover.run(shift));
            });
        if let Err(e) = spawned {
            return future::ready(Err(anyhow!("failed to start move: {e}"))).boxed();
        }

        async move {
            rx.await
                .unwrap_or_else(|_| Err(anyhow!("mover thread exited early")))
        }
        .boxed()
    }
}

struct Mover {
    name: String,
    position: Arc<Attribute>,
    speed: Arc<ContinuousAttribute>,
    token: u64,
    generation: Arc<AtomicU64>,
    motion: Arc<Mutex<()>>,
}

impl Mover {
    fn run(self, mut remaining: AxisShift) -> anyhow::Result<()> {
        tracing::debug!(stage = %self.name, ?remaining, "move started");
        let step = self.speed.get_as::<f64>()? * TICK.as_secs_f64();
        loop {
            if self.generation.load(Ordering::SeqCst) != self.token {
                anyhow::bail!("move of {} interrupted", self.name);
            }
            let done = {
                let _motion = self.motion.lock();
                let mut position = self.position.get();
                for (axis, left) in remaining.iter_mut() {
                    let delta = left.signum() * left.abs().min(step);
                    *left -= delta;
                    shift_axis(&mut position, axis, delta);
                }
                self.position.update(position)?;
                remaining.values().all(|left| *left == 0.0)
            };
            if done {
                tracing::debug!(stage = %self.name, "move done");
                return Ok(());
            }
            thread::sleep(TICK);
        }
    }
}

fn shift_axis(position: &mut Value, axis: &str, delta: f64) {
    if let Value::Map(entries) = position {
        let key = Value::from(axis);
        for (k, v) in entries.iter_mut() {
            if *k == key {
                if let Value::Float(x) = v {
                    *x += delta;
                }
            }
        }
    }
}
