//! Backend lifecycle
//!
//! The backend assembles the component tree described by a [`ScopeConfig`],
//! backed by simulated drivers, and hands out the [`Microscope`] to whoever
//! needs it. There is no process-wide "current microscope": front-ends get
//! the handle explicitly from [`Backend::connect`] and give it back with
//! [`Backend::release`], which stops every actuator.

use anyhow::Context;
use scope_core::{
    Component, ContinuousAttribute, EnumeratedAttribute, ListAttribute, Microscope,
    ScopeResult, VigilantAttribute,
};
use std::sync::Arc;

use crate::config::{AttributeDefinition, ComponentDefinition, ComponentKind, ScopeConfig};
use crate::hardware::{SimCamera, SimLight, SimStage};

/// Sensor size of simulated cameras.
pub const CAMERA_SENSOR: (u32, u32) = (2048, 2048);
/// Maximum power of simulated lights, in W.
pub const LIGHT_MAX_POWER: f64 = 0.1;

/// A running instrument tree.
#[derive(Debug)]
pub struct Backend {
    microscope: Arc<Microscope>,
}

impl Backend {
    /// Build the tree described by `config`.
    pub fn connect(config: &ScopeConfig) -> anyhow::Result<Self> {
        let mut root = Component::builder(
            config.microscope.name.clone(),
            config.microscope.role.clone(),
        );
        for def in config.children_of(None) {
            root = root.child(build_component(config, def)?);
        }
        let microscope = Microscope::new(root.build())?;

        for def in &config.components {
            if def.affects.is_empty() {
                continue;
            }
            let source = microscope.find_by_name(&def.name)?;
            for target in &def.affects {
                source.link_affects(&microscope.find_by_name(target)?);
            }
        }

        tracing::info!(
            microscope = microscope.name(),
            components = config.components.len(),
            "backend connected"
        );
        Ok(Self {
            microscope: Arc::new(microscope),
        })
    }

    /// The instrument tree.
    pub fn microscope(&self) -> &Arc<Microscope> {
        &self.microscope
    }

    /// Stop every actuator and drop the tree.
    pub fn release(self) -> anyhow::Result<()> {
        self.microscope
            .stop_all()
            .context("failed to stop the microscope while releasing the backend")?;
        tracing::info!(microscope = self.microscope.name(), "backend released");
        Ok(())
    }
}

fn build_component(config: &ScopeConfig, def: &ComponentDefinition) -> anyhow::Result<Arc<Component>> {
    let mut builder = match def.kind {
        ComponentKind::Stage => SimStage::new(def.name.clone(), def.axes.clone())?.component(&def.role),
        ComponentKind::Camera => {
            SimCamera::new(def.name.clone(), CAMERA_SENSOR.0, CAMERA_SENSOR.1)?.component(&def.role)
        }
        ComponentKind::Light => {
            let sources = def
                .attributes
                .get("emissions")
                .and_then(|a| a.value.as_seq().map(|items| items.len()))
                .unwrap_or(1);
            SimLight::new(def.name.clone(), LIGHT_MAX_POWER, sources)?.component(&def.role)
        }
        ComponentKind::Container => Component::builder(def.name.clone(), def.role.clone()),
    };

    let mut overrides = Vec::new();
    for (name, attr) in &def.attributes {
        if builder.has_attribute(name) {
            overrides.push((name, attr));
        } else {
            let attribute = build_attribute(attr)
                .with_context(|| format!("invalid attribute '{}.{}'", def.name, name))?;
            builder = builder.dyn_attribute(name.clone(), attribute);
        }
    }
    for child in config.children_of(Some(&def.name)) {
        builder = builder.child(build_component(config, child)?);
    }

    let component = builder.build();
    for (name, attr) in overrides {
        component
            .attribute(name)?
            .set(attr.value.clone())
            .with_context(|| format!("cannot apply initial value of '{}.{}'", def.name, name))?;
    }
    tracing::debug!(component = %def.name, kind = ?def.kind, "component created");
    Ok(component)
}

macro_rules! with_metadata {
    ($attr:expr, $def:expr) => {{
        let mut attr = $attr;
        if let Some(unit) = &$def.unit {
            attr = attr.with_unit(unit.clone());
        }
        if $def.readonly {
            attr = attr.read_only();
        }
        attr
    }};
}

/// Create the attribute declared by `def`.
///
/// A `range` gives a [`ContinuousAttribute`], `choices` an
/// [`EnumeratedAttribute`], a sequence value a [`ListAttribute`] and anything
/// else a plain attribute.
pub fn build_attribute(def: &AttributeDefinition) -> ScopeResult<Arc<dyn VigilantAttribute>> {
    let value = def.value.clone();
    let attr: Arc<dyn VigilantAttribute> = match (&def.range, &def.choices) {
        (Some(range), _) => Arc::new(with_metadata!(
            ContinuousAttribute::new(value, range.clone())?,
            def
        )),
        (None, Some(choices)) => Arc::new(with_metadata!(
            EnumeratedAttribute::new(value, choices.clone())?,
            def
        )),
        (None, None) if value.as_seq().is_some() => {
            Arc::new(with_metadata!(ListAttribute::new(value)?, def))
        }
        (None, None) => Arc::new(with_metadata!(scope_core::Attribute::new(value)?, def)),
    };
    Ok(attr)
}
