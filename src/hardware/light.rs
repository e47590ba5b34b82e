//! Simulated light source.

use scope_core::{
    Component, ComponentBuilder, ContinuousAttribute, Emitter, ListAttribute, ScopeResult, Value,
};
use std::sync::Arc;

/// Simulated multi-source light.
///
/// `power` is the total output, `emissions` the relative intensity of each
/// source (the first one is on by default).
pub struct SimLight {
    name: String,
    sources: usize,
    power: Arc<ContinuousAttribute>,
    emissions: Arc<ListAttribute>,
}

impl SimLight {
    pub fn new(name: impl Into<String>, max_power: f64, sources: usize) -> ScopeResult<Arc<Self>> {
        let power = ContinuousAttribute::new(0.0, (0.0, max_power))?.with_unit("W");
        let emissions = ListAttribute::new(Value::list(
            (0..sources.max(1)).map(|i| if i == 0 { 1.0 } else { 0.0 }),
        ))?
        .with_description("Relative intensity of each source");

        Ok(Arc::new(Self {
            name: name.into(),
            sources: sources.max(1),
            power: Arc::new(power),
            emissions: Arc::new(emissions),
        }))
    }

    pub fn power(&self) -> &Arc<ContinuousAttribute> {
        &self.power
    }

    pub fn emissions(&self) -> &Arc<ListAttribute> {
        &self.emissions
    }

    /// Component exposing this light as an emitter.
    pub fn component(self: &Arc<Self>, role: &str) -> ComponentBuilder {
        Component::builder(self.name.clone(), role)
            .attribute("power", self.power.clone())
            .attribute("emissions", self.emissions.clone())
            .emitter(self.clone())
    }
}

impl Emitter for SimLight {
    fn emission_shape(&self) -> Vec<usize> {
        vec![self.sources]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope_core::ScopeError;

    #[test]
    fn test_power_bounds() {
        let light = SimLight::new("Lamp", 0.5, 3).unwrap();
        light.power().set(0.5).unwrap();
        assert!(matches!(
            light.power().set(0.6),
            Err(ScopeError::OutOfBound(_))
        ));
    }

    #[test]
    fn test_emissions_per_source() {
        let light = SimLight::new("Lamp", 1.0, 3).unwrap();
        assert_eq!(light.emissions().get(), Value::list([1.0, 0.0, 0.0]));
        light.emissions().set_from_str("0,0.5,1").unwrap();
        assert_eq!(light.emissions().get(), Value::list([0.0, 0.5, 1.0]));

        let comp = light.component("light").build();
        assert_eq!(comp.property("shape"), Some(&Value::tuple([3usize])));
    }
}
