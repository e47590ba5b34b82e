//! Simulated camera.

use scope_core::{
    Component, ComponentBuilder, ContinuousAttribute, Detector, EnumeratedAttribute, ScopeResult,
    Value,
};
use std::sync::Arc;

/// Maximum pixel value reported as the third dimension of the sensor shape.
const PIXEL_DEPTH: usize = 4096;

/// Simulated camera with exposure, binning and resolution settings.
///
/// Changing the binning shrinks (or grows) the allowed resolution so that
/// `resolution * binning` never exceeds the sensor.
pub struct SimCamera {
    name: String,
    sensor: [i64; 2],
    exposure_time: Arc<ContinuousAttribute>,
    binning: Arc<EnumeratedAttribute>,
    resolution: Arc<ContinuousAttribute>,
}

impl SimCamera {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> ScopeResult<Arc<Self>> {
        let sensor = [i64::from(width), i64::from(height)];
        let exposure_time = ContinuousAttribute::new(0.1, (1e-6, 10.0))?.with_unit("s");
        let binning = EnumeratedAttribute::new(
            Value::tuple([1, 1]),
            Value::set([
                Value::tuple([1, 1]),
                Value::tuple([2, 2]),
                Value::tuple([4, 4]),
            ]),
        )?
        .with_unit("px");
        let resolution = ContinuousAttribute::new(
            Value::tuple(sensor),
            (Value::tuple([1, 1]), Value::tuple(sensor)),
        )?
        .with_unit("px");

        let camera = Arc::new(Self {
            name: name.into(),
            sensor,
            exposure_time: Arc::new(exposure_time),
            binning: Arc::new(binning),
            resolution: Arc::new(resolution),
        });
        camera
            .binning
            .subscribe_bound(&camera, SimCamera::on_binning, false);
        Ok(camera)
    }

    pub fn exposure_time(&self) -> &Arc<ContinuousAttribute> {
        &self.exposure_time
    }

    pub fn binning(&self) -> &Arc<EnumeratedAttribute> {
        &self.binning
    }

    pub fn resolution(&self) -> &Arc<ContinuousAttribute> {
        &self.resolution
    }

    /// Component exposing this camera as a detector.
    pub fn component(self: &Arc<Self>, role: &str) -> ComponentBuilder {
        Component::builder(self.name.clone(), role)
            .attribute("exposureTime", self.exposure_time.clone())
            .attribute("binning", self.binning.clone())
            .attribute("resolution", self.resolution.clone())
            .property("pixelSize", (6.5e-6, 6.5e-6))
            .data_flow("data")
            .detector(self.clone())
    }

    fn on_binning(&self, binning: &Value) {
        let Ok(binning) = Vec::<i64>::try_from(binning.clone()) else {
            return;
        };
        if binning.len() != 2 || binning.iter().any(|b| *b <= 0) {
            return;
        }
        let max = [self.sensor[0] / binning[0], self.sensor[1] / binning[1]];
        let current: Vec<i64> = self.resolution.get_as().unwrap_or_default();
        let clamped = Value::tuple(current.iter().zip(max).map(|(c, m)| (*c).min(m).max(1)));

        let result = self
            .resolution
            .update(clamped)
            .and_then(|()| self.resolution.set_range((Value::tuple([1, 1]), Value::tuple(max))));
        if let Err(e) = result {
            tracing::warn!(camera = %self.name, error = %e, "failed to adapt resolution to binning");
        }
    }
}

impl Detector for SimCamera {
    fn sensor_shape(&self) -> Vec<usize> {
        vec![
            usize::try_from(self.sensor[0]).unwrap_or(0),
            usize::try_from(self.sensor[1]).unwrap_or(0),
            PIXEL_DEPTH,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scope_core::ScopeError;

    #[test]
    fn test_binning_limits_resolution() {
        let camera = SimCamera::new("Camera", 2048, 1024).unwrap();
        assert_eq!(camera.resolution().get(), Value::tuple([2048, 1024]));

        camera.binning().set(Value::tuple([2, 2])).unwrap();
        assert_eq!(camera.resolution().get(), Value::tuple([1024, 512]));
        assert!(matches!(
            camera.resolution().set(Value::tuple([2048, 1024])),
            Err(ScopeError::OutOfBound(_))
        ));

        camera.binning().set(Value::tuple([1, 1])).unwrap();
        camera.resolution().set(Value::tuple([2048, 1024])).unwrap();
    }

    #[test]
    fn test_binning_choices() {
        let camera = SimCamera::new("Camera", 640, 480).unwrap();
        assert!(matches!(
            camera.binning().set(Value::tuple([3, 3])),
            Err(ScopeError::OutOfBound(_))
        ));
        camera.binning().set_from_str("4,4").unwrap();
        assert_eq!(camera.resolution().get(), Value::tuple([160, 120]));
    }

    #[test]
    fn test_component_shape() {
        let camera = SimCamera::new("Camera", 640, 480).unwrap();
        let comp = camera.component("ccd").build();
        assert_eq!(
            comp.property("shape"),
            Some(&Value::tuple([640usize, 480, 4096]))
        );
        assert_eq!(comp.data_flows(), ["data".to_string()]);
    }
}
