//! Microscope configuration using Figment
//!
//! The instrument tree is described in a TOML file, merged with environment
//! variables prefixed with `RUSTSCOPE_` (nested keys separated by `__`):
//!
//! ```text
//! RUSTSCOPE_APPLICATION__LOG_LEVEL=debug
//! RUSTSCOPE_MICROSCOPE__NAME="Bench 2"
//! ```
//!
//! # Example file
//!
//! ```toml
//! [application]
//! name = "rust-scope"
//! log_level = "info"
//!
//! [microscope]
//! name = "Optical"
//! role = "optical"
//!
//! [[components]]
//! name = "Camera"
//! role = "ccd"
//! kind = "camera"
//!
//! [[components]]
//! name = "Stage"
//! role = "stage"
//! kind = "stage"
//! axes = ["x", "y"]
//!
//! [components.attributes.speed]
//! value = 0.005
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use scope_core::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/scope.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Root of the component tree
    pub microscope: MicroscopeConfig,
    /// Hardware components, in declaration order
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// The microscope component at the root of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicroscopeConfig {
    pub name: String,
    #[serde(default = "default_microscope_role")]
    pub role: String,
}

/// Which simulated driver backs a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    /// Actuator with named axes
    Stage,
    /// Detector
    Camera,
    /// Emitter
    Light,
    /// Grouping node without hardware
    Container,
}

/// A component of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Unique name
    pub name: String,
    pub role: String,
    pub kind: ComponentKind,
    /// Name of the containing component; the microscope if absent
    #[serde(default)]
    pub parent: Option<String>,
    /// Names of the components this one affects
    #[serde(default)]
    pub affects: Vec<String>,
    /// Axis names (stages only)
    #[serde(default)]
    pub axes: Vec<String>,
    /// Extra attributes, or initial values of the driver's own attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDefinition>,
}

/// A vigilant attribute declared in the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Initial value
    pub value: Value,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub unit: Option<String>,
    /// `[min, max]`
    #[serde(default)]
    pub range: Option<Value>,
    #[serde(default)]
    pub choices: Option<Value>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_microscope_role() -> String {
    "microscope".to_string()
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ScopeConfig {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// Environment variables take precedence over the file. The result is
    /// validated before being returned.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RUSTSCOPE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadError(Box::new(e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration held in memory, without the
    /// environment overlay.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Toml::string(text))
            .extract()
            .map_err(|e| ConfigError::LoadError(Box::new(e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Names are unique, including the microscope's
    /// - Parents and `affects` targets exist, and parents form no cycle
    /// - Only stages declare axes, and every stage has at least one
    /// - Attributes declare at most one of `range` and `choices`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.microscope.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "Microscope name cannot be empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        names.insert(self.microscope.name.as_str());
        for comp in &self.components {
            if comp.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "Component name cannot be empty".to_string(),
                ));
            }
            if !names.insert(comp.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate component name: '{}'",
                    comp.name
                )));
            }
        }

        for comp in &self.components {
            self.validate_component(comp, &names)?;
        }

        self.check_parent_cycles()
    }

    fn validate_component(
        &self,
        comp: &ComponentDefinition,
        names: &HashSet<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = &comp.parent {
            if !names.contains(parent.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Component '{}': unknown parent '{}'",
                    comp.name, parent
                )));
            }
        }
        for target in &comp.affects {
            if !names.contains(target.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Component '{}': unknown affected component '{}'",
                    comp.name, target
                )));
            }
        }

        match comp.kind {
            ComponentKind::Stage if comp.axes.is_empty() => {
                return Err(ConfigError::ValidationError(format!(
                    "Stage '{}': 'axes' cannot be empty",
                    comp.name
                )));
            }
            ComponentKind::Stage => {}
            _ if !comp.axes.is_empty() => {
                return Err(ConfigError::ValidationError(format!(
                    "Component '{}': only stages can declare axes",
                    comp.name
                )));
            }
            _ => {}
        }

        for (name, attr) in &comp.attributes {
            if attr.range.is_some() && attr.choices.is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "Attribute '{}.{}': 'range' and 'choices' are exclusive",
                    comp.name, name
                )));
            }
        }
        Ok(())
    }

    fn check_parent_cycles(&self) -> Result<(), ConfigError> {
        let parents: HashMap<&str, &str> = self
            .components
            .iter()
            .filter_map(|c| c.parent.as_deref().map(|p| (c.name.as_str(), p)))
            .collect();
        for comp in &self.components {
            let mut current = comp.name.as_str();
            let mut hops = 0;
            while let Some(parent) = parents.get(current) {
                hops += 1;
                if *parent == comp.name || hops > parents.len() {
                    return Err(ConfigError::ValidationError(format!(
                        "Component '{}' is its own ancestor",
                        comp.name
                    )));
                }
                current = *parent;
            }
        }
        Ok(())
    }

    /// Components whose parent is `parent` (`None` for the microscope).
    pub fn children_of(&self, parent: Option<&str>) -> Vec<&ComponentDefinition> {
        self.components
            .iter()
            .filter(|c| match (c.parent.as_deref(), parent) {
                (None, None) => true,
                (Some(p), None) => p == self.microscope.name,
                (p, Some(name)) => p == Some(name),
            })
            .collect()
    }

    /// Look up a component definition.
    pub fn component(&self, name: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ScopeConfig {
        ScopeConfig {
            application: ApplicationConfig {
                name: "Test".to_string(),
                log_level: "info".to_string(),
            },
            microscope: MicroscopeConfig {
                name: "Optical".to_string(),
                role: "optical".to_string(),
            },
            components: vec![],
        }
    }

    fn component(name: &str, kind: ComponentKind) -> ComponentDefinition {
        ComponentDefinition {
            name: name.to_string(),
            role: name.to_lowercase(),
            kind,
            parent: None,
            affects: vec![],
            axes: if kind == ComponentKind::Stage {
                vec!["x".to_string()]
            } else {
                vec![]
            },
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_config_validation_valid() {
        let mut config = base();
        config.components.push(component("Camera", ComponentKind::Camera));
        config.components.push(component("Stage", ComponentKind::Stage));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = base();
        config.application.log_level = "chatty".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log_level"));
    }

    #[test]
    fn test_duplicate_names() {
        let mut config = base();
        config.components.push(component("Camera", ComponentKind::Camera));
        config.components.push(component("Camera", ComponentKind::Light));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate component name"));

        let mut config = base();
        config.components.push(component("Optical", ComponentKind::Light));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_references() {
        let mut config = base();
        let mut light = component("Lamp", ComponentKind::Light);
        light.affects = vec!["Ghost".to_string()];
        config.components.push(light);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown affected component"));

        let mut config = base();
        let mut stage = component("Stage", ComponentKind::Stage);
        stage.parent = Some("Ghost".to_string());
        config.components.push(stage);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown parent"));
    }

    #[test]
    fn test_parent_cycle() {
        let mut config = base();
        let mut a = component("A", ComponentKind::Container);
        let mut b = component("B", ComponentKind::Container);
        a.parent = Some("B".to_string());
        b.parent = Some("A".to_string());
        config.components = vec![a, b];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("own ancestor"));
    }

    #[test]
    fn test_axes_only_on_stages() {
        let mut config = base();
        let mut camera = component("Camera", ComponentKind::Camera);
        camera.axes = vec!["z".to_string()];
        config.components.push(camera);
        assert!(config.validate().is_err());

        let mut config = base();
        let mut stage = component("Stage", ComponentKind::Stage);
        stage.axes.clear();
        config.components.push(stage);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_children_of() {
        let mut config = base();
        let wheel = component("Wheel", ComponentKind::Container);
        let mut filter = component("Filter", ComponentKind::Container);
        filter.parent = Some("Wheel".to_string());
        let mut explicit = component("Lamp", ComponentKind::Light);
        explicit.parent = Some("Optical".to_string());
        config.components = vec![wheel, filter, explicit];

        let top: Vec<&str> = config
            .children_of(None)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(top, vec!["Wheel", "Lamp"]);
        assert_eq!(config.children_of(Some("Wheel")).len(), 1);
    }
}
