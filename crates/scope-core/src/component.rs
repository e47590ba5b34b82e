//! Named, roled nodes of the instrument tree.
//!
//! A [`Component`] owns its vigilant attributes and its children. It refers to
//! its parent and to the components it affects without owning them, so the
//! tree is dropped from the root down and no reference cycle can keep a node
//! alive.
//!
//! Components are assembled with [`ComponentBuilder`]:
//!
//! ```rust
//! use scope_core::attribute::ContinuousAttribute;
//! use scope_core::component::Component;
//! use std::sync::Arc;
//!
//! let power = Arc::new(ContinuousAttribute::new(0.0, (0.0, 10.0)).unwrap().with_unit("W"));
//! let light = Component::builder("Light", "light")
//!     .attribute("power", power.clone())
//!     .property("hwVersion", "simulated")
//!     .build();
//!
//! light.attribute("power").unwrap().set(2.5.into()).unwrap();
//! assert_eq!(power.get_as::<f64>().unwrap(), 2.5);
//! ```

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::attribute::VigilantAttribute;
use crate::capabilities::{Actuator, Capability, Detector, Emitter, Stoppable};
use crate::error::{ScopeError, ScopeResult};
use crate::value::Value;

/// A node of the instrument tree.
pub struct Component {
    name: String,
    role: String,
    attributes: BTreeMap<String, Arc<dyn VigilantAttribute>>,
    properties: BTreeMap<String, Value>,
    data_flows: Vec<String>,
    children: RwLock<Vec<Arc<Component>>>,
    parent: RwLock<Weak<Component>>,
    affects: RwLock<Vec<Weak<Component>>>,
    stoppable: Option<Arc<dyn Stoppable>>,
    actuator: Option<Arc<dyn Actuator>>,
    detector: Option<Arc<dyn Detector>>,
    emitter: Option<Arc<dyn Emitter>>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("children", &self.children.read().len())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl Component {
    /// Start building a component.
    pub fn builder(name: impl Into<String>, role: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder::new(name, role)
    }

    /// Unique name within a tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role, not necessarily unique.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Look up a vigilant attribute by name.
    pub fn attribute(&self, name: &str) -> ScopeResult<Arc<dyn VigilantAttribute>> {
        self.attributes.get(name).cloned().ok_or_else(|| {
            ScopeError::NotFound(format!(
                "attribute '{name}' on component '{}'",
                self.name
            ))
        })
    }

    /// All vigilant attributes, sorted by name.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Arc<dyn VigilantAttribute>)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read-only properties fixed at construction (`axes`, `shape`, ...).
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Look up a read-only property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Names of the data flows this component produces.
    pub fn data_flows(&self) -> &[String] {
        &self.data_flows
    }

    /// Direct children, in insertion order.
    pub fn children(&self) -> Vec<Arc<Component>> {
        self.children.read().clone()
    }

    /// The containing component, if it is still alive.
    pub fn parent(&self) -> Option<Arc<Component>> {
        self.parent.read().upgrade()
    }

    /// Components influenced by this one (e.g. a light affecting a camera).
    ///
    /// Targets that no longer exist are skipped.
    pub fn affects(&self) -> Vec<Arc<Component>> {
        self.affects.read().iter().filter_map(Weak::upgrade).collect()
    }

    /// Record that this component affects `target`, without owning it.
    pub fn link_affects(&self, target: &Arc<Component>) {
        let mut affects = self.affects.write();
        if !affects
            .iter()
            .any(|w| w.upgrade().is_some_and(|c| Arc::ptr_eq(&c, target)))
        {
            affects.push(Arc::downgrade(target));
        }
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.detector.is_some() {
            caps.push(Capability::Detector);
        }
        if self.emitter.is_some() {
            caps.push(Capability::Emitter);
        }
        if self.actuator.is_some() {
            caps.push(Capability::Actuator);
        }
        if self.stoppable.is_some() {
            caps.push(Capability::Stoppable);
        }
        caps
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::Detector => self.detector.is_some(),
            Capability::Emitter => self.emitter.is_some(),
            Capability::Actuator => self.actuator.is_some(),
            Capability::Stoppable => self.stoppable.is_some(),
        }
    }

    pub fn as_actuator(&self) -> Option<&Arc<dyn Actuator>> {
        self.actuator.as_ref()
    }

    pub fn as_detector(&self) -> Option<&Arc<dyn Detector>> {
        self.detector.as_ref()
    }

    pub fn as_emitter(&self) -> Option<&Arc<dyn Emitter>> {
        self.emitter.as_ref()
    }

    pub fn as_stoppable(&self) -> Option<&Arc<dyn Stoppable>> {
        self.stoppable.as_ref()
    }

    /// Whether `other` is this component or one of its descendants.
    pub(crate) fn contains(&self, other: &Component) -> bool {
        std::ptr::eq(self, other) || self.children.read().iter().any(|c| c.contains(other))
    }

    pub(crate) fn attach(self: &Arc<Self>, child: Arc<Component>) {
        *child.parent.write() = Arc::downgrade(self);
        self.children.write().push(child);
    }

    pub(crate) fn detach(&self, name: &str) -> Option<Arc<Component>> {
        let mut children = self.children.write();
        let idx = children.iter().position(|c| c.name == name)?;
        let child = children.remove(idx);
        *child.parent.write() = Weak::new();
        Some(child)
    }
}

/// Builder for [`Component`].
pub struct ComponentBuilder {
    name: String,
    role: String,
    attributes: BTreeMap<String, Arc<dyn VigilantAttribute>>,
    properties: BTreeMap<String, Value>,
    data_flows: Vec<String>,
    children: Vec<Arc<Component>>,
    affects: Vec<Weak<Component>>,
    stoppable: Option<Arc<dyn Stoppable>>,
    actuator: Option<Arc<dyn Actuator>>,
    detector: Option<Arc<dyn Detector>>,
    emitter: Option<Arc<dyn Emitter>>,
}

impl ComponentBuilder {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            data_flows: Vec::new(),
            children: Vec::new(),
            affects: Vec::new(),
            stoppable: None,
            actuator: None,
            detector: None,
            emitter: None,
        }
    }

    /// Expose a vigilant attribute. Keep a clone of the `Arc` to update it.
    pub fn attribute<A>(mut self, name: impl Into<String>, attribute: Arc<A>) -> Self
    where
        A: VigilantAttribute + 'static,
    {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Expose an already type-erased attribute.
    pub fn dyn_attribute(
        mut self,
        name: impl Into<String>,
        attribute: Arc<dyn VigilantAttribute>,
    ) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Whether an attribute named `name` was already added.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Add a read-only property.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Declare a data flow.
    pub fn data_flow(mut self, name: impl Into<String>) -> Self {
        self.data_flows.push(name.into());
        self
    }

    pub fn child(mut self, child: Arc<Component>) -> Self {
        self.children.push(child);
        self
    }

    pub fn affects(mut self, target: &Arc<Component>) -> Self {
        self.affects.push(Arc::downgrade(target));
        self
    }

    /// Declare the actuator capability (which implies `Stoppable`). The
    /// `axes` property is filled from the actuator unless already set.
    pub fn actuator<A: Actuator + 'static>(mut self, actuator: Arc<A>) -> Self {
        self.properties
            .entry("axes".to_string())
            .or_insert_with(|| Value::set(actuator.axes()));
        self.stoppable = Some(actuator.clone());
        self.actuator = Some(actuator);
        self
    }

    /// Declare the detector capability. Fills the `shape` property.
    pub fn detector<D: Detector + 'static>(mut self, detector: Arc<D>) -> Self {
        self.properties
            .entry("shape".to_string())
            .or_insert_with(|| Value::tuple(detector.sensor_shape()));
        self.detector = Some(detector);
        self
    }

    /// Declare the emitter capability. Fills the `shape` property.
    pub fn emitter<E: Emitter + 'static>(mut self, emitter: Arc<E>) -> Self {
        self.properties
            .entry("shape".to_string())
            .or_insert_with(|| Value::tuple(emitter.emission_shape()));
        self.emitter = Some(emitter);
        self
    }

    /// Declare a stop capability without any movement.
    pub fn stoppable<S: Stoppable + 'static>(mut self, stoppable: Arc<S>) -> Self {
        self.stoppable = Some(stoppable);
        self
    }

    pub fn build(self) -> Arc<Component> {
        Arc::new_cyclic(|me| {
            for child in &self.children {
                *child.parent.write() = me.clone();
            }
            Component {
                name: self.name,
                role: self.role,
                attributes: self.attributes,
                properties: self.properties,
                data_flows: self.data_flows,
                children: RwLock::new(self.children),
                parent: RwLock::new(Weak::new()),
                affects: RwLock::new(self.affects),
                stoppable: self.stoppable,
                actuator: self.actuator,
                detector: self.detector,
                emitter: self.emitter,
            }
        })
    }
}
