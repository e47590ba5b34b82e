//! The microscope: root of the component tree.
//!
//! [`Microscope`] wraps the root [`Component`] and provides the whole-tree
//! queries front-ends rely on: lookup by name or role, classification into
//! detectors, emitters and actuators, the structural walk used by
//! introspection tools, and the stop sweep.
//!
//! Structural changes (`add_child`, `remove_child`) take the tree lock for
//! writing; every query and the stop sweep hold it for reading, so a reader
//! never sees a half-linked node.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use crate::attribute::VigilantAttribute;
use crate::capabilities::Capability;
use crate::component::Component;
use crate::error::{ScopeError, ScopeResult, StopFailure};

/// One step of [`Microscope::walk`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// 0 for the microscope itself, 1 for the top of each group, and so on.
    pub depth: usize,
    pub component: Arc<Component>,
}

/// Root aggregate of an instrument tree.
#[derive(Debug)]
pub struct Microscope {
    root: Arc<Component>,
    structure: RwLock<()>,
}

impl Microscope {
    /// Wrap `root`, checking that names are unique and the tree is acyclic.
    pub fn new(root: Arc<Component>) -> ScopeResult<Self> {
        check_tree(&root)?;
        tracing::debug!(
            microscope = root.name(),
            components = descendants(&root).len(),
            "component tree assembled"
        );
        Ok(Self {
            root,
            structure: RwLock::new(()),
        })
    }

    /// The microscope component itself.
    pub fn root(&self) -> &Arc<Component> {
        &self.root
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    pub fn role(&self) -> &str {
        self.root.role()
    }

    /// Every component of the tree, root first, in pre-order.
    pub fn components(&self) -> Vec<Arc<Component>> {
        let _tree = self.structure.read();
        let mut all = vec![self.root.clone()];
        all.extend(descendants(&self.root));
        all
    }

    /// Find the component named `name`.
    pub fn find_by_name(&self, name: &str) -> ScopeResult<Arc<Component>> {
        self.components()
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ScopeError::NotFound(format!("component '{name}'")))
    }

    /// Every component with role `role`. May be empty.
    pub fn find_by_role(&self, role: &str) -> Vec<Arc<Component>> {
        self.components()
            .into_iter()
            .filter(|c| c.role() == role)
            .collect()
    }

    /// Direct children of the root.
    pub fn children(&self) -> Vec<Arc<Component>> {
        let _tree = self.structure.read();
        self.root.children()
    }

    /// Descendants declaring `capability`, in pre-order.
    pub fn with_capability(&self, capability: Capability) -> Vec<Arc<Component>> {
        let _tree = self.structure.read();
        descendants(&self.root)
            .into_iter()
            .filter(|c| c.has_capability(capability))
            .collect()
    }

    pub fn detectors(&self) -> Vec<Arc<Component>> {
        self.with_capability(Capability::Detector)
    }

    pub fn emitters(&self) -> Vec<Arc<Component>> {
        self.with_capability(Capability::Emitter)
    }

    pub fn actuators(&self) -> Vec<Arc<Component>> {
        self.with_capability(Capability::Actuator)
    }

    /// Find the actuator named `name`.
    pub fn find_actuator(&self, name: &str) -> ScopeResult<Arc<Component>> {
        self.actuators()
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ScopeError::NotFound(format!("actuator '{name}'")))
    }

    /// Look up attribute `attribute` of component `component`.
    pub fn attribute(
        &self,
        component: &str,
        attribute: &str,
    ) -> ScopeResult<Arc<dyn VigilantAttribute>> {
        self.find_by_name(component)?.attribute(attribute)
    }

    /// Structural walk for introspection.
    ///
    /// The microscope comes first, then each detector, emitter and actuator
    /// with its subtree, then the remaining direct children with theirs. Every
    /// component appears once.
    pub fn walk(&self) -> Vec<WalkEntry> {
        let _tree = self.structure.read();
        let mut out = vec![WalkEntry {
            depth: 0,
            component: self.root.clone(),
        }];
        let mut seen: HashSet<*const Component> = HashSet::new();
        seen.insert(Arc::as_ptr(&self.root));

        let all = descendants(&self.root);
        let children = self.root.children();
        let grouped = [
            Capability::Detector,
            Capability::Emitter,
            Capability::Actuator,
        ]
        .into_iter()
        .flat_map(|cap| all.iter().filter(move |c| c.has_capability(cap)));
        for comp in grouped.chain(children.iter()) {
            walk_subtree(comp, 1, &mut seen, &mut out);
        }
        out
    }

    /// Stop every stoppable component, the root included.
    ///
    /// Failures are logged and collected; the sweep always visits every
    /// component and reports `StopFailed` if any of them failed.
    pub fn stop_all(&self) -> ScopeResult<()> {
        let _tree = self.structure.read();
        let mut failures = Vec::new();
        for comp in std::iter::once(self.root.clone()).chain(descendants(&self.root)) {
            let Some(stoppable) = comp.as_stoppable() else {
                continue;
            };
            match stoppable.stop() {
                Ok(()) => tracing::debug!(component = comp.name(), "stopped"),
                Err(e) => {
                    tracing::error!(component = comp.name(), error = %e, "Failed to stop component");
                    failures.push(StopFailure {
                        component: comp.name().to_string(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScopeError::StopFailed(failures))
        }
    }

    /// Attach `child` under the component named `parent`.
    ///
    /// Fails with `DuplicateName` if any name of the new subtree is already in
    /// use and `CyclicTree` if `child` is already part of this tree.
    pub fn add_child(&self, parent: &str, child: Arc<Component>) -> ScopeResult<()> {
        let _tree = self.structure.write();
        let parent = find_in(&self.root, parent)
            .ok_or_else(|| ScopeError::NotFound(format!("component '{parent}'")))?;
        if child.contains(&self.root) || self.root.contains(&child) {
            return Err(ScopeError::CyclicTree(child.name().to_string()));
        }
        check_tree(&child)?;
        let existing: HashSet<String> = std::iter::once(self.root.clone())
            .chain(descendants(&self.root))
            .map(|c| c.name().to_string())
            .collect();
        for comp in std::iter::once(child.clone()).chain(descendants(&child)) {
            if existing.contains(comp.name()) {
                return Err(ScopeError::DuplicateName(comp.name().to_string()));
            }
        }
        tracing::debug!(parent = parent.name(), child = child.name(), "component attached");
        parent.attach(child);
        Ok(())
    }

    /// Detach the child named `child` from the component named `parent`.
    pub fn remove_child(&self, parent: &str, child: &str) -> ScopeResult<Arc<Component>> {
        let _tree = self.structure.write();
        let parent_comp = find_in(&self.root, parent)
            .ok_or_else(|| ScopeError::NotFound(format!("component '{parent}'")))?;
        parent_comp.detach(child).ok_or_else(|| {
            ScopeError::NotFound(format!("component '{child}' under '{parent}'"))
        })
    }
}

fn find_in(root: &Arc<Component>, name: &str) -> Option<Arc<Component>> {
    std::iter::once(root.clone())
        .chain(descendants(root))
        .find(|c| c.name() == name)
}

fn walk_subtree(
    comp: &Arc<Component>,
    depth: usize,
    seen: &mut HashSet<*const Component>,
    out: &mut Vec<WalkEntry>,
) {
    if !seen.insert(Arc::as_ptr(comp)) {
        return;
    }
    out.push(WalkEntry {
        depth,
        component: comp.clone(),
    });
    for child in comp.children() {
        walk_subtree(&child, depth + 1, seen, out);
    }
}

/// All descendants of `root` in pre-order, root excluded.
fn descendants(root: &Arc<Component>) -> Vec<Arc<Component>> {
    let mut out = Vec::new();
    let mut stack: Vec<Arc<Component>> = root.children().into_iter().rev().collect();
    let mut seen: HashSet<*const Component> = HashSet::new();
    seen.insert(Arc::as_ptr(root));
    while let Some(comp) = stack.pop() {
        if !seen.insert(Arc::as_ptr(&comp)) {
            continue;
        }
        stack.extend(comp.children().into_iter().rev());
        out.push(comp);
    }
    out
}

/// Reject cycles and duplicate names below (and including) `root`.
fn check_tree(root: &Arc<Component>) -> ScopeResult<()> {
    fn visit(
        comp: &Arc<Component>,
        path: &mut Vec<*const Component>,
        names: &mut HashSet<String>,
    ) -> ScopeResult<()> {
        let ptr = Arc::as_ptr(comp);
        if path.contains(&ptr) {
            return Err(ScopeError::CyclicTree(comp.name().to_string()));
        }
        if !names.insert(comp.name().to_string()) {
            return Err(ScopeError::DuplicateName(comp.name().to_string()));
        }
        path.push(ptr);
        for child in comp.children() {
            visit(&child, path, names)?;
        }
        path.pop();
        Ok(())
    }

    visit(root, &mut Vec::new(), &mut HashSet::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Detector, Stoppable};

    struct Ccd;

    impl Detector for Ccd {
        fn sensor_shape(&self) -> Vec<usize> {
            vec![2048, 2048, 4096]
        }
    }

    struct Halt;

    impl Stoppable for Halt {
        fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn sample() -> Microscope {
        let ccd = Component::builder("Andor", "ccd").detector(Arc::new(Ccd)).build();
        let filter = Component::builder("Filter", "filter").build();
        let wheel = Component::builder("Wheel", "container")
            .child(filter)
            .stoppable(Arc::new(Halt))
            .build();
        let root = Component::builder("Bench", "optical")
            .child(wheel)
            .child(ccd)
            .build();
        Microscope::new(root).unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let a = Component::builder("Same", "x").build();
        let b = Component::builder("Same", "y").build();
        let root = Component::builder("Root", "optical").child(a).child(b).build();
        assert!(matches!(
            Microscope::new(root),
            Err(ScopeError::DuplicateName(name)) if name == "Same"
        ));
    }

    #[test]
    fn test_walk_puts_groups_first() {
        let mic = sample();
        let walk: Vec<(usize, String)> = mic
            .walk()
            .into_iter()
            .map(|e| (e.depth, e.component.name().to_string()))
            .collect();
        assert_eq!(
            walk,
            vec![
                (0, "Bench".to_string()),
                (1, "Andor".to_string()),
                (1, "Wheel".to_string()),
                (2, "Filter".to_string()),
            ]
        );
    }

    #[test]
    fn test_add_and_remove_child() {
        let mic = sample();
        let extra = Component::builder("Lamp", "light").build();
        mic.add_child("Wheel", extra).unwrap();
        assert_eq!(mic.find_by_name("Lamp").unwrap().parent().unwrap().name(), "Wheel");

        let dup = Component::builder("Filter", "filter").build();
        assert!(matches!(
            mic.add_child("Bench", dup),
            Err(ScopeError::DuplicateName(_))
        ));

        let wheel = mic.find_by_name("Wheel").unwrap();
        assert!(matches!(
            mic.add_child("Lamp", wheel),
            Err(ScopeError::CyclicTree(_))
        ));

        let lamp = mic.remove_child("Wheel", "Lamp").unwrap();
        assert!(lamp.parent().is_none());
        assert!(matches!(
            mic.find_by_name("Lamp"),
            Err(ScopeError::NotFound(_))
        ));
        assert!(mic.remove_child("Wheel", "Lamp").is_err());
    }

    #[test]
    fn test_stop_all_includes_plain_stoppables() {
        let mic = sample();
        assert!(mic.stop_all().is_ok());
        assert!(mic.actuators().is_empty());
        assert_eq!(mic.detectors().len(), 1);
    }

    struct Jammed;

    impl Stoppable for Jammed {
        fn stop(&self) -> anyhow::Result<()> {
            anyhow::bail!("shutter stuck")
        }
    }

    #[test]
    fn test_stop_all_includes_root() {
        let wheel = Component::builder("Wheel", "container")
            .stoppable(Arc::new(Halt))
            .build();
        let root = Component::builder("Bench", "optical")
            .child(wheel)
            .stoppable(Arc::new(Jammed))
            .build();
        let mic = Microscope::new(root).unwrap();

        match mic.stop_all() {
            Err(ScopeError::StopFailed(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].component, "Bench");
                assert!(failures[0].message.contains("shutter stuck"));
            }
            other => panic!("expected a stop failure, got {other:?}"),
        }
    }
}
