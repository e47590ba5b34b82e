//! Role probing
//!
//! Front-ends rarely walk the tree: they want "the camera" or "the focus".
//! [`InstrumentHandles::probe`] looks at the direct children of the
//! microscope and keeps the ones whose role is well known.

use scope_core::{Component, Microscope, ScopeError, ScopeResult, StopFailure};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Roles recognised on the direct children of the microscope.
pub const KNOWN_ROLES: &[&str] = &[
    "ccd",
    "se-detector",
    "bs-detector",
    "ebic-detector",
    "cl-detector",
    "spectrometer",
    "spectrograph",
    "chamber-ccd",
    "overview-ccd",
    "stage",
    "scan-stage",
    "focus",
    "ebeam-focus",
    "overview-focus",
    "mirror",
    "align",
    "fiber-aligner",
    "chamber",
    "light",
    "brightlight",
    "backlight",
    "filter",
    "lens",
    "e-beam",
    "chamber-light",
    "overview-light",
];

/// Roles of which at least one must be present.
const DETECTOR_ROLES: &[&str] = &[
    "ccd",
    "se-detector",
    "bs-detector",
    "ebic-detector",
    "cl-detector",
    "spectrometer",
];
const EMITTER_ROLES: &[&str] = &["light", "e-beam"];

/// Components of a microscope indexed by their role.
#[derive(Debug, Clone)]
pub struct InstrumentHandles {
    role: String,
    by_role: BTreeMap<&'static str, Arc<Component>>,
}

impl InstrumentHandles {
    /// Resolve the well-known roles of `microscope`.
    ///
    /// Fails with `NotFound` when no detector role or no emitter role is
    /// present. A spectrograph nested under the spectrometer is found too.
    pub fn probe(microscope: &Microscope) -> ScopeResult<Self> {
        let mut by_role = BTreeMap::new();
        for child in microscope.children() {
            if let Some(role) = KNOWN_ROLES.iter().find(|r| **r == child.role()) {
                by_role.insert(*role, child);
            }
        }
        if !by_role.contains_key("spectrograph") {
            let nested = by_role.get("spectrometer").and_then(|spectrometer| {
                spectrometer
                    .children()
                    .into_iter()
                    .find(|c| c.role() == "spectrograph")
            });
            if let Some(spectrograph) = nested {
                by_role.insert("spectrograph", spectrograph);
            }
        }

        if !DETECTOR_ROLES.iter().any(|r| by_role.contains_key(r)) {
            return Err(ScopeError::NotFound(
                "no detector found in the microscope".into(),
            ));
        }
        if !EMITTER_ROLES.iter().any(|r| by_role.contains_key(r)) {
            return Err(ScopeError::NotFound(
                "no emitter found in the microscope".into(),
            ));
        }

        tracing::debug!(roles = ?by_role.keys().collect::<Vec<_>>(), "microscope probed");
        Ok(Self {
            role: microscope.role().to_string(),
            by_role,
        })
    }

    /// Role of the microscope itself ("secom", "sparc", ...).
    pub fn microscope_role(&self) -> &str {
        &self.role
    }

    pub fn get(&self, role: &str) -> Option<&Arc<Component>> {
        self.by_role.get(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_role.keys().copied()
    }

    pub fn ccd(&self) -> Option<&Arc<Component>> {
        self.get("ccd")
    }

    pub fn stage(&self) -> Option<&Arc<Component>> {
        self.get("stage")
    }

    pub fn focus(&self) -> Option<&Arc<Component>> {
        self.get("focus")
    }

    pub fn light(&self) -> Option<&Arc<Component>> {
        self.get("light")
    }

    pub fn ebeam(&self) -> Option<&Arc<Component>> {
        self.get("e-beam")
    }

    pub fn sed(&self) -> Option<&Arc<Component>> {
        self.get("se-detector")
    }

    /// Stop every probed component that can be stopped.
    ///
    /// All of them are asked even if one fails; failures are reported together.
    pub fn stop_motion(&self) -> ScopeResult<()> {
        let mut failures = Vec::new();
        for comp in self.by_role.values() {
            let Some(stoppable) = comp.as_stoppable() else {
                continue;
            };
            if let Err(e) = stoppable.stop() {
                tracing::error!(component = comp.name(), error = %e, "failed to stop");
                failures.push(StopFailure {
                    component: comp.name().to_string(),
                    message: format!("{e:#}"),
                });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScopeError::StopFailed(failures))
        }
    }
}
