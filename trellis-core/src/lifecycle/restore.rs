//! Restore Across Reload
//!
//! Keeps viewmodel state alive across a full re-render of the body.
//!
//! # How Restore Works
//!
//! 1. Before the tree is destroyed, [`RestoreCoordinator::capture`] walks it
//!    and records the plain properties of every viewmodel, keyed by the
//!    view's position path (`body/list#0/item#2`). The snapshot is encoded
//!    with MessagePack and held as the migration payload.
//!
//! 2. [`RestoreCoordinator::begin`] decodes the payload. From then on, every
//!    view created at a recorded position is seeded with its saved values,
//!    so those properties skip their initializers.
//!
//! 3. When the body finishes rendering, [`RestoreCoordinator::restore_all`]
//!    writes the saved values once more over the whole tree and closes the
//!    restore. Properties that no longer exist are skipped.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BindError, Result};
use crate::template::{Template, View};

/// Saved plain properties of one viewmodel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModelSnapshot {
    pub name: Option<String>,
    pub props: IndexMap<String, Value>,
}

/// Saved state of a whole view tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: IndexMap<String, ViewModelSnapshot>,
}

impl Snapshot {
    /// Record every live viewmodel under `root`.
    pub fn capture(root: &View) -> Self {
        let entries = root
            .walk()
            .into_iter()
            .filter_map(|view| {
                let viewmodel = view.viewmodel().filter(|vm| !vm.is_disposed())?;
                let entry = ViewModelSnapshot {
                    name: viewmodel.name().map(str::to_string),
                    props: viewmodel.snapshot(),
                };
                Some((view.path().to_string(), entry))
            })
            .collect();
        Self { entries }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|err| BindError::Snapshot(err.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|err| BindError::Snapshot(err.to_string()))
    }

    pub fn get(&self, path: &str) -> Option<&ViewModelSnapshot> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Viewmodels that received saved values.
    pub restored: usize,
    /// `(path, property)` pairs whose property no longer exists.
    pub skipped: Vec<(String, String)>,
    /// Saved positions with no viewmodel in the new tree.
    pub unmatched: Vec<String>,
}

/// Carries a snapshot from before a reload to the views rendered after it.
#[derive(Debug, Default)]
pub struct RestoreCoordinator {
    payload: Mutex<Option<Vec<u8>>>,
    active: Mutex<Option<Snapshot>>,
}

impl RestoreCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the tree under `root` into the migration payload.
    pub fn capture(&self, root: &View) -> Result<usize> {
        let snapshot = Snapshot::capture(root);
        let bytes = snapshot.encode()?;
        tracing::debug!(
            viewmodels = snapshot.len(),
            bytes = bytes.len(),
            "captured restore snapshot"
        );
        *self.payload.lock() = Some(bytes);
        Ok(snapshot.len())
    }

    /// The encoded payload, if one is waiting.
    pub fn payload(&self) -> Option<Vec<u8>> {
        self.payload.lock().clone()
    }

    /// Hand in a payload captured elsewhere.
    pub fn set_payload(&self, bytes: Vec<u8>) {
        *self.payload.lock() = Some(bytes);
    }

    /// Decode the payload and start seeding views. Returns `false` when
    /// there is nothing usable to restore.
    pub fn begin(&self) -> bool {
        let Some(bytes) = self.payload.lock().take() else {
            return false;
        };
        match Snapshot::decode(&bytes) {
            Ok(snapshot) => {
                tracing::debug!(viewmodels = snapshot.len(), "restore started");
                *self.active.lock() = Some(snapshot);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable restore snapshot");
                false
            }
        }
    }

    /// Whether a restore is in progress.
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Saved values for the view at `path`.
    pub fn seed_for(&self, path: &str) -> IndexMap<String, Value> {
        self.active
            .lock()
            .as_ref()
            .and_then(|snapshot| snapshot.get(path))
            .map(|entry| entry.props.clone())
            .unwrap_or_default()
    }

    /// Apply the active snapshot to every viewmodel under `root` and end the
    /// restore.
    pub fn restore_all(&self, root: &View) -> RestoreReport {
        let Some(snapshot) = self.active.lock().take() else {
            return RestoreReport::default();
        };

        let mut report = RestoreReport::default();
        let mut matched = Vec::new();
        for view in root.walk() {
            let Some(entry) = snapshot.get(view.path()) else {
                continue;
            };
            let Some(viewmodel) = view.viewmodel() else {
                continue;
            };
            matched.push(view.path().to_string());

            for name in viewmodel.restore(&entry.props) {
                tracing::debug!(path = %view.path(), property = %name, "restore skipped missing property");
                report.skipped.push((view.path().to_string(), name));
            }
            report.restored += 1;
        }

        report.unmatched = snapshot
            .entries
            .keys()
            .filter(|path| !matched.contains(*path))
            .cloned()
            .collect();
        for path in &report.unmatched {
            tracing::debug!(path = %path, "restore found no viewmodel at saved position");
        }

        tracing::debug!(restored = report.restored, "restore finished");
        report
    }

    /// Run [`restore_all`](Self::restore_all) whenever `template` (the body)
    /// finishes rendering.
    pub fn install(self: &Arc<Self>, template: &mut Template) {
        let coordinator = Arc::clone(self);
        template.on_rendered(move |view| {
            coordinator.restore_all(view);
            Ok(())
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
