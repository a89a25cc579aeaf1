//! Lifecycle
//!
//! Connects viewmodel definitions to template lifecycles, and carries
//! viewmodel state across a reload of the whole view tree.

mod declare;
mod restore;

pub use declare::declare;
pub use restore::{RestoreCoordinator, RestoreReport, Snapshot, ViewModelSnapshot};
