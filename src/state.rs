//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::{Settings, SnapshotConfig};
use crate::connection::ConnectionRegistry;
use crate::snapshot::ArtifactStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,

    /// Configured connection targets and their pools
    pub connections: ConnectionRegistry,

    /// Snapshot artifacts on disk
    pub artifacts: ArtifactStore,
}

impl AppState {
    pub fn new(settings: Settings, connections: ConnectionRegistry) -> Self {
        let artifacts = ArtifactStore::new(settings.snapshot.backups_dir.clone());

        Self {
            settings,
            connections,
            artifacts,
        }
    }

    pub fn snapshot_config(&self) -> &SnapshotConfig {
        &self.settings.snapshot
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
