//! Snapshot Module
//!
//! Produces replayable artifacts of a schema's structure and data:
//! - Assembly of rendered statements into artifact groups
//! - The dump driver walking tables in dependency order
//! - The on-disk artifact store

pub mod assembler;
pub mod dump;
pub mod store;

pub use assembler::{DumpReport, SnapshotMode};
pub use dump::take_snapshot;
pub use store::{ArtifactStore, StoredArtifact};
