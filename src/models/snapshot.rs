//! Snapshot and restore DTOs

use crate::snapshot::{DumpReport, SnapshotMode, StoredArtifact};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to take a snapshot; `full` when the mode is omitted
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    #[serde(default)]
    pub mode: SnapshotMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub artifact: StoredArtifact,
    pub report: DumpReport,
}

/// Request to replay an artifact
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    /// Artifact path relative to the backups directory
    #[validate(length(min = 1, max = 1024, message = "Artifact file is required"))]
    pub file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub file: String,
    pub statements: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpListResponse {
    pub files: Vec<String>,
    pub total: usize,
}
