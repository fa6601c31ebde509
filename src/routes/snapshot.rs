//! Snapshot and restore route handlers

use crate::error::{validation_error, ApiResult};
use crate::models::{
    CreateSnapshotRequest, DumpListResponse, RestoreRequest, RestoreResponse, SnapshotResponse,
    SuccessResponse,
};
use crate::replay::replay;
use crate::snapshot::take_snapshot;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info};
use validator::Validate;

/// Take a snapshot of a connection and write it under the backups directory
pub async fn create_snapshot(
    State(state): State<SharedState>,
    Path(alias): Path<String>,
    payload: Option<Json<CreateSnapshotRequest>>,
) -> ApiResult<Json<SuccessResponse<SnapshotResponse>>> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    debug!("Taking {:?} snapshot of connection '{}'", request.mode, alias);

    let pool = state.connections.pool(&alias).await?;
    let client = pool.get().await?;
    let snapshot = take_snapshot(&client, state.snapshot_config(), request.mode).await?;

    let artifact = state
        .artifacts
        .write(&alias, request.mode, &snapshot.body)
        .await?;

    Ok(Json(SuccessResponse::with_data(
        format!(
            "Snapshot written to '{}' ({} dumped, {} empty, {} failed).",
            artifact.file,
            snapshot.report.dumped.len(),
            snapshot.report.skipped_empty.len(),
            snapshot.report.failed.len()
        ),
        SnapshotResponse {
            artifact,
            report: snapshot.report,
        },
    )))
}

/// Replay an artifact into a connection, all or nothing
pub async fn restore_snapshot(
    State(state): State<SharedState>,
    Path(alias): Path<String>,
    Json(payload): Json<RestoreRequest>,
) -> ApiResult<Json<SuccessResponse<RestoreResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let body = state.artifacts.read(&payload.file).await?;
    info!("Importing file '{}' into connection '{}'", payload.file, alias);

    let pool = state.connections.pool(&alias).await?;
    let report = replay(&pool, &body).await?;

    Ok(Json(SuccessResponse::with_data(
        format!("Dump '{}' successfully imported.", payload.file),
        RestoreResponse {
            file: payload.file,
            statements: report.statements,
        },
    )))
}

/// List available artifacts
pub async fn list_dumps(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<DumpListResponse>>> {
    let files = state.artifacts.list().await?;
    let total = files.len();

    let message = if total == 0 {
        "No dump file found in the backups folder.".to_string()
    } else {
        format!("Found {} dump file(s).", total)
    };

    Ok(Json(SuccessResponse::with_data(
        message,
        DumpListResponse { files, total },
    )))
}
