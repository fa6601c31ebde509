//! Destructive maintenance route handlers

use crate::error::{validation_error, ApiResult};
use crate::maintenance::{drop_all, truncate_tables, DropReport};
use crate::models::{SuccessResponse, TruncateRequest, TruncateResponse};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use validator::Validate;

/// Drop every application table and enum type of a connection
pub async fn drop_tables(
    State(state): State<SharedState>,
    Path(alias): Path<String>,
) -> ApiResult<Json<SuccessResponse<DropReport>>> {
    let pool = state.connections.pool(&alias).await?;
    let report = drop_all(&pool, state.snapshot_config()).await?;

    let message = if report.cascade_fallback {
        "All tables have been removed with CASCADE (order ignored)."
    } else {
        "All tables have been properly removed."
    };
    info!("{} (connection '{}')", message, alias);

    Ok(Json(SuccessResponse::with_data(message, report)))
}

/// Truncate the selected tables, or all of them
pub async fn truncate(
    State(state): State<SharedState>,
    Path(alias): Path<String>,
    payload: Option<Json<TruncateRequest>>,
) -> ApiResult<Json<SuccessResponse<TruncateResponse>>> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    request.validate().map_err(|e| validation_error(e.to_string()))?;

    let pool = state.connections.pool(&alias).await?;
    let tables = truncate_tables(&pool, state.snapshot_config(), request.tables.as_deref()).await?;

    Ok(Json(SuccessResponse::with_data(
        format!("{} table(s) truncated.", tables.len()),
        TruncateResponse { tables },
    )))
}
