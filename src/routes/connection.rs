//! Connection route handlers
//!
//! Connections are configured up front; these routes only expose them.

use crate::connection::ConnectionInfo;
use crate::error::ApiResult;
use crate::maintenance::list_tables_with_size;
use crate::models::{SuccessResponse, TableSizeListResponse};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

/// List configured connections, passwords masked
pub async fn list_connections(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<ConnectionInfo>>>> {
    let connections = state.connections.list();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} connection(s).", connections.len()),
        connections,
    )))
}

/// List tables of a connection with their size, largest first
pub async fn list_tables(
    State(state): State<SharedState>,
    Path(alias): Path<String>,
) -> ApiResult<Json<SuccessResponse<TableSizeListResponse>>> {
    debug!("Listing tables for connection '{}'", alias);

    let pool = state.connections.pool(&alias).await?;
    let client = pool.get().await?;
    let tables = list_tables_with_size(&client, state.snapshot_config()).await?;
    let total = tables.len();

    Ok(Json(SuccessResponse::with_data(
        format!("Found {} table(s) in schema '{}'.", total, state.snapshot_config().schema),
        TableSizeListResponse { tables, total },
    )))
}
