//! Table maintenance DTOs

use crate::maintenance::TableSize;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to truncate tables; every table when `tables` is omitted
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TruncateRequest {
    #[validate(length(min = 1, message = "At least one table must be selected"))]
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncateResponse {
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSizeListResponse {
    pub tables: Vec<TableSize>,
    pub total: usize,
}
