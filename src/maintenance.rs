//! Schema maintenance operations
//!
//! Dropping every table, truncating a selection of tables and listing table
//! sizes. Drops follow the destructive order; a foreign key cycle falls back
//! to a single cascading drop of all tables.

use crate::config::SnapshotConfig;
use crate::db::queries::LIST_TABLES_WITH_SIZE;
use crate::error::{validation_error, AppError};
use crate::graph::DependencyGraph;
use crate::introspection::{is_excluded, EnumTypeDescriptor, PostgresIntrospector};
use crate::ordering::{destructive_order, CycleDetected};
use crate::render::quote_ident;
use deadpool_postgres::{Client, Pool};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Statements that drop every table and enum type of a schema
#[derive(Debug, Clone)]
pub struct DropPlan {
    pub statements: Vec<String>,
    /// Tables in the order they are dropped; empty on cascade fallback
    pub order: Vec<String>,
    pub cycle: Option<CycleDetected>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DropReport {
    pub tables: Vec<String>,
    pub enum_types: Vec<String>,
    pub cascade_fallback: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSize {
    pub table_name: String,
    pub total_size: String,
    pub total_bytes: i64,
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// Plan the drop of every graph table, then every enum type
pub fn plan_drop(schema: &str, graph: &DependencyGraph, enum_types: &[EnumTypeDescriptor]) -> DropPlan {
    let mut statements = Vec::new();

    let (order, cycle) = match destructive_order(graph) {
        Ok(order) => {
            statements.extend(
                order
                    .iter()
                    .map(|t| format!("DROP TABLE IF EXISTS {} CASCADE;", qualified(schema, t))),
            );
            (order, None)
        }
        Err(cycle) => {
            if !graph.nodes().is_empty() {
                let all = graph
                    .nodes()
                    .iter()
                    .map(|t| qualified(schema, t))
                    .collect::<Vec<_>>()
                    .join(", ");
                statements.push(format!("DROP TABLE IF EXISTS {} CASCADE;", all));
            }
            (Vec::new(), Some(cycle))
        }
    };

    statements.extend(
        enum_types
            .iter()
            .map(|e| format!("DROP TYPE IF EXISTS {} CASCADE;", qualified(schema, &e.name))),
    );

    DropPlan {
        statements,
        order,
        cycle,
    }
}

/// Drop every application table and enum type in one transaction
pub async fn drop_all(pool: &Pool, config: &SnapshotConfig) -> Result<DropReport, AppError> {
    let mut client = pool.get().await?;

    let catalog = PostgresIntrospector::introspect(&client, config).await?;
    let graph = DependencyGraph::from_tables(&catalog.tables);
    let plan = plan_drop(&config.schema, &graph, &catalog.enum_types);

    match &plan.cycle {
        Some(cycle) => warn!("{}, forcing removal with CASCADE on all tables", cycle),
        None => info!("Removing tables in order: {}", plan.order.join(" -> ")),
    }

    let transaction = client.transaction().await?;
    for statement in &plan.statements {
        debug!("Executing: {}", statement);
        transaction.batch_execute(statement).await?;
    }
    transaction.commit().await?;

    let report = DropReport {
        tables: graph.nodes().to_vec(),
        enum_types: catalog.enum_types.iter().map(|e| e.name.clone()).collect(),
        cascade_fallback: plan.cycle.is_some(),
    };
    info!(
        "Dropped {} tables and {} enum types",
        report.tables.len(),
        report.enum_types.len()
    );

    Ok(report)
}

/// Pick the tables to truncate: all of them when no selection is given,
/// otherwise the selection, every name of which must exist
pub fn select_tables(available: &[String], selection: Option<&[String]>) -> Result<Vec<String>, AppError> {
    let Some(selection) = selection else {
        return Ok(available.to_vec());
    };

    if selection.is_empty() {
        return Err(validation_error("No table selected"));
    }

    if let Some(unknown) = selection.iter().find(|t| !available.contains(t)) {
        return Err(validation_error(format!("Unknown table '{}'", unknown)));
    }

    let mut selected: Vec<String> = Vec::with_capacity(selection.len());
    for table in selection {
        if !selected.contains(table) {
            selected.push(table.clone());
        }
    }
    Ok(selected)
}

pub fn truncate_statement(schema: &str, tables: &[String]) -> String {
    let list = tables
        .iter()
        .map(|t| qualified(schema, t))
        .collect::<Vec<_>>()
        .join(", ");
    format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", list)
}

/// Empty tables, resetting their identities; cascades to referencing tables
pub async fn truncate_tables(
    pool: &Pool,
    config: &SnapshotConfig,
    selection: Option<&[String]>,
) -> Result<Vec<String>, AppError> {
    let client = pool.get().await?;
    let available = PostgresIntrospector::list_tables(&client, config).await?;
    let tables = select_tables(&available, selection)?;

    if tables.is_empty() {
        info!("No tables to truncate in schema '{}'", config.schema);
        return Ok(tables);
    }

    client
        .batch_execute(&truncate_statement(&config.schema, &tables))
        .await?;
    info!("Truncated tables: {}", tables.join(", "));

    Ok(tables)
}

/// Application tables with their total on-disk size, largest first
pub async fn list_tables_with_size(
    client: &Client,
    config: &SnapshotConfig,
) -> Result<Vec<TableSize>, AppError> {
    let rows = client.query(LIST_TABLES_WITH_SIZE, &[&config.schema]).await?;

    Ok(rows
        .iter()
        .map(|row| TableSize {
            table_name: row.get("table_name"),
            total_size: row.get("total_size"),
            total_bytes: row.get("total_bytes"),
        })
        .filter(|t| !is_excluded(&t.table_name, &config.excluded_table_prefixes))
        .collect())
}
