//! Snapshot driver
//!
//! Introspect, order, fetch, render, assemble. Runs on one pooled client
//! outside of any transaction so that a failing table does not poison the
//! queries for the tables after it.

use super::assembler::{compose, DataParts, DumpReport, SnapshotMode, StructuralParts, TableOutcome};
use crate::config::SnapshotConfig;
use crate::error::AppError;
use crate::graph::DependencyGraph;
use crate::introspection::{MetadataKind, PostgresIntrospector, TableDescriptor};
use crate::ordering::constructive_order;
use crate::render::ddl::render_inserts;
use crate::render::{quote_ident, quote_ident_list, GenerationError};
use deadpool_postgres::Client;
use tracing::debug;

/// An assembled artifact with its tally
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub body: String,
    pub report: DumpReport,
}

/// Row query for a table: each insertable column cast as its `ValueKind`
/// expects, ordered by primary key when there is one
pub fn select_rows_query(schema: &str, table: &TableDescriptor) -> String {
    let columns = table
        .insertable_columns()
        .iter()
        .map(|c| c.kind.select_expr(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT {} FROM {}.{}",
        columns,
        quote_ident(schema),
        quote_ident(&table.name)
    );

    let pk = table.primary_key_columns();
    if !pk.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", quote_ident_list(pk)));
    }

    sql
}

async fn dump_table(
    client: &Client,
    config: &SnapshotConfig,
    table: &TableDescriptor,
) -> TableOutcome {
    match fetch_table(client, config, table).await {
        Ok(statements) if statements.is_empty() => TableOutcome::Empty {
            table: table.name.clone(),
        },
        Ok(statements) => TableOutcome::Dumped {
            table: table.name.clone(),
            statements,
        },
        Err(error) => TableOutcome::Failed {
            table: table.name.clone(),
            error,
        },
    }
}

async fn fetch_table(
    client: &Client,
    config: &SnapshotConfig,
    table: &TableDescriptor,
) -> Result<Vec<String>, GenerationError> {
    if table.degraded.contains(&MetadataKind::Columns) {
        return Err(GenerationError::MissingColumns(table.name.clone()));
    }
    let columns = table.insertable_columns();
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let sql = select_rows_query(&config.schema, table);
    debug!("Fetching rows: {}", sql);

    let rows = client
        .query(sql.as_str(), &[])
        .await
        .map_err(|source| GenerationError::Fetch {
            table: table.name.clone(),
            source,
        })?;

    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        let decoded = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                column
                    .kind
                    .decode(row, idx)
                    .map_err(|source| GenerationError::Decode {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        values.push(decoded);
    }

    Ok(render_inserts(table, &values, config.insert_batch_size))
}

/// Produce a snapshot of the configured schema
pub async fn take_snapshot(
    client: &Client,
    config: &SnapshotConfig,
    mode: SnapshotMode,
) -> Result<Snapshot, AppError> {
    let catalog = PostgresIntrospector::introspect(client, config).await?;
    let graph = DependencyGraph::from_tables(&catalog.tables).with_sequences(&catalog.sequences);
    let order = constructive_order(&graph);
    debug!("Population order: {:?}", order);

    let mut report = DumpReport::new(mode, catalog.failures.clone());

    let structure = mode
        .includes_structure()
        .then(|| StructuralParts::from_catalog(&catalog, &order, &mut report).render());

    let data = if mode.includes_data() {
        let mut outcomes = Vec::with_capacity(order.len());
        for name in &order {
            if let Some(table) = catalog.table(name) {
                outcomes.push(dump_table(client, config, table).await);
            }
        }
        Some(DataParts::from_outcomes(&config.schema, &graph, outcomes, &mut report).render())
    } else {
        None
    };

    report.log_summary();

    Ok(Snapshot {
        body: compose(structure, data),
        report,
    })
}
