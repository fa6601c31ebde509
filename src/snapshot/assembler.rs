//! Snapshot assembly
//!
//! Composes rendered statements into the final artifact text and keeps the
//! per-table tally. Assembly itself never fails: a table that cannot be
//! rendered is left out of the artifact and counted as failed.

use crate::graph::DependencyGraph;
use crate::introspection::{IntrospectionFailure, SchemaCatalog};
use crate::render::ddl::{
    render_create_sequence, render_create_table, render_enum_type, render_foreign_key,
    render_index, render_sequence_ownership, render_sequence_resync, DISABLE_CONSTRAINTS,
    ENABLE_CONSTRAINTS,
};
use crate::render::GenerationError;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// What a snapshot contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Structure only
    Schema,
    /// Rows only, to be replayed onto an existing structure
    Data,
    /// Structure followed by rows
    #[default]
    Full,
}

impl SnapshotMode {
    pub fn includes_structure(&self) -> bool {
        matches!(self, Self::Schema | Self::Full)
    }

    pub fn includes_data(&self) -> bool {
        matches!(self, Self::Data | Self::Full)
    }

    /// Artifact file name prefix
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Data | Self::Full => "dump",
        }
    }
}

/// Result of fetching and rendering one table's rows
#[derive(Debug)]
pub enum TableOutcome {
    Dumped {
        table: String,
        statements: Vec<String>,
    },
    Empty {
        table: String,
    },
    Failed {
        table: String,
        error: GenerationError,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTable {
    pub table: String,
    pub error: String,
}

/// Per-table tally of one snapshot run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpReport {
    pub mode: SnapshotMode,
    pub dumped: Vec<String>,
    pub skipped_empty: Vec<String>,
    pub failed: Vec<FailedTable>,
    pub introspection_failures: Vec<IntrospectionFailure>,
}

impl DumpReport {
    pub fn new(mode: SnapshotMode, introspection_failures: Vec<IntrospectionFailure>) -> Self {
        Self {
            mode,
            introspection_failures,
            ..Self::default()
        }
    }

    pub fn is_failed(&self, table: &str) -> bool {
        self.failed.iter().any(|f| f.table == table)
    }

    fn record_failure(&mut self, table: &str, err: &GenerationError) {
        error!("Failed to dump table {}: {}", table, err);
        if !self.is_failed(table) {
            self.failed.push(FailedTable {
                table: table.to_string(),
                error: err.to_string(),
            });
        }
    }

    /// Count an outcome, handing back its statements when there are any
    pub fn record(&mut self, outcome: TableOutcome) -> Option<Vec<String>> {
        match outcome {
            TableOutcome::Dumped { table, statements } => {
                info!("Table {} dumped ({} INSERT blocks)", table, statements.len());
                self.dumped.push(table);
                Some(statements)
            }
            TableOutcome::Empty { table } => {
                info!("Table {} skipped (empty)", table);
                self.skipped_empty.push(table);
                None
            }
            TableOutcome::Failed { table, error } => {
                self.record_failure(&table, &error);
                None
            }
        }
    }

    /// Log the closing summary
    pub fn log_summary(&self) {
        if !self.introspection_failures.is_empty() {
            warn!(
                "{} metadata lookups failed during introspection",
                self.introspection_failures.len()
            );
        }

        info!(
            "Snapshot ({:?}) finished: {} dumped, {} skipped (empty), {} failed",
            self.mode,
            self.dumped.len(),
            self.skipped_empty.len(),
            self.failed.len()
        );
    }
}

/// Structural statements grouped in replay order
#[derive(Debug, Clone, Default)]
pub struct StructuralParts {
    pub enum_types: Vec<String>,
    pub sequences: Vec<String>,
    pub tables: Vec<String>,
    pub ownerships: Vec<String>,
    pub foreign_keys: Vec<String>,
    pub indexes: Vec<String>,
}

impl StructuralParts {
    /// Render the catalog, tables in `order`. Tables without column metadata
    /// are left out along with their foreign keys and indexes. Identity
    /// sequences come with their table and are not rendered on their own.
    pub fn from_catalog(catalog: &SchemaCatalog, order: &[String], report: &mut DumpReport) -> Self {
        let standalone = || catalog.sequences.iter().filter(|s| !s.identity);
        let mut parts = Self {
            enum_types: catalog.enum_types.iter().map(render_enum_type).collect(),
            sequences: standalone().map(render_create_sequence).collect(),
            ..Self::default()
        };

        let mut rendered = Vec::with_capacity(order.len());
        for name in order {
            let Some(table) = catalog.table(name) else {
                continue;
            };

            match render_create_table(table) {
                Ok(sql) => {
                    parts.tables.push(sql);
                    rendered.push(table);
                }
                Err(e) => report.record_failure(name, &e),
            }
        }

        parts.ownerships = standalone()
            .filter(|s| {
                s.owner
                    .as_ref()
                    .is_some_and(|o| rendered.iter().any(|t| t.name == o.table))
            })
            .filter_map(render_sequence_ownership)
            .collect();

        for table in &rendered {
            parts
                .foreign_keys
                .extend(table.foreign_keys.iter().map(render_foreign_key));
            parts.indexes.extend(table.indexes.iter().map(render_index));
        }

        parts
    }

    /// Groups joined by a blank line, empty groups omitted
    pub fn render(&self) -> String {
        [
            &self.enum_types,
            &self.sequences,
            &self.tables,
            &self.ownerships,
            &self.foreign_keys,
            &self.indexes,
        ]
        .into_iter()
        .filter(|group| !group.is_empty())
        .map(|group| group.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

/// Data statements: INSERT blocks in population order, then sequence resyncs
#[derive(Debug, Clone, Default)]
pub struct DataParts {
    pub inserts: Vec<String>,
    pub resyncs: Vec<String>,
}

impl DataParts {
    /// Fold table outcomes (already in population order) into data statements.
    /// Every sequence owned by a table that was not a failure gets resynced.
    pub fn from_outcomes(
        schema: &str,
        graph: &DependencyGraph,
        outcomes: Vec<TableOutcome>,
        report: &mut DumpReport,
    ) -> Self {
        let mut parts = Self::default();
        let mut resync_tables = Vec::new();

        for outcome in outcomes {
            let table = match &outcome {
                TableOutcome::Dumped { table, .. } | TableOutcome::Empty { table } => {
                    Some(table.clone())
                }
                TableOutcome::Failed { .. } => None,
            };

            if let Some(statements) = report.record(outcome) {
                parts.inserts.extend(statements);
            }

            resync_tables.extend(table);
        }

        for table in resync_tables.iter().filter(|t| !report.is_failed(t)) {
            parts.resyncs.extend(
                graph
                    .sequences_owned_by(table)
                    .map(|(sequence, owner)| render_sequence_resync(schema, sequence, owner)),
            );
        }

        parts
    }

    /// Groups joined by a blank line, like the structural groups
    pub fn render(&self) -> String {
        let mut sections = vec![DISABLE_CONSTRAINTS.to_string()];
        if !self.inserts.is_empty() {
            sections.push(self.inserts.join("\n\n"));
        }
        sections.push(ENABLE_CONSTRAINTS.to_string());
        if !self.resyncs.is_empty() {
            sections.push(self.resyncs.join("\n"));
        }
        sections.join("\n\n")
    }
}

/// Join the structural and data artifacts of a run
pub fn compose(structure: Option<String>, data: Option<String>) -> String {
    let mut body = [structure, data]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    body.push('\n');
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::{
        ColumnDescriptor, EnumTypeDescriptor, ForeignKeyDescriptor, IndexDescriptor, MetadataKind,
        SequenceDescriptor, SequenceOwner, TableDescriptor,
    };
    use crate::ordering::constructive_order;
    use crate::render::literal::ValueKind;
    use pretty_assertions::assert_eq;

    fn id_column() -> ColumnDescriptor {
        ColumnDescriptor {
            name: "id".to_string(),
            declared_type: "integer".to_string(),
            nullable: false,
            kind: ValueKind::Integer,
            ..Default::default()
        }
    }

    fn catalog() -> SchemaCatalog {
        let mut users = TableDescriptor::new("users");
        users.columns = vec![id_column()];
        users.indexes = vec![IndexDescriptor {
            name: "users_idx".to_string(),
            definition: "CREATE INDEX users_idx ON public.users USING btree (id)".to_string(),
        }];

        let mut orders = TableDescriptor::new("orders");
        orders.columns = vec![id_column()];
        orders.foreign_keys = vec![ForeignKeyDescriptor {
            name: "orders_user_fk".to_string(),
            table: "orders".to_string(),
            referenced_table: "users".to_string(),
            columns: vec!["id".to_string()],
            referenced_columns: vec!["id".to_string()],
            on_update: "NO ACTION".to_string(),
            on_delete: "NO ACTION".to_string(),
        }];

        SchemaCatalog {
            tables: vec![orders, users],
            sequences: vec![SequenceDescriptor {
                name: "users_id_seq".to_string(),
                owner: Some(SequenceOwner {
                    table: "users".to_string(),
                    column: "id".to_string(),
                }),
                identity: false,
            }],
            enum_types: vec![EnumTypeDescriptor {
                name: "mood".to_string(),
                labels: vec!["sad".to_string(), "happy".to_string()],
            }],
            failures: vec![],
        }
    }

    fn graph_of(catalog: &SchemaCatalog) -> DependencyGraph {
        DependencyGraph::from_tables(&catalog.tables).with_sequences(&catalog.sequences)
    }

    #[test]
    fn test_structure_groups_in_order() {
        let catalog = catalog();
        let order = constructive_order(&graph_of(&catalog));
        let mut report = DumpReport::new(SnapshotMode::Schema, vec![]);

        let structure = StructuralParts::from_catalog(&catalog, &order, &mut report).render();

        assert_eq!(
            structure,
            "CREATE TYPE \"mood\" AS ENUM ('sad', 'happy');\n\
             \n\
             CREATE SEQUENCE IF NOT EXISTS \"users_id_seq\";\n\
             \n\
             CREATE TABLE \"users\" (\n    \"id\" integer NOT NULL\n);\n\
             CREATE TABLE \"orders\" (\n    \"id\" integer NOT NULL\n);\n\
             \n\
             ALTER SEQUENCE \"users_id_seq\" OWNED BY \"users\".\"id\";\n\
             \n\
             ALTER TABLE \"orders\" ADD CONSTRAINT \"orders_user_fk\" FOREIGN KEY (\"id\") REFERENCES \"users\" (\"id\");\n\
             \n\
             CREATE INDEX users_idx ON public.users USING btree (id);"
        );
        assert!(report.failed.is_empty());
    }

    #[test]
    fn test_empty_groups_are_omitted() {
        let mut table = TableDescriptor::new("notes");
        table.columns = vec![id_column()];
        let catalog = SchemaCatalog {
            tables: vec![table],
            ..SchemaCatalog::default()
        };
        let mut report = DumpReport::default();

        let structure =
            StructuralParts::from_catalog(&catalog, &["notes".to_string()], &mut report).render();
        assert_eq!(structure, "CREATE TABLE \"notes\" (\n    \"id\" integer NOT NULL\n);");
    }

    #[test]
    fn test_table_without_columns_is_counted_failed() {
        let mut catalog = catalog();
        catalog.tables[1].columns.clear();
        catalog.tables[1].degraded.push(MetadataKind::Columns);
        let order = constructive_order(&graph_of(&catalog));
        let mut report = DumpReport::new(SnapshotMode::Schema, vec![]);

        let parts = StructuralParts::from_catalog(&catalog, &order, &mut report);

        assert_eq!(parts.tables.len(), 1);
        assert!(parts.indexes.is_empty());
        assert!(parts.ownerships.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].table, "users");
    }

    #[test]
    fn test_zero_row_table_is_skipped_empty() {
        let catalog = catalog();
        let graph = graph_of(&catalog);
        let mut report = DumpReport::new(SnapshotMode::Data, vec![]);

        let outcomes = vec![
            TableOutcome::Empty {
                table: "users".to_string(),
            },
            TableOutcome::Empty {
                table: "orders".to_string(),
            },
        ];
        let data = DataParts::from_outcomes("public", &graph, outcomes, &mut report);

        assert!(data.inserts.is_empty());
        assert_eq!(report.skipped_empty, vec!["users", "orders"]);
        assert!(report.dumped.is_empty());
        assert!(!data.render().contains("INSERT"));
    }

    #[test]
    fn test_data_artifact_layout() {
        let catalog = catalog();
        let graph = graph_of(&catalog);
        let mut report = DumpReport::new(SnapshotMode::Data, vec![]);

        let outcomes = vec![
            TableOutcome::Dumped {
                table: "users".to_string(),
                statements: vec![
                    "-- Dump of table users\nINSERT INTO \"users\" (\"id\")\nVALUES\n(1);".to_string(),
                ],
            },
            TableOutcome::Failed {
                table: "orders".to_string(),
                error: GenerationError::MissingColumns("orders".to_string()),
            },
        ];
        let data = DataParts::from_outcomes("public", &graph, outcomes, &mut report).render();

        assert_eq!(
            data,
            "-- Disable constraints\n\
             SET session_replication_role = 'replica';\n\
             \n\
             -- Dump of table users\n\
             INSERT INTO \"users\" (\"id\")\n\
             VALUES\n\
             (1);\n\
             \n\
             -- Re-enable constraints\n\
             SET session_replication_role = 'origin';\n\
             \n\
             SELECT setval('\"public\".\"users_id_seq\"', GREATEST(COALESCE((SELECT MAX(\"id\") FROM \"users\"), 0), 1));"
        );
        assert_eq!(report.dumped, vec!["users"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].table, "orders");
    }

    #[test]
    fn test_identity_sequence_is_resynced_but_not_created() {
        let mut catalog = catalog();
        catalog.sequences[0].identity = true;
        let order = constructive_order(&graph_of(&catalog));
        let mut report = DumpReport::new(SnapshotMode::Full, vec![]);

        let structure = StructuralParts::from_catalog(&catalog, &order, &mut report);
        assert!(structure.sequences.is_empty());
        assert!(structure.ownerships.is_empty());

        let outcomes = vec![TableOutcome::Empty {
            table: "users".to_string(),
        }];
        let data = DataParts::from_outcomes("public", &graph_of(&catalog), outcomes, &mut report);
        assert_eq!(data.resyncs.len(), 1);
        assert!(data.resyncs[0].contains("\"users_id_seq\""));
    }

    #[test]
    fn test_compose_full_snapshot() {
        let body = compose(Some("CREATE TABLE x ();".to_string()), Some("SELECT 1;".to_string()));
        assert_eq!(body, "CREATE TABLE x ();\n\nSELECT 1;\n");

        let schema_only = compose(Some(String::new()), None);
        assert_eq!(schema_only, "\n");
    }

    #[test]
    fn test_mode_flags() {
        assert!(SnapshotMode::Schema.includes_structure());
        assert!(!SnapshotMode::Schema.includes_data());
        assert!(SnapshotMode::Full.includes_data());
        assert_eq!(SnapshotMode::Schema.file_prefix(), "schema");
        assert_eq!(SnapshotMode::Data.file_prefix(), "dump");

        let mode: SnapshotMode = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(mode, SnapshotMode::Full);
    }
}
