//! Schema Introspection Module
//!
//! Reads the live catalog of one schema into typed descriptors. Every
//! per-table lookup is fetched on its own: when one fails, the failure is
//! logged and recorded, that list degrades to empty, and the remaining
//! tables are still described.

use crate::config::SnapshotConfig;
use crate::db::queries::{
    GET_COLUMNS, GET_CONSTRAINTS, GET_ENUM_TYPES, GET_FOREIGN_KEYS, GET_INDEXES, GET_SEQUENCES,
    LIST_TABLES,
};
use crate::error::AppError;
use crate::render::literal::ValueKind;
use crate::render::quote_ident;
use deadpool_postgres::Client;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Everything introspected from one schema
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCatalog {
    pub tables: Vec<TableDescriptor>,
    pub sequences: Vec<SequenceDescriptor>,
    pub enum_types: Vec<EnumTypeDescriptor>,
    pub failures: Vec<IntrospectionFailure>,
}

impl SchemaCatalog {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Table representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub constraints: Vec<ConstraintDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    /// Metadata lists that failed to load and are empty for that reason
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<MetadataKind>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            degraded: Vec::new(),
        }
    }

    /// Columns that take explicit values on INSERT; stored generated
    /// columns are computed by the server and left out
    pub fn insertable_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.generated.is_none()).collect()
    }

    /// Columns of the primary key, empty when the table has none
    pub fn primary_key_columns(&self) -> &[String] {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
            .map(|c| c.columns.as_slice())
            .unwrap_or(&[])
    }
}

/// Column representation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    /// Render-ready type, e.g. `varchar(255)` or `numeric(10, 2)`
    pub declared_type: String,
    pub nullable: bool,
    /// Raw default expression, never re-validated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityGeneration>,
    /// Expression of a stored generated column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
    pub kind: ValueKind,
}

/// `GENERATED ALWAYS` or `GENERATED BY DEFAULT` identity column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityGeneration {
    Always,
    ByDefault,
}

impl IdentityGeneration {
    pub fn from_catalog(raw: &str) -> Option<Self> {
        match raw {
            "ALWAYS" => Some(Self::Always),
            "BY DEFAULT" => Some(Self::ByDefault),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Always => "ALWAYS",
            Self::ByDefault => "BY DEFAULT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    Check,
}

impl ConstraintKind {
    pub fn from_catalog(raw: &str) -> Option<Self> {
        match raw {
            "PRIMARY KEY" => Some(Self::PrimaryKey),
            "UNIQUE" => Some(Self::Unique),
            "CHECK" => Some(Self::Check),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::Check => "CHECK",
        }
    }
}

/// PRIMARY KEY, UNIQUE or CHECK constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDescriptor {
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_clause: Option<String>,
}

/// Foreign key relationship
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDescriptor {
    pub name: String,
    pub table: String,
    pub referenced_table: String,
    pub columns: Vec<String>,
    pub referenced_columns: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// Secondary index with its full catalog definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceOwner {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<SequenceOwner>,
    /// Backs an identity column; created along with its table, never on its own
    pub identity: bool,
}

/// Enumerated type; label order defines comparison order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumTypeDescriptor {
    pub name: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    Columns,
    Constraints,
    ForeignKeys,
    Indexes,
    Sequences,
    EnumTypes,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Columns => "columns",
            Self::Constraints => "constraints",
            Self::ForeignKeys => "foreign keys",
            Self::Indexes => "indexes",
            Self::Sequences => "sequences",
            Self::EnumTypes => "enum types",
        };
        f.write_str(label)
    }
}

/// A recovered metadata fetch failure
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("failed to fetch {kind} for {object}: {message}")]
pub struct IntrospectionFailure {
    pub object: String,
    pub kind: MetadataKind,
    pub message: String,
}

/// Raw `information_schema.columns` row
#[derive(Debug, Clone, Default)]
pub struct CatalogColumn {
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
    pub column_default: Option<String>,
    pub is_nullable: String,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
    pub datetime_precision: Option<i32>,
    pub interval_type: Option<String>,
    pub is_identity: Option<String>,
    pub identity_generation: Option<String>,
    pub is_generated: Option<String>,
    pub generation_expression: Option<String>,
}

/// Fractional seconds precision PostgreSQL uses when none is declared
const DEFAULT_DATETIME_PRECISION: i32 = 6;

impl CatalogColumn {
    /// ` (p)` suffix for time-like types, omitted at the default precision
    fn precision_suffix(&self) -> String {
        match self.datetime_precision {
            Some(p) if p != DEFAULT_DATETIME_PRECISION => format!("({})", p),
            _ => String::new(),
        }
    }

    fn length_suffix(&self) -> String {
        self.character_maximum_length
            .map(|len| format!("({})", len))
            .unwrap_or_default()
    }

    /// Type declaration that round-trips through PostgreSQL
    pub fn declared_type(&self) -> String {
        match self.data_type.as_str() {
            "character varying" => format!("varchar{}", self.length_suffix()),
            "character" => format!("char{}", self.length_suffix()),
            "bit" => format!("bit{}", self.length_suffix()),
            "bit varying" => format!("bit varying{}", self.length_suffix()),
            "numeric" => match (self.numeric_precision, self.numeric_scale) {
                (Some(precision), Some(scale)) => format!("numeric({}, {})", precision, scale),
                _ => "numeric".to_string(),
            },
            "timestamp without time zone" => {
                format!("timestamp{} without time zone", self.precision_suffix())
            }
            "timestamp with time zone" => {
                format!("timestamp{} with time zone", self.precision_suffix())
            }
            "time without time zone" => format!("time{} without time zone", self.precision_suffix()),
            "time with time zone" => format!("time{} with time zone", self.precision_suffix()),
            "interval" => match self.interval_type.as_deref() {
                Some(fields) => format!("interval {}{}", fields, self.precision_suffix()),
                None => format!("interval{}", self.precision_suffix()),
            },
            "USER-DEFINED" => quote_ident(&self.udt_name),
            "ARRAY" => {
                let element = self.udt_name.strip_prefix('_').unwrap_or(&self.udt_name);
                format!("{}[]", quote_ident(element))
            }
            other => other.to_string(),
        }
    }

    pub fn into_descriptor(self) -> ColumnDescriptor {
        let identity = match self.is_identity.as_deref() {
            Some("YES") => self
                .identity_generation
                .as_deref()
                .and_then(IdentityGeneration::from_catalog),
            _ => None,
        };
        let generated = match self.is_generated.as_deref() {
            Some("ALWAYS") => self.generation_expression.clone(),
            _ => None,
        };

        ColumnDescriptor {
            declared_type: self.declared_type(),
            kind: ValueKind::from_data_type(&self.data_type),
            nullable: self.is_nullable == "YES",
            name: self.column_name,
            default_value: self.column_default,
            identity,
            generated,
        }
    }
}

/// One row of the constraint query; multi-column keys span several rows
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub constraint_name: String,
    pub constraint_type: String,
    pub check_clause: Option<String>,
    pub column_name: Option<String>,
}

/// Merge constraint rows by name, keeping first-seen order
pub fn merge_constraint_rows(rows: Vec<ConstraintRow>) -> Vec<ConstraintDescriptor> {
    let mut merged: Vec<ConstraintDescriptor> = Vec::new();

    for row in rows {
        let Some(kind) = ConstraintKind::from_catalog(&row.constraint_type) else {
            continue;
        };

        let index = match merged.iter().position(|c| c.name == row.constraint_name) {
            Some(index) => index,
            None => {
                merged.push(ConstraintDescriptor {
                    name: row.constraint_name,
                    kind,
                    columns: Vec::new(),
                    check_clause: row.check_clause,
                });
                merged.len() - 1
            }
        };

        if let Some(column) = row.column_name {
            let constraint = &mut merged[index];
            if !constraint.columns.contains(&column) {
                constraint.columns.push(column);
            }
        }
    }

    merged
}

/// One row of the foreign key query, a single column pair
#[derive(Debug, Clone)]
pub struct ForeignKeyRow {
    pub constraint_name: String,
    pub foreign_table_name: String,
    pub column_name: String,
    pub foreign_column_name: String,
    pub update_rule: String,
    pub delete_rule: String,
}

/// Merge foreign key rows by constraint name; column pairs stay positionally aligned
pub fn merge_foreign_key_rows(table: &str, rows: Vec<ForeignKeyRow>) -> Vec<ForeignKeyDescriptor> {
    let mut merged: Vec<ForeignKeyDescriptor> = Vec::new();

    for row in rows {
        match merged.iter_mut().find(|fk| fk.name == row.constraint_name) {
            Some(fk) => {
                fk.columns.push(row.column_name);
                fk.referenced_columns.push(row.foreign_column_name);
            }
            None => merged.push(ForeignKeyDescriptor {
                name: row.constraint_name,
                table: table.to_string(),
                referenced_table: row.foreign_table_name,
                columns: vec![row.column_name],
                referenced_columns: vec![row.foreign_column_name],
                on_update: row.update_rule,
                on_delete: row.delete_rule,
            }),
        }
    }

    merged
}

/// Bookkeeping tables (migration tooling and the like) are never snapshotted
pub fn is_excluded(table: &str, excluded_prefixes: &[String]) -> bool {
    excluded_prefixes
        .iter()
        .any(|prefix| !prefix.is_empty() && table.starts_with(prefix.as_str()))
}

/// Schema introspector for PostgreSQL
pub struct PostgresIntrospector;

impl PostgresIntrospector {
    /// Introspect tables, sequences and enum types of the configured schema
    pub async fn introspect(
        client: &Client,
        config: &SnapshotConfig,
    ) -> Result<SchemaCatalog, AppError> {
        let schema = config.schema.as_str();
        let names = Self::list_tables(client, config).await?;

        let mut catalog = SchemaCatalog::default();

        for name in names {
            let table = Self::describe_table(client, schema, &name, &mut catalog.failures).await;
            catalog.tables.push(table);
        }

        match Self::get_sequences(client, schema).await {
            Ok(sequences) => catalog.sequences = sequences,
            Err(e) => record_failure(&mut catalog.failures, schema, MetadataKind::Sequences, &e),
        }

        match Self::get_enum_types(client, schema).await {
            Ok(enum_types) => catalog.enum_types = enum_types,
            Err(e) => record_failure(&mut catalog.failures, schema, MetadataKind::EnumTypes, &e),
        }

        debug!(
            "Introspected schema '{}' with {} tables, {} sequences, {} enum types ({} failures)",
            schema,
            catalog.tables.len(),
            catalog.sequences.len(),
            catalog.enum_types.len(),
            catalog.failures.len()
        );

        Ok(catalog)
    }

    /// Application tables of the schema, bookkeeping tables excluded
    pub async fn list_tables(
        client: &Client,
        config: &SnapshotConfig,
    ) -> Result<Vec<String>, AppError> {
        let rows = client.query(LIST_TABLES, &[&config.schema]).await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<_, String>("table_name"))
            .filter(|name| !is_excluded(name, &config.excluded_table_prefixes))
            .collect())
    }

    async fn describe_table(
        client: &Client,
        schema: &str,
        name: &str,
        failures: &mut Vec<IntrospectionFailure>,
    ) -> TableDescriptor {
        let mut table = TableDescriptor::new(name);

        match Self::get_columns(client, schema, name).await {
            Ok(columns) => table.columns = columns,
            Err(e) => {
                record_failure(failures, name, MetadataKind::Columns, &e);
                table.degraded.push(MetadataKind::Columns);
            }
        }

        match Self::get_constraints(client, schema, name).await {
            Ok(constraints) => table.constraints = constraints,
            Err(e) => {
                record_failure(failures, name, MetadataKind::Constraints, &e);
                table.degraded.push(MetadataKind::Constraints);
            }
        }

        match Self::get_foreign_keys(client, schema, name).await {
            Ok(foreign_keys) => table.foreign_keys = foreign_keys,
            Err(e) => {
                record_failure(failures, name, MetadataKind::ForeignKeys, &e);
                table.degraded.push(MetadataKind::ForeignKeys);
            }
        }

        match Self::get_indexes(client, schema, name).await {
            Ok(indexes) => table.indexes = indexes,
            Err(e) => {
                record_failure(failures, name, MetadataKind::Indexes, &e);
                table.degraded.push(MetadataKind::Indexes);
            }
        }

        table
    }

    async fn get_columns(
        client: &Client,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ColumnDescriptor>, tokio_postgres::Error> {
        let rows = client.query(GET_COLUMNS, &[&schema, &table]).await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogColumn {
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    udt_name: row.try_get("udt_name")?,
                    column_default: row.try_get("column_default")?,
                    is_nullable: row.try_get("is_nullable")?,
                    character_maximum_length: row.try_get("character_maximum_length")?,
                    numeric_precision: row.try_get("numeric_precision")?,
                    numeric_scale: row.try_get("numeric_scale")?,
                    datetime_precision: row.try_get("datetime_precision")?,
                    interval_type: row.try_get("interval_type")?,
                    is_identity: row.try_get("is_identity")?,
                    identity_generation: row.try_get("identity_generation")?,
                    is_generated: row.try_get("is_generated")?,
                    generation_expression: row.try_get("generation_expression")?,
                }
                .into_descriptor())
            })
            .collect()
    }

    async fn get_constraints(
        client: &Client,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ConstraintDescriptor>, tokio_postgres::Error> {
        let rows = client.query(GET_CONSTRAINTS, &[&schema, &table]).await?;

        let rows = rows
            .iter()
            .map(|row| {
                Ok(ConstraintRow {
                    constraint_name: row.try_get("constraint_name")?,
                    constraint_type: row.try_get("constraint_type")?,
                    check_clause: row.try_get("check_clause")?,
                    column_name: row.try_get("column_name")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        Ok(merge_constraint_rows(rows))
    }

    async fn get_foreign_keys(
        client: &Client,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ForeignKeyDescriptor>, tokio_postgres::Error> {
        let rows = client.query(GET_FOREIGN_KEYS, &[&schema, &table]).await?;

        let rows = rows
            .iter()
            .map(|row| {
                Ok(ForeignKeyRow {
                    constraint_name: row.try_get("constraint_name")?,
                    foreign_table_name: row.try_get("foreign_table_name")?,
                    column_name: row.try_get("column_name")?,
                    foreign_column_name: row.try_get("foreign_column_name")?,
                    update_rule: row.try_get("update_rule")?,
                    delete_rule: row.try_get("delete_rule")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()?;

        Ok(merge_foreign_key_rows(table, rows))
    }

    async fn get_indexes(
        client: &Client,
        schema: &str,
        table: &str,
    ) -> Result<Vec<IndexDescriptor>, tokio_postgres::Error> {
        let rows = client.query(GET_INDEXES, &[&schema, &table]).await?;

        rows.iter()
            .map(|row| {
                Ok(IndexDescriptor {
                    name: row.try_get("indexname")?,
                    definition: row.try_get("indexdef")?,
                })
            })
            .collect()
    }

    async fn get_sequences(
        client: &Client,
        schema: &str,
    ) -> Result<Vec<SequenceDescriptor>, tokio_postgres::Error> {
        let rows = client.query(GET_SEQUENCES, &[&schema]).await?;

        let mut sequences: Vec<SequenceDescriptor> = Vec::new();
        for row in &rows {
            let name: String = row.try_get("sequence_name")?;
            let table: Option<String> = row.try_get("table_name")?;
            let column: Option<String> = row.try_get("column_name")?;
            let identity: bool = row.try_get("is_identity")?;

            // A sequence has at most one owning column; keep the first row
            if sequences.iter().any(|s| s.name == name) {
                continue;
            }

            let owner = match (table, column) {
                (Some(table), Some(column)) => Some(SequenceOwner { table, column }),
                _ => None,
            };
            sequences.push(SequenceDescriptor {
                name,
                owner,
                identity,
            });
        }

        Ok(sequences)
    }

    async fn get_enum_types(
        client: &Client,
        schema: &str,
    ) -> Result<Vec<EnumTypeDescriptor>, tokio_postgres::Error> {
        let rows = client.query(GET_ENUM_TYPES, &[&schema]).await?;

        rows.iter()
            .map(|row| {
                Ok(EnumTypeDescriptor {
                    name: row.try_get("type_name")?,
                    labels: row.try_get("labels")?,
                })
            })
            .collect()
    }
}

fn record_failure(
    failures: &mut Vec<IntrospectionFailure>,
    object: &str,
    kind: MetadataKind,
    error: &tokio_postgres::Error,
) {
    let failure = IntrospectionFailure {
        object: object.to_string(),
        kind,
        message: error.to_string(),
    };
    warn!("⚠️  {}", failure);
    failures.push(failure);
}
