//! DDL and DML statement generator
//!
//! Generates PostgreSQL statements from introspected descriptors.

use super::literal::{quote_text, render_literal, SqlValue};
use super::{quote_ident, quote_ident_list, GenerationError};
use crate::introspection::{
    ColumnDescriptor, ConstraintDescriptor, ConstraintKind, EnumTypeDescriptor,
    ForeignKeyDescriptor, IdentityGeneration, IndexDescriptor, MetadataKind, SequenceDescriptor,
    SequenceOwner, TableDescriptor,
};

/// Statement that disables trigger-based constraint checking for the session
pub const DISABLE_CONSTRAINTS: &str = "-- Disable constraints\nSET session_replication_role = 'replica';";

/// Statement restoring normal constraint checking
pub const ENABLE_CONSTRAINTS: &str = "-- Re-enable constraints\nSET session_replication_role = 'origin';";

pub fn render_column(column: &ColumnDescriptor) -> String {
    let mut def = format!(
        "{} {} {}",
        quote_ident(&column.name),
        column.declared_type,
        if column.nullable { "NULL" } else { "NOT NULL" }
    );
    if let Some(ref default) = column.default_value {
        def.push_str(&format!(" DEFAULT {}", default));
    }
    if let Some(identity) = column.identity {
        def.push_str(&format!(" GENERATED {} AS IDENTITY", identity.as_sql()));
    }
    if let Some(ref expression) = column.generated {
        def.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expression));
    }
    def
}

pub fn render_constraint(constraint: &ConstraintDescriptor) -> String {
    match constraint.kind {
        ConstraintKind::Check => format!(
            "CONSTRAINT {} CHECK ({})",
            quote_ident(&constraint.name),
            constraint.check_clause.as_deref().unwrap_or("true")
        ),
        kind => format!(
            "CONSTRAINT {} {} ({})",
            quote_ident(&constraint.name),
            kind.as_sql(),
            quote_ident_list(&constraint.columns)
        ),
    }
}

/// `CREATE TABLE` with columns then constraints, one per indented line
pub fn render_create_table(table: &TableDescriptor) -> Result<String, GenerationError> {
    if table.degraded.contains(&MetadataKind::Columns) {
        return Err(GenerationError::MissingColumns(table.name.clone()));
    }

    let lines: Vec<String> = table
        .columns
        .iter()
        .map(render_column)
        .chain(table.constraints.iter().map(render_constraint))
        .map(|line| format!("    {}", line))
        .collect();

    Ok(format!(
        "CREATE TABLE {} (\n{}\n);",
        quote_ident(&table.name),
        lines.join(",\n")
    ))
}

pub fn render_enum_type(enum_type: &EnumTypeDescriptor) -> String {
    let labels: Vec<String> = enum_type.labels.iter().map(|l| quote_text(l)).collect();
    format!(
        "CREATE TYPE {} AS ENUM ({});",
        quote_ident(&enum_type.name),
        labels.join(", ")
    )
}

pub fn render_create_sequence(sequence: &SequenceDescriptor) -> String {
    format!("CREATE SEQUENCE IF NOT EXISTS {};", quote_ident(&sequence.name))
}

/// `ALTER SEQUENCE ... OWNED BY ...`, only for owned sequences
pub fn render_sequence_ownership(sequence: &SequenceDescriptor) -> Option<String> {
    sequence.owner.as_ref().map(|owner| {
        format!(
            "ALTER SEQUENCE {} OWNED BY {}.{};",
            quote_ident(&sequence.name),
            quote_ident(&owner.table),
            quote_ident(&owner.column)
        )
    })
}

pub fn render_foreign_key(fk: &ForeignKeyDescriptor) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        quote_ident(&fk.table),
        quote_ident(&fk.name),
        quote_ident_list(&fk.columns),
        quote_ident(&fk.referenced_table),
        quote_ident_list(&fk.referenced_columns)
    );

    if fk.on_delete != "NO ACTION" {
        sql.push_str(&format!(" ON DELETE {}", fk.on_delete));
    }

    if fk.on_update != "NO ACTION" {
        sql.push_str(&format!(" ON UPDATE {}", fk.on_update));
    }

    sql.push(';');
    sql
}

pub fn render_index(index: &IndexDescriptor) -> String {
    format!("{};", index.definition.trim_end_matches(';'))
}

/// `INSERT` blocks for a table, at most `batch_size` rows each. Rows hold
/// the table's insertable columns in order. No rows means no statement.
pub fn render_inserts(
    table: &TableDescriptor,
    rows: &[Vec<SqlValue>],
    batch_size: usize,
) -> Vec<String> {
    let columns = table.insertable_columns();
    let column_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    // Explicit values into a GENERATED ALWAYS identity are rejected otherwise
    let overriding = if columns
        .iter()
        .any(|c| c.identity == Some(IdentityGeneration::Always))
    {
        "\nOVERRIDING SYSTEM VALUE"
    } else {
        ""
    };

    rows.chunks(batch_size.max(1))
        .map(|chunk| {
            let values = chunk
                .iter()
                .map(|row| {
                    let literals: Vec<String> = row.iter().map(render_literal).collect();
                    format!("({})", literals.join(", "))
                })
                .collect::<Vec<_>>()
                .join(",\n");

            format!(
                "-- Dump of table {}\nINSERT INTO {} ({}){}\nVALUES\n{};",
                table.name,
                quote_ident(&table.name),
                column_list,
                overriding,
                values
            )
        })
        .collect()
}

/// Move a sequence to the greater of its column's current maximum and 1
pub fn render_sequence_resync(schema: &str, sequence: &str, owner: &SequenceOwner) -> String {
    let regclass = format!("{}.{}", quote_ident(schema), quote_ident(sequence));
    format!(
        "SELECT setval({}, GREATEST(COALESCE((SELECT MAX({}) FROM {}), 0), 1));",
        quote_text(&regclass),
        quote_ident(&owner.column),
        quote_ident(&owner.table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::literal::ValueKind;
    use pretty_assertions::assert_eq;

    fn col(name: &str, ty: &str, nullable: bool, default: Option<&str>) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            declared_type: ty.to_string(),
            nullable,
            default_value: default.map(String::from),
            kind: ValueKind::from_data_type(ty),
            ..Default::default()
        }
    }

    fn users_table() -> TableDescriptor {
        let mut table = TableDescriptor::new("users");
        table.columns = vec![
            col("id", "integer", false, Some("nextval('users_id_seq'::regclass)")),
            col("email", "varchar(255)", false, None),
            col("age", "integer", true, None),
        ];
        table.constraints = vec![
            ConstraintDescriptor {
                name: "users_pkey".to_string(),
                kind: ConstraintKind::PrimaryKey,
                columns: vec!["id".to_string()],
                check_clause: None,
            },
            ConstraintDescriptor {
                name: "adult".to_string(),
                kind: ConstraintKind::Check,
                columns: vec![],
                check_clause: Some("(age >= 18)".to_string()),
            },
        ];
        table
    }

    #[test]
    fn test_render_create_table() {
        let sql = render_create_table(&users_table()).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\n\
             \x20   \"id\" integer NOT NULL DEFAULT nextval('users_id_seq'::regclass),\n\
             \x20   \"email\" varchar(255) NOT NULL,\n\
             \x20   \"age\" integer NULL,\n\
             \x20   CONSTRAINT \"users_pkey\" PRIMARY KEY (\"id\"),\n\
             \x20   CONSTRAINT \"adult\" CHECK ((age >= 18))\n\
             );"
        );
    }

    #[test]
    fn test_create_table_without_columns_metadata_fails() {
        let mut table = users_table();
        table.columns.clear();
        table.degraded.push(MetadataKind::Columns);

        let err = render_create_table(&table).unwrap_err();
        assert!(matches!(err, GenerationError::MissingColumns(name) if name == "users"));
    }

    #[test]
    fn test_render_enum_keeps_label_order() {
        let mood = EnumTypeDescriptor {
            name: "mood".to_string(),
            labels: vec!["sad".to_string(), "ok".to_string(), "it's great".to_string()],
        };
        assert_eq!(
            render_enum_type(&mood),
            "CREATE TYPE \"mood\" AS ENUM ('sad', 'ok', 'it''s great');"
        );
    }

    #[test]
    fn test_render_sequence_statements() {
        let owned = SequenceDescriptor {
            name: "users_id_seq".to_string(),
            owner: Some(SequenceOwner {
                table: "users".to_string(),
                column: "id".to_string(),
            }),
            identity: false,
        };
        let free = SequenceDescriptor {
            name: "invoice_numbers".to_string(),
            ..Default::default()
        };

        assert_eq!(
            render_create_sequence(&owned),
            "CREATE SEQUENCE IF NOT EXISTS \"users_id_seq\";"
        );
        assert_eq!(
            render_sequence_ownership(&owned).unwrap(),
            "ALTER SEQUENCE \"users_id_seq\" OWNED BY \"users\".\"id\";"
        );
        assert_eq!(render_sequence_ownership(&free), None);
    }

    #[test]
    fn test_render_foreign_key() {
        let fk = ForeignKeyDescriptor {
            name: "orders_user_fk".to_string(),
            table: "orders".to_string(),
            referenced_table: "users".to_string(),
            columns: vec!["user_id".to_string()],
            referenced_columns: vec!["id".to_string()],
            on_update: "NO ACTION".to_string(),
            on_delete: "CASCADE".to_string(),
        };
        assert_eq!(
            render_foreign_key(&fk),
            "ALTER TABLE \"orders\" ADD CONSTRAINT \"orders_user_fk\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON DELETE CASCADE;"
        );
    }

    #[test]
    fn test_render_index_verbatim() {
        let index = IndexDescriptor {
            name: "idx_orders_created".to_string(),
            definition: "CREATE INDEX idx_orders_created ON public.orders USING btree (created_at)"
                .to_string(),
        };
        assert_eq!(
            render_index(&index),
            "CREATE INDEX idx_orders_created ON public.orders USING btree (created_at);"
        );
    }

    #[test]
    fn test_render_inserts() {
        let table = users_table();
        let rows = vec![
            vec![
                SqlValue::Int(1),
                SqlValue::Text("o'brien@example.com".to_string()),
                SqlValue::Null,
            ],
            vec![
                SqlValue::Int(2),
                SqlValue::Text("ann@example.com".to_string()),
                SqlValue::Int(31),
            ],
        ];

        let inserts = render_inserts(&table, &rows, 1000);
        assert_eq!(
            inserts,
            vec![
                "-- Dump of table users\n\
                 INSERT INTO \"users\" (\"id\", \"email\", \"age\")\n\
                 VALUES\n\
                 (1, 'o''brien@example.com', NULL),\n\
                 (2, 'ann@example.com', 31);"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_render_inserts_batches_and_empty() {
        let mut table = TableDescriptor::new("t");
        table.columns = vec![col("id", "integer", false, None)];
        let rows: Vec<Vec<SqlValue>> = (1..=5).map(|i| vec![SqlValue::Int(i)]).collect();

        let inserts = render_inserts(&table, &rows, 2);
        assert_eq!(inserts.len(), 3);
        assert!(inserts[2].ends_with("VALUES\n(5);"));

        assert!(render_inserts(&table, &[], 2).is_empty());
    }

    fn invoice_lines() -> TableDescriptor {
        let mut table = TableDescriptor::new("invoice_lines");
        table.columns = vec![
            ColumnDescriptor {
                identity: Some(IdentityGeneration::Always),
                ..col("id", "integer", false, None)
            },
            col("qty", "integer", false, None),
            ColumnDescriptor {
                generated: Some("(qty * 2)".to_string()),
                ..col("doubled", "integer", true, None)
            },
        ];
        table
    }

    #[test]
    fn test_identity_and_generated_columns_in_ddl() {
        assert_eq!(
            render_create_table(&invoice_lines()).unwrap(),
            "CREATE TABLE \"invoice_lines\" (\n\
             \x20   \"id\" integer NOT NULL GENERATED ALWAYS AS IDENTITY,\n\
             \x20   \"qty\" integer NOT NULL,\n\
             \x20   \"doubled\" integer NULL GENERATED ALWAYS AS ((qty * 2)) STORED\n\
             );"
        );

        let by_default = ColumnDescriptor {
            identity: Some(IdentityGeneration::ByDefault),
            ..col("id", "bigint", false, None)
        };
        assert_eq!(
            render_column(&by_default),
            "\"id\" bigint NOT NULL GENERATED BY DEFAULT AS IDENTITY"
        );
    }

    #[test]
    fn test_inserts_override_identity_and_skip_generated() {
        let rows = vec![vec![SqlValue::Int(1), SqlValue::Int(3)]];
        assert_eq!(
            render_inserts(&invoice_lines(), &rows, 1000),
            vec![
                "-- Dump of table invoice_lines\n\
                 INSERT INTO \"invoice_lines\" (\"id\", \"qty\")\n\
                 OVERRIDING SYSTEM VALUE\n\
                 VALUES\n\
                 (1, 3);"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_render_sequence_resync() {
        let owner = SequenceOwner {
            table: "users".to_string(),
            column: "id".to_string(),
        };
        assert_eq!(
            render_sequence_resync("public", "users_id_seq", &owner),
            "SELECT setval('\"public\".\"users_id_seq\"', GREATEST(COALESCE((SELECT MAX(\"id\") FROM \"users\"), 0), 1));"
        );
    }
}
