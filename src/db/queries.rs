//! SQL query constants
//!
//! Catalog queries used by introspection and maintenance. Every query takes
//! the schema name as `$1`; per-table queries take the table name as `$2`.

/// List base tables of a schema
pub const LIST_TABLES: &str = r#"
    SELECT table_name
    FROM information_schema.tables
    WHERE table_schema = $1::text
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

/// List base tables with their total on-disk size, largest first
pub const LIST_TABLES_WITH_SIZE: &str = r#"
    SELECT
        t.table_name,
        pg_size_pretty(pg_total_relation_size(format('%I.%I', t.table_schema, t.table_name)::regclass)) AS total_size,
        pg_total_relation_size(format('%I.%I', t.table_schema, t.table_name)::regclass) AS total_bytes
    FROM information_schema.tables t
    WHERE t.table_schema = $1::text
      AND t.table_type = 'BASE TABLE'
    ORDER BY total_bytes DESC, t.table_name
"#;

/// Columns of one table in ordinal order
pub const GET_COLUMNS: &str = r#"
    SELECT
        column_name::text AS column_name,
        data_type::text AS data_type,
        udt_name::text AS udt_name,
        column_default::text AS column_default,
        is_nullable::text AS is_nullable,
        character_maximum_length::int4 AS character_maximum_length,
        numeric_precision::int4 AS numeric_precision,
        numeric_scale::int4 AS numeric_scale,
        datetime_precision::int4 AS datetime_precision,
        interval_type::text AS interval_type,
        is_identity::text AS is_identity,
        identity_generation::text AS identity_generation,
        is_generated::text AS is_generated,
        generation_expression::text AS generation_expression
    FROM information_schema.columns
    WHERE table_schema = $1::text AND table_name = $2::text
    ORDER BY ordinal_position
"#;

/// PRIMARY KEY, UNIQUE and CHECK constraints of one table, one row per key
/// column. Scoped by relation, so names shared with other tables never mix.
pub const GET_CONSTRAINTS: &str = r#"
    SELECT
        c.conname::text AS constraint_name,
        CASE c.contype
            WHEN 'p' THEN 'PRIMARY KEY'
            WHEN 'u' THEN 'UNIQUE'
            ELSE 'CHECK'
        END AS constraint_type,
        CASE WHEN c.contype = 'c' THEN pg_get_expr(c.conbin, c.conrelid) END AS check_clause,
        a.attname::text AS column_name
    FROM pg_constraint AS c
    LEFT JOIN LATERAL unnest(c.conkey) WITH ORDINALITY AS k(attnum, ord)
        ON c.contype IN ('p', 'u')
    LEFT JOIN pg_attribute AS a
        ON a.attrelid = c.conrelid
        AND a.attnum = k.attnum
    WHERE c.conrelid = format('%I.%I', $1::text, $2::text)::regclass
        AND c.contype IN ('p', 'u', 'c')
    ORDER BY c.conname, k.ord
"#;

/// Outbound foreign keys of one table, one row per column pair in key order.
/// Scoped by relation, so names shared with other tables never mix.
pub const GET_FOREIGN_KEYS: &str = r#"
    SELECT
        c.conname::text AS constraint_name,
        ft.relname::text AS foreign_table_name,
        a.attname::text AS column_name,
        fa.attname::text AS foreign_column_name,
        CASE c.confupdtype
            WHEN 'r' THEN 'RESTRICT'
            WHEN 'c' THEN 'CASCADE'
            WHEN 'n' THEN 'SET NULL'
            WHEN 'd' THEN 'SET DEFAULT'
            ELSE 'NO ACTION'
        END AS update_rule,
        CASE c.confdeltype
            WHEN 'r' THEN 'RESTRICT'
            WHEN 'c' THEN 'CASCADE'
            WHEN 'n' THEN 'SET NULL'
            WHEN 'd' THEN 'SET DEFAULT'
            ELSE 'NO ACTION'
        END AS delete_rule
    FROM pg_constraint AS c
    JOIN pg_class AS ft ON ft.oid = c.confrelid
    CROSS JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(attnum, fattnum, ord)
    JOIN pg_attribute AS a
        ON a.attrelid = c.conrelid
        AND a.attnum = k.attnum
    JOIN pg_attribute AS fa
        ON fa.attrelid = c.confrelid
        AND fa.attnum = k.fattnum
    WHERE c.contype = 'f'
        AND c.conrelid = format('%I.%I', $1::text, $2::text)::regclass
    ORDER BY c.conname, k.ord
"#;

/// Secondary indexes of one table, skipping those backing a PRIMARY KEY or UNIQUE constraint
pub const GET_INDEXES: &str = r#"
    SELECT
        indexname,
        indexdef
    FROM pg_indexes
    WHERE schemaname = $1::text
        AND tablename = $2::text
        AND indexname NOT IN (
            SELECT constraint_name
            FROM information_schema.table_constraints
            WHERE table_schema = $1::text
                AND table_name = $2::text
                AND constraint_type IN ('PRIMARY KEY', 'UNIQUE')
        )
    ORDER BY indexname
"#;

/// Sequences of a schema with their owning column, if any. `is_identity`
/// marks sequences backing an identity column.
pub const GET_SEQUENCES: &str = r#"
    SELECT
        s.relname::text AS sequence_name,
        t.relname::text AS table_name,
        a.attname::text AS column_name,
        COALESCE(d.deptype = 'i', false) AS is_identity
    FROM pg_class s
    JOIN pg_namespace n ON n.oid = s.relnamespace
    LEFT JOIN pg_depend d
        ON d.objid = s.oid
        AND d.classid = 'pg_class'::regclass
        AND d.refclassid = 'pg_class'::regclass
        AND d.deptype IN ('a', 'i')
    LEFT JOIN pg_class t ON t.oid = d.refobjid
    LEFT JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = d.refobjsubid
    WHERE s.relkind = 'S'
        AND n.nspname = $1::text
    ORDER BY s.relname
"#;

/// Enumerated types of a schema with their labels in sort order
pub const GET_ENUM_TYPES: &str = r#"
    SELECT
        t.typname AS type_name,
        COALESCE(array_agg(e.enumlabel::text ORDER BY e.enumsortorder), ARRAY[]::text[]) AS labels
    FROM pg_type t
    JOIN pg_namespace n ON n.oid = t.typnamespace
    JOIN pg_enum e ON e.enumtypid = t.oid
    WHERE n.nspname = $1::text
    GROUP BY t.typname
    ORDER BY t.typname
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_table_queries_are_scoped_by_relation() {
        // Constraint names are only unique per table; joining on name alone
        // merges same-named keys and checks of different tables.
        for query in [GET_CONSTRAINTS, GET_FOREIGN_KEYS] {
            assert!(query.contains("c.conrelid = format('%I.%I', $1::text, $2::text)::regclass"));
            assert!(!query.contains("information_schema"));
        }
        assert!(GET_FOREIGN_KEYS.contains("unnest(c.conkey, c.confkey) WITH ORDINALITY"));
        assert!(GET_CONSTRAINTS.contains("pg_get_expr(c.conbin, c.conrelid)"));
    }

    #[test]
    fn test_identity_sequences_are_listed() {
        assert!(GET_SEQUENCES.contains("d.deptype IN ('a', 'i')"));
        assert!(GET_COLUMNS.contains("identity_generation"));
        assert!(GET_COLUMNS.contains("generation_expression"));
    }
}
