//! Statement and literal rendering
//!
//! Turns descriptors into PostgreSQL DDL and row values into SQL literals.

pub mod ddl;
pub mod literal;

use thiserror::Error;

/// Rendering one table failed; the table is skipped and counted as failed
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("column metadata for table {0} could not be loaded")]
    MissingColumns(String),

    #[error("failed to read rows of table {table}: {source}")]
    Fetch {
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("failed to decode column {column} of table {table}: {source}")]
    Decode {
        table: String,
        column: String,
        #[source]
        source: tokio_postgres::Error,
    },
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma separated list of quoted identifiers
pub fn quote_ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("Order Items"), "\"Order Items\"");
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn test_quote_ident_list() {
        let cols = vec!["order_id".to_string(), "line_no".to_string()];
        assert_eq!(quote_ident_list(&cols), "\"order_id\", \"line_no\"");
        assert_eq!(quote_ident_list(&[]), "");
    }
}
