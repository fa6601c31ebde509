//! Row values and their SQL literal encoding
//!
//! Each column is fetched according to its `ValueKind`: numeric kinds come
//! back as numbers and render bare, temporal kinds render as quoted ISO-8601
//! (or `'infinity'` / `'-infinity'`), and everything else is cast to text and
//! rendered as a quoted string. Doubling the single quote is the only escape
//! applied.

use super::quote_ident;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::error::Error;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

/// How a column's values are fetched and encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    Numeric,
    Date,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    #[default]
    Text,
}

/// A date or timestamp that may hold one of PostgreSQL's infinities.
/// Those are stored as the extreme integer of the binary encoding, which
/// chrono cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal<T> {
    Finite(T),
    Infinity,
    NegInfinity,
}

impl<T> Temporal<T> {
    fn into_value(self, finite: impl FnOnce(T) -> SqlValue) -> SqlValue {
        match self {
            Self::Finite(value) => finite(value),
            Self::Infinity => SqlValue::Text("infinity".to_string()),
            Self::NegInfinity => SqlValue::Text("-infinity".to_string()),
        }
    }
}

impl<'a, T: FromSql<'a>> FromSql<'a> for Temporal<T> {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        match raw {
            // i32::MAX (date) or i64::MAX (timestamp)
            [0x7f, 0xff, 0xff, 0xff] | [0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff] => {
                Ok(Self::Infinity)
            }
            // i32::MIN or i64::MIN
            [0x80, 0, 0, 0] | [0x80, 0, 0, 0, 0, 0, 0, 0] => Ok(Self::NegInfinity),
            _ => T::from_sql(ty, raw).map(Self::Finite),
        }
    }

    fn accepts(ty: &Type) -> bool {
        T::accepts(ty)
    }
}

impl ValueKind {
    /// Classify an `information_schema.columns.data_type`
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type {
            "boolean" => Self::Bool,
            "smallint" | "integer" | "bigint" => Self::Integer,
            "real" | "double precision" => Self::Float,
            "numeric" => Self::Numeric,
            "date" => Self::Date,
            "timestamp without time zone" => Self::Timestamp,
            "timestamp with time zone" => Self::TimestampTz,
            "uuid" => Self::Uuid,
            "json" | "jsonb" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Select-list expression fetching the column in the shape `decode` expects
    pub fn select_expr(&self, column: &str) -> String {
        let column = quote_ident(column);
        match self {
            Self::Integer => format!("{}::int8", column),
            Self::Float => format!("{}::float8", column),
            Self::Numeric | Self::Text => format!("{}::text", column),
            _ => column,
        }
    }

    /// Read column `idx` of a row fetched with `select_expr`
    pub fn decode(&self, row: &Row, idx: usize) -> Result<SqlValue, tokio_postgres::Error> {
        let value = match self {
            Self::Bool => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
            Self::Integer => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int),
            Self::Float => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Float),
            Self::Numeric => row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Numeric),
            Self::Date => row
                .try_get::<_, Option<Temporal<NaiveDate>>>(idx)?
                .map(|t| t.into_value(SqlValue::Date)),
            Self::Timestamp => row
                .try_get::<_, Option<Temporal<NaiveDateTime>>>(idx)?
                .map(|t| t.into_value(SqlValue::Timestamp)),
            Self::TimestampTz => row
                .try_get::<_, Option<Temporal<DateTime<Utc>>>>(idx)?
                .map(|t| t.into_value(SqlValue::TimestampTz)),
            Self::Uuid => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(SqlValue::Uuid),
            Self::Json => row
                .try_get::<_, Option<serde_json::Value>>(idx)?
                .map(SqlValue::Json),
            Self::Text => row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text),
        };

        Ok(value.unwrap_or(SqlValue::Null))
    }
}

/// One fetched cell
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary precision number kept as its text form
    Numeric(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Text(String),
}

/// Quote a string literal, doubling embedded single quotes
pub fn quote_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Encode a value as a SQL literal
pub fn render_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(true) => "TRUE".to_string(),
        SqlValue::Bool(false) => "FALSE".to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) if f.is_nan() => quote_text("NaN"),
        SqlValue::Float(f) if f.is_infinite() => {
            quote_text(if *f > 0.0 { "Infinity" } else { "-Infinity" })
        }
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Numeric(n) => match n.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => n.clone(),
            _ => quote_text(n),
        },
        SqlValue::Date(d) => quote_text(&d.format("%Y-%m-%d").to_string()),
        SqlValue::Timestamp(ts) => quote_text(&ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        SqlValue::TimestampTz(ts) => quote_text(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        SqlValue::Uuid(u) => quote_text(&u.hyphenated().to_string()),
        SqlValue::Json(j) => quote_text(&j.to_string()),
        SqlValue::Text(s) => quote_text(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_and_booleans() {
        assert_eq!(render_literal(&SqlValue::Null), "NULL");
        assert_eq!(render_literal(&SqlValue::Bool(true)), "TRUE");
        assert_eq!(render_literal(&SqlValue::Bool(false)), "FALSE");
    }

    #[test]
    fn test_numbers_are_not_quoted() {
        assert_eq!(render_literal(&SqlValue::Int(-42)), "-42");
        assert_eq!(render_literal(&SqlValue::Float(1.5)), "1.5");
        assert_eq!(render_literal(&SqlValue::Numeric("1234.50".to_string())), "1234.50");
    }

    #[test]
    fn test_non_finite_numbers_are_quoted() {
        assert_eq!(render_literal(&SqlValue::Float(f64::NAN)), "'NaN'");
        assert_eq!(render_literal(&SqlValue::Float(f64::INFINITY)), "'Infinity'");
        assert_eq!(render_literal(&SqlValue::Float(f64::NEG_INFINITY)), "'-Infinity'");
        assert_eq!(render_literal(&SqlValue::Numeric("NaN".to_string())), "'NaN'");
    }

    #[test]
    fn test_apostrophes_are_doubled() {
        assert_eq!(render_literal(&SqlValue::Text("O'Brien".to_string())), "'O''Brien'");
        assert_eq!(render_literal(&SqlValue::Text("''".to_string())), "''''''");
    }

    #[test]
    fn test_no_other_characters_are_escaped() {
        let value = SqlValue::Text("back\\slash\nnew line \"quoted\"".to_string());
        assert_eq!(render_literal(&value), "'back\\slash\nnew line \"quoted\"'");
    }

    #[test]
    fn test_temporal_values_are_quoted_iso_8601() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(render_literal(&SqlValue::Date(date)), "'2024-02-29'");

        let ts = date.and_hms_milli_opt(13, 5, 9, 250).unwrap();
        assert_eq!(
            render_literal(&SqlValue::Timestamp(ts)),
            "'2024-02-29T13:05:09.250'"
        );

        let whole = date.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            render_literal(&SqlValue::Timestamp(whole)),
            "'2024-02-29T00:00:00'"
        );

        let tz = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            render_literal(&SqlValue::TimestampTz(tz)),
            "'2023-12-31T23:59:59Z'"
        );
    }

    #[test]
    fn test_infinite_temporals_decode_and_render() {
        let date = Temporal::<NaiveDate>::from_sql(&Type::DATE, &i32::MAX.to_be_bytes()).unwrap();
        assert_eq!(date, Temporal::Infinity);
        assert_eq!(render_literal(&date.into_value(SqlValue::Date)), "'infinity'");

        let ts =
            Temporal::<NaiveDateTime>::from_sql(&Type::TIMESTAMP, &i64::MIN.to_be_bytes()).unwrap();
        assert_eq!(ts, Temporal::NegInfinity);
        assert_eq!(
            render_literal(&ts.into_value(SqlValue::Timestamp)),
            "'-infinity'"
        );

        let tz = Temporal::<DateTime<Utc>>::from_sql(&Type::TIMESTAMPTZ, &i64::MAX.to_be_bytes())
            .unwrap();
        assert_eq!(tz, Temporal::Infinity);
    }

    #[test]
    fn test_finite_temporals_decode_through_chrono() {
        // The binary epoch is 2000-01-01
        let date = Temporal::<NaiveDate>::from_sql(&Type::DATE, &0i32.to_be_bytes()).unwrap();
        assert_eq!(
            date,
            Temporal::Finite(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
        );

        let one_day = 86_400_000_000i64;
        let ts =
            Temporal::<NaiveDateTime>::from_sql(&Type::TIMESTAMP, &one_day.to_be_bytes()).unwrap();
        assert_eq!(
            render_literal(&ts.into_value(SqlValue::Timestamp)),
            "'2000-01-02T00:00:00'"
        );
    }

    #[test]
    fn test_uuid_and_json() {
        let id = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            render_literal(&SqlValue::Uuid(id)),
            "'67e55044-10b1-426f-9247-bb680e5fe0c8'"
        );

        let doc = serde_json::json!({"name": "O'Hara"});
        assert_eq!(render_literal(&SqlValue::Json(doc)), "'{\"name\":\"O''Hara\"}'");
    }

    #[test]
    fn test_value_kind_from_data_type() {
        assert_eq!(ValueKind::from_data_type("boolean"), ValueKind::Bool);
        assert_eq!(ValueKind::from_data_type("bigint"), ValueKind::Integer);
        assert_eq!(ValueKind::from_data_type("double precision"), ValueKind::Float);
        assert_eq!(ValueKind::from_data_type("numeric"), ValueKind::Numeric);
        assert_eq!(
            ValueKind::from_data_type("timestamp with time zone"),
            ValueKind::TimestampTz
        );
        assert_eq!(ValueKind::from_data_type("jsonb"), ValueKind::Json);
        assert_eq!(ValueKind::from_data_type("USER-DEFINED"), ValueKind::Text);
        assert_eq!(ValueKind::from_data_type("bytea"), ValueKind::Text);
    }

    #[test]
    fn test_select_expr_casts() {
        assert_eq!(ValueKind::Integer.select_expr("id"), "\"id\"::int8");
        assert_eq!(ValueKind::Float.select_expr("score"), "\"score\"::float8");
        assert_eq!(ValueKind::Numeric.select_expr("price"), "\"price\"::text");
        assert_eq!(ValueKind::Text.select_expr("mood"), "\"mood\"::text");
        assert_eq!(ValueKind::Date.select_expr("born_on"), "\"born_on\"");
    }
}
