// tabletransfer/src/utils/identifier.rs
use regex::Regex;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::sync::OnceLock;

use crate::errors::{Result, TransferError};

fn sql_identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // optional schema qualifier, unquoted identifiers only
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$")
            .expect("static identifier regex")
    })
}

fn warehouse_identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // project ids may be domain scoped (example.com:project) and contain dashes
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.:$-]*$").expect("static identifier regex")
    })
}

/// Rejects anything that is not a plain (optionally schema-qualified) PostgreSQL identifier.
pub fn validate_sql_identifier(key: &str, value: &str) -> Result<()> {
    if sql_identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(TransferError::InvalidIdentifier {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

pub fn validate_warehouse_identifier(key: &str, value: &str) -> Result<()> {
    if warehouse_identifier_pattern().is_match(value) {
        Ok(())
    } else {
        Err(TransferError::InvalidIdentifier {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// PostgreSQL truncates identifiers longer than this many bytes.
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Quotes a single name (a column, say) as one identifier, dots included.
pub fn quote_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a table identifier for DDL, keeping an optional `schema.` prefix as a separate part.
pub fn quote_identifier(name: &str) -> String {
    name.split('.').map(quote_name).collect::<Vec<_>>().join(".")
}

/// Confirms a rendered query is exactly one read-only SELECT before it reaches the server.
pub fn ensure_single_select(sql: &str) -> Result<()> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| TransferError::Query(format!("could not parse {:?}: {}", sql, e)))?;

    match statements.as_slice() {
        [Statement::Query(query)] if matches!(*query.body, SetExpr::Select(_)) => Ok(()),
        [_] => Err(TransferError::Query(format!("not a SELECT statement: {:?}", sql))),
        _ => Err(TransferError::Query(format!(
            "expected exactly one statement, found {} in {:?}",
            statements.len(),
            sql
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_identifiers() {
        for ok in ["t", "dest", "_tmp1", "public.orders", "sales$2024"] {
            assert!(validate_sql_identifier("table", ok).is_ok(), "{ok}");
        }
        for bad in ["", "1abc", "a b", "t;drop table x", "a.b.c", "\"quoted\"", "t--"] {
            assert!(validate_sql_identifier("table", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_warehouse_identifiers() {
        for ok in ["p", "my-project-123", "example.com:proj", "dataset_1"] {
            assert!(validate_warehouse_identifier("project_id", ok).is_ok(), "{ok}");
        }
        for bad in ["", "a b", "t]; SELECT", "x`y"] {
            assert!(validate_warehouse_identifier("project_id", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("dest"), "\"dest\"");
        assert_eq!(quote_identifier("public.dest"), "\"public\".\"dest\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_name("unit.price"), "\"unit.price\"");
    }

    #[test]
    fn test_ensure_single_select() {
        assert!(ensure_single_select("SELECT * FROM t").is_ok());
        assert!(ensure_single_select("SELECT * FROM public.t").is_ok());
        assert!(ensure_single_select("DELETE FROM t").is_err());
        assert!(ensure_single_select("SELECT * FROM t; DROP TABLE t").is_err());
    }
}
