// tabletransfer/src/upload/verification.rs
use sqlx::postgres::PgConnection;

use crate::errors::{Result, TransferError};
use crate::table::Table;
use crate::utils::identifier::quote_identifier;

/// Column names and row count of a table as the server reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredShape {
    pub columns: Vec<String>,
    pub rows: i64,
}

pub async fn stored_shape(conn: &mut PgConnection, table_name: &str) -> Result<StoredShape> {
    let read_error = |source: sqlx::Error| TransferError::Write {
        table: table_name.to_string(),
        source,
    };
    let (schema, name) = match table_name.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table_name),
    };

    let columns: Vec<(String,)> = sqlx::query_as(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2 \
         ORDER BY ordinal_position",
    )
    .bind(schema)
    .bind(name)
    .fetch_all(&mut *conn)
    .await
    .map_err(read_error)?;

    let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name)))
        .fetch_one(&mut *conn)
        .await
        .map_err(read_error)?;

    Ok(StoredShape {
        columns: columns.into_iter().map(|(c,)| c).collect(),
        rows,
    })
}

/// Compares a stored shape with the table that was written to it.
pub fn check_shape(table_name: &str, shape: &StoredShape, table: &Table) -> Result<()> {
    let expected: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
    if shape.columns != expected {
        return Err(TransferError::Verification(format!(
            "table '{}' has columns {:?}, expected {:?}",
            table_name, shape.columns, expected
        )));
    }
    if shape.rows != table.num_rows() as i64 {
        return Err(TransferError::Verification(format!(
            "table '{}' has {} rows, expected {}",
            table_name,
            shape.rows,
            table.num_rows()
        )));
    }
    Ok(())
}

/// Checks the destination has exactly the uploaded columns and row count.
///
/// Runs on the writing transaction, so a mismatch rolls the replacement back.
pub async fn verify_upload(conn: &mut PgConnection, table_name: &str, table: &Table) -> Result<StoredShape> {
    println!("Verifying table '{}'...", table_name);
    let shape = stored_shape(conn, table_name).await?;
    check_shape(table_name, &shape, table)?;
    println!("✓ Table '{}' holds {} rows x {} columns.", table_name, shape.rows, shape.columns.len());
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnType, Value};

    fn uploaded() -> anyhow::Result<Table> {
        let mut table = Table::new(vec![
            Column::new("id", ColumnType::Integer),
            Column::new("label", ColumnType::Text),
        ]);
        table.push_row(vec![Value::Int(1), Value::Text("x".into())])?;
        table.push_row(vec![Value::Int(2), Value::Null])?;
        Ok(table)
    }

    #[test]
    fn test_check_shape_accepts_matching_table() -> anyhow::Result<()> {
        let shape = StoredShape {
            columns: vec!["id".into(), "label".into()],
            rows: 2,
        };
        check_shape("dest", &shape, &uploaded()?)?;
        Ok(())
    }

    #[test]
    fn test_check_shape_rejects_renamed_column() -> anyhow::Result<()> {
        let shape = StoredShape {
            columns: vec!["id".into(), "lab".into()],
            rows: 2,
        };
        let err = check_shape("dest", &shape, &uploaded()?).unwrap_err();
        assert!(matches!(err, TransferError::Verification(_)));
        assert!(err.to_string().contains("\"lab\""));
        Ok(())
    }

    #[test]
    fn test_check_shape_rejects_row_count_mismatch() -> anyhow::Result<()> {
        let shape = StoredShape {
            columns: vec!["id".into(), "label".into()],
            rows: 5,
        };
        let err = check_shape("dest", &shape, &uploaded()?).unwrap_err();
        assert!(err.to_string().contains("5 rows, expected 2"));
        Ok(())
    }
}
