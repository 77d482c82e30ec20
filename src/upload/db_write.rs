// tabletransfer/src/upload/db_write.rs
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, QueryBuilder};

use crate::errors::{Result, TransferError};
use crate::table::{ColumnType, Table, Value};
use crate::upload::verification::verify_upload;
use crate::utils::identifier::{MAX_IDENTIFIER_BYTES, quote_identifier, quote_name};

/// PostgreSQL caps a statement at this many bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

pub fn create_table_sql(table_name: &str, table: &Table) -> String {
    let columns = table
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_name(&c.name), c.column_type.to_postgres()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_identifier(table_name), columns)
}

/// Rejects names the server would silently truncate, before anything is dropped.
pub fn validate_names(table_name: &str, table: &Table) -> Result<()> {
    let too_long = |key: &str, value: &str| TransferError::InvalidIdentifier {
        key: key.to_string(),
        value: value.to_string(),
    };
    if table_name.split('.').any(|part| part.len() > MAX_IDENTIFIER_BYTES) {
        return Err(too_long("table", table_name));
    }
    match table.columns().iter().find(|c| c.name.len() > MAX_IDENTIFIER_BYTES) {
        Some(column) => Err(too_long("column", &column.name)),
        None => Ok(()),
    }
}

pub fn rows_per_insert(num_columns: usize) -> usize {
    (MAX_BIND_PARAMS / num_columns.max(1)).max(1)
}

/// Replaces `table_name` with the contents and schema of `table`.
///
/// Drop, create, insert and the shape check run in one transaction, so a
/// failure leaves the previous table in place.
pub async fn replace_table(conn: &mut PgConnection, table_name: &str, table: &Table) -> Result<u64> {
    validate_names(table_name, table)?;
    let write_error = |source: sqlx::Error| TransferError::Write {
        table: table_name.to_string(),
        source,
    };
    let quoted = quote_identifier(table_name);

    let mut tx = conn.begin().await.map_err(write_error)?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted))
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

    let create_sql = create_table_sql(table_name, table);
    tracing::debug!(sql = %create_sql, "creating destination table");
    sqlx::query(&create_sql)
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;

    let mut inserted = 0u64;
    if table.num_columns() > 0 {
        let column_list = table
            .columns()
            .iter()
            .map(|c| quote_name(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let types: Vec<ColumnType> = table.columns().iter().map(|c| c.column_type).collect();

        for chunk in table.rows().chunks(rows_per_insert(table.num_columns())) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", quoted, column_list));
            builder.push_values(chunk, |mut tuple, row| {
                for (column_type, value) in types.iter().zip(row) {
                    match (value, column_type) {
                        (Value::Null, ColumnType::Boolean) => tuple.push_bind(None::<bool>),
                        (Value::Null, ColumnType::Integer) => tuple.push_bind(None::<i64>),
                        (Value::Null, ColumnType::Float) => tuple.push_bind(None::<f64>),
                        (Value::Null, ColumnType::Text) => tuple.push_bind(None::<String>),
                        (Value::Null, other) => tuple
                            .push_bind(None::<String>)
                            .push_unseparated(format!("::{}", other.to_postgres())),
                        (Value::Bool(b), _) => tuple.push_bind(*b),
                        (Value::Int(i), _) => tuple.push_bind(*i),
                        (Value::Float(x), _) => tuple.push_bind(*x),
                        (Value::Text(s), ColumnType::Text) => tuple.push_bind(s.clone()),
                        (Value::Text(s), other) => tuple
                            .push_bind(s.clone())
                            .push_unseparated(format!("::{}", other.to_postgres())),
                    };
                }
            });
            let result = builder.build().execute(&mut *tx).await.map_err(write_error)?;
            inserted += result.rows_affected();
        }
    }

    verify_upload(&mut *tx, table_name, table).await?;
    tx.commit().await.map_err(write_error)?;
    Ok(inserted)
}
