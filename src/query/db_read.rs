// tabletransfer/src/query/db_read.rs
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column as _, Decode, Executor, Postgres, Row, Statement, Type, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::errors::{Result, TransferError};
use crate::table::{Column, ColumnType, Table, Value};
use crate::utils::identifier::quote_name;

/// Maps a PostgreSQL type name to the table column type it is read as.
pub fn column_type_for(pg_type: &str) -> ColumnType {
    match pg_type {
        "BOOL" => ColumnType::Boolean,
        "INT2" | "INT4" | "INT8" => ColumnType::Integer,
        "FLOAT4" | "FLOAT8" => ColumnType::Float,
        "NUMERIC" => ColumnType::Numeric,
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "TIME" => ColumnType::Text,
        "DATE" => ColumnType::Date,
        "TIMESTAMP" => ColumnType::Timestamp,
        "TIMESTAMPTZ" => ColumnType::TimestampTz,
        "JSON" | "JSONB" => ColumnType::Json,
        "UUID" => ColumnType::Uuid,
        "BYTEA" => ColumnType::Bytes,
        _ => ColumnType::Other,
    }
}

/// Types read through their server-side text form rather than a binary decoder.
///
/// NUMERIC is included so `NaN`/`Infinity` survive and the declared scale is kept.
pub fn reads_as_text(pg_type: &str) -> bool {
    !matches!(
        pg_type,
        "BOOL"
            | "INT2"
            | "INT4"
            | "INT8"
            | "FLOAT4"
            | "FLOAT8"
            | "TEXT"
            | "VARCHAR"
            | "BPCHAR"
            | "NAME"
            | "DATE"
            | "TIME"
            | "TIMESTAMP"
            | "TIMESTAMPTZ"
            | "UUID"
            | "JSON"
            | "JSONB"
            | "BYTEA"
    )
}

/// Wraps `sql` so every column in `columns` (name, PostgreSQL type) that has no binary
/// decoder comes back as `::text`.
///
/// Returns `None` when no cast is needed, or when duplicate column names make the
/// wrapper ambiguous.
pub fn text_cast_query(sql: &str, columns: &[(String, String)]) -> Option<String> {
    if !columns.iter().any(|(_, pg_type)| reads_as_text(pg_type)) {
        return None;
    }
    let mut seen = HashSet::new();
    if !columns.iter().all(|(name, _)| seen.insert(name.as_str())) {
        tracing::warn!("duplicate column names, reading without text casts");
        return None;
    }

    let select_list = columns
        .iter()
        .map(|(name, pg_type)| {
            let quoted = quote_name(name);
            if reads_as_text(pg_type) {
                format!("{0}::text AS {0}", quoted)
            } else {
                quoted
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("SELECT {} FROM ({}) AS source", select_list, sql))
}

/// Runs `sql` and reads the full result into a table.
///
/// The statement is prepared first so the column list is known even when no rows come back.
pub async fn fetch_table(conn: &mut PgConnection, sql: &str) -> Result<Table> {
    let statement = (&mut *conn)
        .prepare(sql)
        .await
        .map_err(|e| TransferError::Query(e.to_string()))?;

    let described: Vec<(String, String)> = statement
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.type_info().name().to_string()))
        .collect();
    let columns = described
        .iter()
        .map(|(name, pg_type)| Column::new(name.clone(), column_type_for(pg_type)))
        .collect();
    let mut table = Table::new(columns);

    let wrapped = text_cast_query(sql, &described);
    let cast_to_text = wrapped.is_some();
    if let Some(wrapped_sql) = &wrapped {
        tracing::debug!(sql = %wrapped_sql, "reading some columns as text");
    }

    let rows = sqlx::query(wrapped.as_deref().unwrap_or(sql))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| TransferError::Query(e.to_string()))?;

    for row in &rows {
        let values = described
            .iter()
            .enumerate()
            .map(|(index, (_, pg_type))| {
                if cast_to_text && reads_as_text(pg_type) {
                    Ok(get::<String>(row, index)?.map_or(Value::Null, Value::Text))
                } else {
                    decode_cell(row, index, pg_type)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        table.push_row(values)?;
    }

    tracing::debug!(rows = table.num_rows(), columns = table.num_columns(), "fetched table");
    Ok(table)
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(|e| TransferError::Query(format!("failed to decode column {}: {}", index, e)))
}

fn text_of<T: ToString>(value: Option<T>) -> Value {
    value.map_or(Value::Null, |v| Value::Text(v.to_string()))
}

/// Binary decoding, used for every column when the text-cast wrapper could not be built.
fn decode_cell(row: &PgRow, index: usize, pg_type: &str) -> Result<Value> {
    let value = match pg_type {
        "BOOL" => get::<bool>(row, index)?.map_or(Value::Null, Value::Bool),
        "INT2" => get::<i16>(row, index)?.map_or(Value::Null, |v| Value::Int(v.into())),
        "INT4" => get::<i32>(row, index)?.map_or(Value::Null, |v| Value::Int(v.into())),
        "INT8" => get::<i64>(row, index)?.map_or(Value::Null, Value::Int),
        "FLOAT4" => get::<f32>(row, index)?.map_or(Value::Null, |v| Value::Float(v.into())),
        "FLOAT8" => get::<f64>(row, index)?.map_or(Value::Null, Value::Float),
        // BigDecimal has no NaN or infinity
        "NUMERIC" => match row.try_get::<Option<BigDecimal>, _>(index) {
            Ok(v) => text_of(v.map(|d| d.normalized())),
            Err(_) => Value::Float(f64::NAN),
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => get::<String>(row, index)?.map_or(Value::Null, Value::Text),
        "DATE" => text_of(get::<NaiveDate>(row, index)?),
        "TIME" => text_of(get::<NaiveTime>(row, index)?),
        "TIMESTAMP" => text_of(get::<NaiveDateTime>(row, index)?),
        "TIMESTAMPTZ" => text_of(
            get::<DateTime<Utc>>(row, index)?.map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.f%:z")),
        ),
        "UUID" => text_of(get::<Uuid>(row, index)?),
        "JSON" | "JSONB" => text_of(get::<serde_json::Value>(row, index)?),
        "BYTEA" => get::<Vec<u8>>(row, index)?.map_or(Value::Null, |bytes| {
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            Value::Text(format!("\\x{}", hex))
        }),
        // binary wire format of an unknown type is not text
        other => {
            let raw = row
                .try_get_raw(index)
                .map_err(|e| TransferError::Query(format!("failed to read column {}: {}", index, e)))?;
            if raw.is_null() {
                Value::Null
            } else {
                Value::Text(format!("<{}>", other.to_lowercase()))
            }
        }
    };
    Ok(value)
}
