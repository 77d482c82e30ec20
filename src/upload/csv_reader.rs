// tabletransfer/src/upload/csv_reader.rs
use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;

use crate::errors::Result;
use crate::table::{Column, ColumnType, Table, Value};

/// Field contents read as missing values.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];
const TRUE_VALUES: &[&str] = &["True", "TRUE", "true"];
const FALSE_VALUES: &[&str] = &["False", "FALSE", "false"];

fn is_na(field: &str) -> bool {
    NA_VALUES.contains(&field.trim())
}

fn parse_bool(field: &str) -> Option<bool> {
    let field = field.trim();
    if TRUE_VALUES.contains(&field) {
        Some(true)
    } else if FALSE_VALUES.contains(&field) {
        Some(false)
    } else {
        None
    }
}

/// Narrowest type that fits one non-missing field.
fn classify(field: &str) -> ColumnType {
    let trimmed = field.trim();
    if trimmed.parse::<i64>().is_ok() {
        ColumnType::Integer
    } else if trimmed.parse::<f64>().is_ok() {
        ColumnType::Float
    } else if parse_bool(trimmed).is_some() {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

/// Widens the type seen so far to also hold `next`.
fn widen(current: Option<ColumnType>, next: ColumnType) -> ColumnType {
    use ColumnType::*;
    match (current, next) {
        (None, t) => t,
        (Some(a), b) if a == b => a,
        (Some(Integer), Float) | (Some(Float), Integer) => Float,
        _ => Text,
    }
}

/// Makes header names unique the way spreadsheet tools do: `a`, `a.1`, `a.2`.
fn dedupe_headers(raw: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(raw.len());
    for (index, name) in raw.iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {}", index)
        } else {
            name.to_string()
        };
        let mut candidate = base.clone();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}.{}", base, count);
        }
        seen.insert(candidate.clone(), 0);
        names.push(candidate);
    }
    names
}

/// Parses a comma-separated file with a header row into a typed table.
pub fn read_csv_table(path: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = dedupe_headers(reader.headers()?);

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?);
    }

    let mut inferred: Vec<Option<ColumnType>> = vec![None; headers.len()];
    for record in &records {
        for (slot, field) in inferred.iter_mut().zip(record.iter()) {
            if !is_na(field) {
                *slot = Some(widen(*slot, classify(field)));
            }
        }
    }

    let columns = headers
        .into_iter()
        .zip(&inferred)
        // all-missing columns are numeric NaN columns
        .map(|(name, t)| Column::new(name, t.unwrap_or(ColumnType::Float)))
        .collect::<Vec<_>>();
    let types: Vec<ColumnType> = columns.iter().map(|c| c.column_type).collect();
    let mut table = Table::new(columns);

    for record in &records {
        let row = types
            .iter()
            .zip(record.iter())
            .map(|(column_type, field)| convert_field(*column_type, field))
            .collect();
        table.push_row(row)?;
    }

    tracing::debug!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "parsed csv"
    );
    Ok(table)
}

fn convert_field(column_type: ColumnType, field: &str) -> Value {
    if is_na(field) {
        return Value::Null;
    }
    let trimmed = field.trim();
    match column_type {
        ColumnType::Integer => trimmed.parse().map_or(Value::Null, Value::Int),
        ColumnType::Float => trimmed.parse().map_or(Value::Null, Value::Float),
        ColumnType::Boolean => parse_bool(trimmed).map_or(Value::Null, Value::Bool),
        _ => Value::Text(field.to_string()),
    }
}
