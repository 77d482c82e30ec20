use prettytable::{Cell, Row, Table as PrettyTable, format};

use super::{ColumnType, Table, Value};

/// Tables longer than this are shown as head and tail only.
pub const MAX_DISPLAY_ROWS: usize = 60;
const EDGE_ROWS: usize = 5;

/// Renders the table as aligned text with a row index and a `[N rows x M columns]` footer.
pub fn render(table: &Table) -> String {
    let shape = format!("[{} rows x {} columns]", table.num_rows(), table.num_columns());

    if table.is_empty() {
        let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
        return format!("Empty table\nColumns: [{}]\n{}\n", names.join(", "), shape);
    }

    let mut out = PrettyTable::new();
    out.set_format(*format::consts::FORMAT_CLEAN);

    let mut titles = vec![Cell::new("")];
    titles.extend(table.columns().iter().map(|c| Cell::new(&c.name)));
    out.set_titles(Row::new(titles));

    let total = table.num_rows();
    let truncated = total > MAX_DISPLAY_ROWS;
    for (index, row) in table.rows().iter().enumerate() {
        if truncated && index >= EDGE_ROWS && index < total - EDGE_ROWS {
            if index == EDGE_ROWS {
                out.add_row(ellipsis_row(table.num_columns()));
            }
            continue;
        }
        let mut cells = vec![Cell::new(&index.to_string()).style_spec("b")];
        for (column, value) in table.columns().iter().zip(row) {
            cells.push(value_cell(column.column_type, value));
        }
        out.add_row(Row::new(cells));
    }

    format!("{}\n{}\n", out, shape)
}

pub fn print_table(table: &Table) {
    print!("{}", render(table));
}

fn value_cell(column_type: ColumnType, value: &Value) -> Cell {
    let text = if value.is_null() && column_type == ColumnType::Float {
        "NaN".to_string()
    } else {
        value.to_string()
    };
    if column_type.is_numeric() {
        Cell::new(&text).style_spec("r")
    } else {
        Cell::new(&text)
    }
}

fn ellipsis_row(width: usize) -> Row {
    Row::new((0..=width).map(|_| Cell::new("...")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn numbered_table(rows: i64) -> Table {
        let mut table = Table::new(vec![
            Column::new("n", ColumnType::Integer),
            Column::new("score", ColumnType::Float),
        ]);
        for i in 0..rows {
            let score = if i % 2 == 0 { Value::Float(i as f64 / 2.0) } else { Value::Null };
            table.push_row(vec![Value::Int(i * 100), score]).unwrap();
        }
        table
    }

    #[test]
    fn test_render_small_table_shows_every_row() {
        let output = render(&numbered_table(3));
        assert!(output.contains("score"));
        assert!(output.contains("200"));
        assert!(output.contains("NaN"));
        assert!(output.contains("1.0"));
        assert!(!output.contains("..."));
        assert!(output.ends_with("[3 rows x 2 columns]\n"));
    }

    #[test]
    fn test_render_long_table_keeps_head_and_tail() {
        let output = render(&numbered_table(100));
        assert!(output.contains("..."));
        assert!(output.contains("400")); // row 4, last of the head
        assert!(output.contains("9500")); // row 95, first of the tail
        assert!(output.contains("9900"));
        assert!(!output.contains("5000"));
        assert!(output.ends_with("[100 rows x 2 columns]\n"));
    }

    #[test]
    fn test_render_at_threshold_is_not_truncated() {
        let output = render(&numbered_table(MAX_DISPLAY_ROWS as i64));
        assert!(!output.contains("..."));
        assert!(output.contains("3000"));
    }

    #[test]
    fn test_render_empty_table_lists_columns() {
        let output = render(&numbered_table(0));
        assert_eq!(output, "Empty table\nColumns: [n, score]\n[0 rows x 2 columns]\n");
    }
}
