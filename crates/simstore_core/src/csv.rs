//! Delimited text codec for tables
//!
//! Index levels are written as leading columns. Cells are typed on read by
//! content: empty → `Null`, `True`/`False` → `Bool`, integers → `Int`,
//! other numbers → `Float`, everything else → `Str`. Quoting only protects
//! delimiters, quotes and line breaks, so a string cell that reads like
//! another type (`"12"`, `"True"`, `""`) comes back as that type.

use std::io::{self, Write};

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use crate::error::{Result, StoreError};
use crate::table::{INDEX_LEVELS, Table};
use crate::value::Value;

/// Write `table` (index levels first) as CSV.
pub fn write_table<W: Write>(table: &Table, writer: W) -> io::Result<()> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    let header: Vec<&str> = table
        .index()
        .iter()
        .chain(table.columns())
        .map(|c| c.name.as_str())
        .collect();
    if header.is_empty() {
        return wtr.flush();
    }
    wtr.write_record(&header)?;

    for row in 0..table.n_rows() {
        wtr.write_record(table.row_values(row).into_iter().map(encode_cell))?;
    }
    wtr.flush()
}

/// Parse CSV text into a table, moving recognised index columns into the
/// index.
pub fn read_table(text: &str) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let names: Vec<String> = rdr
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Ok(Table::new());
    }

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    let mut record = StringRecord::new();
    while rdr.read_record(&mut record).map_err(csv_error)? {
        for (column, field) in columns.iter_mut().zip(record.iter()) {
            column.push(infer_value(field));
        }
    }

    let index: Vec<&str> = INDEX_LEVELS
        .iter()
        .copied()
        .filter(|level| names.iter().any(|n| n.as_str() == *level))
        .collect();
    let pairs: Vec<(String, Vec<Value>)> = names.into_iter().zip(columns).collect();
    Table::from_columns(pairs)?.with_index(&index)
}

fn csv_error(error: csv::Error) -> StoreError {
    let line = error
        .position()
        .and_then(|pos| usize::try_from(pos.line()).ok())
        .unwrap_or(0);
    StoreError::Csv {
        line,
        reason: error.to_string(),
    }
}

fn infer_value(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if looks_numeric(text)
        && let Ok(x) = text.parse::<f64>()
    {
        return Value::Float(x);
    }
    Value::Str(text.to_string())
}

// f64::from_str also accepts "infinity" and friends; only take forms we write
fn looks_numeric(text: &str) -> bool {
    let body = text.trim_start_matches(['-', '+']);
    matches!(body, "inf" | "NaN")
        || body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

fn encode_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => format!("{x:?}"),
        Value::Str(s) => s.clone(),
    }
}
