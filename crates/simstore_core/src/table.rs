//! Minimal columnar table with a named, multi-level row index
//!
//! Tables only offer what reshaping recorded output needs: construction,
//! lookup, column selection, moving columns in and out of the index,
//! stacking rows and filtering/replicating rows. Index levels are ordered
//! and carry one value per row just like data columns.

use crate::error::{Result, StoreError};
use crate::value::Value;

/// Index level names recognised when reading a table back from disk,
/// in the order they are restored.
pub const INDEX_LEVELS: [&str; 7] = [
    "sample_id",
    "run_id",
    "scenario",
    "env_key",
    "agent_id",
    "obj_id",
    "t",
];

/// A named column of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Two-dimensional table. A table without index levels is positionally
/// indexed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index: Vec<Column>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a positionally indexed table from `(name, values)` pairs.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Result<Self> {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, values)| Column::new(name, values))
            .collect();
        let n_rows = columns.first().map_or(0, |c| c.values.len());
        check_lengths(&columns, n_rows)?;
        Ok(Self {
            index: Vec::new(),
            columns,
            n_rows,
        })
    }

    /// Build a table with an explicit number of rows and no columns.
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            index: Vec::new(),
            columns: Vec::new(),
            n_rows,
        }
    }

    /// Move the named columns into the index (see [`Table::set_index`]).
    pub fn with_index<S: AsRef<str>>(self, levels: &[S]) -> Result<Self> {
        self.set_index(levels)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// True if the table has no rows or no data columns
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn index(&self) -> &[Column] {
        &self.index
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.index.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn index_level(&self, name: &str) -> Option<&[Value]> {
        self.index
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_index_level(&self, name: &str) -> bool {
        self.index.iter().any(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look a name up among index levels first, then data columns.
    pub fn level_or_column(&self, name: &str) -> Option<&[Value]> {
        self.index_level(name).or_else(|| self.column(name))
    }

    /// Index values followed by column values of one row
    pub fn row_values(&self, row: usize) -> Vec<&Value> {
        self.index
            .iter()
            .chain(self.columns.iter())
            .filter_map(|c| c.values.get(row))
            .collect()
    }

    /// Keep only the named data columns, in the requested order.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let column = self
                .columns
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| self.missing(name))?;
            columns.push(column.clone());
        }
        Ok(Table {
            index: self.index.clone(),
            columns,
            n_rows: self.n_rows,
        })
    }

    /// Replace the index with the named columns. Levels of the current
    /// index are turned back into columns first so nothing is dropped.
    pub fn set_index<S: AsRef<str>>(self, levels: &[S]) -> Result<Table> {
        let mut table = self.reset_index();
        let mut index = Vec::with_capacity(levels.len());
        for level in levels {
            let level = level.as_ref();
            let pos = table
                .columns
                .iter()
                .position(|c| c.name == level)
                .ok_or_else(|| table.missing(level))?;
            index.push(table.columns.remove(pos));
        }
        table.index = index;
        Ok(table)
    }

    /// Move every index level into leading data columns.
    pub fn reset_index(mut self) -> Table {
        let mut columns = std::mem::take(&mut self.index);
        columns.append(&mut self.columns);
        self.columns = columns;
        self
    }

    /// Insert an index level holding `value` on every row at `position`
    /// (clamped to the number of levels).
    pub fn insert_index_level(mut self, position: usize, name: &str, value: Value) -> Table {
        let position = position.min(self.index.len());
        let level = Column::new(name, vec![value; self.n_rows]);
        self.index.insert(position, level);
        self
    }

    /// Drop the current index and number rows `0..n` under `name`.
    pub fn with_sequence_index(mut self, name: &str) -> Table {
        let values = (0..self.n_rows).map(Value::from).collect();
        self.index = vec![Column::new(name, values)];
        self
    }

    /// Add or overwrite a data column.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.n_rows {
            return Err(StoreError::shape(
                name,
                format!("column has {} rows, table has {}", values.len(), self.n_rows),
            ));
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
        Ok(())
    }

    /// Add or overwrite a column holding the same value on every row.
    pub fn set_constant(&mut self, name: &str, value: Value) {
        let values = vec![value; self.n_rows];
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column::new(name, values)),
        }
    }

    /// Stack tables vertically. Index levels and columns are the ordered
    /// union over all inputs; cells a table does not have are `Null`.
    pub fn concat_rows(tables: &[Table]) -> Table {
        let index_names = union_names(tables.iter().map(|t| &t.index));
        let column_names = union_names(tables.iter().map(|t| &t.columns));
        let n_rows = tables.iter().map(|t| t.n_rows).sum();

        let stack = |names: &[String], pick: fn(&Table) -> &[Column]| -> Vec<Column> {
            names
                .iter()
                .map(|name| {
                    let mut values = Vec::with_capacity(n_rows);
                    for table in tables {
                        match pick(table).iter().find(|c| &c.name == name) {
                            Some(column) => values.extend(column.values.iter().cloned()),
                            None => values.extend(std::iter::repeat_n(Value::Null, table.n_rows)),
                        }
                    }
                    Column::new(name.clone(), values)
                })
                .collect()
        };

        Table {
            index: stack(&index_names, |t| t.index.as_slice()),
            columns: stack(&column_names, |t| t.columns.as_slice()),
            n_rows,
        }
    }

    /// Keep the rows at the given positions, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> Table {
        let take = |columns: &[Column]| -> Vec<Column> {
            columns
                .iter()
                .map(|c| {
                    let values = rows
                        .iter()
                        .map(|&r| c.values.get(r).cloned().unwrap_or_default())
                        .collect();
                    Column::new(c.name.clone(), values)
                })
                .collect()
        };
        Table {
            index: take(&self.index),
            columns: take(&self.columns),
            n_rows: rows.len(),
        }
    }

    /// Keep the rows for which `keep` returns true.
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Table {
        let rows: Vec<usize> = (0..self.n_rows).filter(|&r| keep(r)).collect();
        self.take_rows(&rows)
    }

    /// Repeat every row `times` times in place: `a, b` becomes `a, a, b, b`.
    pub fn repeat_rows(&self, times: usize) -> Table {
        let rows: Vec<usize> = (0..self.n_rows)
            .flat_map(|r| std::iter::repeat_n(r, times))
            .collect();
        self.take_rows(&rows)
    }

    fn missing(&self, name: &str) -> StoreError {
        StoreError::MissingColumn {
            column: name.to_string(),
            available: self.columns.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

fn check_lengths(columns: &[Column], n_rows: usize) -> Result<()> {
    match columns.iter().find(|c| c.values.len() != n_rows) {
        Some(column) => Err(StoreError::shape(
            &column.name,
            format!("column has {} rows, expected {n_rows}", column.values.len()),
        )),
        None => Ok(()),
    }
}

fn union_names<'a>(groups: impl Iterator<Item = &'a Vec<Column>>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for group in groups {
        for column in group {
            if !names.contains(&column.name) {
                names.push(column.name.clone());
            }
        }
    }
    names
}
