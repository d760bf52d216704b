//! Result store: the nested container holding a run's recorded output
//!
//! A store maps keys to [`Entry`] values. A few keys have a meaning of
//! their own:
//! - `log`: run metadata (`name`, `model_type`, `iterations`, ...)
//! - `parameters`: fixed mapping, varied table, or a nested store with both
//! - `variables`: single table, or a nested store of per-object-type tables
//! - `measures`: table with one row per run
//!
//! The typed views ([`Variables`], [`Parameters`]) classify those entries
//! once and report malformed shapes as [`StoreError::Shape`].

use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use crate::error::{Result, StoreError};
use crate::table::Table;

pub const LOG: &str = "log";
pub const PARAMETERS: &str = "parameters";
pub const VARIABLES: &str = "variables";
pub const MEASURES: &str = "measures";
pub const FIXED: &str = "fixed";
pub const VARIED: &str = "varied";

/// One value held by a [`ResultStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Table(Table),
    Store(ResultStore),
    /// Scalars, lists and mappings
    Json(Json),
}

impl Entry {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Entry::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_store(&self) -> Option<&ResultStore> {
        match self {
            Entry::Store(store) => Some(store),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Entry::Table(_) => "table",
            Entry::Store(_) => "nested store",
            Entry::Json(Json::Object(_)) => "mapping",
            Entry::Json(_) => "value",
        }
    }
}

impl From<Table> for Entry {
    fn from(table: Table) -> Self {
        Entry::Table(table)
    }
}

impl From<ResultStore> for Entry {
    fn from(store: ResultStore) -> Self {
        Entry::Store(store)
    }
}

impl From<Json> for Entry {
    fn from(value: Json) -> Self {
        Entry::Json(value)
    }
}

/// The `variables` entry, classified
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Variables<'a> {
    /// A single table for the whole run
    Single(&'a Table),
    /// One table per object type, in insertion order
    ByType(&'a IndexMap<String, Entry>),
}

/// The `parameters` entry, classified
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parameters<'a> {
    /// One value per parameter, shared by every run
    Fixed(&'a Map<String, Json>),
    /// One row per run
    Varied(&'a Table),
    /// Nested store with `fixed` and/or `varied`
    Both {
        fixed: Option<&'a Map<String, Json>>,
        varied: Option<&'a Table>,
    },
}

/// Ordered mapping from keys to entries
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    entries: IndexMap<String, Entry>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: impl Into<Entry>) -> Option<Entry> {
        self.entries.insert(key.into(), entry.into())
    }

    /// Builder-style [`ResultStore::insert`]
    pub fn with(mut self, key: impl Into<String>, entry: impl Into<Entry>) -> Self {
        self.insert(key, entry);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nested store under `key`, created if missing.
    pub fn store_mut(&mut self, key: &str) -> Result<&mut ResultStore> {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Store(ResultStore::new()));
        match entry {
            Entry::Store(store) => Ok(store),
            other => Err(StoreError::shape(
                key,
                format!("expected a nested store, found a {}", other.kind()),
            )),
        }
    }

    // === Run metadata ===

    pub fn log(&self) -> Option<&Map<String, Json>> {
        match self.entries.get(LOG) {
            Some(Entry::Json(Json::Object(map))) => Some(map),
            _ => None,
        }
    }

    pub fn log_value(&self, key: &str) -> Option<&Json> {
        self.log().and_then(|log| log.get(key))
    }

    /// Experiment name recorded in the log
    pub fn name(&self) -> Option<&str> {
        self.log_value("name").and_then(Json::as_str)
    }

    /// Name of the model-level object type
    pub fn model_type(&self) -> Option<&str> {
        self.log_value("model_type").and_then(Json::as_str)
    }

    /// Iterations per parameter combination (1 if not logged)
    pub fn iterations(&self) -> usize {
        self.log_value("iterations")
            .and_then(Json::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(1)
    }

    // === Typed views ===

    pub fn variables(&self) -> Result<Option<Variables<'_>>> {
        match self.entries.get(VARIABLES) {
            None => Ok(None),
            Some(Entry::Table(table)) => Ok(Some(Variables::Single(table))),
            Some(Entry::Store(store)) => {
                if let Some((key, entry)) = store.iter().find(|(_, e)| e.as_table().is_none()) {
                    return Err(StoreError::shape(
                        &format!("{VARIABLES}.{key}"),
                        format!("expected a table, found a {}", entry.kind()),
                    ));
                }
                Ok(Some(Variables::ByType(&store.entries)))
            }
            Some(other) => Err(StoreError::shape(
                VARIABLES,
                format!("must be a table or a nested store, found a {}", other.kind()),
            )),
        }
    }

    pub fn parameters(&self) -> Result<Option<Parameters<'_>>> {
        match self.entries.get(PARAMETERS) {
            None => Ok(None),
            Some(Entry::Json(Json::Object(map))) => Ok(Some(Parameters::Fixed(map))),
            Some(Entry::Table(table)) => Ok(Some(Parameters::Varied(table))),
            Some(Entry::Store(store)) => {
                let fixed = match store.get(FIXED) {
                    None => None,
                    Some(Entry::Json(Json::Object(map))) => Some(map),
                    Some(other) => {
                        return Err(StoreError::shape(
                            "parameters.fixed",
                            format!("expected a mapping, found a {}", other.kind()),
                        ));
                    }
                };
                let varied = match store.get(VARIED) {
                    None => None,
                    Some(Entry::Table(table)) => Some(table),
                    Some(other) => {
                        return Err(StoreError::shape(
                            "parameters.varied",
                            format!("expected a table, found a {}", other.kind()),
                        ));
                    }
                };
                Ok(Some(Parameters::Both { fixed, varied }))
            }
            Some(other) => Err(StoreError::shape(
                PARAMETERS,
                format!(
                    "must be a mapping, a table or a nested store, found a {}",
                    other.kind()
                ),
            )),
        }
    }

    pub fn measures(&self) -> Result<Option<&Table>> {
        match self.entries.get(MEASURES) {
            None => Ok(None),
            Some(Entry::Table(table)) => Ok(Some(table)),
            Some(other) => Err(StoreError::shape(
                MEASURES,
                format!("must be a table, found a {}", other.kind()),
            )),
        }
    }

    // === Summaries ===

    /// One-line description, e.g. `ResultStore {3 entries}`
    pub fn short_summary(&self) -> String {
        let n = self.len();
        format!("ResultStore {{{n} entr{}}}", if n == 1 { "y" } else { "ies" })
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "    ".repeat(depth);
        for (key, entry) in &self.entries {
            write!(f, "\n{indent}'{key}': ")?;
            match entry {
                Entry::Table(table) => {
                    let (cols, rows) = (table.n_columns(), table.n_rows());
                    write!(
                        f,
                        "Table with {cols} variable{} and {rows} row{}",
                        plural(cols),
                        plural(rows)
                    )?;
                }
                Entry::Store(store) => store.write_summary(f, depth + 1)?,
                Entry::Json(value) => write_json_summary(f, value)?,
            }
        }
        Ok(())
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn write_json_summary(f: &mut fmt::Formatter<'_>, value: &Json) -> fmt::Result {
    match value {
        Json::Null => write!(f, "null"),
        Json::Bool(b) => write!(f, "{b} <bool>"),
        Json::Number(n) if n.is_f64() => write!(f, "{n} <float>"),
        Json::Number(n) => write!(f, "{n} <int>"),
        Json::String(s) => {
            let len = s.chars().count();
            let head: String = s.chars().take(30).collect();
            if len > 20 {
                write!(f, "'{head}...' (length {len}) <str>")
            } else {
                write!(f, "'{head}' <str>")
            }
        }
        Json::Array(items) => {
            let n = items.len();
            write!(f, "List with {n} entr{}", if n == 1 { "y" } else { "ies" })
        }
        Json::Object(map) => write!(f, "Dictionary with {} key{}", map.len(), plural(map.len())),
    }
}

impl fmt::Display for ResultStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultStore {{")?;
        self.write_summary(f, 0)?;
        write!(f, "\n}}")
    }
}

/// Stores are equal when they hold the same keys with equal entries;
/// key order does not matter.
impl PartialEq for ResultStore {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, entry)| other.entries.get(key) == Some(entry))
    }
}

impl<K: Into<String>> FromIterator<(K, Entry)> for ResultStore {
    fn from_iter<I: IntoIterator<Item = (K, Entry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::value::Value;

    fn pop_table() -> Table {
        Table::from_columns(vec![
            ("t", vec![Value::Int(0), Value::Int(1)]),
            ("pop", vec![Value::Int(5), Value::Int(6)]),
        ])
        .unwrap()
        .with_index(&["t"])
        .unwrap()
    }

    #[test]
    fn test_log_accessors() {
        let store = ResultStore::new().with(
            LOG,
            json!({"name": "test", "model_type": "Model", "iterations": 3}),
        );
        assert_eq!(store.name(), Some("test"));
        assert_eq!(store.model_type(), Some("Model"));
        assert_eq!(store.iterations(), 3);
        assert_eq!(ResultStore::new().iterations(), 1);
    }

    #[test]
    fn test_variables_classification() {
        let single = ResultStore::new().with(VARIABLES, pop_table());
        assert!(matches!(single.variables(), Ok(Some(Variables::Single(_)))));

        let nested = ResultStore::new().with(
            VARIABLES,
            ResultStore::new().with("Model", pop_table()),
        );
        assert!(matches!(nested.variables(), Ok(Some(Variables::ByType(m))) if m.len() == 1));

        let bad = ResultStore::new().with(VARIABLES, json!([1, 2]));
        assert!(matches!(bad.variables(), Err(StoreError::Shape { .. })));

        let bad_inner =
            ResultStore::new().with(VARIABLES, ResultStore::new().with("Agent", json!(1)));
        assert!(matches!(bad_inner.variables(), Err(StoreError::Shape { .. })));
    }

    #[test]
    fn test_parameters_classification() {
        let fixed = ResultStore::new().with(PARAMETERS, json!({"x": 1}));
        assert!(matches!(fixed.parameters(), Ok(Some(Parameters::Fixed(_)))));

        let varied = ResultStore::new().with(PARAMETERS, pop_table());
        assert!(matches!(varied.parameters(), Ok(Some(Parameters::Varied(_)))));

        let both = ResultStore::new().with(
            PARAMETERS,
            ResultStore::new().with(FIXED, json!({"x": 1})),
        );
        assert!(matches!(
            both.parameters(),
            Ok(Some(Parameters::Both { fixed: Some(_), varied: None }))
        ));

        let bad = ResultStore::new().with(PARAMETERS, json!("x"));
        assert!(matches!(bad.parameters(), Err(StoreError::Shape { .. })));
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = ResultStore::new()
            .with("a", json!(1))
            .with("b", pop_table());
        let b = ResultStore::new()
            .with("b", pop_table())
            .with("a", json!(1));
        assert_eq!(a, b);

        let c = ResultStore::new().with("a", json!(1));
        assert_ne!(a, c);
        assert_ne!(c, a);
    }

    #[test]
    fn test_store_mut_rejects_non_store() {
        let mut store = ResultStore::new().with(VARIABLES, pop_table());
        assert!(store.store_mut(VARIABLES).is_err());
        assert!(store.store_mut(PARAMETERS).is_ok());
        assert!(matches!(store.get(PARAMETERS), Some(Entry::Store(_))));
    }

    #[test]
    fn test_summary() {
        let store = ResultStore::new()
            .with(LOG, json!({"name": "test", "iterations": 1}))
            .with("seed", json!(42))
            .with(
                VARIABLES,
                ResultStore::new().with("Model", pop_table()),
            );

        let text = store.to_string();
        assert!(text.starts_with("ResultStore {"));
        assert!(text.contains("'log': Dictionary with 2 keys"));
        assert!(text.contains("'seed': 42 <int>"));
        assert!(text.contains("\n    'Model': Table with 1 variable and 2 rows"));
        assert_eq!(store.short_summary(), "ResultStore {3 entries}");
    }
}
