//! Combining the `variables` and `parameters` entries into single tables

use serde_json::{Map, Value as Json};

use crate::error::Result;
use crate::selection::Selection;
use crate::store::{Parameters, ResultStore, Variables};
use crate::table::Table;
use crate::value::Value;

pub const OBJ_TYPE: &str = "obj_type";
pub const OBJ_ID: &str = "obj_id";
pub const RUN_ID: &str = "run_id";
pub const SCENARIO: &str = "scenario";

/// Merge the per-object-type variable tables into one table.
///
/// With several object types each table gets a leading `obj_type` level,
/// and the model's own table gets an `obj_id = 0` level in front of `t` so
/// its index lines up with the agent tables. Returns `None` when the store
/// has no variables or the filters leave nothing.
pub fn combine_variables(
    store: &ResultStore,
    obj_types: &Selection,
    var_keys: &Selection,
) -> Result<Option<Table>> {
    let Some(variables) = store.variables()? else {
        return Ok(None);
    };

    let combined = match variables {
        Variables::Single(table) => table.clone(),
        Variables::ByType(tables) if tables.len() == 1 => {
            match tables.first().and_then(|(_, e)| e.as_table()) {
                Some(table) => table.clone(),
                None => return Ok(None),
            }
        }
        Variables::ByType(tables) => {
            let model_type = store.model_type();
            let mut parts = Vec::with_capacity(tables.len());

            for (obj_type, entry) in tables {
                let Some(table) = entry.as_table() else {
                    continue;
                };
                if let Some(names) = var_keys.names()
                    && !names.iter().any(|n| table.has_column(n))
                {
                    continue;
                }
                if !obj_types.contains(obj_type) {
                    continue;
                }

                let mut table = table.clone();
                if model_type == Some(obj_type.as_str()) && !table.has_index_level(OBJ_ID) {
                    let before_t = table.index().len().saturating_sub(1);
                    table = table.insert_index_level(before_t, OBJ_ID, Value::Int(0));
                }
                parts.push(table.insert_index_level(0, OBJ_TYPE, Value::from(obj_type.as_str())));
            }

            if parts.is_empty() {
                return Ok(None);
            }
            Table::concat_rows(&parts)
        }
    };

    match var_keys.names() {
        Some(names) => combined.select_columns(names).map(Some),
        None => Ok(Some(combined)),
    }
}

/// Build the per-run parameter table.
///
/// Fixed parameters become constant columns. When the log records more
/// than one iteration each run's row is repeated once per iteration, and
/// the result is indexed by a fresh `run_id` sequence.
pub fn combine_parameters(
    store: &ResultStore,
    varied: bool,
    fixed: bool,
) -> Result<Option<Table>> {
    let Some(parameters) = store.parameters()? else {
        return Ok(None);
    };

    let table = match parameters {
        Parameters::Both {
            fixed: fixed_values,
            varied: varied_table,
        } => {
            let mut table = varied_table.filter(|_| varied).cloned();
            if fixed && let Some(values) = fixed_values {
                let table = table.get_or_insert_with(|| Table::with_rows(1));
                add_fixed_columns(table, values);
            }
            table
        }
        Parameters::Fixed(values) if fixed => {
            let mut table = Table::with_rows(1);
            add_fixed_columns(&mut table, values);
            Some(table)
        }
        Parameters::Varied(table) if varied => Some(table.clone()),
        Parameters::Fixed(_) | Parameters::Varied(_) => None,
    };

    let Some(table) = table.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    let iterations = store.iterations();
    let table = if iterations > 1 {
        table.repeat_rows(iterations)
    } else {
        table
    };
    Ok(Some(table.with_sequence_index(RUN_ID)))
}

fn add_fixed_columns(table: &mut Table, values: &Map<String, Json>) {
    for (name, value) in values {
        // Lists and mappings are kept as their JSON text
        let cell = Value::from_json(value).unwrap_or_else(|| Value::Str(value.to_string()));
        table.set_constant(name, cell);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::StoreError;
    use crate::store::{FIXED, LOG, PARAMETERS, VARIABLES, VARIED};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    fn model_table() -> Table {
        Table::from_columns(vec![("t", ints(&[0, 1])), ("pop", ints(&[10, 20]))])
            .unwrap()
            .with_index(&["t"])
            .unwrap()
    }

    fn agent_table() -> Table {
        Table::from_columns(vec![
            ("obj_id", ints(&[1, 2, 1, 2])),
            ("t", ints(&[0, 0, 1, 1])),
            ("wealth", ints(&[3, 4, 5, 6])),
        ])
        .unwrap()
        .with_index(&["obj_id", "t"])
        .unwrap()
    }

    fn two_types() -> ResultStore {
        ResultStore::new()
            .with(LOG, json!({"model_type": "Model", "iterations": 1}))
            .with(
                VARIABLES,
                ResultStore::new()
                    .with("Model", model_table())
                    .with("Agent", agent_table()),
            )
    }

    #[test]
    fn test_no_variables() {
        let store = ResultStore::new();
        assert_eq!(
            combine_variables(&store, &Selection::All, &Selection::All).unwrap(),
            None
        );
    }

    #[test]
    fn test_single_category_unwraps() {
        let store = ResultStore::new().with(
            VARIABLES,
            ResultStore::new().with("Model", model_table()),
        );
        let table = combine_variables(&store, &Selection::All, &Selection::All)
            .unwrap()
            .unwrap();
        assert_eq!(table, model_table());
    }

    #[test]
    fn test_model_type_gets_obj_id() {
        let table = combine_variables(&two_types(), &Selection::All, &Selection::All)
            .unwrap()
            .unwrap();

        assert_eq!(table.index_names(), vec!["obj_type", "obj_id", "t"]);
        assert_eq!(table.n_rows(), 6);
        assert_eq!(
            table.index_level("obj_id").unwrap(),
            ints(&[0, 0, 1, 2, 1, 2]).as_slice()
        );
        assert_eq!(
            table.index_level("obj_type").unwrap()[..3],
            [Value::from("Model"), Value::from("Model"), Value::from("Agent")]
        );
        assert_eq!(
            table.column("pop").unwrap(),
            &[
                Value::Int(10),
                Value::Int(20),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null
            ]
        );
    }

    #[test]
    fn test_stored_tables_are_not_modified() {
        let store = two_types();
        combine_variables(&store, &Selection::All, &Selection::All).unwrap();
        let Some(Variables::ByType(tables)) = store.variables().unwrap() else {
            panic!("expected per-type variables");
        };
        assert_eq!(tables["Model"].as_table().unwrap(), &model_table());
    }

    #[test]
    fn test_variable_filter_drops_unrelated_types() {
        let table = combine_variables(&two_types(), &Selection::All, &Selection::only(["wealth"]))
            .unwrap()
            .unwrap();
        assert_eq!(table.column_names(), vec!["wealth"]);
        assert_eq!(table.n_rows(), 4);
        assert!(
            table
                .index_level("obj_type")
                .unwrap()
                .iter()
                .all(|v| v == &Value::from("Agent"))
        );
    }

    #[test]
    fn test_obj_type_filter_to_nothing() {
        let result =
            combine_variables(&two_types(), &Selection::only(["Nobody"]), &Selection::All).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let err = combine_variables(
            &two_types(),
            &Selection::All,
            &Selection::only(["pop", "missing"]),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { .. }));
    }

    #[test]
    fn test_variables_wrong_shape() {
        let store = ResultStore::new().with(VARIABLES, json!({"a": 1}));
        assert!(matches!(
            combine_variables(&store, &Selection::All, &Selection::All),
            Err(StoreError::Shape { .. })
        ));
    }

    fn varied_table() -> Table {
        Table::from_columns(vec![("n", ints(&[10, 20]))]).unwrap()
    }

    #[test]
    fn test_iterations_repeat_each_run() {
        let store = ResultStore::new()
            .with(LOG, json!({"iterations": 3}))
            .with(PARAMETERS, varied_table());

        let table = combine_parameters(&store, true, true).unwrap().unwrap();
        assert_eq!(table.n_rows(), 6);
        assert_eq!(table.index_names(), vec!["run_id"]);
        assert_eq!(table.index_level("run_id").unwrap(), ints(&[0, 1, 2, 3, 4, 5]).as_slice());
        assert_eq!(
            table.column("n").unwrap(),
            ints(&[10, 10, 10, 20, 20, 20]).as_slice()
        );
    }

    #[test]
    fn test_fixed_mapping() {
        let store = ResultStore::new().with(PARAMETERS, json!({"x": 1, "rate": 0.5}));

        let table = combine_parameters(&store, true, true).unwrap().unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.column_names(), vec!["x", "rate"]);
        assert_eq!(table.column("rate").unwrap(), &[Value::Float(0.5)]);

        assert_eq!(combine_parameters(&store, true, false).unwrap(), None);
    }

    #[test]
    fn test_varied_only_table() {
        let store = ResultStore::new().with(PARAMETERS, varied_table());
        assert_eq!(combine_parameters(&store, false, true).unwrap(), None);
        assert!(combine_parameters(&store, true, false).unwrap().is_some());
    }

    #[test]
    fn test_fixed_and_varied() {
        let store = ResultStore::new().with(
            PARAMETERS,
            ResultStore::new()
                .with(FIXED, json!({"x": 1}))
                .with(VARIED, varied_table()),
        );

        let both = combine_parameters(&store, true, true).unwrap().unwrap();
        assert_eq!(both.column_names(), vec!["n", "x"]);
        assert_eq!(both.column("x").unwrap(), ints(&[1, 1]).as_slice());

        let fixed_only = combine_parameters(&store, false, true).unwrap().unwrap();
        assert_eq!(fixed_only.n_rows(), 1);
        assert_eq!(fixed_only.column_names(), vec!["x"]);

        let varied_only = combine_parameters(&store, true, false).unwrap().unwrap();
        assert_eq!(varied_only.column_names(), vec!["n"]);
    }

    #[test]
    fn test_empty_parameters_are_no_data() {
        let store = ResultStore::new().with(PARAMETERS, json!({}));
        assert_eq!(combine_parameters(&store, true, true).unwrap(), None);
    }

    #[test]
    fn test_parameters_wrong_shape() {
        let store = ResultStore::new().with(PARAMETERS, json!([1, 2, 3]));
        assert!(matches!(
            combine_parameters(&store, true, true),
            Err(StoreError::Shape { .. })
        ));
    }
}
