//! Arranging a result store into one flat table for analysis
//!
//! Variables (per time step), measures (per run) and parameters (per run)
//! are combined into a single table:
//! 1. variables of the selected object types are merged
//! 2. measures are stacked with the variables on their shared index
//! 3. parameters are attached as columns, matched by `run_id`
//! 4. rows outside the selected scenarios are dropped
//! 5. the index is flattened into columns unless asked to keep it

use rustc_hash::FxHashMap;

use crate::combine::{RUN_ID, SCENARIO, combine_parameters, combine_variables};
use crate::error::{Result, StoreError};
use crate::selection::{ParameterSelection, RunAlignment, Selection};
use crate::store::{PARAMETERS, ResultStore};
use crate::table::Table;
use crate::value::Value;

/// What [`ResultStore::arrange`] should include
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrangeOptions {
    /// Variables to include (`None` leaves variables out)
    pub variables: Option<Selection>,
    /// Measures to include (`None` leaves measures out)
    pub measures: Option<Selection>,
    /// Parameters to attach (`None` leaves parameters out)
    pub parameters: Option<ParameterSelection>,
    /// Object types whose variables are included
    pub obj_types: Selection,
    /// Scenarios to keep, if the data has a `scenario` level
    pub scenarios: Selection,
    /// Keep the multi-level index instead of flattening it into columns
    pub index: bool,
    /// How multi-run parameters are matched to rows
    pub alignment: RunAlignment,
}

impl ArrangeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variables(mut self, selection: Selection) -> Self {
        self.variables = Some(selection);
        self
    }

    pub fn measures(mut self, selection: Selection) -> Self {
        self.measures = Some(selection);
        self
    }

    pub fn parameters(mut self, selection: ParameterSelection) -> Self {
        self.parameters = Some(selection);
        self
    }

    pub fn obj_types(mut self, selection: Selection) -> Self {
        self.obj_types = selection;
        self
    }

    pub fn scenarios(mut self, selection: Selection) -> Self {
        self.scenarios = selection;
        self
    }

    pub fn keep_index(mut self, index: bool) -> Self {
        self.index = index;
        self
    }

    pub fn alignment(mut self, alignment: RunAlignment) -> Self {
        self.alignment = alignment;
        self
    }
}

impl ResultStore {
    /// Combine and filter the store's tables into one table.
    ///
    /// Returns `Ok(None)` when nothing was selected or none of the selected
    /// entries exist; an empty selection never produces an empty table.
    pub fn arrange(&self, options: &ArrangeOptions) -> Result<Option<Table>> {
        let variables = match &options.variables {
            Some(selection) => combine_variables(self, &options.obj_types, selection)?,
            None => None,
        };

        let measures = match (&options.measures, self.measures()?) {
            (Some(Selection::All), Some(table)) => Some(table.clone()),
            (Some(Selection::Only(names)), Some(table)) => Some(table.select_columns(names)?),
            _ => None,
        };

        let parameters = match &options.parameters {
            Some(selection) => {
                let table = combine_parameters(
                    self,
                    selection.includes_varied(),
                    selection.includes_fixed(),
                )?;
                match (table, selection.names()) {
                    (Some(table), Some(names)) => Some(table.select_columns(names)?),
                    (table, _) => table,
                }
            }
            None => None,
        };

        let combined = match (variables, measures) {
            (Some(variables), Some(measures)) => {
                let levels: Vec<String> = variables
                    .index_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let stacked =
                    Table::concat_rows(&[measures.reset_index(), variables.reset_index()]);
                Some(stacked.set_index(&levels)?)
            }
            (variables, measures) => variables.or(measures),
        };

        let table = match (combined, parameters) {
            (None, None) => return Ok(None),
            (Some(table), None) | (None, Some(table)) => table,
            (Some(table), Some(parameters)) => {
                attach_parameters(table, &parameters, options.alignment)?
            }
        };

        let table = filter_scenarios(table, &options.scenarios);

        tracing::debug!(
            rows = table.n_rows(),
            columns = table.n_columns(),
            levels = table.index().len(),
            "Arranged result store"
        );

        Ok(Some(if options.index {
            table
        } else {
            table.reset_index()
        }))
    }

    /// Variables together with the varied parameters.
    ///
    /// `filters.variables` picks the columns (all when unset); the object
    /// type, scenario, index and alignment settings pass through. Measures
    /// and the parameter selection of `filters` are ignored.
    pub fn arrange_variables(&self, filters: &ArrangeOptions) -> Result<Option<Table>> {
        self.arrange(&ArrangeOptions {
            variables: Some(filters.variables.clone().unwrap_or_default()),
            measures: None,
            parameters: Some(ParameterSelection::Varied),
            ..filters.clone()
        })
    }

    /// Measures together with the varied parameters.
    ///
    /// Mirror of [`arrange_variables`](Self::arrange_variables) with
    /// `filters.measures` picking the columns.
    pub fn arrange_measures(&self, filters: &ArrangeOptions) -> Result<Option<Table>> {
        self.arrange(&ArrangeOptions {
            variables: None,
            measures: Some(filters.measures.clone().unwrap_or_default()),
            parameters: Some(ParameterSelection::Varied),
            ..filters.clone()
        })
    }
}

/// Add parameter columns to `table`. A single-row parameter table is
/// broadcast; otherwise rows are matched on `run_id`.
fn attach_parameters(
    mut table: Table,
    parameters: &Table,
    alignment: RunAlignment,
) -> Result<Table> {
    if parameters.n_rows() == 1 {
        for column in parameters.columns() {
            let value = column.values.first().cloned().unwrap_or_default();
            table.set_constant(&column.name, value);
        }
        return Ok(table);
    }

    let Some(run_ids) = table.level_or_column(RUN_ID) else {
        return Err(StoreError::shape(
            PARAMETERS,
            format!(
                "{} runs of parameters but the data has no '{RUN_ID}' to align them on",
                parameters.n_rows()
            ),
        ));
    };

    let lookup = RunLookup::new(parameters, alignment);
    let rows: Vec<Option<usize>> = run_ids.iter().map(|id| lookup.row(id)).collect();

    for column in parameters.columns() {
        let values = rows
            .iter()
            .map(|row| {
                row.and_then(|r| column.values.get(r).cloned())
                    .unwrap_or_default()
            })
            .collect();
        table.set_column(&column.name, values)?;
    }
    Ok(table)
}

/// Maps a run id to its row in the parameter table
struct RunLookup {
    rows: FxHashMap<i64, usize>,
    /// Known run ids in ascending order, for forward filling
    sorted: Vec<i64>,
    alignment: RunAlignment,
}

impl RunLookup {
    fn new(parameters: &Table, alignment: RunAlignment) -> Self {
        let rows: FxHashMap<i64, usize> = match parameters.index_level(RUN_ID) {
            Some(ids) => ids
                .iter()
                .enumerate()
                .filter_map(|(row, id)| id.as_i64().map(|id| (id, row)))
                .collect(),
            None => (0..parameters.n_rows())
                .map(|row| (row as i64, row))
                .collect(),
        };
        let mut sorted: Vec<i64> = rows.keys().copied().collect();
        sorted.sort_unstable();
        Self {
            rows,
            sorted,
            alignment,
        }
    }

    fn row(&self, run_id: &Value) -> Option<usize> {
        let id = run_id.as_i64()?;
        if let Some(&row) = self.rows.get(&id) {
            return Some(row);
        }
        match self.alignment {
            RunAlignment::Exact => None,
            RunAlignment::ForwardFill => {
                let preceding = self.sorted.partition_point(|&known| known <= id);
                let known = self.sorted.get(preceding.checked_sub(1)?)?;
                self.rows.get(known).copied()
            }
        }
    }
}

fn filter_scenarios(table: Table, scenarios: &Selection) -> Table {
    let Some(names) = scenarios.names() else {
        return table;
    };
    let Some(levels) = table.index_level(SCENARIO) else {
        return table;
    };
    let keep: Vec<bool> = levels
        .iter()
        .map(|scenario| names.contains(&scenario.label()))
        .collect();
    table.filter_rows(|row| keep.get(row).copied().unwrap_or(false))
}
