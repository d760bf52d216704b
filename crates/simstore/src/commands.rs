//! Subcommand implementations

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use color_eyre::eyre::WrapErr;
use simstore_core::{
    ArrangeOptions, LoadOptions, LoadReport, ParameterSelection, RunAlignment, Selection, csv,
    list_experiments, load,
};

use crate::config::Config;

/// Which experiment to open
#[derive(Args, Debug, Clone, Default)]
pub struct ExperimentArgs {
    /// Experiment name (default: most recently modified experiment)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Experiment id (default: highest id for the name)
    #[arg(short, long)]
    pub id: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ArrangeArgs {
    #[command(flatten)]
    pub experiment: ExperimentArgs,

    /// Variables to include: `all` or a comma separated list
    #[arg(long)]
    pub variables: Option<Selection>,

    /// Measures to include: `all` or a comma separated list
    #[arg(long)]
    pub measures: Option<Selection>,

    /// Parameters to attach: `all`, `varied`, `fixed` or a comma separated list
    #[arg(long)]
    pub parameters: Option<ParameterSelection>,

    /// Object types whose variables are included
    #[arg(long, default_value = "all")]
    pub obj_types: Selection,

    /// Scenarios to keep
    #[arg(long, default_value = "all")]
    pub scenarios: Selection,

    /// Keep the index levels in front instead of flattening them
    #[arg(long)]
    pub index: bool,

    /// How multi-run parameters are matched to rows
    #[arg(long, value_enum, default_value_t = Alignment::ForwardFill)]
    pub alignment: Alignment,

    /// Write the table to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Exact,
    #[default]
    ForwardFill,
}

impl From<Alignment> for RunAlignment {
    fn from(alignment: Alignment) -> Self {
        match alignment {
            Alignment::Exact => RunAlignment::Exact,
            Alignment::ForwardFill => RunAlignment::ForwardFill,
        }
    }
}

impl ArrangeArgs {
    pub fn options(&self) -> ArrangeOptions {
        ArrangeOptions {
            variables: self.variables.clone(),
            measures: self.measures.clone(),
            parameters: self.parameters.clone(),
            obj_types: self.obj_types.clone(),
            scenarios: self.scenarios.clone(),
            index: self.index,
            alignment: self.alignment.into(),
        }
    }
}

/// Print every experiment under the output path
pub fn list<W: Write>(config: &Config, mut out: W) -> color_eyre::Result<()> {
    let experiments = list_experiments(&config.output_path)
        .wrap_err_with(|| format!("Failed to list {}", config.output_path.display()))?;

    if experiments.is_empty() {
        writeln!(out, "No experiments in {}", config.output_path.display())?;
        return Ok(());
    }

    writeln!(out, "{:<30} {:>5} {:>6}  {}", "NAME", "ID", "FILES", "MODIFIED")?;
    for experiment in experiments {
        let files = fs::read_dir(&experiment.path).map_or(0, |entries| entries.count());
        let modified = experiment
            .modified
            .and_then(|time| jiff::Timestamp::try_from(time).ok())
            .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:<30} {:>5} {:>6}  {}",
            experiment.name, experiment.id, files, modified
        )?;
    }
    Ok(())
}

/// Load an experiment and print its summary and any skipped files
pub fn inspect<W: Write>(
    config: &Config,
    experiment: &ExperimentArgs,
    mut out: W,
) -> color_eyre::Result<()> {
    let report = open(config, experiment)?;

    writeln!(out, "{}", report.path.display())?;
    writeln!(out, "{}", report.store)?;
    if !report.warnings.is_empty() {
        writeln!(out, "\nSkipped {} file(s):", report.warnings.len())?;
        for warning in &report.warnings {
            writeln!(out, "  {}: {}", warning.file, warning.error)?;
        }
    }
    Ok(())
}

/// Load an experiment, arrange it and write the table as CSV
pub fn arrange<W: Write>(config: &Config, args: &ArrangeArgs, out: W) -> color_eyre::Result<()> {
    let report = open(config, &args.experiment)?;
    let table = report
        .store
        .arrange(&args.options())
        .wrap_err_with(|| format!("Failed to arrange {}", report.path.display()))?;

    let Some(table) = table else {
        tracing::warn!(path = %report.path.display(), "Nothing to arrange for this selection");
        return Ok(());
    };

    match &args.output {
        Some(path) => write_output(path, |w| csv::write_table(&table, w))?,
        None => csv::write_table(&table, out)?,
    }
    tracing::info!(rows = table.n_rows(), columns = table.n_columns(), "Arranged table written");
    Ok(())
}

fn open(config: &Config, experiment: &ExperimentArgs) -> color_eyre::Result<LoadReport> {
    let options = LoadOptions {
        exp_name: experiment.name.clone(),
        exp_id: experiment.id,
        path: config.output_path.clone(),
        display: config.display,
    };
    load(&options).wrap_err("Failed to load experiment")
}

fn write_output(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> color_eyre::Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use simstore_core::store::{LOG, MEASURES, PARAMETERS};
    use simstore_core::{ResultStore, SaveOptions, Table, Value};
    use tempfile::{TempDir, tempdir};

    use super::*;

    fn saved_experiment() -> (TempDir, Config) {
        let dir = tempdir().unwrap();
        let measures = Table::from_columns(vec![
            ("run_id", vec![Value::Int(0), Value::Int(1)]),
            ("final", vec![Value::Int(3), Value::Int(4)]),
        ])
        .unwrap()
        .with_index(&["run_id"])
        .unwrap();
        ResultStore::new()
            .with(LOG, json!({"name": "demo"}))
            .with(PARAMETERS, json!({"x": 1}))
            .with(MEASURES, measures)
            .save(&SaveOptions::new(dir.path()).display(false))
            .unwrap();

        let config = Config {
            output_path: dir.path().to_path_buf(),
            display: false,
            ..Config::default()
        };
        (dir, config)
    }

    #[test]
    fn test_list() {
        let (_dir, config) = saved_experiment();
        let mut out = Vec::new();
        list(&config, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("demo"));
        assert!(row.split_whitespace().any(|field| field == "3"));
    }

    #[test]
    fn test_list_empty() {
        let dir = tempdir().unwrap();
        let config = Config {
            output_path: dir.path().join("nothing"),
            ..Config::default()
        };
        let mut out = Vec::new();
        list(&config, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("No experiments"));
    }

    #[test]
    fn test_inspect() {
        let (_dir, config) = saved_experiment();
        let mut out = Vec::new();
        inspect(&config, &ExperimentArgs::default(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Table with 1 variable and 2 rows"));
        assert!(!text.contains("Skipped"));
    }

    #[test]
    fn test_arrange_to_stdout_and_file() {
        let (dir, config) = saved_experiment();
        let args = ArrangeArgs {
            measures: Some(Selection::All),
            parameters: Some(ParameterSelection::All),
            ..ArrangeArgs::default()
        };

        let mut out = Vec::new();
        arrange(&config, &args, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "run_id,final,x\n0,3,1\n1,4,1\n"
        );

        let path = dir.path().join("arranged.csv");
        let args = ArrangeArgs {
            output: Some(path.clone()),
            ..args
        };
        let mut out = Vec::new();
        arrange(&config, &args, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "run_id,final,x\n0,3,1\n1,4,1\n"
        );
    }

    #[test]
    fn test_arrange_missing_experiment() {
        let (_dir, config) = saved_experiment();
        let args = ArrangeArgs {
            experiment: ExperimentArgs {
                name: Some("other".to_string()),
                id: None,
            },
            ..ArrangeArgs::default()
        };
        assert!(arrange(&config, &args, io::sink()).is_err());
    }
}
