//! Saving result stores to, and loading them from, experiment directories
//!
//! Directory structure:
//! {path}/
//!   {exp_name}_{exp_id}/
//!     log.json                # structured entries
//!     measures.csv            # tables, index levels as leading columns
//!     parameters_fixed.json   # entries of nested stores: {key}_{inner}
//!     variables_Agent.csv
//!
//! Experiment names have spaces replaced by underscores. Ids are positive
//! and a new save takes one more than the highest id already present for
//! the same name.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::csv;
use crate::error::{Result, StoreError};
use crate::store::{Entry, PARAMETERS, ResultStore, VARIABLES};
use crate::table::Table;
use crate::util::io::write_atomic;

/// Base directory used when none is given
pub const DEFAULT_OUTPUT_PATH: &str = "ap_output";

const UNNAMED: &str = "Unnamed";

/// Nested stores restored from `{key}_{inner}` file names
const NESTED_KEYS: [&str; 2] = [VARIABLES, PARAMETERS];

/// Emit a progress event at info level when `display` is set, debug otherwise
macro_rules! progress {
    ($display:expr, $($arg:tt)+) => {
        if $display {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

// ============================================================================
// Options and reports
// ============================================================================

#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Experiment name (default: `log.name`, else `Unnamed`)
    pub exp_name: Option<String>,
    /// Experiment id (default: highest existing id + 1)
    pub exp_id: Option<u32>,
    /// Base directory
    pub path: PathBuf,
    /// Report progress at info level
    pub display: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            exp_name: None,
            exp_id: None,
            path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            display: true,
        }
    }
}

impl SaveOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, exp_name: impl Into<String>) -> Self {
        self.exp_name = Some(exp_name.into());
        self
    }

    pub fn id(mut self, exp_id: u32) -> Self {
        self.exp_id = Some(exp_id);
        self
    }

    pub fn display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Experiment name (default: most recently modified experiment)
    pub exp_name: Option<String>,
    /// Experiment id (default: highest existing id for the name)
    pub exp_id: Option<u32>,
    /// Base directory
    pub path: PathBuf,
    /// Report progress at info level
    pub display: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            exp_name: None,
            exp_id: None,
            path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            display: true,
        }
    }
}

impl LoadOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, exp_name: impl Into<String>) -> Self {
        self.exp_name = Some(exp_name.into());
        self
    }

    pub fn id(mut self, exp_id: u32) -> Self {
        self.exp_id = Some(exp_id);
        self
    }

    pub fn display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}

/// A file that could not be written or read
#[derive(Debug)]
pub struct FileWarning {
    pub file: String,
    pub error: StoreError,
}

#[derive(Debug)]
pub struct SaveReport {
    /// The experiment directory that was created
    pub path: PathBuf,
    /// Files written, in order
    pub written: Vec<String>,
    pub warnings: Vec<FileWarning>,
}

#[derive(Debug)]
pub struct LoadReport {
    pub store: ResultStore,
    /// The experiment directory that was read
    pub path: PathBuf,
    pub warnings: Vec<FileWarning>,
}

// ============================================================================
// File names
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

/// A file name inside an experiment directory, `[{parent}_]{key}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFileName {
    /// Nested store the entry belongs to, if any
    pub parent: Option<String>,
    pub key: String,
    pub format: FileFormat,
}

impl EntryFileName {
    pub fn new(parent: Option<&str>, key: &str, format: FileFormat) -> Self {
        Self {
            parent: parent.map(str::to_string),
            key: key.to_string(),
            format,
        }
    }

    /// Split a file name into parent, key and format. Only `variables_`
    /// and `parameters_` prefixes denote a nested store.
    pub fn parse(file: &str) -> Result<Self> {
        let (stem, extension) = file.rsplit_once('.').unwrap_or((file, ""));
        let format = match extension {
            "csv" => FileFormat::Csv,
            "json" => FileFormat::Json,
            other => {
                return Err(StoreError::UnsupportedFormat {
                    file: file.to_string(),
                    extension: other.to_string(),
                });
            }
        };

        let nested = NESTED_KEYS.iter().find_map(|parent| {
            stem.strip_prefix(parent)
                .and_then(|rest| rest.strip_prefix('_'))
                .filter(|key| !key.is_empty())
                .map(|key| (*parent, key))
        });

        Ok(match nested {
            Some((parent, key)) => Self::new(Some(parent), key, format),
            None => Self::new(None, stem, format),
        })
    }

    pub fn file_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}_{}.{}", self.key, self.format.extension()),
            None => format!("{}.{}", self.key, self.format.extension()),
        }
    }
}

// ============================================================================
// Experiment directories
// ============================================================================

/// An experiment directory `{name}_{id}` under a base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDir {
    pub name: String,
    pub id: u32,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// Name used on disk: spaces become underscores
pub fn experiment_dir_name(exp_name: &str) -> String {
    exp_name.replace(' ', "_")
}

fn parse_dir_name(dir_name: &str) -> Option<(&str, u32)> {
    let (name, id) = dir_name.rsplit_once('_')?;
    let id = id.parse().ok()?;
    (!name.is_empty()).then_some((name, id))
}

/// All experiment directories under `path`, sorted by name then id. A
/// missing base directory holds no experiments.
pub fn list_experiments(path: &Path) -> Result<Vec<ExperimentDir>> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut experiments = Vec::new();
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        if let Some((name, id)) = parse_dir_name(&dir_name) {
            experiments.push(ExperimentDir {
                name: name.to_string(),
                id,
                path: entry.path(),
                modified: metadata.modified().ok(),
            });
        }
    }
    experiments.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(experiments)
}

/// Highest id used by `exp_name` under `path`, 0 if there is none
fn last_exp_id(exp_name: &str, path: &Path) -> Result<u32> {
    Ok(list_experiments(path)?
        .into_iter()
        .filter(|e| e.name == exp_name)
        .map(|e| e.id)
        .max()
        .unwrap_or(0))
}

fn latest_experiment_name(path: &Path) -> Result<String> {
    list_experiments(path)?
        .into_iter()
        .max_by_key(|e| e.modified)
        .map(|e| e.name)
        .ok_or_else(|| StoreError::NotFound {
            name: "*".to_string(),
            path: path.to_path_buf(),
        })
}

// ============================================================================
// Save
// ============================================================================

impl ResultStore {
    /// Write every entry to a new directory `{path}/{exp_name}_{exp_id}/`.
    ///
    /// Tables become CSV files, structured entries JSON files, and nested
    /// stores one file per inner entry. Entries that cannot be written are
    /// reported in [`SaveReport::warnings`] and leave no file behind. An
    /// existing target directory is never reused.
    pub fn save(&self, options: &SaveOptions) -> Result<SaveReport> {
        fs::create_dir_all(&options.path).map_err(|e| StoreError::io(&options.path, e))?;

        let exp_name = experiment_dir_name(
            options
                .exp_name
                .as_deref()
                .or_else(|| self.name())
                .unwrap_or(UNNAMED),
        );
        let exp_id = match options.exp_id {
            Some(0) => {
                return Err(StoreError::InvalidId {
                    name: exp_name,
                    reason: "experiment ids start at 1".to_string(),
                });
            }
            Some(id) => id,
            None => last_exp_id(&exp_name, &options.path)?
                .checked_add(1)
                .ok_or_else(|| StoreError::InvalidId {
                    name: exp_name.clone(),
                    reason: format!("no id left after {}", u32::MAX),
                })?,
        };

        let dir = options.path.join(format!("{exp_name}_{exp_id}"));
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Collision { path: dir });
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        }

        let mut report = SaveReport {
            path: dir,
            written: Vec::new(),
            warnings: Vec::new(),
        };

        for (key, entry) in self.iter() {
            match entry {
                Entry::Table(table) => {
                    report.write_table(&EntryFileName::new(None, key, FileFormat::Csv), table);
                }
                Entry::Json(value) => {
                    report.write_json(&EntryFileName::new(None, key, FileFormat::Json), value);
                }
                Entry::Store(inner) => {
                    for (inner_key, inner_entry) in inner.iter() {
                        match inner_entry {
                            Entry::Table(table) => report.write_table(
                                &EntryFileName::new(Some(key), inner_key, FileFormat::Csv),
                                table,
                            ),
                            Entry::Json(value) => report.write_json(
                                &EntryFileName::new(Some(key), inner_key, FileFormat::Json),
                                value,
                            ),
                            Entry::Store(_) => {
                                let error = StoreError::shape(
                                    &format!("{key}.{inner_key}"),
                                    "stores nested more than one level deep are not saved",
                                );
                                tracing::warn!(error = %error, "Skipping nested store");
                                report.warnings.push(FileWarning {
                                    file: format!("{key}_{inner_key}"),
                                    error,
                                });
                            }
                        }
                    }
                }
            }
            progress!(options.display, key, "Saved entry");
        }

        progress!(
            options.display,
            path = %report.path.display(),
            files = report.written.len(),
            "Data saved"
        );
        Ok(report)
    }
}

impl SaveReport {
    fn write_table(&mut self, name: &EntryFileName, table: &Table) {
        let file = name.file_name();
        let path = self.path.join(&file);
        match write_atomic(&path, |w| csv::write_table(table, w)) {
            Ok(()) => self.written.push(file),
            Err(e) => {
                let error = StoreError::io(&path, e);
                tracing::warn!(file = %file, error = %error, "Failed to save table");
                self.warnings.push(FileWarning { file, error });
            }
        }
    }

    fn write_json(&mut self, name: &EntryFileName, value: &serde_json::Value) {
        let file = name.file_name();
        let path = self.path.join(&file);
        match write_atomic(&path, |w| serde_json::to_writer(w, value).map_err(Into::into)) {
            Ok(()) => self.written.push(file),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                let key = match &name.parent {
                    Some(parent) => format!("{parent}.{}", name.key),
                    None => name.key.clone(),
                };
                let error = StoreError::Serialization {
                    key,
                    reason: e.to_string(),
                };
                tracing::warn!(file = %file, error = %error, "Object could not be saved");
                self.warnings.push(FileWarning { file, error });
            }
            Err(e) => {
                let error = StoreError::io(&path, e);
                tracing::warn!(file = %file, error = %error, "Object could not be saved");
                self.warnings.push(FileWarning { file, error });
            }
        }
    }
}

// ============================================================================
// Load
// ============================================================================

/// Read an experiment directory back into a result store.
///
/// Files that fail to load are reported in [`LoadReport::warnings`]; the
/// remaining files are still loaded.
pub fn load(options: &LoadOptions) -> Result<LoadReport> {
    let exp_name = match &options.exp_name {
        Some(name) => experiment_dir_name(name),
        None => latest_experiment_name(&options.path)?,
    };
    let not_found = || StoreError::NotFound {
        name: exp_name.clone(),
        path: options.path.clone(),
    };

    // Id 0 is never assigned; treat it like no id
    let exp_id = match options.exp_id.filter(|&id| id > 0) {
        Some(id) => id,
        None => match last_exp_id(&exp_name, &options.path)? {
            0 => return Err(not_found()),
            id => id,
        },
    };

    let dir = options.path.join(format!("{exp_name}_{exp_id}"));
    if !dir.is_dir() {
        return Err(not_found());
    }
    progress!(options.display, path = %dir.display(), "Loading from directory");

    let mut files: Vec<String> = fs::read_dir(&dir)
        .map_err(|e| StoreError::io(&dir, e))?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();

    let mut store = ResultStore::new();
    let mut warnings = Vec::new();

    for file in files {
        let loaded = EntryFileName::parse(&file)
            .and_then(|name| read_entry(&dir.join(&file), name.format).map(|e| (name, e)))
            .and_then(|(name, entry)| insert_entry(&mut store, name, entry));

        match loaded {
            Ok(()) => progress!(options.display, file = %file, "Loaded file"),
            Err(error) => {
                tracing::warn!(file = %file, error = %error, "Failed to load file");
                warnings.push(FileWarning { file, error });
            }
        }
    }

    Ok(LoadReport {
        store,
        path: dir,
        warnings,
    })
}

fn read_entry(path: &Path, format: FileFormat) -> Result<Entry> {
    let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    match format {
        FileFormat::Csv => Ok(Entry::Table(csv::read_table(&text)?)),
        FileFormat::Json => Ok(Entry::Json(serde_json::from_str(&text)?)),
    }
}

fn insert_entry(store: &mut ResultStore, name: EntryFileName, entry: Entry) -> Result<()> {
    match name.parent {
        Some(parent) => {
            store.store_mut(&parent)?.insert(name.key, entry);
        }
        None => {
            if NESTED_KEYS.contains(&name.key.as_str())
                && matches!(store.get(&name.key), Some(Entry::Store(_)))
            {
                return Err(StoreError::shape(
                    &name.key,
                    "both a single file and per-key files exist",
                ));
            }
            store.insert(name.key, entry);
        }
    }
    Ok(())
}
