use std::io;
use std::path::PathBuf;

/// Errors produced while reshaping or persisting a result store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An entry does not have one of the shapes its key requires
    #[error("malformed entry '{key}': {reason}")]
    Shape { key: String, reason: String },

    /// No experiment directory matches the requested name/id
    #[error("no experiment found with name '{name}' in path '{}'", path.display())]
    NotFound { name: String, path: PathBuf },

    /// The file extension is neither `csv` nor `json`
    #[error("file type '{extension}' not supported ({file})")]
    UnsupportedFormat { file: String, extension: String },

    /// A structured entry could not be written as JSON
    #[error("object '{key}' could not be saved: {reason}")]
    Serialization { key: String, reason: String },

    /// The target experiment directory already exists
    #[error("experiment directory '{}' already exists", path.display())]
    Collision { path: PathBuf },

    /// A selected column is not present in the table
    #[error("column '{column}' not found (available: {available:?})")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// Experiment id outside the usable range
    #[error("invalid experiment id for '{name}': {reason}")]
    InvalidId { name: String, reason: String },

    /// Malformed delimited text
    #[error("csv error at line {line}: {reason}")]
    Csv { line: usize, reason: String },

    /// Malformed JSON document
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn shape(key: &str, reason: impl Into<String>) -> Self {
        StoreError::Shape {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
