//! I/O utility functions

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write a file using the write-then-rename pattern.
///
/// `write` fills a temporary sibling of `path` (`<name>.tmp`), which is
/// renamed to `path` once everything was written and flushed. If anything
/// fails the temporary file is removed, so a failed write never leaves a
/// truncated file behind.
///
/// # Example
/// ```ignore
/// write_atomic(Path::new("log.json"), |w| serde_json::to_writer(w, &value).map_err(Into::into))?;
/// ```
pub fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let temp_path = temp_path(path);

    let result = File::create(&temp_path)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if result.is_err()
        && temp_path.exists()
        && let Err(e) = fs::remove_file(&temp_path)
    {
        tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove partial file");
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.json");

        write_atomic(&path, |w| w.write_all(b"{\"a\": 1}")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\": 1}");
        assert!(!dir.path().join("log.json.tmp").exists());
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");

        let result = write_atomic(&path, |w| {
            w.write_all(b"{\"partial\": ")?;
            Err(io::Error::other("value not representable"))
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!dir.path().join("broken.json.tmp").exists());
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("measures.csv");

        write_atomic(&path, |w| w.write_all(b"first")).unwrap();
        write_atomic(&path, |w| w.write_all(b"second")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "second");
    }
}
