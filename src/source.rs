/*!
 * Local record source
 *
 * Reads JSON records from the regular files directly inside one directory.
 * Candidates are chosen by file-name suffix, ordered by name and truncated to
 * the requested count before any file is opened, so a cap of N means "the
 * first N matching files", not "N valid records".
 */

use crate::error::{PipelineError, RecordError, Result};
use crate::progress::counter_bar;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A parsed local record
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// File name without directory
    pub name: String,
    pub payload: Value,
}

/// Read all matching records from `dir`
///
/// Files that cannot be read or parsed are logged and skipped.
///
/// # Errors
///
/// Returns `PipelineError::InputDirectory` if `dir` is not an enumerable
/// directory.
pub fn read_records(dir: &Path, suffix: &str, max_count: Option<usize>) -> Result<Vec<RawRecord>> {
    read_records_with_progress(dir, suffix, max_count, false)
}

/// [`read_records`] with a progress bar over the candidate files
pub fn read_records_with_progress(
    dir: &Path,
    suffix: &str,
    max_count: Option<usize>,
    show_progress: bool,
) -> Result<Vec<RawRecord>> {
    let mut candidates = list_candidates(dir, suffix)?;
    if let Some(max) = max_count {
        candidates.truncate(max);
    }

    let progress = counter_bar(candidates.len() as u64, "Reading", show_progress);
    let mut records = Vec::with_capacity(candidates.len());

    for path in candidates {
        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(error = %e, "Skipping record"),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    tracing::info!(
        directory = %dir.display(),
        records = records.len(),
        "Loaded records"
    );
    Ok(records)
}

/// Matching regular files in `dir`, sorted by file name
fn list_candidates(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let directory_error = |source: io::Error| PipelineError::InputDirectory {
        path: dir.to_path_buf(),
        source,
    };

    let metadata = std::fs::metadata(dir).map_err(directory_error)?;
    if !metadata.is_dir() {
        return Err(directory_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("directory walk failed"));
                return Err(directory_error(source));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            candidates.push(entry.into_path());
        }
    }

    Ok(candidates)
}

fn read_record(path: &Path) -> std::result::Result<RawRecord, RecordError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bytes = std::fs::read(path).map_err(|source| RecordError::Unreadable {
        name: name.clone(),
        source,
    })?;
    let payload = serde_json::from_slice(&bytes).map_err(|source| RecordError::InvalidJson {
        name: name.clone(),
        source,
    })?;

    Ok(RawRecord { name, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_suffix_filter() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.info", r#"{"shortcode":"a"}"#);
        write(temp_dir.path(), "b.txt", r#"{"shortcode":"b"}"#);
        write(temp_dir.path(), "c.info", r#"{"shortcode":"c"}"#);

        let records = read_records(temp_dir.path(), ".info", None).unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.info", "c.info"]);
        assert_eq!(records[1].payload, json!({"shortcode": "c"}));
    }

    #[test]
    fn test_invalid_files_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.info", "{}");
        write(temp_dir.path(), "b.info", "not json");
        write(temp_dir.path(), "c.info", "[1, 2]");

        let records = read_records(temp_dir.path(), ".info", None).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.name != "b.info"));
    }

    #[test]
    fn test_truncation_happens_before_parsing() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.info", "broken");
        write(temp_dir.path(), "b.info", "{}");
        write(temp_dir.path(), "c.info", "{}");

        let records = read_records(temp_dir.path(), ".info", Some(2)).unwrap();

        // a.info and b.info are the candidates; a.info fails to parse
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "b.info");
    }

    #[test]
    fn test_subdirectories_ignored() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested.info")).unwrap();
        write(&temp_dir.path().join("nested.info"), "x.info", "{}");
        write(temp_dir.path(), "top.info", "{}");

        let records = read_records(temp_dir.path(), ".info", None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "top.info");
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let result = read_records(&temp_dir.path().join("absent"), ".info", None);
        assert!(matches!(result, Err(PipelineError::InputDirectory { .. })));

        write(temp_dir.path(), "file.info", "{}");
        let result = read_records(&temp_dir.path().join("file.info"), ".info", None);
        assert!(matches!(result, Err(PipelineError::InputDirectory { .. })));
    }

    #[test]
    fn test_zero_cap_reads_nothing() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.info", "{}");
        assert!(read_records(temp_dir.path(), ".info", Some(0))
            .unwrap()
            .is_empty());
    }
}
