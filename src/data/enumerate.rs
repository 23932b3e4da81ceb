use std::fs::ReadDir;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// File enumeration
// ---------------------------------------------------------------------------

/// Lazy listing of the files in one directory that carry a given extension.
///
/// Yields paths in whatever order the filesystem returns them; callers must
/// not rely on sorting. Entries that cannot be read are skipped with a
/// warning.
pub struct FileIter {
    entries: ReadDir,
    extension: String,
}

impl Iterator for FileIter {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable directory entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && has_extension(&path, &self.extension) {
                return Some(path);
            }
        }
        None
    }
}

/// List files of `dir` whose extension equals `extension` (case-insensitive,
/// without the dot).
///
/// Fails with [`AnalysisError::NotFound`] when `dir` does not exist.
pub fn list_files(dir: &Path, extension: &str) -> Result<FileIter> {
    if !dir.is_dir() {
        return Err(AnalysisError::NotFound(dir.to_path_buf()).into());
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?;
    Ok(FileIter {
        entries,
        extension: extension.trim_start_matches('.').to_ascii_lowercase(),
    })
}

/// Create `dir` and its parents if absent.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_matching_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.csv", "b.CSV", "c.txt", "d.csv.bak"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let mut found: Vec<String> = list_files(dir.path(), "csv")
            .unwrap()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        found.sort();
        assert_eq!(found, vec!["a.csv", "b.CSV"]);
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = list_files(&missing, ".csv").err().unwrap();
        assert_eq!(
            err.downcast_ref::<AnalysisError>(),
            Some(&AnalysisError::NotFound(missing))
        );
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots/full");
        ensure_dir(&out).unwrap();
        ensure_dir(&out).unwrap();
        assert!(out.is_dir());
    }
}
