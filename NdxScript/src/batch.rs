//! Batch processing
//!
//! File discovery and a parallel driver running one operation per file.
//! Per-file work is independent: a failing file is recorded and the others
//! carry on.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::Error;

/// Summary of a batch run
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Number of files processed successfully
    pub success_count: usize,
    /// Number of files that failed
    pub fail_count: usize,
    /// Each failed file with its error, sorted by path
    pub failures: Vec<(PathBuf, Error)>,
}

impl BatchResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.fail_count == 0
    }
}

/// Progress of a batch run, reported once per file as it starts
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    /// 1-based position of this file
    pub current: usize,
    pub total: usize,
    pub path: &'a Path,
}

/// Find all files with `extension` under `dir`, recursively
///
/// The extension is matched case-insensitively, without the leading dot.
///
/// # Returns
/// A sorted list of matching file paths.
pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

/// Run `op` on every file in parallel
pub fn run_batch<F, T>(files: &[PathBuf], op: F) -> BatchResult
where
    F: Fn(&Path) -> crate::Result<T> + Send + Sync,
{
    run_batch_with_progress(files, op, |_| {})
}

/// Run `op` on every file in parallel, reporting progress
///
/// # Arguments
/// * `files` - Files to process
/// * `op` - Operation to run per file
/// * `progress` - Callback invoked as each file starts
pub fn run_batch_with_progress<F, T, P>(files: &[PathBuf], op: F, progress: P) -> BatchResult
where
    F: Fn(&Path) -> crate::Result<T> + Send + Sync,
    P: Fn(&BatchProgress) + Send + Sync,
{
    let success_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let failures = Mutex::new(Vec::new());
    let total = files.len();

    files.par_iter().for_each(|path| {
        let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
        progress(&BatchProgress {
            current,
            total,
            path,
        });

        match op(path) {
            Ok(_) => {
                success_counter.fetch_add(1, Ordering::SeqCst);
            }
            Err(err) => {
                tracing::warn!("Failed to process {}: {err}", path.display());
                fail_counter.fetch_add(1, Ordering::SeqCst);
                if let Ok(mut failures) = failures.lock() {
                    failures.push((path.clone(), err));
                }
            }
        }
    });

    let mut failures = failures
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    failures.sort_by(|a, b| a.0.cmp(&b.0));

    let result = BatchResult {
        success_count: success_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        failures,
    };
    tracing::info!(
        "Batch finished: {} succeeded, {} failed",
        result.success_count,
        result.fail_count
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("map/sub")).unwrap();
        fs::write(dir.path().join("map/sub/b.TSS"), b"").unwrap();
        fs::write(dir.path().join("map/a.tss"), b"").unwrap();
        fs::write(dir.path().join("map/a.xml"), b"").unwrap();

        let files = find_files(dir.path(), "tss");
        assert_eq!(
            files,
            vec![dir.path().join("map/a.tss"), dir.path().join("map/sub/b.TSS")]
        );
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let files: Vec<PathBuf> = ["a", "bad1", "b", "bad2", "c"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let seen = AtomicUsize::new(0);

        let result = run_batch_with_progress(
            &files,
            |path| {
                if path.to_string_lossy().starts_with("bad") {
                    Err(Error::InvalidIr("broken".to_string()))
                } else {
                    Ok(())
                }
            },
            |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert_eq!(result.success_count, 3);
        assert_eq!(result.fail_count, 2);
        assert!(!result.is_success());
        let failed: Vec<_> = result.failures.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(failed, vec![PathBuf::from("bad1"), PathBuf::from("bad2")]);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
