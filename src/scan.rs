//! Directory traversal and the parallel extract → classify pipeline
//!
//! Every collected file yields exactly one outcome: a
//! [`ClassificationResult`] when extraction succeeds, a [`ScanError`] when it
//! does not. One file failing never stops the others.

use crate::analyzer::{ClassificationResult, Classifier};
use crate::error::ScanError;
use crate::format::CodecFamily;
use crate::probe::MetadataSource;
use crate::report::Summary;
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Everything a scan produced, both lists sorted by path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    pub results: Vec<ClassificationResult>,
    pub errors: Vec<ScanError>,
}

impl ScanOutcome {
    /// Aggregate statistics, reduced in parallel across partial summaries.
    pub fn summary(&self) -> Summary {
        let mut summary = self
            .results
            .par_iter()
            .fold(Summary::default, |mut summary, result| {
                summary.add(result);
                summary
            })
            .reduce(Summary::default, Summary::merge);
        summary.errors = self.errors.len();
        summary
    }

    pub fn incompatible(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter(|r| !r.compatible)
    }
}

/// Collect audio files under `root`, or `root` itself when it is a file.
///
/// Files whose extension maps to no [`CodecFamily`] are skipped here and never
/// reach the engine. A missing root is an error; unreadable entries below it
/// are logged and skipped.
pub fn collect_files(root: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root)?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut walker = WalkDir::new(root).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| CodecFamily::from_path(e.path()).is_some())
        .map(|e| e.into_path())
        .collect();

    files.sort();
    debug!("Collected {} audio file(s) under {}", files.len(), root.display());
    Ok(files)
}

/// Extract and classify `files` in parallel on the current rayon pool.
///
/// `on_progress` is called once per file, from worker threads, as each one
/// finishes.
pub fn scan<S, F>(files: &[PathBuf], source: &S, classifier: &Classifier, on_progress: F) -> ScanOutcome
where
    S: MetadataSource + ?Sized,
    F: Fn(&Path) + Sync,
{
    let outcomes: Vec<Result<ClassificationResult, ScanError>> = files
        .par_iter()
        .map(|path| {
            let outcome = source.extract(path).map(|record| classifier.classify(record));
            if let Err(ref e) = outcome {
                warn!("Could not read {}: {}", path.display(), e.reason);
            }
            on_progress(path);
            outcome
        })
        .collect();

    let mut scan = ScanOutcome::default();
    for outcome in outcomes {
        match outcome {
            Ok(result) => scan.results.push(result),
            Err(error) => scan.errors.push(error),
        }
    }
    scan.results.sort_by(|a, b| a.record.path.cmp(&b.record.path));
    scan.errors.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "Scanned {} file(s): {} classified, {} unreadable",
        files.len(),
        scan.results.len(),
        scan.errors.len()
    );
    scan
}
