//! Report generation for scan results
//!
//! This module aggregates a scan into [`Summary`] statistics and renders it:
//!
//! - **Text**: human-readable report with summary, distributions, per-file
//!   detail and the error list
//! - **JSON**: machine-readable format for programmatic consumption
//!
//! # Usage
//!
//! ```ignore
//! use cdjcheck::report;
//!
//! // Automatically picks format based on extension
//! report::generate("report.json", &outcome, root)?;  // JSON
//! report::generate("report.txt", &outcome, root)?;   // Text
//! ```

pub mod json;
pub mod text;

use crate::analyzer::ClassificationResult;
use crate::format::{CodecFamily, Encoding};
use crate::scan::ScanOutcome;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, outcome: &ScanOutcome, root: &Path) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);

    match ext.as_str() {
        "json" => json::write(&mut file, outcome, root),
        _ => text::write(&mut file, outcome, root),
    }
}

/// Summary statistics for a batch of results
///
/// Built by folding results one at a time ([`Summary::add`]) or by merging
/// partial summaries ([`Summary::merge`]); both are order-independent, so
/// the summary can be reduced in parallel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub compatible: usize,
    pub incompatible: usize,
    /// Files that failed extraction; never part of the distributions
    pub errors: usize,
    pub codec_families: BTreeMap<CodecFamily, usize>,
    pub sample_rates: BTreeMap<u32, usize>,
    /// Lossy records have no bit depth and are left out
    pub bit_depths: BTreeMap<u16, usize>,
    pub channel_counts: BTreeMap<u16, usize>,
}

impl Summary {
    pub fn from_results(results: &[ClassificationResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, r| {
            summary.add(r);
            summary
        })
    }

    pub fn add(&mut self, result: &ClassificationResult) {
        if result.compatible {
            self.compatible += 1;
        } else {
            self.incompatible += 1;
        }

        let record = &result.record;
        *self.codec_families.entry(record.family).or_default() += 1;
        *self.sample_rates.entry(record.sample_rate_hz).or_default() += 1;
        *self.channel_counts.entry(record.channels).or_default() += 1;
        if let Encoding::Pcm { bit_depth } = record.encoding {
            *self.bit_depths.entry(bit_depth).or_default() += 1;
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.compatible += other.compatible;
        self.incompatible += other.incompatible;
        self.errors += other.errors;
        merge_counts(&mut self.codec_families, other.codec_families);
        merge_counts(&mut self.sample_rates, other.sample_rates);
        merge_counts(&mut self.bit_depths, other.bit_depths);
        merge_counts(&mut self.channel_counts, other.channel_counts);
        self
    }

    /// Classified files (errors excluded)
    pub fn total(&self) -> usize {
        self.compatible + self.incompatible
    }

    /// Fraction of classified files that are compatible, 0.0 for an empty set.
    pub fn compatibility_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.compatible as f64 / total as f64,
        }
    }
}

fn merge_counts<K: Ord>(into: &mut BTreeMap<K, usize>, from: BTreeMap<K, usize>) {
    for (key, count) in from {
        *into.entry(key).or_default() += count;
    }
}

/// Path relative to the scan root when possible.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::tests::{lossy_record, pcm_record};
    use crate::analyzer::Classifier;
    use crate::format::TechnicalRecord;

    // ==========================================================================
    // SUMMARY STATISTICS TESTS
    // ==========================================================================
    //
    // The Summary aggregates verdict counts and attribute distributions for a
    // batch of files. It is displayed at the top of reports.
    // ==========================================================================

    fn classify_all(records: Vec<TechnicalRecord>) -> Vec<ClassificationResult> {
        let classifier = Classifier::default();
        records.into_iter().map(|r| classifier.classify(r)).collect()
    }

    fn mixed_results() -> Vec<ClassificationResult> {
        classify_all(vec![
            pcm_record(CodecFamily::Wav, 44100, 16, 2),
            pcm_record(CodecFamily::Wav, 96000, 24, 2),
            pcm_record(CodecFamily::Flac, 44100, 24, 2),
            lossy_record(CodecFamily::Mp3, 44100, 320, 2),
            lossy_record(CodecFamily::M4a, 44100, 128, 2),
            lossy_record(CodecFamily::Ogg, 48000, 160, 1),
        ])
    }

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_results(&[]);

        assert_eq!(summary.total(), 0);
        assert_eq!(summary.compatible, 0);
        assert_eq!(summary.incompatible, 0);
        assert_eq!(summary.compatibility_rate(), 0.0);
        assert!(summary.codec_families.is_empty());
        assert!(summary.sample_rates.is_empty());
        assert!(summary.bit_depths.is_empty());
        assert!(summary.channel_counts.is_empty());
    }

    #[test]
    fn test_summary_default_matches_empty() {
        assert_eq!(Summary::default(), Summary::from_results(&[]));
    }

    #[test]
    fn test_summary_mixed() {
        let summary = Summary::from_results(&mixed_results());

        assert_eq!(summary.total(), 6);
        assert_eq!(summary.compatible, 3);
        assert_eq!(summary.incompatible, 3);
        assert!((summary.compatibility_rate() - 0.5).abs() < 1e-9);

        assert_eq!(summary.codec_families.get(&CodecFamily::Wav), Some(&2));
        assert_eq!(summary.codec_families.get(&CodecFamily::Ogg), Some(&1));
        assert_eq!(summary.sample_rates.get(&44100), Some(&4));
        assert_eq!(summary.sample_rates.get(&96000), Some(&1));
        assert_eq!(summary.channel_counts.get(&2), Some(&5));
        assert_eq!(summary.channel_counts.get(&1), Some(&1));
    }

    #[test]
    fn test_lossy_records_skip_bit_depth_distribution() {
        let summary = Summary::from_results(&mixed_results());

        // Three PCM records, three lossy ones; no zero-bit entry
        assert_eq!(summary.bit_depths.values().sum::<usize>(), 3);
        assert_eq!(summary.bit_depths.get(&16), Some(&1));
        assert_eq!(summary.bit_depths.get(&24), Some(&2));
        assert!(!summary.bit_depths.contains_key(&0));
    }

    #[test]
    fn test_summary_all_compatible() {
        let results = classify_all(vec![
            pcm_record(CodecFamily::Aiff, 44100, 16, 2),
            pcm_record(CodecFamily::Aiff, 48000, 24, 2),
        ]);
        let summary = Summary::from_results(&results);
        assert_eq!(summary.compatibility_rate(), 1.0);
    }

    #[test]
    fn test_summary_is_order_independent() {
        let results = mixed_results();
        let forward = Summary::from_results(&results);

        let mut reversed = results.clone();
        reversed.reverse();
        assert_eq!(Summary::from_results(&reversed), forward);

        let mut rotated = results.clone();
        rotated.rotate_left(2);
        assert_eq!(Summary::from_results(&rotated), forward);
    }

    #[test]
    fn test_merge_equals_single_fold() {
        let results = mixed_results();
        let whole = Summary::from_results(&results);

        let (left, right) = results.split_at(2);
        let merged = Summary::from_results(right).merge(Summary::from_results(left));

        assert_eq!(merged, whole);
    }

    #[test]
    fn test_errors_do_not_enter_distributions() {
        let mut summary = Summary::from_results(&mixed_results());
        let before = summary.clone();
        summary = summary.merge(Summary {
            errors: 2,
            ..Summary::default()
        });

        assert_eq!(summary.errors, 2);
        assert_eq!(summary.total(), before.total());
        assert_eq!(summary.codec_families, before.codec_families);
        assert_eq!(summary.compatibility_rate(), before.compatibility_rate());
    }

    #[test]
    fn test_display_path_relative_to_root() {
        let root = Path::new("/music");
        assert_eq!(display_path(Path::new("/music/a/b.wav"), root), "a/b.wav");
        assert_eq!(display_path(Path::new("/other/c.wav"), root), "/other/c.wav");
        // Single-file scan: root is the file itself
        assert_eq!(
            display_path(Path::new("/music/c.wav"), Path::new("/music/c.wav")),
            "/music/c.wav"
        );
    }
}
