//! JSON report

use super::Summary;
use crate::analyzer::ClassificationResult;
use crate::error::ScanError;
use crate::scan::ScanOutcome;
use chrono::Local;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated: String,
    root: &'a Path,
    summary: Summary,
    compatibility_rate: f64,
    files: &'a [ClassificationResult],
    errors: &'a [ScanError],
}

pub fn write<W: Write>(writer: &mut W, outcome: &ScanOutcome, root: &Path) -> io::Result<()> {
    let summary = outcome.summary();
    let report = JsonReport {
        generated: Local::now().to_rfc3339(),
        root,
        compatibility_rate: summary.compatibility_rate(),
        summary,
        files: &outcome.results,
        errors: &outcome.errors,
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    writer.flush()
}
