//! Plain-text report

use super::{display_path, Summary};
use crate::format::Encoding;
use crate::scan::ScanOutcome;
use chrono::Local;
use std::io::{self, Write};
use std::path::Path;

pub fn write<W: Write>(writer: &mut W, outcome: &ScanOutcome, root: &Path) -> io::Result<()> {
    let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    render(writer, outcome, root, &generated)
}

fn render<W: Write>(
    writer: &mut W,
    outcome: &ScanOutcome,
    root: &Path,
    generated: &str,
) -> io::Result<()> {
    let summary = outcome.summary();

    writeln!(writer, "=== CDJ Compatibility Report ===")?;
    writeln!(writer)?;
    writeln!(writer, "Generated on: {}", generated)?;
    writeln!(writer, "Directory scanned: {}", root.display())?;
    writeln!(
        writer,
        "Total audio files found: {}",
        outcome.results.len() + outcome.errors.len()
    )?;
    if outcome.errors.is_empty() {
        writeln!(writer, "All files processed successfully.")?;
    } else {
        writeln!(writer, "Files with errors: {}", outcome.errors.len())?;
    }
    writeln!(writer)?;

    write_summary(writer, &summary)?;
    write_distributions(writer, &summary)?;

    writeln!(writer, "=== Detailed File Information ===")?;
    writeln!(writer)?;
    for result in &outcome.results {
        let record = &result.record;
        writeln!(writer, "File: {}", display_path(&record.path, root))?;
        writeln!(writer, "  Type: {}", record.family)?;
        writeln!(writer, "  Size: {:.2} MB", record.size_mb())?;
        writeln!(writer, "  Sample Rate: {} Hz", record.sample_rate_hz)?;
        match record.encoding {
            Encoding::Pcm { bit_depth } => writeln!(writer, "  Bit Depth: {} bits", bit_depth)?,
            Encoding::Lossy { bitrate_kbps } => {
                writeln!(writer, "  Bitrate: {} kbps", bitrate_kbps)?
            }
        }
        writeln!(writer, "  Channels: {}", record.channels)?;
        writeln!(writer, "  Duration: {}", format_duration(record.duration_secs))?;
        writeln!(
            writer,
            "  CDJ Compatible: {}",
            if result.compatible { "Yes" } else { "No" }
        )?;
        if !result.violations.is_empty() {
            writeln!(writer, "  Issues:")?;
            for violation in &result.violations {
                writeln!(writer, "    - {}", violation)?;
            }
        }
        writeln!(writer)?;
    }

    if !outcome.errors.is_empty() {
        writeln!(writer, "=== Files with Errors ===")?;
        writeln!(writer)?;
        for error in &outcome.errors {
            writeln!(
                writer,
                "- {} (Error: {})",
                display_path(&error.path, root),
                error.reason
            )?;
        }
    }

    writer.flush()
}

fn write_summary<W: Write>(writer: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(writer, "=== Compatibility Summary ===")?;
    writeln!(writer)?;
    writeln!(writer, "Compatible:         {}", summary.compatible)?;
    writeln!(writer, "Incompatible:       {}", summary.incompatible)?;
    writeln!(
        writer,
        "Compatibility rate: {:.1}%",
        summary.compatibility_rate() * 100.0
    )?;
    writeln!(writer, "Errors:             {}", summary.errors)?;
    writeln!(writer)
}

fn write_distributions<W: Write>(writer: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(writer, "=== Summary Statistics ===")?;
    writeln!(writer)?;

    writeln!(writer, "File Types:")?;
    for (family, count) in &summary.codec_families {
        writeln!(writer, "  {}: {} files", family, count)?;
    }

    writeln!(writer, "\nSample Rates:")?;
    for (rate, count) in &summary.sample_rates {
        writeln!(writer, "  {} Hz: {} files", rate, count)?;
    }

    writeln!(writer, "\nBit Depths:")?;
    for (depth, count) in &summary.bit_depths {
        writeln!(writer, "  {} bits: {} files", depth, count)?;
    }

    writeln!(writer, "\nChannel Configurations:")?;
    for (channels, count) in &summary.channel_counts {
        writeln!(writer, "  {} channels: {} files", channels, count)?;
    }
    writeln!(writer)
}

fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
