//! Where converted files are written
//!
//! Each output mirrors its source's directory, relative to the scan root,
//! under a separate output directory. The output directory may not overlap
//! the scanned tree, and no two plans in one batch share an output path.

use super::RemediationPlan;
use crate::error::ConversionError;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    out: PathBuf,
}

impl OutputLayout {
    /// Layout for converting files found under `scan_path` (a file or a
    /// directory) into `out`.
    ///
    /// Refuses an `out` that equals, sits inside or contains the scanned
    /// directory: converted files would land next to the originals.
    pub fn new(scan_path: &Path, out: &Path) -> Result<Self, ConversionError> {
        let root = if scan_path.is_file() {
            scan_path.parent().unwrap_or(Path::new("")).to_path_buf()
        } else {
            scan_path.to_path_buf()
        };

        let resolved_root = resolve(&root);
        let resolved_out = resolve(out);
        if resolved_out.starts_with(&resolved_root) || resolved_root.starts_with(&resolved_out) {
            return Err(ConversionError::new(
                out,
                format!(
                    "output directory overlaps the scanned directory {}; choose an --out outside it",
                    resolved_root.display()
                ),
            ));
        }

        Ok(Self {
            root,
            out: out.to_path_buf(),
        })
    }

    pub fn out(&self) -> &Path {
        &self.out
    }

    /// Scan root that source paths are made relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination directory for a source file.
    pub fn dest_dir(&self, source: &Path) -> PathBuf {
        source
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.root).ok())
            .filter(|relative| !relative.as_os_str().is_empty())
            .map(|relative| self.out.join(relative))
            .unwrap_or_else(|| self.out.clone())
    }

    /// Output path for every plan, in plan order.
    ///
    /// Plans whose natural output (`intro.wav`) collides with another plan's
    /// keep the source extension instead (`intro.ogg.wav`, `intro.flac.wav`).
    /// Anything still colliding after that is an error for each plan involved.
    pub fn assign(&self, plans: &[RemediationPlan]) -> Vec<Result<PathBuf, ConversionError>> {
        let natural: Vec<PathBuf> = plans
            .iter()
            .map(|plan| self.dest_dir(&plan.source).join(output_file_name(plan)))
            .collect();

        let counts = occurrences(&natural);
        let candidates: Vec<PathBuf> = plans
            .iter()
            .zip(natural)
            .map(|(plan, path)| {
                if counts.get(&collision_key(&path)).copied().unwrap_or(0) > 1 {
                    let renamed = path.with_file_name(qualified_file_name(plan));
                    debug!(
                        "Output {} is shared, using {}",
                        path.display(),
                        renamed.display()
                    );
                    renamed
                } else {
                    path
                }
            })
            .collect();

        let counts = occurrences(&candidates);
        plans
            .iter()
            .zip(candidates)
            .map(|(plan, path)| {
                if counts.get(&collision_key(&path)).copied().unwrap_or(0) > 1 {
                    Err(ConversionError::new(
                        &plan.source,
                        format!("output {} collides with another conversion", path.display()),
                    ))
                } else {
                    Ok(path)
                }
            })
            .collect()
    }
}

/// Source stem with the target family's extension.
pub fn output_file_name(plan: &RemediationPlan) -> OsString {
    let mut name = plan
        .source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("converted"));
    name.push(".");
    name.push(plan.target.family.extension());
    name
}

/// Full source file name with the target family's extension appended.
fn qualified_file_name(plan: &RemediationPlan) -> OsString {
    let mut name = plan
        .source
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("converted"));
    name.push(".");
    name.push(plan.target.family.extension());
    name
}

// Case is folded so the check also holds on case-insensitive filesystems
fn collision_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn occurrences(paths: &[PathBuf]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for path in paths {
        *counts.entry(collision_key(path)).or_insert(0) += 1;
    }
    counts
}

/// Absolute form of a path that may not exist yet: the longest existing
/// ancestor is canonicalized and the rest appended.
fn resolve(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };

    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path;
    loop {
        if let Ok(found) = current.canonicalize() {
            return missing.iter().rev().fold(found, |acc, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = if parent.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    parent
                };
            }
            _ => return path.to_path_buf(),
        }
    }
}
