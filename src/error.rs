//! Error types
//!
//! Per-file failures ([`ScanError`], [`ConversionError`]) are values that get
//! collected next to the successful results. Only [`ConfigError`] is ever fatal,
//! and only to the CLI.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A file that could not be turned into a technical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{}: {reason}", .path.display())]
pub struct ScanError {
    pub path: PathBuf,
    pub reason: String,
}

impl ScanError {
    pub fn new<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A remediation that ffmpeg (or the output guards around it) refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{}: {reason}", .path.display())]
pub struct ConversionError {
    pub path: PathBuf,
    pub reason: String,
}

impl ConversionError {
    pub fn new<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid rule table: {0}")]
    Invalid(String),
}
