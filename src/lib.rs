//! cdjcheck - Check an audio library against CDJ playback limits
//!
//! cdjcheck scans a folder of audio files, reads their technical parameters
//! (format, sample rate, bit depth or bitrate, channels) and checks each file
//! against the formats that Pioneer CDJ-style media players can load. Files
//! that fail get a remediation plan and can be converted with ffmpeg into a
//! separate folder, leaving the originals untouched.
//!
//! # Pipeline
//!
//! 1. **Extract** ([`probe`]): container headers are read with symphonia into
//!    a [`TechnicalRecord`]. Unreadable files become a [`ScanError`].
//!
//! 2. **Classify** ([`analyzer`]): each record is checked against the
//!    [`RuleTable`] and every violated dimension is listed.
//!
//! 3. **Aggregate** ([`report`]): results fold into a [`report::Summary`] of
//!    counts and distributions, rendered as text or JSON.
//!
//! 4. **Plan and convert** ([`remediation`]): incompatible files get a
//!    [`RemediationPlan`]. [`OutputLayout`] picks a distinct output path
//!    outside the scanned tree and [`remediation::ffmpeg::Converter`] carries
//!    the plan out.
//!
//! # Quick Start
//!
//! ```no_run
//! use cdjcheck::{Classifier, MetadataSource, Planner, SymphoniaProbe};
//! use std::path::Path;
//!
//! let classifier = Classifier::default();
//! let record = SymphoniaProbe::new().extract(Path::new("track.flac")).unwrap();
//! let result = classifier.classify(record);
//!
//! if result.compatible {
//!     println!("Ready for the booth");
//! } else {
//!     for violation in &result.violations {
//!         println!("  - {}", violation);
//!     }
//!     let plan = Planner::new(classifier.rules()).plan(&result).unwrap();
//!     println!("Convert to {}", plan.target);
//! }
//! ```
//!
//! # Default Rules
//!
//! | Format | Sample rates | Depth / bitrate | Channels |
//! |--------|--------------|-----------------|----------|
//! | WAV, AIFF, FLAC | 44.1, 48 kHz | 16, 24 bit | 2 |
//! | MP3 | 44.1 kHz | 32-320 kbps | 2 |
//! | M4A | 44.1, 48 kHz | >= 256 kbps | 2 |
//!
//! Anything else (OGG, Opus, raw AAC) is unsupported and converts to WAV.
//! The table can be replaced with a TOML file, see [`rules`].

pub mod analyzer;
pub mod error;
pub mod format;
pub mod probe;
pub mod remediation;
pub mod report;
pub mod rules;
pub mod scan;

pub use analyzer::{ClassificationResult, Classifier, Violation, ViolationField};
pub use error::{ConfigError, ConversionError, ScanError};
pub use format::{CodecFamily, Encoding, TechnicalRecord};
pub use probe::{MetadataSource, SymphoniaProbe};
pub use remediation::layout::OutputLayout;
pub use remediation::{Planner, RemediationPlan, TargetProfile};
pub use rules::{CompatibilityRule, Policy, RuleTable, TieBreak};
pub use scan::ScanOutcome;
