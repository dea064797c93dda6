//! Compatibility classifier
//!
//! Evaluates one [`TechnicalRecord`] against the [`RuleTable`] and reports
//! every dimension that falls outside the envelope.
//!
//! # Checks
//!
//! | Check | Applies to | Passes when |
//! |-------|------------|-------------|
//! | channels | all | count equals the rule's channel count |
//! | sample rate | all | rate is listed by the rule |
//! | bit depth | PCM records | depth is listed (or the rule lists none) |
//! | bitrate | lossy records | within the rule's min/max bounds |
//!
//! A family with no rule short-circuits to a single `unsupported_format`
//! violation. Otherwise all checks run, so one file can carry several
//! violations and the report shows every defect at once.

use crate::format::{CodecFamily, Encoding, TechnicalRecord};
use crate::rules::{CompatibilityRule, RuleTable};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which dimension a violation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationField {
    SampleRate,
    BitDepth,
    Bitrate,
    Channels,
    UnsupportedFormat,
}

/// A single dimension outside the rule's envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum Violation {
    SampleRate {
        observed: u32,
        expected: Vec<u32>,
    },
    BitDepth {
        observed: u16,
        expected: Vec<u16>,
    },
    Bitrate {
        observed: u32,
        min: Option<u32>,
        max: Option<u32>,
    },
    Channels {
        observed: u16,
        expected: u16,
    },
    UnsupportedFormat {
        family: CodecFamily,
    },
}

impl Violation {
    pub fn field(&self) -> ViolationField {
        match self {
            Violation::SampleRate { .. } => ViolationField::SampleRate,
            Violation::BitDepth { .. } => ViolationField::BitDepth,
            Violation::Bitrate { .. } => ViolationField::Bitrate,
            Violation::Channels { .. } => ViolationField::Channels,
            Violation::UnsupportedFormat { .. } => ViolationField::UnsupportedFormat,
        }
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SampleRate { observed, expected } => {
                write!(f, "sample rate {}Hz not in {{{}}}", observed, join(expected))
            }
            Violation::BitDepth { observed, expected } => {
                write!(f, "bit depth {}-bit not in {{{}}}", observed, join(expected))
            }
            Violation::Bitrate { observed, min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    write!(f, "bitrate {}kbps outside {}-{}kbps", observed, min, max)
                }
                (Some(min), None) => write!(f, "bitrate {}kbps below {}kbps", observed, min),
                (None, Some(max)) => write!(f, "bitrate {}kbps above {}kbps", observed, max),
                (None, None) => write!(f, "bitrate {}kbps", observed),
            },
            Violation::Channels { observed, expected } => {
                write!(f, "{} channel(s), expected {}", observed, expected)
            }
            Violation::UnsupportedFormat { family } => {
                write!(f, "{} is not a supported format", family)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub record: TechnicalRecord,
    pub compatible: bool,
    pub violations: Vec<Violation>,
}

impl ClassificationResult {
    fn new(record: TechnicalRecord, violations: Vec<Violation>) -> Self {
        Self {
            compatible: violations.is_empty(),
            record,
            violations,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.field() == ViolationField::UnsupportedFormat)
    }

    pub fn has_violation(&self, field: ViolationField) -> bool {
        self.violations.iter().any(|v| v.field() == field)
    }
}

/// Stateless apart from the shared, read-only rule table; safe to use from
/// any number of worker threads.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Arc<RuleTable>,
}

impl Classifier {
    pub fn new(rules: RuleTable) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn classify(&self, record: TechnicalRecord) -> ClassificationResult {
        let violations = match self.rules.lookup(record.family) {
            Some(rule) => check(&record, rule),
            None => vec![Violation::UnsupportedFormat {
                family: record.family,
            }],
        };
        ClassificationResult::new(record, violations)
    }
}

fn check(record: &TechnicalRecord, rule: &CompatibilityRule) -> Vec<Violation> {
    let mut violations = Vec::new();

    if record.channels != rule.channels {
        violations.push(Violation::Channels {
            observed: record.channels,
            expected: rule.channels,
        });
    }

    if !rule.accepts_sample_rate(record.sample_rate_hz) {
        violations.push(Violation::SampleRate {
            observed: record.sample_rate_hz,
            expected: rule.sample_rates_hz.clone(),
        });
    }

    match record.encoding {
        Encoding::Pcm { bit_depth } => {
            if !rule.accepts_bit_depth(bit_depth) {
                violations.push(Violation::BitDepth {
                    observed: bit_depth,
                    expected: rule.bit_depths.clone(),
                });
            }
        }
        Encoding::Lossy { bitrate_kbps } => {
            if !rule.accepts_bitrate(bitrate_kbps) {
                violations.push(Violation::Bitrate {
                    observed: bitrate_kbps,
                    min: rule.min_bitrate_kbps,
                    max: rule.max_bitrate_kbps,
                });
            }
        }
    }

    violations
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn pcm_record(
        family: CodecFamily,
        sample_rate_hz: u32,
        bit_depth: u16,
        channels: u16,
    ) -> TechnicalRecord {
        TechnicalRecord {
            path: PathBuf::from(format!("/music/track.{}", family.extension())),
            family,
            sample_rate_hz,
            channels,
            encoding: Encoding::Pcm { bit_depth },
            duration_secs: 240.0,
            size_bytes: 42_336_000,
        }
    }

    pub(crate) fn lossy_record(
        family: CodecFamily,
        sample_rate_hz: u32,
        bitrate_kbps: u32,
        channels: u16,
    ) -> TechnicalRecord {
        TechnicalRecord {
            path: PathBuf::from(format!("/music/track.{}", family.extension())),
            family,
            sample_rate_hz,
            channels,
            encoding: Encoding::Lossy { bitrate_kbps },
            duration_secs: 240.0,
            size_bytes: 7_680_000,
        }
    }

    fn classify(record: TechnicalRecord) -> ClassificationResult {
        Classifier::default().classify(record)
    }

    // ==========================================================================
    // COMPATIBLE FILES
    // ==========================================================================

    #[test]
    fn test_cd_quality_wav_is_compatible() {
        // SCENARIO: 44.1kHz / 16-bit / stereo WAV, the CD standard
        let result = classify(pcm_record(CodecFamily::Wav, 44100, 16, 2));

        assert!(result.compatible);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_128k_mp3_is_compatible() {
        // SCENARIO: 128kbps MP3, above the 32kbps floor
        let result = classify(lossy_record(CodecFamily::Mp3, 44100, 128, 2));

        assert!(result.compatible, "violations: {:?}", result.violations);
    }

    #[test]
    fn test_every_listed_combination_passes() {
        let classifier = Classifier::default();
        for family in [CodecFamily::Wav, CodecFamily::Aiff, CodecFamily::Flac] {
            for rate in [44100, 48000] {
                for depth in [16, 24] {
                    let result = classifier.classify(pcm_record(family, rate, depth, 2));
                    assert!(
                        result.compatible,
                        "{} {}Hz {}-bit should pass: {:?}",
                        family, rate, depth, result.violations
                    );
                }
            }
        }
    }

    #[test]
    fn test_bitrate_floor_is_inclusive() {
        let result = classify(lossy_record(CodecFamily::M4a, 44100, 256, 2));
        assert!(result.compatible);
    }

    // ==========================================================================
    // SINGLE-DIMENSION VIOLATIONS
    // ==========================================================================
    //
    // Mutating exactly one field of a compatible record must produce exactly
    // one violation of the matching kind.
    // ==========================================================================

    #[test]
    fn test_hires_wav_flags_sample_rate_only() {
        // SCENARIO: 96kHz studio master
        let result = classify(pcm_record(CodecFamily::Wav, 96000, 16, 2));

        assert!(!result.compatible);
        assert_eq!(
            result.violations,
            vec![Violation::SampleRate {
                observed: 96000,
                expected: vec![44100, 48000],
            }]
        );
        assert_eq!(
            result.violations[0].to_string(),
            "sample rate 96000Hz not in {44100, 48000}"
        );
    }

    #[test]
    fn test_32bit_flac_flags_bit_depth_only() {
        let result = classify(pcm_record(CodecFamily::Flac, 44100, 32, 2));

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].field(), ViolationField::BitDepth);
    }

    #[test]
    fn test_mono_flags_channels_only() {
        // Equality, not a minimum: mono fails
        let result = classify(pcm_record(CodecFamily::Aiff, 44100, 16, 1));

        assert_eq!(
            result.violations,
            vec![Violation::Channels {
                observed: 1,
                expected: 2
            }]
        );
    }

    #[test]
    fn test_surround_flags_channels_only() {
        // More channels than required fails too
        let result = classify(pcm_record(CodecFamily::Wav, 48000, 24, 6));

        assert_eq!(result.violations.len(), 1);
        assert!(result.has_violation(ViolationField::Channels));
    }

    #[test]
    fn test_low_bitrate_m4a_flags_bitrate() {
        // SCENARIO: 128kbps AAC in M4A, below the 256kbps floor
        let result = classify(lossy_record(CodecFamily::M4a, 44100, 128, 2));

        assert!(!result.compatible);
        assert_eq!(
            result.violations,
            vec![Violation::Bitrate {
                observed: 128,
                min: Some(256),
                max: None,
            }]
        );
        assert_eq!(result.violations[0].to_string(), "bitrate 128kbps below 256kbps");
    }

    #[test]
    fn test_mp3_above_max_flags_bitrate() {
        // Non-standard freeformat MP3 above 320kbps
        let result = classify(lossy_record(CodecFamily::Mp3, 44100, 450, 2));

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].field(), ViolationField::Bitrate);
    }

    #[test]
    fn test_48k_mp3_flags_sample_rate() {
        // MP3 rule only lists 44.1kHz
        let result = classify(lossy_record(CodecFamily::Mp3, 48000, 320, 2));

        assert_eq!(result.violations.len(), 1);
        assert!(result.has_violation(ViolationField::SampleRate));
    }

    // ==========================================================================
    // MULTIPLE VIOLATIONS
    // ==========================================================================

    #[test]
    fn test_all_violations_reported() {
        // SCENARIO: mono 96kHz 32-bit WAV breaks three dimensions
        let result = classify(pcm_record(CodecFamily::Wav, 96000, 32, 1));

        assert_eq!(result.violations.len(), 3, "got {:?}", result.violations);
        assert!(result.has_violation(ViolationField::Channels));
        assert!(result.has_violation(ViolationField::SampleRate));
        assert!(result.has_violation(ViolationField::BitDepth));
    }

    #[test]
    fn test_violation_order_is_stable() {
        let result = classify(lossy_record(CodecFamily::M4a, 22050, 96, 1));
        let fields: Vec<_> = result.violations.iter().map(|v| v.field()).collect();
        assert_eq!(
            fields,
            vec![
                ViolationField::Channels,
                ViolationField::SampleRate,
                ViolationField::Bitrate
            ]
        );
    }

    // ==========================================================================
    // UNSUPPORTED FORMATS
    // ==========================================================================

    #[test]
    fn test_ogg_is_unsupported() {
        // SCENARIO: OGG has no rule; no further checks are reported even
        // though the record is also mono
        let result = classify(lossy_record(CodecFamily::Ogg, 96000, 64, 1));

        assert!(!result.compatible);
        assert!(result.is_unsupported());
        assert_eq!(
            result.violations,
            vec![Violation::UnsupportedFormat {
                family: CodecFamily::Ogg
            }]
        );
    }

    #[test]
    fn test_custom_table_drives_classification() {
        // Same record, stricter table: only 44.1kHz allowed
        let table = RuleTable::from_toml_str(
            r#"
            [rules.wav]
            sample_rates_hz = [44100]
            bit_depths = [16]
            channels = 2
            "#,
        )
        .unwrap();
        let result = Classifier::new(table).classify(pcm_record(CodecFamily::Wav, 48000, 24, 2));

        assert_eq!(result.violations.len(), 2);
    }

    #[test]
    fn test_violation_serializes_with_field_tag() {
        let v = Violation::Channels {
            observed: 1,
            expected: 2,
        };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"field":"channels","observed":1,"expected":2}"#);
    }
}
