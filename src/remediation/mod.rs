//! Remediation planning
//!
//! Turns an incompatible [`ClassificationResult`] into the technical profile
//! a converted copy should have. The planner only decides *what* to produce;
//! [`ffmpeg::Converter`] decides how.
//!
//! # Policy
//!
//! - A file with a rule keeps its family. Each dimension moves to the nearest
//!   acceptable value and dimensions that already pass stay as they are.
//! - A file without a rule goes to the policy's fallback family at that
//!   family's canonical values (first listed rate and depth, or bitrate floor).
//!
//! | Dimension | Choice |
//! |-----------|--------|
//! | sample rate | closest listed rate, ties per policy (default: higher) |
//! | bit depth | smallest listed depth >= current, else the largest |
//! | bitrate | the floor when below it, the ceiling when above it |
//! | channels | the rule's channel count |

pub mod ffmpeg;
pub mod layout;

use crate::analyzer::{ClassificationResult, Violation};
use crate::format::{CodecFamily, Encoding, TechnicalRecord};
use crate::rules::{RuleTable, TieBreak};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

const CD_SAMPLE_RATE: u32 = 44100;
const CD_BIT_DEPTH: u16 = 16;
const STEREO: u16 = 2;

/// Technical profile of a file, current or desired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetProfile {
    pub family: CodecFamily,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub encoding: Encoding,
}

impl TargetProfile {
    /// The profile a record already has.
    pub fn of(record: &TechnicalRecord) -> Self {
        Self {
            family: record.family,
            sample_rate_hz: record.sample_rate_hz,
            channels: record.channels,
            encoding: record.encoding,
        }
    }
}

impl fmt::Display for TargetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}Hz {} {}ch",
            self.family, self.sample_rate_hz, self.encoding, self.channels
        )
    }
}

/// Contract handed to the converter for one incompatible file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemediationPlan {
    pub source: PathBuf,
    pub target: TargetProfile,
    /// Violations that prompted the plan
    pub reasons: Vec<Violation>,
}

pub struct Planner<'a> {
    rules: &'a RuleTable,
}

impl<'a> Planner<'a> {
    pub fn new(rules: &'a RuleTable) -> Self {
        Self { rules }
    }

    /// Plan a conversion for an incompatible result. Compatible results need
    /// no plan.
    pub fn plan(&self, result: &ClassificationResult) -> Option<RemediationPlan> {
        if result.compatible {
            return None;
        }
        Some(RemediationPlan {
            source: result.record.path.clone(),
            target: self.target_profile(&result.record),
            reasons: result.violations.clone(),
        })
    }

    /// Nearest compatible profile for a record. For a record that already
    /// passes, this is its own profile.
    pub fn target_profile(&self, record: &TechnicalRecord) -> TargetProfile {
        let rule = match self.rules.lookup(record.family) {
            Some(rule) => rule,
            None => return self.fallback_profile(),
        };

        let encoding = match record.encoding {
            Encoding::Pcm { bit_depth } => Encoding::Pcm {
                bit_depth: nearest_bit_depth(bit_depth, &rule.bit_depths),
            },
            Encoding::Lossy { bitrate_kbps } => Encoding::Lossy {
                bitrate_kbps: clamp_bitrate(
                    bitrate_kbps,
                    rule.min_bitrate_kbps,
                    rule.max_bitrate_kbps,
                ),
            },
        };

        TargetProfile {
            family: record.family,
            sample_rate_hz: nearest_sample_rate(
                record.sample_rate_hz,
                &rule.sample_rates_hz,
                self.rules.policy().sample_rate_tie,
            ),
            channels: rule.channels,
            encoding,
        }
    }

    fn fallback_profile(&self) -> TargetProfile {
        let family = self.rules.policy().fallback;
        // RuleTable validation guarantees the rule and its canonical values;
        // the CD defaults only cover a table built outside that path.
        let rule = self.rules.lookup(family);

        let sample_rate_hz = rule
            .and_then(|r| r.sample_rates_hz.first().copied())
            .unwrap_or(CD_SAMPLE_RATE);
        let channels = rule.map(|r| r.channels).unwrap_or(STEREO);
        let encoding = if family.is_lossless() {
            Encoding::Pcm {
                bit_depth: rule
                    .and_then(|r| r.bit_depths.first().copied())
                    .unwrap_or(CD_BIT_DEPTH),
            }
        } else {
            Encoding::Lossy {
                bitrate_kbps: rule.and_then(|r| r.min_bitrate_kbps).unwrap_or(320),
            }
        };

        TargetProfile {
            family,
            sample_rate_hz,
            channels,
            encoding,
        }
    }
}

/// Closest acceptable rate by absolute difference.
pub fn nearest_sample_rate(current: u32, acceptable: &[u32], tie: TieBreak) -> u32 {
    if acceptable.contains(&current) {
        return current;
    }
    let distance = |rate: u32| (i64::from(rate) - i64::from(current)).unsigned_abs();

    acceptable
        .iter()
        .copied()
        .min_by(|&a, &b| {
            distance(a).cmp(&distance(b)).then_with(|| match tie {
                TieBreak::Higher => b.cmp(&a),
                TieBreak::Lower => a.cmp(&b),
            })
        })
        .unwrap_or(current)
}

/// Smallest acceptable depth that loses nothing, else the deepest available.
pub fn nearest_bit_depth(current: u16, acceptable: &[u16]) -> u16 {
    if acceptable.is_empty() || acceptable.contains(&current) {
        return current;
    }
    acceptable
        .iter()
        .copied()
        .filter(|&depth| depth >= current)
        .min()
        .or_else(|| acceptable.iter().copied().max())
        .unwrap_or(current)
}

pub fn clamp_bitrate(current: u32, min: Option<u32>, max: Option<u32>) -> u32 {
    match (min, max) {
        (Some(min), _) if current < min => min,
        (_, Some(max)) if current > max => max,
        _ => current,
    }
}
