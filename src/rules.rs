//! Compatibility rule table
//!
//! The table maps each [`CodecFamily`] to the technical envelope a CDJ will
//! play back. It is plain data: the built-in table mirrors the Pioneer CDJ
//! format support list, and a TOML file can replace it without touching the
//! classifier.
//!
//! ```toml
//! [policy]
//! fallback = "wav"
//! sample_rate_tie = "higher"
//!
//! [rules.wav]
//! sample_rates_hz = [44100, 48000]
//! bit_depths = [16, 24]
//! channels = 2
//!
//! [rules.mp3]
//! sample_rates_hz = [44100]
//! min_bitrate_kbps = 32
//! max_bitrate_kbps = 320
//! channels = 2
//! ```
//!
//! The first entry of `sample_rates_hz` and `bit_depths` is the canonical
//! value used when a file has to be converted to the fallback family.

use crate::error::ConfigError;
use crate::format::CodecFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Acceptable technical envelope for one codec family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompatibilityRule {
    pub sample_rates_hz: Vec<u32>,
    /// Empty for families judged on bitrate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bit_depths: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_bitrate_kbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate_kbps: Option<u32>,
    /// Exact channel count (CDJs want stereo, not "at least stereo")
    pub channels: u16,
}

impl CompatibilityRule {
    pub fn pcm(sample_rates_hz: &[u32], bit_depths: &[u16]) -> Self {
        Self {
            sample_rates_hz: sample_rates_hz.to_vec(),
            bit_depths: bit_depths.to_vec(),
            min_bitrate_kbps: None,
            max_bitrate_kbps: None,
            channels: 2,
        }
    }

    pub fn lossy(sample_rates_hz: &[u32], min_kbps: u32, max_kbps: Option<u32>) -> Self {
        Self {
            sample_rates_hz: sample_rates_hz.to_vec(),
            bit_depths: vec![],
            min_bitrate_kbps: Some(min_kbps),
            max_bitrate_kbps: max_kbps,
            channels: 2,
        }
    }

    pub fn accepts_sample_rate(&self, hz: u32) -> bool {
        self.sample_rates_hz.contains(&hz)
    }

    /// An empty depth list means depth is not checked.
    pub fn accepts_bit_depth(&self, bits: u16) -> bool {
        self.bit_depths.is_empty() || self.bit_depths.contains(&bits)
    }

    pub fn accepts_bitrate(&self, kbps: u32) -> bool {
        self.min_bitrate_kbps.map_or(true, |min| kbps >= min)
            && self.max_bitrate_kbps.map_or(true, |max| kbps <= max)
    }

    fn validate(&self, family: CodecFamily) -> Result<(), ConfigError> {
        if self.sample_rates_hz.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "{} rule lists no sample rates",
                family
            )));
        }
        if self.channels == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} rule requires zero channels",
                family
            )));
        }
        if let (Some(min), Some(max)) = (self.min_bitrate_kbps, self.max_bitrate_kbps) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "{} rule has min bitrate {}kbps above max {}kbps",
                    family, min, max
                )));
            }
        }
        Ok(())
    }
}

/// Which neighbour wins when a sample rate sits exactly between two
/// acceptable rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    #[default]
    Higher,
    Lower,
}

/// Planner policy that the rule data alone does not determine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    /// Family that files without a rule are converted to
    pub fallback: CodecFamily,
    pub sample_rate_tie: TieBreak,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fallback: CodecFamily::Wav,
            sample_rate_tie: TieBreak::Higher,
        }
    }
}

/// On-disk shape of a rules file. Family names are kept as strings here so
/// an unknown family is reported as a validation error with its name.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    policy: Option<Policy>,
    #[serde(default)]
    rules: Option<BTreeMap<String, CompatibilityRule>>,
}

/// Read-only mapping from codec family to rule, plus the planner policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: BTreeMap<CodecFamily, CompatibilityRule>,
    policy: Policy,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::cdj()
    }
}

impl RuleTable {
    /// Built-in CDJ table. AAC, OGG and OPUS are deliberately absent.
    pub fn cdj() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(CodecFamily::Wav, CompatibilityRule::pcm(&[44100, 48000], &[16, 24]));
        rules.insert(CodecFamily::Aiff, CompatibilityRule::pcm(&[44100, 48000], &[16, 24]));
        rules.insert(CodecFamily::Flac, CompatibilityRule::pcm(&[44100, 48000], &[16, 24]));
        rules.insert(CodecFamily::Mp3, CompatibilityRule::lossy(&[44100], 32, Some(320)));
        rules.insert(CodecFamily::M4a, CompatibilityRule::lossy(&[44100, 48000], 256, None));

        Self {
            rules,
            policy: Policy::default(),
        }
    }

    /// Build a validated table.
    pub fn new(
        rules: BTreeMap<CodecFamily, CompatibilityRule>,
        policy: Policy,
    ) -> Result<Self, ConfigError> {
        let table = Self { rules, policy };
        table.validate()?;
        Ok(table)
    }

    pub fn lookup(&self, family: CodecFamily) -> Option<&CompatibilityRule> {
        self.rules.get(&family)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn rules(&self) -> impl Iterator<Item = (CodecFamily, &CompatibilityRule)> {
        self.rules.iter().map(|(family, rule)| (*family, rule))
    }

    /// Parse a rules file. A file without `[rules]` keeps the built-in table,
    /// one without `[policy]` keeps the default policy.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = toml::from_str(content)?;
        let defaults = Self::cdj();

        let rules = match file.rules {
            Some(raw) => {
                let mut rules = BTreeMap::new();
                for (name, rule) in raw {
                    let family = name.parse::<CodecFamily>().map_err(ConfigError::Invalid)?;
                    rules.insert(family, rule);
                }
                rules
            }
            None => defaults.rules,
        };

        Self::new(rules, file.policy.unwrap_or_default())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_toml_str(&content)?;
        debug!(
            "Loaded {} rule(s) from {}",
            table.rules.len(),
            path.display()
        );
        Ok(table)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let file = RuleFile {
            policy: Some(self.policy.clone()),
            rules: Some(
                self.rules
                    .iter()
                    .map(|(family, rule)| (family.extension().to_string(), rule.clone()))
                    .collect(),
            ),
        };
        Ok(toml::to_string_pretty(&file)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (family, rule) in &self.rules {
            rule.validate(*family)?;
        }

        let fallback = self.policy.fallback;
        let rule = self.lookup(fallback).ok_or_else(|| {
            ConfigError::Invalid(format!("fallback family {} has no rule", fallback))
        })?;

        // The fallback must name a concrete target for the planner
        if fallback.is_lossless() && rule.bit_depths.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "fallback family {} lists no bit depths",
                fallback
            )));
        }
        if !fallback.is_lossless() && rule.min_bitrate_kbps.is_none() {
            return Err(ConfigError::Invalid(format!(
                "fallback family {} has no minimum bitrate",
                fallback
            )));
        }

        Ok(())
    }
}
