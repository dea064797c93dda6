//! Codec families and the technical record extracted from each file
//!
//! A [`TechnicalRecord`] is the only input the compatibility engine sees.
//! Whether a file is judged on bit depth or on bitrate is carried by its
//! [`Encoding`], so a record can never hold both (or neither).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Container/encoding category that a compatibility rule is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecFamily {
    Wav,
    Aiff,
    Flac,
    Mp3,
    M4a,
    Aac,
    Ogg,
    Opus,
}

impl CodecFamily {
    pub const ALL: [CodecFamily; 8] = [
        CodecFamily::Wav,
        CodecFamily::Aiff,
        CodecFamily::Flac,
        CodecFamily::Mp3,
        CodecFamily::M4a,
        CodecFamily::Aac,
        CodecFamily::Ogg,
        CodecFamily::Opus,
    ];

    /// Map a file extension (without the dot, any case) to its family.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(CodecFamily::Wav),
            "aif" | "aiff" => Some(CodecFamily::Aiff),
            "flac" => Some(CodecFamily::Flac),
            "mp3" => Some(CodecFamily::Mp3),
            "m4a" | "mp4" => Some(CodecFamily::M4a),
            "aac" => Some(CodecFamily::Aac),
            "ogg" | "oga" => Some(CodecFamily::Ogg),
            "opus" => Some(CodecFamily::Opus),
            _ => None,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Lossless families are judged on bit depth, everything else on bitrate.
    pub fn is_lossless(self) -> bool {
        matches!(self, CodecFamily::Wav | CodecFamily::Aiff | CodecFamily::Flac)
    }

    /// Extension written for converted output.
    pub fn extension(self) -> &'static str {
        match self {
            CodecFamily::Wav => "wav",
            CodecFamily::Aiff => "aiff",
            CodecFamily::Flac => "flac",
            CodecFamily::Mp3 => "mp3",
            CodecFamily::M4a => "m4a",
            CodecFamily::Aac => "aac",
            CodecFamily::Ogg => "ogg",
            CodecFamily::Opus => "opus",
        }
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CodecFamily::Wav => "WAV",
            CodecFamily::Aiff => "AIFF",
            CodecFamily::Flac => "FLAC",
            CodecFamily::Mp3 => "MP3",
            CodecFamily::M4a => "M4A",
            CodecFamily::Aac => "AAC",
            CodecFamily::Ogg => "OGG",
            CodecFamily::Opus => "OPUS",
        })
    }
}

impl FromStr for CodecFamily {
    type Err = String;

    /// Parse the lowercase family name used in rule files (`wav`, `m4a`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CodecFamily::ALL
            .into_iter()
            .find(|family| family.extension() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown codec family '{}'", s))
    }
}

/// How the audio payload is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoding {
    /// Uncompressed or lossless PCM
    Pcm { bit_depth: u16 },
    /// Lossy stream, average bitrate in kbps
    Lossy { bitrate_kbps: u32 },
}

impl Encoding {
    pub fn bit_depth(&self) -> Option<u16> {
        match *self {
            Encoding::Pcm { bit_depth } => Some(bit_depth),
            Encoding::Lossy { .. } => None,
        }
    }

    pub fn bitrate_kbps(&self) -> Option<u32> {
        match *self {
            Encoding::Pcm { .. } => None,
            Encoding::Lossy { bitrate_kbps } => Some(bitrate_kbps),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Pcm { bit_depth } => write!(f, "{}-bit", bit_depth),
            Encoding::Lossy { bitrate_kbps } => write!(f, "{}kbps", bitrate_kbps),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalRecord {
    pub path: PathBuf,
    pub family: CodecFamily,
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub encoding: Encoding,
    pub duration_secs: f64,
    pub size_bytes: u64,
}

impl TechnicalRecord {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}
