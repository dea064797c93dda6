//! Conversion through an external `ffmpeg` process
//!
//! The converter writes a new file at an output path chosen by
//! [`OutputLayout`](super::layout::OutputLayout) and never touches the source. Encoder arguments are built by [`ffmpeg_args`], a pure
//! function, so the mapping from [`TargetProfile`] to ffmpeg flags is testable
//! without ffmpeg installed.

use super::{RemediationPlan, TargetProfile};
use crate::error::ConversionError;
use crate::format::{CodecFamily, Encoding};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Converter {
    ffmpeg: PathBuf,
    overwrite: bool,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    pub fn new() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            overwrite: false,
        }
    }

    pub fn with_ffmpeg<P: Into<PathBuf>>(mut self, ffmpeg: P) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Check that the ffmpeg binary runs at all.
    pub fn check_available(&self) -> Result<(), ConversionError> {
        let output = Command::new(&self.ffmpeg)
            .arg("-version")
            .output()
            .map_err(|e| {
                ConversionError::new(
                    &self.ffmpeg,
                    format!("ffmpeg is not installed or not on PATH: {}", e),
                )
            })?;

        if !output.status.success() {
            return Err(ConversionError::new(
                &self.ffmpeg,
                format!("ffmpeg -version exited with {}", output.status),
            ));
        }
        Ok(())
    }

    /// Convert `plan.source` into `output`, creating its directory if
    /// needed. Returns the path of the written file.
    pub fn convert(
        &self,
        plan: &RemediationPlan,
        output: &Path,
    ) -> Result<PathBuf, ConversionError> {
        let source = &plan.source;
        let output = output.to_path_buf();
        let dest_dir = output.parent().unwrap_or(Path::new("."));

        if is_same_file(source, &output) {
            return Err(ConversionError::new(
                source,
                format!("output {} would overwrite the source", output.display()),
            ));
        }
        if output.exists() && !self.overwrite {
            return Err(ConversionError::new(
                source,
                format!("{} already exists (use --overwrite)", output.display()),
            ));
        }

        std::fs::create_dir_all(dest_dir).map_err(|e| {
            ConversionError::new(
                source,
                format!("cannot create {}: {}", dest_dir.display(), e),
            )
        })?;

        let args = ffmpeg_args(source, &plan.target, &output);
        debug!("Running {} {:?}", self.ffmpeg.display(), args);

        let start = Instant::now();
        let result = Command::new(&self.ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| {
                ConversionError::new(
                    source,
                    format!("failed to execute {}: {}", self.ffmpeg.display(), e),
                )
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!("ffmpeg failed for {}: {}", source.display(), stderr.trim());
            return Err(ConversionError::new(
                source,
                format!("ffmpeg exited with {}: {}", result.status, last_line(&stderr)),
            ));
        }

        if !output.exists() {
            return Err(ConversionError::new(
                source,
                format!("ffmpeg reported success but {} is missing", output.display()),
            ));
        }

        info!(
            "Converted {} -> {} ({}) in {:.1}s",
            source.display(),
            output.display(),
            plan.target,
            start.elapsed().as_secs_f64()
        );
        Ok(output)
    }
}

/// Full ffmpeg argument list for one conversion.
pub fn ffmpeg_args(source: &Path, target: &TargetProfile, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(source.as_os_str().to_os_string());

    // Audio only; cover art streams break WAV/AIFF muxers
    for arg in ["-vn", "-map_metadata", "0"] {
        args.push(arg.into());
    }

    for arg in codec_args(target.family, target.encoding) {
        args.push(arg.into());
    }

    args.push("-ar".into());
    args.push(target.sample_rate_hz.to_string().into());
    args.push("-ac".into());
    args.push(target.channels.to_string().into());

    // Existing outputs were already checked by the caller
    args.push("-y".into());
    args.push(output.as_os_str().to_os_string());
    args
}

fn codec_args(family: CodecFamily, encoding: Encoding) -> Vec<String> {
    let bitrate = |kbps: u32| vec!["-b:a".to_string(), format!("{}k", kbps)];

    match (family, encoding) {
        (CodecFamily::Wav, Encoding::Pcm { bit_depth }) => {
            vec!["-c:a".into(), pcm_codec(bit_depth, "le")]
        }
        (CodecFamily::Aiff, Encoding::Pcm { bit_depth }) => {
            vec!["-c:a".into(), pcm_codec(bit_depth, "be")]
        }
        (CodecFamily::Flac, Encoding::Pcm { bit_depth }) => {
            let mut args = vec!["-c:a".to_string(), "flac".to_string()];
            if bit_depth <= 16 {
                args.extend(["-sample_fmt".to_string(), "s16".to_string()]);
            } else {
                args.extend([
                    "-sample_fmt".to_string(),
                    "s32".to_string(),
                    "-bits_per_raw_sample".to_string(),
                    bit_depth.min(24).to_string(),
                ]);
            }
            args
        }
        (family, encoding) => {
            let codec = match family {
                CodecFamily::Mp3 => "libmp3lame",
                CodecFamily::M4a | CodecFamily::Aac => "aac",
                CodecFamily::Ogg => "libvorbis",
                CodecFamily::Opus => "libopus",
                // Lossless families with a lossy target cannot come out of
                // the planner; let ffmpeg pick its default PCM codec.
                CodecFamily::Wav | CodecFamily::Aiff | CodecFamily::Flac => return vec![],
            };
            let mut args = vec!["-c:a".to_string(), codec.to_string()];
            if let Encoding::Lossy { bitrate_kbps } = encoding {
                args.extend(bitrate(bitrate_kbps));
            }
            args
        }
    }
}

fn pcm_codec(bit_depth: u16, endian: &str) -> String {
    match bit_depth {
        0..=8 if endian == "le" => "pcm_u8".to_string(),
        0..=8 => "pcm_s8".to_string(),
        9..=16 => format!("pcm_s16{}", endian),
        17..=24 => format!("pcm_s24{}", endian),
        _ => format!("pcm_s32{}", endian),
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(source: &str, target: TargetProfile) -> RemediationPlan {
        RemediationPlan {
            source: PathBuf::from(source),
            target,
            reasons: vec![],
        }
    }

    fn wav(sample_rate_hz: u32, bit_depth: u16) -> TargetProfile {
        TargetProfile {
            family: CodecFamily::Wav,
            sample_rate_hz,
            channels: 2,
            encoding: Encoding::Pcm { bit_depth },
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    // ==========================================================================
    // ARGUMENT BUILDING
    // ==========================================================================

    #[test]
    fn test_wav_args() {
        let args = strings(&ffmpeg_args(
            Path::new("in.wav"),
            &wav(48000, 24),
            Path::new("out/in.wav"),
        ));

        assert!(has_pair(&args, "-i", "in.wav"));
        assert!(has_pair(&args, "-c:a", "pcm_s24le"));
        assert!(has_pair(&args, "-ar", "48000"));
        assert!(has_pair(&args, "-ac", "2"));
        assert_eq!(args.last().map(String::as_str), Some("out/in.wav"));
    }

    #[test]
    fn test_aiff_is_big_endian() {
        let target = TargetProfile {
            family: CodecFamily::Aiff,
            ..wav(44100, 16)
        };
        let args = strings(&ffmpeg_args(Path::new("a.aif"), &target, Path::new("a.aiff")));
        assert!(has_pair(&args, "-c:a", "pcm_s16be"));
    }

    #[test]
    fn test_flac_24_bit_args() {
        let target = TargetProfile {
            family: CodecFamily::Flac,
            ..wav(48000, 24)
        };
        let args = strings(&ffmpeg_args(Path::new("a.flac"), &target, Path::new("b.flac")));
        assert!(has_pair(&args, "-c:a", "flac"));
        assert!(has_pair(&args, "-sample_fmt", "s32"));
        assert!(has_pair(&args, "-bits_per_raw_sample", "24"));
    }

    #[test]
    fn test_m4a_bitrate_args() {
        let target = TargetProfile {
            family: CodecFamily::M4a,
            sample_rate_hz: 44100,
            channels: 2,
            encoding: Encoding::Lossy { bitrate_kbps: 256 },
        };
        let args = strings(&ffmpeg_args(Path::new("a.m4a"), &target, Path::new("b.m4a")));
        assert!(has_pair(&args, "-c:a", "aac"));
        assert!(has_pair(&args, "-b:a", "256k"));
    }

    #[test]
    fn test_mp3_uses_lame() {
        let target = TargetProfile {
            family: CodecFamily::Mp3,
            sample_rate_hz: 44100,
            channels: 2,
            encoding: Encoding::Lossy { bitrate_kbps: 320 },
        };
        let args = strings(&ffmpeg_args(Path::new("a.mp3"), &target, Path::new("b.mp3")));
        assert!(has_pair(&args, "-c:a", "libmp3lame"));
        assert!(has_pair(&args, "-b:a", "320k"));
    }

    #[test]
    fn test_pcm_codec_names() {
        assert_eq!(pcm_codec(8, "le"), "pcm_u8");
        assert_eq!(pcm_codec(16, "le"), "pcm_s16le");
        assert_eq!(pcm_codec(24, "be"), "pcm_s24be");
        assert_eq!(pcm_codec(32, "le"), "pcm_s32le");
    }

    // ==========================================================================
    // OUTPUT PATHS
    // ==========================================================================

    #[test]
    fn test_refuses_to_overwrite_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("track.wav");
        std::fs::write(&source, b"RIFF").unwrap();

        let p = plan(source.to_str().unwrap(), wav(44100, 16));
        let err = Converter::new()
            .with_overwrite(true)
            .convert(&p, &source)
            .unwrap_err();

        assert!(err.reason.contains("overwrite the source"), "got: {}", err);
        assert_eq!(std::fs::read(&source).unwrap(), b"RIFF");
    }

    #[test]
    fn test_existing_output_needs_overwrite() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("track.flac");
        std::fs::write(&source, b"fLaC").unwrap();
        std::fs::write(out_dir.path().join("track.wav"), b"old").unwrap();

        let p = plan(source.to_str().unwrap(), wav(44100, 16));
        let err = Converter::new()
            .convert(&p, &out_dir.path().join("track.wav"))
            .unwrap_err();

        assert!(err.reason.contains("already exists"), "got: {}", err);
    }

    #[test]
    fn test_missing_ffmpeg_is_conversion_error() {
        let converter = Converter::new().with_ffmpeg("/nonexistent/bin/ffmpeg-cdjcheck");
        assert!(converter.check_available().is_err());

        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("track.flac");
        std::fs::write(&source, b"fLaC").unwrap();

        let p = plan(source.to_str().unwrap(), wav(44100, 16));
        let output = out_dir.path().join("nested").join("track.wav");
        let err = converter.convert(&p, &output).unwrap_err();

        assert!(err.reason.contains("failed to execute"), "got: {}", err);
        // Destination is created before ffmpeg runs
        assert!(out_dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_last_line_skips_blank_lines() {
        assert_eq!(last_line("first\nError opening input\n\n"), "Error opening input");
        assert_eq!(last_line(""), "no output");
    }
}
