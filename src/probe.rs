//! Technical metadata extraction
//!
//! [`MetadataSource`] is the seam between the filesystem and the engine: it
//! turns a path into a [`TechnicalRecord`] or a [`ScanError`]. The shipped
//! implementation, [`SymphoniaProbe`], reads container headers with symphonia
//! and never decodes audio.
//!
//! Lossless families report bit depth from the codec parameters. Lossy
//! families report an average bitrate computed from the demuxed packets
//! (payload bytes over stream duration), which excludes tags and artwork.

use crate::error::ScanError;
use crate::format::{CodecFamily, Encoding, TechnicalRecord};
use std::fs::File;
use std::path::Path;
use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Extraction collaborator: one record or one error per path.
pub trait MetadataSource: Sync {
    fn extract(&self, path: &Path) -> Result<TechnicalRecord, ScanError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaProbe;

impl SymphoniaProbe {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataSource for SymphoniaProbe {
    fn extract(&self, path: &Path) -> Result<TechnicalRecord, ScanError> {
        let family = CodecFamily::from_path(path)
            .ok_or_else(|| ScanError::new(path, "unrecognised file extension"))?;

        let size_bytes = std::fs::metadata(path)
            .map_err(|e| ScanError::new(path, format!("cannot stat file: {}", e)))?
            .len();
        let file =
            File::open(path).map_err(|e| ScanError::new(path, format!("cannot open: {}", e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        hint.with_extension(family.extension());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ScanError::new(path, format!("unreadable container: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ScanError::new(path, "no audio track"))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate_hz = params
            .sample_rate
            .filter(|&rate| rate > 0)
            .ok_or_else(|| ScanError::new(path, "sample rate not reported"))?;
        let channels = channel_count(&params)
            .ok_or_else(|| ScanError::new(path, "channel count not reported"))?;

        let (encoding, duration_secs) = if family.is_lossless() {
            let bit_depth = params
                .bits_per_sample
                .or(params.bits_per_coded_sample)
                .ok_or_else(|| ScanError::new(path, "bit depth not reported"))?;
            let frames = match params.n_frames {
                Some(n) => n,
                None => scan_packets(format.as_mut(), track_id)
                    .map_err(|e| ScanError::new(path, e))?
                    .frames,
            };
            (
                Encoding::Pcm {
                    bit_depth: bit_depth as u16,
                },
                frames as f64 / f64::from(sample_rate_hz),
            )
        } else {
            let totals =
                scan_packets(format.as_mut(), track_id).map_err(|e| ScanError::new(path, e))?;
            let duration_secs = totals.frames as f64 / f64::from(sample_rate_hz);
            if duration_secs <= 0.0 {
                return Err(ScanError::new(path, "stream has no audio packets"));
            }
            (
                Encoding::Lossy {
                    bitrate_kbps: average_kbps(totals.bytes, duration_secs),
                },
                duration_secs,
            )
        };

        debug!(
            "{}: {} {}Hz {} {}ch {:.1}s",
            path.display(),
            family,
            sample_rate_hz,
            encoding,
            channels,
            duration_secs
        );

        Ok(TechnicalRecord {
            path: path.to_path_buf(),
            family,
            sample_rate_hz,
            channels,
            encoding,
            duration_secs,
            size_bytes,
        })
    }
}

fn channel_count(params: &CodecParameters) -> Option<u16> {
    params
        .channels
        .map(|c| c.count())
        .or_else(|| params.channel_layout.map(|l| l.into_channels().count()))
        .filter(|&n| n > 0)
        .map(|n| n as u16)
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct PacketTotals {
    frames: u64,
    bytes: u64,
}

/// Walk every packet of a track without decoding, summing duration (in
/// frames) and payload size.
fn scan_packets(format: &mut dyn FormatReader, track_id: u32) -> Result<PacketTotals, String> {
    let mut totals = PacketTotals::default();
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    totals.frames += packet.dur;
                    totals.bytes += packet.buf().len() as u64;
                }
            }
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(format!("corrupt stream: {}", e)),
        }
    }
    Ok(totals)
}

fn average_kbps(bytes: u64, duration_secs: f64) -> u32 {
    (bytes as f64 * 8.0 / duration_secs / 1000.0).round() as u32
}
