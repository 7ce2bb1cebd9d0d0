//! PCM stream abstractions and domain models
//!
//! The WAV container is treated as an opaque 44-byte header followed by a
//! body of interleaved signed 16-bit little-endian samples. Nothing here
//! parses or rewrites the header; [`WavHeader::declared_format`] only peeks
//! at the canonical fields so callers can warn about a mismatch.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Size of the canonical PCM WAV header in bytes
pub const WAV_HEADER_SIZE: usize = 44;

/// Size of one PCM sample in bytes
pub const BYTES_PER_SAMPLE: usize = 2;

/// Errors that can occur while filtering a PCM stream
#[derive(Debug, Error)]
pub enum AudioError {
    /// Input or output file could not be opened
    #[error("Error opening {role} file {}: {source}", path.display())]
    FileOpen {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The 44-byte header could not be read in full
    #[error("Error reading input file (header): {0}")]
    HeaderRead(#[source] std::io::Error),

    /// The 44-byte header could not be written
    #[error("Error writing output file (header): {0}")]
    HeaderWrite(#[source] std::io::Error),

    /// Reading a block of the sample body failed
    #[error("Error reading input file (body): {0}")]
    BodyRead(#[source] std::io::Error),

    /// Writing a block of the sample body failed
    #[error("Error writing output file (body): {0}")]
    BodyWrite(#[source] std::io::Error),

    /// Filter parameters outside the range the low-pass topology supports
    #[error("Invalid filter spec: {0}")]
    InvalidSpec(String),

    /// Stream parameters that cannot be honored
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Number of interleaved channels in the sample body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
}

impl ChannelCount {
    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
        }
    }

    pub fn from_count(count: u16) -> Result<Self> {
        match count {
            1 => Ok(ChannelCount::Mono),
            2 => Ok(ChannelCount::Stereo),
            n => Err(AudioError::InvalidConfiguration(format!(
                "unsupported channel count {n} (expected 1 or 2)"
            ))),
        }
    }
}

/// Channel count and sample rate as declared by a canonical header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Verbatim copy of the leading 44 bytes of a WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader([u8; WAV_HEADER_SIZE]);

impl WavHeader {
    pub fn new(bytes: [u8; WAV_HEADER_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; WAV_HEADER_SIZE] {
        &self.0
    }

    /// Peek at the `fmt ` fields of a canonical header
    ///
    /// Returns `None` when the RIFF/WAVE/fmt markers are not where a
    /// canonical header keeps them.
    pub fn declared_format(&self) -> Option<DeclaredFormat> {
        let b = &self.0;
        if &b[0..4] != b"RIFF" || &b[8..12] != b"WAVE" || &b[12..16] != b"fmt " {
            return None;
        }

        Some(DeclaredFormat {
            channels: u16::from_le_bytes([b[22], b[23]]),
            sample_rate: u32::from_le_bytes([b[24], b[25], b[26], b[27]]),
        })
    }
}

#[cfg(test)]
pub(crate) fn canonical_header(channels: u16, sample_rate: u32, data_len: u32) -> WavHeader {
    let mut b = [0u8; WAV_HEADER_SIZE];
    b[0..4].copy_from_slice(b"RIFF");
    b[4..8].copy_from_slice(&(36 + data_len).to_le_bytes());
    b[8..12].copy_from_slice(b"WAVE");
    b[12..16].copy_from_slice(b"fmt ");
    b[16..20].copy_from_slice(&16u32.to_le_bytes());
    b[20..22].copy_from_slice(&1u16.to_le_bytes());
    b[22..24].copy_from_slice(&channels.to_le_bytes());
    b[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    let block_align = channels * BYTES_PER_SAMPLE as u16;
    b[28..32].copy_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    b[32..34].copy_from_slice(&block_align.to_le_bytes());
    b[34..36].copy_from_slice(&16u16.to_le_bytes());
    b[36..40].copy_from_slice(b"data");
    b[40..44].copy_from_slice(&data_len.to_le_bytes());
    WavHeader::new(b)
}
