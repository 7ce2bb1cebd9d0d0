//! Configuration management for Quadfilter
//!
//! This module provides:
//! - Filter and stream configuration structs with TOML serialization
//! - Factory presets for the two supported filtering setups
//! - Conversion of a configuration into a ready-to-run stream processor

use crate::domain::audio::{AudioError, ChannelCount};
use crate::domain::dsp::{params, CarryPolicy, ChannelLayout, FilterSpec, QuantizedCoefficients};
use crate::domain::stream::{StreamProcessor, DEFAULT_BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Low-pass filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Cutoff frequency in Hz
    pub cutoff_hz: f64,

    /// Quality factor, 0 < Q <= 0.707
    pub q: f64,

    /// Residue handling of the integer track
    pub carry: CarryPolicy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: params::DEFAULT_CUTOFF_HZ,
            q: params::DEFAULT_Q,
            carry: CarryPolicy::RoundAndReset,
        }
    }
}

/// PCM stream parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz (not read from the header)
    pub sample_rate: u32,

    /// Interleaved channels, 1 or 2
    pub channels: u16,

    /// Samples per I/O block
    pub block_size: usize,

    /// Mapping of interleaved samples onto filter state
    pub layout: ChannelLayout,

    /// Reject cutoff/Q values outside the low-pass range instead of
    /// filtering with saturated coefficients
    pub validate: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: params::DEFAULT_SAMPLE_RATE,
            channels: 2,
            block_size: DEFAULT_BLOCK_SIZE,
            layout: ChannelLayout::InterleavedDifference,
            validate: true,
        }
    }
}

/// Complete Quadfilter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadfilterConfig {
    pub filter: FilterConfig,
    pub stream: StreamConfig,
}

impl QuadfilterConfig {
    /// Factory default: 10 kHz low-pass with the stereo difference channel
    pub fn factory_default() -> Self {
        Self::default()
    }

    /// 200 Hz low-pass applied to each channel independently
    pub fn stereo_lowpass() -> Self {
        Self {
            filter: FilterConfig {
                cutoff_hz: 200.0,
                q: params::DEFAULT_Q,
                carry: CarryPolicy::CarryRemainder,
            },
            stream: StreamConfig {
                layout: ChannelLayout::Independent,
                ..StreamConfig::default()
            },
        }
    }

    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Filter spec described by this configuration
    ///
    /// With `stream.validate` off, out-of-range values pass through.
    pub fn filter_spec(&self) -> Result<FilterSpec> {
        let (fc, fs, q) = (self.filter.cutoff_hz, self.stream.sample_rate, self.filter.q);
        if self.stream.validate {
            Ok(FilterSpec::new(fc, fs, q)?)
        } else {
            Ok(FilterSpec::new_unchecked(fc, fs, q))
        }
    }

    pub fn channel_count(&self) -> Result<ChannelCount> {
        Ok(ChannelCount::from_count(self.stream.channels)?)
    }

    /// Coefficients for this configuration, computed once per stream
    pub fn coefficients(&self) -> Result<QuantizedCoefficients> {
        Ok(QuantizedCoefficients::lowpass(&self.filter_spec()?))
    }

    /// Build a stream processor for this configuration
    pub fn build_processor(&self) -> Result<StreamProcessor> {
        let coeffs = self.coefficients()?;
        let channels = self.channel_count()?;
        let filter = self
            .stream
            .layout
            .build(channels, coeffs, self.filter.carry)?;

        info!(
            cutoff_hz = self.filter.cutoff_hz,
            q = self.filter.q,
            sample_rate = self.stream.sample_rate,
            channels = self.stream.channels,
            layout = %self.stream.layout,
            carry = %self.filter.carry,
            "Filter configured"
        );

        let processor = StreamProcessor::new(filter, self.stream.block_size)?
            .with_expected_format(self.stream.channels, self.stream.sample_rate);
        Ok(processor)
    }
}
