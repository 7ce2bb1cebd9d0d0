//! Domain entities and filtering rules

pub mod audio;
pub mod config;
pub mod dsp;
pub mod fixed_point;
pub mod stream;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, ChannelCount, DeclaredFormat, WavHeader, WAV_HEADER_SIZE};
pub use config::{ConfigError, FilterConfig, QuadfilterConfig, StreamConfig};
pub use dsp::{
    BiquadCoeffs, BiquadEngine, BlockFilter, CarryPolicy, ChannelBank, ChannelLayout,
    FilterSpec, FilterState, FixedCoeffs, InterleavedDifference, QuantizedCoefficients,
};
pub use fixed_point::FixedPointFormat;
pub use stream::{StreamProcessor, StreamStats, DEFAULT_BLOCK_SIZE};
