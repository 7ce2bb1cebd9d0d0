//! Biquad low-pass filtering for 16-bit PCM streams
//!
//! This module provides:
//! - Coefficient derivation from cutoff frequency, sample rate and Q
//!   (bilinear-transform low-pass), quantized to Q30 fixed point
//! - A biquad engine with a bit-exact integer track and an independent
//!   floating-point reference track
//! - Channel layouts that map an interleaved sample stream onto engines
//!
//! The integer track is deterministic across platforms. Its accumulator
//! carries the sub-unit residue of each output into the next sample, so
//! block boundaries never change the result.

use crate::domain::audio::{AudioError, ChannelCount, Result};
use crate::domain::fixed_point::FixedPointFormat;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// Parameter constraints for the low-pass topology
pub mod params {
    /// Highest Q that keeps the response maximally flat (no resonant peak)
    pub const Q_MAX: f64 = 0.707;

    /// Butterworth Q
    pub const DEFAULT_Q: f64 = 0.707;

    pub const DEFAULT_CUTOFF_HZ: f64 = 10_000.0;
    pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
}

// ============================================================================
// FILTER SPEC
// ============================================================================

/// Analog parameters of a second-order low-pass filter
///
/// Deserialized values go through [`FilterSpec::new`] and are range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterSpec")]
pub struct FilterSpec {
    cutoff_hz: f64,
    sample_rate: u32,
    q: f64,
}

#[derive(Deserialize)]
struct RawFilterSpec {
    cutoff_hz: f64,
    sample_rate: u32,
    q: f64,
}

impl TryFrom<RawFilterSpec> for FilterSpec {
    type Error = AudioError;

    fn try_from(raw: RawFilterSpec) -> Result<Self> {
        Self::new(raw.cutoff_hz, raw.sample_rate, raw.q)
    }
}

impl FilterSpec {
    /// Create a validated filter spec
    ///
    /// # Errors
    /// Returns [`AudioError::InvalidSpec`] unless `0 < cutoff_hz < sample_rate / 2`
    /// and `0 < q <= 0.707`.
    pub fn new(cutoff_hz: f64, sample_rate: u32, q: f64) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSpec("sample rate must be non-zero".to_string()));
        }

        let nyquist = sample_rate as f64 / 2.0;
        if !cutoff_hz.is_finite() || cutoff_hz <= 0.0 || cutoff_hz >= nyquist {
            return Err(AudioError::InvalidSpec(format!(
                "cutoff {cutoff_hz} Hz outside (0, {nyquist}) Hz"
            )));
        }

        if !q.is_finite() || q <= 0.0 || q > params::Q_MAX {
            return Err(AudioError::InvalidSpec(format!(
                "Q {q} outside (0, {}]",
                params::Q_MAX
            )));
        }

        Ok(Self::new_unchecked(cutoff_hz, sample_rate, q))
    }

    /// Create a spec without range checks
    ///
    /// Out-of-range parameters produce undefined or saturated coefficients
    /// instead of an error.
    pub fn new_unchecked(cutoff_hz: f64, sample_rate: u32, q: f64) -> Self {
        Self {
            cutoff_hz,
            sample_rate,
            q,
        }
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn q(&self) -> f64 {
        self.q
    }
}

// ============================================================================
// COEFFICIENTS
// ============================================================================

/// Floating-point biquad coefficients (a0 normalized to 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Bilinear-transform low-pass coefficients
    #[must_use]
    pub fn lowpass(spec: &FilterSpec) -> Self {
        let k = (PI * spec.cutoff_hz / spec.sample_rate as f64).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + k / spec.q + k2);

        let b0 = k2 * norm;

        Self {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / spec.q + k2) * norm,
        }
    }
}

/// Fixed-point biquad coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCoeffs {
    pub b0: i32,
    pub b1: i32,
    pub b2: i32,
    pub a1: i32,
    pub a2: i32,
}

/// Coefficients in both parallel forms, derived once per stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedCoefficients {
    pub float: BiquadCoeffs,
    pub fixed: FixedCoeffs,
    pub format: FixedPointFormat,
}

impl QuantizedCoefficients {
    /// Low-pass coefficients quantized to Q30
    pub fn lowpass(spec: &FilterSpec) -> Self {
        Self::lowpass_with_format(spec, FixedPointFormat::Q30)
    }

    /// Low-pass coefficients quantized to an arbitrary fixed-point format
    pub fn lowpass_with_format(spec: &FilterSpec, format: FixedPointFormat) -> Self {
        let float = BiquadCoeffs::lowpass(spec);

        // b2 mirrors b0 so the symmetric numerator stays exact
        let b0 = format.quantize(float.b0);
        let fixed = FixedCoeffs {
            b0,
            b1: format.quantize(float.b1),
            b2: b0,
            a1: format.quantize(float.a1),
            a2: format.quantize(float.a2),
        };

        debug!(
            cutoff_hz = spec.cutoff_hz,
            sample_rate = spec.sample_rate,
            q = spec.q,
            scale_bits = format.scale_bits(),
            ?fixed,
            "Low-pass coefficients computed"
        );

        Self {
            float,
            fixed,
            format,
        }
    }
}

// ============================================================================
// BIQUAD ENGINE
// ============================================================================

/// How the integer track scales its accumulator back to sample resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CarryPolicy {
    /// Round to nearest, then keep only the sign bit and the fractional
    /// bits of the accumulator for the next sample
    RoundAndReset,
    /// Truncate (floor) and carry the fractional bits into the next sample
    CarryRemainder,
}

impl CarryPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarryPolicy::RoundAndReset => "round-and-reset",
            CarryPolicy::CarryRemainder => "carry-remainder",
        }
    }
}

impl fmt::Display for CarryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CarryPolicy {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "round-and-reset" => Ok(CarryPolicy::RoundAndReset),
            "carry-remainder" => Ok(CarryPolicy::CarryRemainder),
            other => Err(AudioError::InvalidConfiguration(format!(
                "unknown carry policy '{other}'"
            ))),
        }
    }
}

/// Per-channel filter memory
///
/// Index 0 holds the n-1 value, index 1 the n-2 value. The integer and
/// floating tracks share the struct but never read each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    x: [i32; 2],
    y: [i32; 2],
    acc: i64,
    dx: [f64; 2],
    dy: [f64; 2],
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Residue carried from the last integer output into the next one
    pub fn residue(&self) -> i64 {
        self.acc
    }

    /// Integer input history `[x[n-1], x[n-2]]`
    pub fn input_history(&self) -> [i32; 2] {
        self.x
    }

    /// Integer output history `[y[n-1], y[n-2]]`
    pub fn output_history(&self) -> [i32; 2] {
        self.y
    }

    /// Floating output history `[y[n-1], y[n-2]]`
    pub fn reference_history(&self) -> [f64; 2] {
        self.dy
    }
}

/// Second-order low-pass filter over one stream of i16 samples
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadEngine {
    coeffs: QuantizedCoefficients,
    policy: CarryPolicy,
    state: FilterState,
}

impl BiquadEngine {
    /// Create an engine with zeroed state
    pub fn new(coeffs: QuantizedCoefficients, policy: CarryPolicy) -> Self {
        Self {
            coeffs,
            policy,
            state: FilterState::new(),
        }
    }

    pub fn coeffs(&self) -> &QuantizedCoefficients {
        &self.coeffs
    }

    pub fn policy(&self) -> CarryPolicy {
        self.policy
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Filter one sample on the integer track
    ///
    /// The output is the low 16 bits of the 32-bit result; values outside
    /// the i16 range wrap rather than clip.
    #[inline]
    pub fn process_fixed(&mut self, sample: i16) -> i16 {
        let c = &self.coeffs.fixed;
        let s = &mut self.state;
        let format = self.coeffs.format;

        let acc = s
            .acc
            .wrapping_add(c.b0 as i64 * sample as i64)
            .wrapping_add(c.b1 as i64 * s.x[0] as i64)
            .wrapping_add(c.b2 as i64 * s.x[1] as i64)
            .wrapping_sub(c.a1 as i64 * s.y[0] as i64)
            .wrapping_sub(c.a2 as i64 * s.y[1] as i64);

        let y = match self.policy {
            CarryPolicy::RoundAndReset => {
                let y = (acc.wrapping_add(format.half()) >> format.scale_bits()) as i32;
                // The kept sign bit drops out at the 32-bit truncation above
                s.acc = acc & (i64::MIN | format.fraction_mask());
                y
            }
            CarryPolicy::CarryRemainder => {
                let y = (acc >> format.scale_bits()) as i32;
                s.acc = acc & format.fraction_mask();
                y
            }
        };

        s.x[1] = s.x[0];
        s.x[0] = sample as i32;
        s.y[1] = s.y[0];
        s.y[0] = y;

        y as i16
    }

    /// Filter one sample on the floating reference track
    ///
    /// No scaling and no carry: the result is truncated toward zero and
    /// saturated to the i16 range.
    #[inline]
    pub fn process_reference(&mut self, sample: i16) -> i16 {
        let c = &self.coeffs.float;
        let s = &mut self.state;
        let x = sample as f64;

        let y = c.b0 * x + c.b1 * s.dx[0] + c.b2 * s.dx[1] - c.a1 * s.dy[0] - c.a2 * s.dy[1];

        s.dx[1] = s.dx[0];
        s.dx[0] = x;
        s.dy[1] = s.dy[0];
        s.dy[0] = y;

        y as i16
    }

    /// Filter a buffer in place on the integer track
    pub fn process(&mut self, buffer: &mut [i16]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_fixed(*sample);
        }
    }

    /// Clear both tracks and the residue
    pub fn reset(&mut self) {
        self.state = FilterState::new();
    }
}

// ============================================================================
// CHANNEL LAYOUTS
// ============================================================================

/// Maps an interleaved sample stream onto filter engines
///
/// Implementations keep their position in the stream across calls, so a
/// stream may be split into blocks of any size.
pub trait BlockFilter: Send {
    /// Filter a block of interleaved samples in place
    fn process(&mut self, block: &mut [i16]);

    /// Return to the start-of-stream state
    fn reset(&mut self);

    /// Layout name for logging
    fn name(&self) -> &str;
}

/// How samples of an interleaved stream are assigned to filter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelLayout {
    /// One engine per channel, integer track only
    Independent,
    /// One shared engine over a stereo stream: left samples on the integer
    /// track, right samples emitted as reference minus integer output
    InterleavedDifference,
}

impl ChannelLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelLayout::Independent => "independent",
            ChannelLayout::InterleavedDifference => "interleaved-difference",
        }
    }

    /// Build the block filter for this layout
    ///
    /// # Errors
    /// [`ChannelLayout::InterleavedDifference`] needs a stereo stream.
    pub fn build(
        &self,
        channels: ChannelCount,
        coeffs: QuantizedCoefficients,
        policy: CarryPolicy,
    ) -> Result<Box<dyn BlockFilter>> {
        match self {
            ChannelLayout::Independent => Ok(Box::new(ChannelBank::new(channels, coeffs, policy))),
            ChannelLayout::InterleavedDifference => {
                if channels != ChannelCount::Stereo {
                    return Err(AudioError::InvalidConfiguration(format!(
                        "{} layout needs 2 channels, got {}",
                        self.as_str(),
                        channels.count()
                    )));
                }
                Ok(Box::new(InterleavedDifference::new(coeffs, policy)))
            }
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ChannelLayout {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "independent" => Ok(ChannelLayout::Independent),
            "interleaved-difference" => Ok(ChannelLayout::InterleavedDifference),
            other => Err(AudioError::InvalidConfiguration(format!(
                "unknown channel layout '{other}'"
            ))),
        }
    }
}

/// Independent integer-track engine per channel
///
/// Channel index is the stream position modulo the channel count.
#[derive(Debug, Clone)]
pub struct ChannelBank {
    engines: Vec<BiquadEngine>,
    cursor: usize,
}

impl ChannelBank {
    pub fn new(channels: ChannelCount, coeffs: QuantizedCoefficients, policy: CarryPolicy) -> Self {
        let engines = (0..channels.count())
            .map(|_| BiquadEngine::new(coeffs, policy))
            .collect();

        Self { engines, cursor: 0 }
    }
}

impl BlockFilter for ChannelBank {
    fn process(&mut self, block: &mut [i16]) {
        let channels = self.engines.len();
        for sample in block.iter_mut() {
            *sample = self.engines[self.cursor].process_fixed(*sample);
            self.cursor = (self.cursor + 1) % channels;
        }
        trace!(samples = block.len(), next_channel = self.cursor, "Block filtered");
    }

    fn reset(&mut self) {
        for engine in &mut self.engines {
            engine.reset();
        }
        self.cursor = 0;
    }

    fn name(&self) -> &str {
        "independent"
    }
}

/// Shared-state stereo layout with a difference channel
///
/// Even positions: integer-track output. Odd positions: reference-track
/// output minus the integer output emitted just before it, wrapped to i16.
/// Both tracks live in the same [`FilterState`].
#[derive(Debug, Clone)]
pub struct InterleavedDifference {
    engine: BiquadEngine,
    odd: bool,
    last_fixed: i16,
}

impl InterleavedDifference {
    pub fn new(coeffs: QuantizedCoefficients, policy: CarryPolicy) -> Self {
        Self {
            engine: BiquadEngine::new(coeffs, policy),
            odd: false,
            last_fixed: 0,
        }
    }
}

impl BlockFilter for InterleavedDifference {
    fn process(&mut self, block: &mut [i16]) {
        for sample in block.iter_mut() {
            if self.odd {
                let reference = self.engine.process_reference(*sample);
                *sample = reference.wrapping_sub(self.last_fixed);
            } else {
                self.last_fixed = self.engine.process_fixed(*sample);
                *sample = self.last_fixed;
            }
            self.odd = !self.odd;
        }
        trace!(samples = block.len(), "Block filtered");
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.odd = false;
        self.last_fixed = 0;
    }

    fn name(&self) -> &str {
        "interleaved-difference"
    }
}
