//! Signed fixed-point formats for filter coefficients
//!
//! A coefficient `c` is stored as the 32-bit integer `c * 2^scale_bits`.
//! With `scale_bits = 30` (Q30) the representable range is [-2.0, 2.0),
//! which covers every coefficient of a non-resonant low-pass biquad.

use crate::domain::audio::{AudioError, Result};

/// Fixed-point format described by its number of fractional bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedPointFormat {
    scale_bits: u32,
}

impl FixedPointFormat {
    /// Q30: 2 integer bits (sign included), 30 fractional bits
    pub const Q30: Self = Self { scale_bits: 30 };

    /// Create a format with `scale_bits` fractional bits
    ///
    /// # Errors
    /// Returns [`AudioError::InvalidConfiguration`] unless `scale_bits` is in `1..=31`.
    pub fn new(scale_bits: u32) -> Result<Self> {
        if !(1..=31).contains(&scale_bits) {
            return Err(AudioError::InvalidConfiguration(format!(
                "fixed-point scale of {scale_bits} bits outside 1..=31"
            )));
        }
        Ok(Self { scale_bits })
    }

    pub const fn scale_bits(&self) -> u32 {
        self.scale_bits
    }

    /// Integer value that represents 1.0
    #[inline]
    pub const fn one(&self) -> i64 {
        1_i64 << self.scale_bits
    }

    /// Half of one unit, added before a shift to round to nearest
    #[inline]
    pub const fn half(&self) -> i64 {
        1_i64 << (self.scale_bits - 1)
    }

    /// Mask selecting the fractional bits of a scaled accumulator
    #[inline]
    pub const fn fraction_mask(&self) -> i64 {
        self.one() - 1
    }

    /// Scale factor as a float (`2^scale_bits`)
    #[inline]
    pub fn scale(&self) -> f64 {
        self.one() as f64
    }

    /// Smallest real value that saturates to `i32::MAX`
    #[inline]
    pub fn upper_bound(&self) -> f64 {
        (1_i64 << (31 - self.scale_bits)) as f64
    }

    /// Real values strictly below this saturate to `i32::MIN`
    #[inline]
    pub fn lower_bound(&self) -> f64 {
        -self.upper_bound()
    }

    /// Convert a real value to fixed point, saturating at the format bounds
    ///
    /// In-range values are scaled and truncated toward zero.
    pub fn quantize(&self, value: f64) -> i32 {
        if value >= self.upper_bound() {
            i32::MAX
        } else if value < self.lower_bound() {
            i32::MIN
        } else {
            // `as` saturates, which covers the sliver just below the upper bound
            (value * self.scale()) as i32
        }
    }

    /// Convert a fixed-point value back to a real number
    #[inline]
    pub fn to_real(&self, fixed: i32) -> f64 {
        fixed as f64 / self.scale()
    }
}

impl Default for FixedPointFormat {
    fn default() -> Self {
        Self::Q30
    }
}
