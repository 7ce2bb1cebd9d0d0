//! Quadfilter core: fixed-point biquad low-pass filtering of 16-bit PCM WAV streams

pub mod domain;
