//! Integration tests for the file-to-file filtering pipeline
//!
//! These tests go through real files: configuration on disk, a canonical
//! WAV input, and the filtered output.

use quadfilter_core::domain::{
    AudioError, BiquadEngine, CarryPolicy, ChannelLayout, ConfigError, QuadfilterConfig,
    QuantizedCoefficients, WAV_HEADER_SIZE,
};
use std::path::Path;
use tempfile::TempDir;

fn wav_bytes(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;

    let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE + samples.len() * 2);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

fn read_body(path: &Path) -> Vec<i16> {
    let bytes = std::fs::read(path).unwrap();
    bytes[WAV_HEADER_SIZE..]
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn generate_sine_wave(frequency: f64, sample_rate: u32, frames: usize, amplitude: f64) -> Vec<i16> {
    (0..frames)
        .map(|i| 2.0 * std::f64::consts::PI * frequency * i as f64 / sample_rate as f64)
        .map(|phase| (phase.sin() * amplitude) as i16)
        .collect()
}

fn rms(samples: &[i16]) -> f64 {
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}

// ============================================================================
// END-TO-END SCENARIOS
// ============================================================================

#[test]
fn test_four_sample_stereo_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");

    let source = wav_bytes(2, 48000, &[100, -100, 200, -200]);
    std::fs::write(&input, &source).unwrap();

    let mut config = QuadfilterConfig::stereo_lowpass();
    config.filter.cutoff_hz = 200.0;

    let stats = config.build_processor().unwrap().run_files(&input, &output).unwrap();
    assert_eq!(stats.samples, 4);

    let written = std::fs::read(&output).unwrap();
    assert_eq!(&written[..WAV_HEADER_SIZE], &source[..WAV_HEADER_SIZE]);
    assert_eq!(written.len(), source.len());
}

#[test]
fn test_factory_default_difference_channel() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");

    // Identical left and right: the right channel becomes the residual
    // between the floating and fixed-point tracks, which stays tiny
    let mono = generate_sine_wave(440.0, 48000, 4_800, 8_000.0);
    let stereo: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();
    std::fs::write(&input, wav_bytes(2, 48000, &stereo)).unwrap();

    QuadfilterConfig::factory_default()
        .build_processor()
        .unwrap()
        .run_files(&input, &output)
        .unwrap();

    let body = read_body(&output);
    let left: Vec<i16> = body.iter().step_by(2).copied().collect();
    let right: Vec<i16> = body.iter().skip(1).step_by(2).copied().collect();

    assert!(rms(&left) > 4_000.0, "440 Hz passes a 10 kHz low-pass");
    assert!(right.iter().all(|&r| r.abs() <= 2), "residual too large");
}

#[test]
fn test_low_pass_attenuates_high_frequencies() {
    let dir = TempDir::new().unwrap();
    let low_in = dir.path().join("low.wav");
    let high_in = dir.path().join("high.wav");
    let low_out = dir.path().join("low_out.wav");
    let high_out = dir.path().join("high_out.wav");

    let stereo_sine = |frequency: f64| -> Vec<u8> {
        let mono = generate_sine_wave(frequency, 48000, 9_600, 10_000.0);
        let stereo: Vec<i16> = mono.iter().flat_map(|&x| [x, x]).collect();
        wav_bytes(2, 48000, &stereo)
    };
    std::fs::write(&low_in, stereo_sine(50.0)).unwrap();
    std::fs::write(&high_in, stereo_sine(5_000.0)).unwrap();

    let config = QuadfilterConfig::stereo_lowpass();
    config.build_processor().unwrap().run_files(&low_in, &low_out).unwrap();
    config.build_processor().unwrap().run_files(&high_in, &high_out).unwrap();

    // Skip the settling period
    let low_rms = rms(&read_body(&low_out)[4_800..]);
    let high_rms = rms(&read_body(&high_out)[4_800..]);

    assert!(low_rms > 6_000.0, "50 Hz passband rms {low_rms}");
    assert!(high_rms < 100.0, "5 kHz stopband rms {high_rms}");
}

#[test]
fn test_mono_independent_matches_engine() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");

    let samples = generate_sine_wave(1_000.0, 48000, 2_345, 20_000.0);
    std::fs::write(&input, wav_bytes(1, 48000, &samples)).unwrap();

    let mut config = QuadfilterConfig::stereo_lowpass();
    config.stream.channels = 1;
    config.stream.block_size = 64;
    config.build_processor().unwrap().run_files(&input, &output).unwrap();

    let coeffs = QuantizedCoefficients::lowpass(&config.filter_spec().unwrap());
    let mut expected = samples.clone();
    BiquadEngine::new(coeffs, CarryPolicy::CarryRemainder).process(&mut expected);

    assert_eq!(read_body(&output), expected);
}

#[test]
fn test_header_mismatch_still_copies_verbatim() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");

    // Header says 44.1 kHz, configuration says 48 kHz
    let source = wav_bytes(2, 44_100, &[1, 2, 3, 4, 5, 6]);
    std::fs::write(&input, &source).unwrap();

    QuadfilterConfig::stereo_lowpass()
        .build_processor()
        .unwrap()
        .run_files(&input, &output)
        .unwrap();

    let written = std::fs::read(&output).unwrap();
    assert_eq!(&written[..WAV_HEADER_SIZE], &source[..WAV_HEADER_SIZE]);
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn test_truncated_header() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("short.wav");
    std::fs::write(&input, [0u8; 10]).unwrap();

    let result = QuadfilterConfig::factory_default()
        .build_processor()
        .unwrap()
        .run_files(&input, &dir.path().join("out.wav"));

    assert!(matches!(result, Err(AudioError::HeaderRead(_))));
}

#[test]
fn test_unwritable_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.wav");
    std::fs::write(&input, wav_bytes(2, 48000, &[0, 0])).unwrap();

    // A directory cannot be opened as the output file
    let result = QuadfilterConfig::factory_default()
        .build_processor()
        .unwrap()
        .run_files(&input, dir.path());

    assert!(matches!(result, Err(AudioError::FileOpen { role: "output", .. })));
}

// ============================================================================
// CONFIGURATION ON DISK
// ============================================================================

#[tokio::test]
async fn test_config_file_drives_processing() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("quadfilter.toml");
    std::fs::write(
        &config_path,
        r#"
        [filter]
        cutoff_hz = 200.0
        carry = "carry-remainder"

        [stream]
        layout = "independent"
        block_size = 10
        "#,
    )
    .unwrap();

    let config = QuadfilterConfig::load_from_file(&config_path).await.unwrap();
    assert_eq!(config.stream.layout, ChannelLayout::Independent);
    assert_eq!(config, {
        let mut expected = QuadfilterConfig::stereo_lowpass();
        expected.stream.block_size = 10;
        expected
    });

    let input = dir.path().join("in.wav");
    let output = dir.path().join("out.wav");
    std::fs::write(&input, wav_bytes(2, 48000, &vec![1_000; 50_000])).unwrap();

    let stats = config.build_processor().unwrap().run_files(&input, &output).unwrap();
    assert_eq!(stats.blocks, 5_000);

    // Remainder carry settles exactly on the DC input
    let body = read_body(&output);
    assert!(body[40_000..].iter().all(|&s| s == 1_000));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("bad.toml");
    std::fs::write(&config_path, "[filter]\nq = 2.0\n").unwrap();

    let config = QuadfilterConfig::load_from_file(&config_path).await.unwrap();
    assert!(matches!(
        config.build_processor(),
        Err(ConfigError::Audio(AudioError::InvalidSpec(_)))
    ));
}
