//! Example comparing the two carry policies on an impulse and a DC step
//!
//! Run with: cargo run --package quadfilter-core --example filter_demo

use quadfilter_core::domain::{
    BiquadEngine, CarryPolicy, FilterSpec, QuadfilterConfig, QuantizedCoefficients,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("quadfilter_core=debug,info")
        .init();

    println!("=== Quadfilter Carry Policy Demo ===\n");

    let config = QuadfilterConfig::stereo_lowpass();
    println!("1. Configuration (TOML):\n");
    println!("{}", toml::to_string_pretty(&config)?);

    let spec = FilterSpec::new(
        config.filter.cutoff_hz,
        config.stream.sample_rate,
        config.filter.q,
    )?;
    let coeffs = QuantizedCoefficients::lowpass(&spec);
    println!("2. Q30 coefficients: {:?}\n", coeffs.fixed);

    println!("3. Impulse response (first 12 samples):");
    for policy in [CarryPolicy::RoundAndReset, CarryPolicy::CarryRemainder] {
        let mut signal = vec![0i16; 12];
        signal[0] = i16::MAX;
        BiquadEngine::new(coeffs, policy).process(&mut signal);
        println!("   {policy:>16}: {signal:?}");
    }

    println!("\n4. Settled output for a DC input of 1000:");
    for policy in [CarryPolicy::RoundAndReset, CarryPolicy::CarryRemainder] {
        let mut engine = BiquadEngine::new(coeffs, policy);
        let mut signal = vec![1_000i16; 20_000];
        engine.process(&mut signal);
        println!(
            "   {policy:>16}: {} (residue {:#x})",
            signal[signal.len() - 1],
            engine.state().residue()
        );
    }

    Ok(())
}
