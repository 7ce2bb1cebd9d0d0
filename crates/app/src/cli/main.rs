//! Quadfilter CLI Application

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use quadfilter_core::domain::{CarryPolicy, ChannelLayout, QuadfilterConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quadfilter")]
#[command(about = "Fixed-point biquad low-pass filter for 16-bit PCM WAV files", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Filter a WAV file, copying its header verbatim
    Process {
        /// Input WAV file
        #[arg(default_value = "TestSound3.wav")]
        input: PathBuf,

        /// Output WAV file (created or truncated)
        #[arg(default_value = "Output.wav")]
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        stream: StreamArgs,
    },

    /// Print the floating and fixed-point coefficients
    Coeffs {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Write a configuration file with the factory defaults
    InitConfig {
        path: PathBuf,

        /// Use the 200 Hz per-channel preset instead
        #[arg(long)]
        stereo: bool,
    },
}

/// Options that determine the coefficients
#[derive(Args)]
struct FilterArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cutoff frequency in Hz
    #[arg(long)]
    cutoff: Option<f64>,

    /// Quality factor (0 < Q <= 0.707)
    #[arg(long)]
    q: Option<f64>,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Filter with saturated coefficients instead of rejecting out-of-range parameters
    #[arg(long)]
    no_validate: bool,
}

/// Options that only matter when a stream is filtered
#[derive(Args)]
struct StreamArgs {
    /// Interleaved channel count (1 or 2)
    #[arg(long)]
    channels: Option<u16>,

    /// Samples per I/O block
    #[arg(long)]
    block_size: Option<usize>,

    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    #[arg(long, value_enum)]
    carry: Option<CarryArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Independent,
    InterleavedDifference,
}

impl From<LayoutArg> for ChannelLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Independent => ChannelLayout::Independent,
            LayoutArg::InterleavedDifference => ChannelLayout::InterleavedDifference,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CarryArg {
    RoundAndReset,
    CarryRemainder,
}

impl From<CarryArg> for CarryPolicy {
    fn from(arg: CarryArg) -> Self {
        match arg {
            CarryArg::RoundAndReset => CarryPolicy::RoundAndReset,
            CarryArg::CarryRemainder => CarryPolicy::CarryRemainder,
        }
    }
}

impl FilterArgs {
    /// Load the config file (or factory default) and apply command-line values
    async fn resolve(self) -> anyhow::Result<QuadfilterConfig> {
        let mut config = match &self.config {
            Some(path) => QuadfilterConfig::load_from_file(path)
                .await
                .with_context(|| format!("Error loading config {}", path.display()))?,
            None => QuadfilterConfig::factory_default(),
        };

        if let Some(cutoff) = self.cutoff {
            config.filter.cutoff_hz = cutoff;
        }
        if let Some(q) = self.q {
            config.filter.q = q;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.stream.sample_rate = sample_rate;
        }
        if self.no_validate {
            config.stream.validate = false;
        }

        Ok(config)
    }
}

impl StreamArgs {
    fn apply(self, config: &mut QuadfilterConfig) {
        if let Some(carry) = self.carry {
            config.filter.carry = carry.into();
        }
        if let Some(channels) = self.channels {
            config.stream.channels = channels;
        }
        if let Some(block_size) = self.block_size {
            config.stream.block_size = block_size;
        }
        if let Some(layout) = self.layout {
            config.stream.layout = layout.into();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Process {
            input,
            output,
            filter,
            stream,
        } => {
            let mut config = filter.resolve().await?;
            stream.apply(&mut config);
            let mut processor = config
                .build_processor()
                .context("Error configuring filter")?;

            tracing::info!(
                input = %input.display(),
                output = %output.display(),
                "Quadfilter starting"
            );

            let stats = tokio::task::spawn_blocking(move || processor.run_files(&input, &output))
                .await
                .context("Filter task failed")??;

            tracing::info!(samples = stats.samples, blocks = stats.blocks, "Done");
        }

        Command::Coeffs { filter } => {
            let config = filter.resolve().await?;
            let coeffs = config.coefficients().context("Error computing coefficients")?;

            println!(
                "cutoff {} Hz, Q {}, sample rate {} Hz, Q{} fixed point",
                config.filter.cutoff_hz,
                config.filter.q,
                config.stream.sample_rate,
                coeffs.format.scale_bits()
            );
            let f = coeffs.float;
            let x = coeffs.fixed;
            for (name, float, fixed) in [
                ("b0", f.b0, x.b0),
                ("b1", f.b1, x.b1),
                ("b2", f.b2, x.b2),
                ("a1", f.a1, x.a1),
                ("a2", f.a2, x.a2),
            ] {
                let stored = coeffs.format.to_real(fixed);
                println!("{name} = {float:>22.17} {fixed:>12} {stored:>22.17}");
            }
        }

        Command::InitConfig { path, stereo } => {
            let config = if stereo {
                QuadfilterConfig::stereo_lowpass()
            } else {
                QuadfilterConfig::factory_default()
            };
            config
                .save_to_file(&path)
                .await
                .with_context(|| format!("Error writing config {}", path.display()))?;
        }
    }

    Ok(())
}
