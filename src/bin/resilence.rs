//! resilence - create silent WAV files.

use std::process::ExitCode;

use anyhow::Result;
use av_rewavi::silence::{SilenceConfig, DEFAULT_CHANNELS, DEFAULT_LENGTH, DEFAULT_SAMPLE_RATE};
use av_rewavi::sink::{OutputTarget, Sink};
use clap::Parser;
use tracing::{error, info, Level};

/// Creates silent WAV files
#[derive(Parser)]
#[command(name = "resilence")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output WAV file name, "-" writes to stdout
    output: String,

    /// Length of the output stream in seconds
    #[arg(short, long, default_value_t = DEFAULT_LENGTH, allow_negative_numbers = true)]
    length: f64,

    /// Number of channels (1 to 32)
    #[arg(short, long, default_value_t = DEFAULT_CHANNELS)]
    channels: u32,

    /// Sample rate in Hz (up to 192000)
    #[arg(short, long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Bits per sample: 8, 16, 24 or 32 [default: 16]
    #[arg(short, long)]
    bits: Option<u32>,

    /// Use 32-bit floating-point samples; cannot be combined with another bit depth
    #[arg(short, long)]
    float: bool,

    /// Print debug diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: Cli) -> Result<()> {
    let config = SilenceConfig {
        length: cli.length,
        channels: cli.channels,
        sample_rate: cli.sample_rate,
        bits_per_sample: cli.bits,
        float: cli.float,
    };
    let job = config.plan()?;

    let target = OutputTarget::from(cli.output.as_str());
    let mut sink = Sink::open(&target)?;
    info!("Writing silence WAV file {target} ...");

    job.write(&mut sink)?;
    sink.finish()?;

    info!("WAV file written successfully.");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
