//! rewavi - extract the first PCM audio track of an AVI file as WAV.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use av_rewavi::avi::AviReader;
use av_rewavi::extract::{Extraction, OutputFormat};
use av_rewavi::plan::HeaderLayout;
use av_rewavi::sink::{OutputTarget, Sink};
use clap::Parser;
use tracing::{error, info, Level};

const CHANNEL_MASKS: &str = "\
The default channel masks are:

Mask  Ch.  MS channels                   Description
----  ---  ----------------------------  ----------------
   4   1                       FC        Mono
   3   2                          FR FL  Stereo
 259   3   BC                     FR FL  First Surround
  51   4              BR BL       FR FL  Quadro
  55   5              BR BL    FC FR FL  like Dpl II (without LFE)
  63   6              BR BL LF FC FR FL  Standard Surround
 319   7   BC         BR BL LF FC FR FL  With back center
 255   8      FLC FRC BR BL LF FC FR FL  With front center left/right

More than 8 channels default to the lowest N speaker positions.

Some other common channel masks:

Mask  Ch. MS channels                    Description
----  --- -----------------------------  ----------------
   7   3                       FC FR FL
 263   4  BC                   FC FR FL  like Dpl I
 271   5  BC                LF FC FR FL
  59   5              BR BL LF    FR FL

WAV files larger than 4 GB may be created. Their size fields are clamped,
so such files are non-standard and some players and encoders may not
handle them; a warning is printed when this happens.";

/// Extracts the first uncompressed PCM audio track of an AVI 1.0 file
#[derive(Parser)]
#[command(name = "rewavi")]
#[command(version, about, long_about = None, after_long_help = CHANNEL_MASKS)]
struct Cli {
    /// Input AVI 1.0 file
    input: PathBuf,

    /// Output file, "-" writes to stdout; without it only the track is described
    output: Option<String>,

    /// Write raw samples without a WAV header
    #[arg(short, long, conflicts_with = "extensible")]
    raw: bool,

    /// Write an extensible WAV header with a channel mask (decimal or 0x hex);
    /// the default mask for the channel count is used when none is given
    #[arg(short = 'x', long, value_name = "MASK", value_parser = parse_mask)]
    extensible: Option<Option<u32>>,

    /// Print debug diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn parse_mask(arg: &str) -> Result<u32, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => arg.parse(),
    };
    parsed.map_err(|err| format!("invalid channel mask '{arg}': {err}"))
}

fn run(cli: Cli) -> Result<()> {
    let output_format = match (cli.raw, cli.extensible) {
        (true, _) => OutputFormat::Raw,
        (false, Some(mask)) => OutputFormat::Extensible(mask),
        (false, None) => OutputFormat::Wav,
    };

    let mut source = AviReader::open(&cli.input)?;
    let mut job = Extraction::prepare(&source, output_format)?;

    let Some(output) = cli.output else {
        return Ok(());
    };

    let target = OutputTarget::from(output.as_str());
    let mut sink = Sink::open(&target)?;
    let kind = if job.layout() == HeaderLayout::Raw {
        "RAW"
    } else {
        "WAV"
    };
    info!("Writing {kind} file {target} ...");

    let mut stderr = std::io::stderr();
    let result = job.run(&mut source, &mut sink, |progress| {
        let _ = write!(
            stderr,
            "\rProgress: {}% ({}/{})",
            progress.percent, progress.done, progress.total
        );
    });
    let _ = writeln!(stderr);
    result?;
    sink.finish()?;

    info!("File written successfully.");
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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mask_values() {
        assert_eq!(parse_mask("63"), Ok(63));
        assert_eq!(parse_mask("0x3F"), Ok(63));
        assert!(parse_mask("surround").is_err());
    }

    #[test]
    fn output_modes() {
        let cli = Cli::parse_from(["rewavi", "in.avi", "out.wav", "-x", "0x33"]);
        assert_eq!(cli.extensible, Some(Some(0x33)));
        assert!(!cli.raw);

        let cli = Cli::parse_from(["rewavi", "in.avi", "out.wav", "-x"]);
        assert_eq!(cli.extensible, Some(None));

        let cli = Cli::parse_from(["rewavi", "in.avi"]);
        assert_eq!(cli.output, None);

        assert!(Cli::try_parse_from(["rewavi", "in.avi", "-", "-r", "-x"]).is_err());
    }
}
