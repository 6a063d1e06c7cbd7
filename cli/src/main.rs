use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mc202tape_core::{decode_audio, parse_payload_with_limit, MAX_TOTAL_LINES};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod source;

use source::WavSource;

#[derive(Parser)]
#[command(name = "mc202tape")]
#[command(about = "Decode Roland MC-202 cassette tape dumps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a WAV recording of a tape dump
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Also write the parsed sequence as JSON next to the input
        #[arg(long)]
        json: bool,

        /// Upper bound accepted for the line count
        #[arg(long, default_value_t = MAX_TOTAL_LINES)]
        max_lines: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            input,
            json,
            max_lines,
        } => decode_command(&input, json, max_lines),
    }
}

fn decode_command(input: &Path, json: bool, max_lines: u16) -> Result<()> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let reader = hound::WavReader::new(BufReader::new(file))
        .with_context(|| format!("reading WAV header of {}", input.display()))?;

    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        bail!("float WAV files are not supported; expected integer PCM");
    }
    debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "opened recording"
    );

    let mut source = WavSource::new(reader);
    let payload = decode_audio(&mut source).context("decoding tape audio")?;

    debug!("recovered {} payload bytes: {:02X?}", payload.len(), payload);

    let sequence =
        parse_payload_with_limit(&payload, max_lines).context("parsing tape payload")?;

    println!("{sequence}");

    if json {
        let out_path = input.with_extension("json");
        let pretty = serde_json::to_string_pretty(&sequence)?;
        std::fs::write(&out_path, pretty)
            .with_context(|| format!("writing {}", out_path.display()))?;
        println!("json written to {}", out_path.display());
    }

    Ok(())
}
