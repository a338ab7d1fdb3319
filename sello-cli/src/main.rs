use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sello_core::identifier::bits_to_string;
use sello_core::{
    BatchConfig, EmbedConfig, FfmpegTranscoder, Identifier, LossyCodec, Perturbation,
    RobustnessOutcome, SampleBuffer, TranscoderConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sello", about = "LSB audio watermarking tool", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed an identifier into a PCM WAV file
    Embed {
        /// Input audio file (WAV, or anything ffmpeg reads with --convert)
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        /// Identifier as a hex string
        #[arg(long)]
        id: String,

        #[command(flatten)]
        embed: EmbedArgs,

        /// Convert non-WAV input to PCM with ffmpeg first
        #[arg(long)]
        convert: bool,

        /// Write the file even if it is too short for the whole identifier
        #[arg(long)]
        allow_partial: bool,
    },
    /// Read an identifier back from a WAV file
    Extract {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Number of hex digits to read
        #[arg(short, long)]
        digits: usize,

        /// Expected identifier; prints the bit error rate against it
        #[arg(long)]
        expect: Option<String>,
    },
    /// Embed, run a lossy encode/decode round trip and report the bit error rate
    Robustness {
        /// Input audio file (WAV, or anything ffmpeg reads with --convert)
        #[arg(short, long)]
        input: PathBuf,

        /// Identifier as a hex string
        #[arg(long)]
        id: String,

        #[command(flatten)]
        embed: EmbedArgs,

        #[command(flatten)]
        transcoder: TranscoderArgs,

        /// Convert non-WAV input to PCM with ffmpeg first
        #[arg(long)]
        convert: bool,
    },
    /// Watermark every file listed in a CSV manifest
    Batch {
        /// Manifest with unique_hex_code, audio_file_name and label columns
        #[arg(short, long)]
        manifest: PathBuf,

        /// Folder holding files labelled "real"
        #[arg(long)]
        real_dir: PathBuf,

        /// Folder holding files labelled "fake"
        #[arg(long)]
        fake_dir: PathBuf,

        /// Folder for watermarked output
        #[arg(short, long, default_value = "watermarked_files")]
        output_dir: PathBuf,

        #[command(flatten)]
        embed: EmbedArgs,

        /// Convert non-WAV sources to PCM with ffmpeg first
        #[arg(long)]
        convert: bool,

        /// Accept files too short for the whole identifier
        #[arg(long)]
        allow_partial: bool,
    },
}

#[derive(clap::Args)]
struct EmbedArgs {
    /// Amplitude perturbation weight, in [0, 1)
    #[arg(short, long, default_value = "0.01")]
    weight: f64,

    /// Ordering of perturbation and LSB write
    #[arg(long, value_enum, default_value = "before-mark")]
    perturbation: PerturbationArg,
}

impl EmbedArgs {
    fn to_config(&self) -> EmbedConfig {
        EmbedConfig {
            weight: self.weight,
            perturbation: self.perturbation.into(),
        }
    }
}

#[derive(clap::Args)]
struct TranscoderArgs {
    /// Lossy codec for the round trip
    #[arg(long, value_enum, default_value = "mp3")]
    codec: CodecArg,

    /// Target bitrate
    #[arg(short, long, default_value = "128k")]
    bitrate: String,

    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Per-invocation timeout (seconds)
    #[arg(long, default_value = "120")]
    timeout_seconds: u64,
}

impl TranscoderArgs {
    fn to_config(&self) -> TranscoderConfig {
        TranscoderConfig {
            program: self.ffmpeg.clone(),
            codec: self.codec.into(),
            bitrate: self.bitrate.clone(),
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PerturbationArg {
    BeforeMark,
    SkipCarriers,
    AfterMark,
    Disabled,
}

impl From<PerturbationArg> for Perturbation {
    fn from(arg: PerturbationArg) -> Self {
        match arg {
            PerturbationArg::BeforeMark => Perturbation::BeforeMark,
            PerturbationArg::SkipCarriers => Perturbation::SkipCarriers,
            PerturbationArg::AfterMark => Perturbation::AfterMark,
            PerturbationArg::Disabled => Perturbation::Disabled,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecArg {
    Mp3,
    Aac,
    Opus,
}

impl From<CodecArg> for LossyCodec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Mp3 => LossyCodec::Mp3,
            CodecArg::Aac => LossyCodec::Aac,
            CodecArg::Opus => LossyCodec::Opus,
        }
    }
}

fn load_audio(input: &Path, convert: bool) -> Result<SampleBuffer, Box<dyn std::error::Error>> {
    let is_wav = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if is_wav || !convert {
        return Ok(sello_core::wav::decode(input)?);
    }
    tracing::info!(input = %input.display(), "converting to PCM with ffmpeg");
    let dir = tempfile::tempdir()?;
    let converted = dir.path().join("converted.wav");
    FfmpegTranscoder::default().convert_to_pcm(input, &converted)?;
    Ok(sello_core::wav::decode(&converted)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Embed {
            input,
            output,
            id,
            embed,
            convert,
            allow_partial,
        } => {
            let id = Identifier::parse(&id)?;
            let buffer = load_audio(&input, convert)?;
            tracing::info!(
                input = %input.display(),
                samples = buffer.len(),
                channels = buffer.channels(),
                sample_rate = buffer.sample_rate(),
                "embedding watermark"
            );

            let mut result = sello_core::embed(&buffer, &id, &embed.to_config())?;
            if !allow_partial {
                result = result.require_complete()?;
            }
            sello_core::wav::encode(&result.buffer, &output)?;

            tracing::info!(output = %output.display(), "watermarked audio written");
            println!("Identifier: {id}");
            println!("Embedded:   {}/{} bits", result.embedded_bits, result.requested_bits);
        }
        Command::Extract {
            input,
            digits,
            expect,
        } => {
            let buffer = sello_core::wav::decode(&input)?;
            let decoded = sello_core::extract(&buffer, digits)?;
            println!("Identifier: {}", decoded.identifier);
            println!("Bits:       {}", bits_to_string(&decoded.bits));
            if let Some(expect) = expect {
                let expected = Identifier::parse(&expect)?;
                let ber = sello_core::bit_error_rate(&expected.to_bits(), &decoded.bits)?;
                println!("BER:        {ber:.1}%");
            }
        }
        Command::Robustness {
            input,
            id,
            embed,
            transcoder,
            convert,
        } => {
            let id = Identifier::parse(&id)?;
            let buffer = load_audio(&input, convert)?;
            let embedded =
                sello_core::embed(&buffer, &id, &embed.to_config())?.require_complete()?;

            let transcoder_config = transcoder.to_config();
            tracing::info!(
                codec = transcoder_config.codec.encoder(),
                bitrate = %transcoder_config.bitrate,
                "running lossy round trip"
            );
            let ffmpeg = FfmpegTranscoder::new(transcoder_config);

            match sello_core::measure_robustness(&id, &embedded.buffer, &ffmpeg)? {
                RobustnessOutcome::Measured(report) => {
                    println!("Original: {}", bits_to_string(&report.original));
                    println!("Decoded:  {}", bits_to_string(&report.decoded));
                    println!("Recovered identifier: {}", report.decoded_identifier);
                    println!("Bit Error Rate (BER): {:.1}%", report.bit_error_rate);
                    if !report.format_preserved {
                        eprintln!("Warning: transcoder changed the audio format.");
                    }
                }
                RobustnessOutcome::TranscoderFailure(reason) => {
                    eprintln!("Transcoder failed: {reason}");
                    std::process::exit(2);
                }
            }
        }
        Command::Batch {
            manifest,
            real_dir,
            fake_dir,
            output_dir,
            embed,
            convert,
            allow_partial,
        } => {
            let mut config = BatchConfig::new(real_dir, fake_dir, output_dir);
            config.embed = embed.to_config();
            config.allow_partial = allow_partial;
            let converter = convert.then(FfmpegTranscoder::default);

            let summary =
                sello_core::batch::process_manifest(&manifest, &config, converter.as_ref())?;
            println!(
                "Watermarked: {}  Skipped: {}  Missing: {}  Failed: {}",
                summary.watermarked(),
                summary.skipped(),
                summary.missing(),
                summary.failed()
            );
            println!("Manifest updated: {}", manifest.display());
        }
    }

    Ok(())
}
