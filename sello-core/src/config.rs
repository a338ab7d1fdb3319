use std::path::PathBuf;
use std::time::Duration;

/// How the amplitude perturbation interacts with the watermark bit write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Perturbation {
    /// Perturb and saturate first, then write the LSB. The watermark bit is
    /// always the last write to a carrier sample.
    #[default]
    BeforeMark,
    /// Perturb only samples that carry no watermark bit.
    SkipCarriers,
    /// Write the LSB, then perturb. An odd `floor(sample * weight)` flips
    /// the bit that was just written.
    AfterMark,
    /// No perturbation at all.
    Disabled,
}

/// Configuration for watermark embedding.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Amplitude perturbation weight, in `[0, 1)`. Default: 0.01.
    pub weight: f64,
    /// Ordering of perturbation relative to the LSB write.
    pub perturbation: Perturbation,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            weight: 0.01,
            perturbation: Perturbation::BeforeMark,
        }
    }
}

impl EmbedConfig {
    /// Plain LSB embedding with no amplitude perturbation.
    pub fn lsb_only() -> Self {
        Self {
            weight: 0.0,
            perturbation: Perturbation::Disabled,
        }
    }
}

/// Lossy codecs the ffmpeg transcoder knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossyCodec {
    Mp3,
    Aac,
    Opus,
}

impl LossyCodec {
    /// ffmpeg encoder name.
    pub fn encoder(self) -> &'static str {
        match self {
            LossyCodec::Mp3 => "libmp3lame",
            LossyCodec::Aac => "aac",
            LossyCodec::Opus => "libopus",
        }
    }

    /// Container extension for the intermediate lossy file.
    pub fn extension(self) -> &'static str {
        match self {
            LossyCodec::Mp3 => "mp3",
            LossyCodec::Aac => "m4a",
            LossyCodec::Opus => "ogg",
        }
    }
}

/// Configuration for the external transcoder process.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Executable to invoke. Default: `ffmpeg` from PATH.
    pub program: PathBuf,
    pub codec: LossyCodec,
    /// Target bitrate passed to `-b:a`, e.g. "128k".
    pub bitrate: String,
    /// Upper bound for each child process. The child is killed on expiry.
    pub timeout: Duration,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            codec: LossyCodec::Mp3,
            bitrate: "128k".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Configuration for manifest-driven batch embedding.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Source folder for rows labelled `real`.
    pub real_dir: PathBuf,
    /// Source folder for rows labelled `fake`.
    pub fake_dir: PathBuf,
    /// Destination for `<stem>_watermarked.wav` files.
    pub output_dir: PathBuf,
    pub embed: EmbedConfig,
    /// Accept files too short to carry the whole identifier.
    pub allow_partial: bool,
}

impl BatchConfig {
    pub fn new(
        real_dir: impl Into<PathBuf>,
        fake_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            real_dir: real_dir.into(),
            fake_dir: fake_dir.into(),
            output_dir: output_dir.into(),
            embed: EmbedConfig::default(),
            allow_partial: false,
        }
    }
}
