//! Lossy transcoding collaborators.
//!
//! The robustness harness only sees the [`Transcoder`] trait. The shipped
//! implementation shells out to `ffmpeg`; each invocation is an independent
//! child process bounded by [`TranscoderConfig::timeout`].

use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::buffer::{SampleBuffer, SampleWidth};
use crate::config::TranscoderConfig;
use crate::error::{Error, Result};
use crate::wav;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A lossy transform applied to watermarked audio.
pub trait Transcoder {
    fn transcode(&self, buffer: &SampleBuffer) -> Result<SampleBuffer>;
}

impl<F> Transcoder for F
where
    F: Fn(&SampleBuffer) -> Result<SampleBuffer>,
{
    fn transcode(&self, buffer: &SampleBuffer) -> Result<SampleBuffer> {
        self(buffer)
    }
}

/// Compress and decompress through an external `ffmpeg` executable.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Convert any input ffmpeg understands (MP3, FLAC, ...) to 16-bit PCM WAV.
    pub fn convert_to_pcm(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(&[
            OsStr::new("-i"),
            input.as_os_str(),
            OsStr::new("-c:a"),
            OsStr::new("pcm_s16le"),
            output.as_os_str(),
        ])?;
        require_output(output)
    }

    /// Encode `input_wav` with the configured lossy codec and decode it back
    /// to PCM at `output_wav`, keeping the channel count, rate and width.
    ///
    /// The intermediate lossy file is written next to `output_wav`.
    pub fn round_trip_file(
        &self,
        input_wav: &Path,
        output_wav: &Path,
        width: SampleWidth,
        channels: u16,
        sample_rate: u32,
    ) -> Result<()> {
        let codec = self.config.codec;
        let lossy = output_wav.with_extension(codec.extension());

        self.run(&[
            OsStr::new("-i"),
            input_wav.as_os_str(),
            OsStr::new("-c:a"),
            OsStr::new(codec.encoder()),
            OsStr::new("-b:a"),
            OsStr::new(&self.config.bitrate),
            lossy.as_os_str(),
        ])?;
        require_output(&lossy)?;

        let channels = OsString::from(channels.to_string());
        let rate = OsString::from(sample_rate.to_string());
        self.run(&[
            OsStr::new("-i"),
            lossy.as_os_str(),
            OsStr::new("-c:a"),
            OsStr::new(pcm_encoder(width)),
            OsStr::new("-ac"),
            channels.as_os_str(),
            OsStr::new("-ar"),
            rate.as_os_str(),
            output_wav.as_os_str(),
        ])?;
        require_output(output_wav)
    }

    fn run(&self, args: &[&OsStr]) -> Result<()> {
        let program = &self.config.program;
        tracing::debug!(program = %program.display(), ?args, "starting transcoder");

        let mut child = Command::new(program)
            .args(["-y", "-nostdin", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::TranscoderFailure(format!("failed to start {}: {e}", program.display()))
            })?;

        // Drain stderr on a separate thread so a chatty child cannot block on a full pipe.
        let stderr = child.stderr.take();
        let drain = thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut text);
            }
            text
        });

        let status = match wait_with_timeout(&mut child, self.config.timeout) {
            Ok(status) => status,
            Err(e) => {
                reap(&mut child);
                let _ = drain.join();
                return Err(e);
            }
        };
        let stderr = drain.join().unwrap_or_default();

        match status {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(Error::TranscoderFailure(format!(
                "{} exited with {status}: {}",
                program.display(),
                stderr.trim()
            ))),
            None => Err(Error::TranscoderFailure(format!(
                "{} timed out after {:?}",
                program.display(),
                self.config.timeout
            ))),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, buffer: &SampleBuffer) -> Result<SampleBuffer> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("watermarked.wav");
        let output = dir.path().join("decoded.wav");

        wav::encode(buffer, &input)?;
        self.round_trip_file(
            &input,
            &output,
            buffer.width(),
            buffer.channels(),
            buffer.sample_rate(),
        )?;
        wav::decode(&output)
    }
}

/// Poll the child until it exits or `timeout` elapses. On timeout the child
/// is killed and reaped and `None` is returned.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            reap(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the child if it is still running and collect its exit status.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn require_output(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(Error::TranscoderFailure(format!(
            "expected output {} was not produced",
            path.display()
        ))),
    }
}

fn pcm_encoder(width: SampleWidth) -> &'static str {
    match width {
        SampleWidth::Bits8 => "pcm_u8",
        SampleWidth::Bits16 => "pcm_s16le",
        SampleWidth::Bits24 => "pcm_s24le",
        SampleWidth::Bits32 => "pcm_s32le",
    }
}
