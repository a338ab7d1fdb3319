//! RIFF/WAVE integer PCM adapter.
//!
//! Only uncompressed integer PCM is decoded here. Compressed input (MP3,
//! FLAC, ...) must first be converted with
//! [`FfmpegTranscoder::convert_to_pcm`](crate::transcode::FfmpegTranscoder::convert_to_pcm).

use std::io::BufWriter;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::buffer::{SampleBuffer, SampleWidth};
use crate::error::{Error, Result};

/// Decode a WAV file into a [`SampleBuffer`].
pub fn decode(path: impl AsRef<Path>) -> Result<SampleBuffer> {
    let path = path.as_ref();
    let reader = hound::WavReader::open(path).map_err(|e| classify(e, path))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int {
        return Err(Error::UnsupportedFormat(format!(
            "{}: floating-point WAV",
            path.display()
        )));
    }
    let width = SampleWidth::from_bits(spec.bits_per_sample)?;

    let samples = reader
        .into_samples::<i32>()
        .collect::<std::result::Result<Vec<i32>, _>>()
        .map_err(|e| classify(e, path))?;

    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "decoded PCM"
    );

    SampleBuffer::new(samples, width, spec.channels, spec.sample_rate)
}

/// Encode a [`SampleBuffer`] to a WAV file with the buffer's own format.
///
/// The data is written to a temporary file next to `path` and renamed into
/// place once complete, so a failed write never leaves a truncated file.
pub fn encode(buffer: &SampleBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: buffer.width().bits(),
        sample_format: hound::SampleFormat::Int,
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = hound::WavWriter::new(BufWriter::new(tmp.as_file_mut()), spec)?;
        for &s in buffer.samples() {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!(path = %path.display(), samples = buffer.len(), "encoded PCM");
    Ok(())
}

fn classify(err: hound::Error, path: &Path) -> Error {
    match err {
        hound::Error::IoError(e) => Error::Io(e),
        hound::Error::FormatError(msg) => {
            Error::UnsupportedFormat(format!("{}: {msg}", path.display()))
        }
        hound::Error::Unsupported => {
            Error::UnsupportedFormat(format!("{}: not integer PCM", path.display()))
        }
        other => Error::Wav(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_24bit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let samples: Vec<i32> = (0..200).map(|i| (i - 100) * 40_000).collect();
        let buffer = SampleBuffer::new(samples, SampleWidth::Bits24, 2, 96000).unwrap();

        encode(&buffer, &path).unwrap();
        let back = decode(&path).unwrap();

        assert_eq!(back, buffer);
        assert_eq!(back.frame_count(), 100);
    }

    #[test]
    fn eight_bit_keeps_signed_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("u8.wav");
        let buffer = SampleBuffer::new(vec![-128, -1, 0, 1, 127], SampleWidth::Bits8, 1, 8000)
            .unwrap();

        encode(&buffer, &path).unwrap();
        assert_eq!(decode(&path).unwrap().samples(), buffer.samples());
    }

    #[test]
    fn non_riff_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.mp3");
        std::fs::write(&path, b"ID3\x04\x00\x00\x00\x00\x00\x00not a wave file").unwrap();

        assert!(matches!(decode(&path), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn float_wav_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(decode(&path), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            decode(dir.path().join("absent.wav")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn failed_encode_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.wav");
        let buffer = SampleBuffer::mono_i16(&[1, 2, 3], 44100);

        assert!(matches!(encode(&buffer, &path), Err(Error::Io(_))));
        assert!(!path.exists());
    }
}
