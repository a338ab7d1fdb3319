use crate::error::{Error, Result};

/// Bit depth of integer PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleWidth {
    Bits8,
    Bits16,
    Bits24,
    Bits32,
}

impl SampleWidth {
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            8 => Ok(SampleWidth::Bits8),
            16 => Ok(SampleWidth::Bits16),
            24 => Ok(SampleWidth::Bits24),
            32 => Ok(SampleWidth::Bits32),
            other => Err(Error::UnsupportedFormat(format!(
                "{other}-bit integer PCM"
            ))),
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            SampleWidth::Bits8 => 8,
            SampleWidth::Bits16 => 16,
            SampleWidth::Bits24 => 24,
            SampleWidth::Bits32 => 32,
        }
    }

    /// Smallest representable sample, `-2^(w-1)`.
    pub fn min_value(self) -> i32 {
        match self {
            SampleWidth::Bits32 => i32::MIN,
            w => -(1i32 << (w.bits() - 1)),
        }
    }

    /// Largest representable sample, `2^(w-1) - 1`.
    pub fn max_value(self) -> i32 {
        match self {
            SampleWidth::Bits32 => i32::MAX,
            w => (1i32 << (w.bits() - 1)) - 1,
        }
    }

    /// Saturate a wide intermediate value into this width's range.
    pub fn saturate(self, value: i64) -> i32 {
        value.clamp(self.min_value() as i64, self.max_value() as i64) as i32
    }
}

/// Decoded integer PCM audio.
///
/// Samples are stored interleaved (frame-major) as `i32` regardless of the
/// on-disk width; every stored value lies inside the width's range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    samples: Vec<i32>,
    width: SampleWidth,
    channels: u16,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build a buffer, rejecting sample counts that are not a whole number of
    /// frames and values outside the width's range.
    pub fn new(
        samples: Vec<i32>,
        width: SampleWidth,
        channels: u16,
        sample_rate: u32,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(Error::UnsupportedFormat("zero channels".to_string()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::UnsupportedFormat(format!(
                "{} samples do not form whole {channels}-channel frames",
                samples.len()
            )));
        }
        let (lo, hi) = (width.min_value(), width.max_value());
        if let Some(bad) = samples.iter().find(|&&s| s < lo || s > hi) {
            return Err(Error::UnsupportedFormat(format!(
                "sample {bad} outside {}-bit range",
                width.bits()
            )));
        }
        Ok(Self {
            samples,
            width,
            channels,
            sample_rate,
        })
    }

    /// Mono 16-bit buffer, the reference format.
    pub fn mono_i16(samples: &[i16], sample_rate: u32) -> Self {
        Self {
            samples: samples.iter().map(|&s| s as i32).collect(),
            width: SampleWidth::Bits16,
            channels: 1,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i32> {
        self.samples
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total interleaved samples (`frame_count * channels`).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True if both buffers share width, channel count and sample rate.
    pub fn same_format(&self, other: &SampleBuffer) -> bool {
        self.width == other.width
            && self.channels == other.channels
            && self.sample_rate == other.sample_rate
    }

    /// New buffer with this buffer's format and the given samples, saturated
    /// into range.
    pub(crate) fn with_samples(&self, wide: impl IntoIterator<Item = i64>) -> Self {
        let width = self.width;
        Self {
            samples: wide.into_iter().map(|s| width.saturate(s)).collect(),
            width,
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}
