//! Watermark survival measurement across a lossy transform.

use crate::buffer::SampleBuffer;
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::identifier::{BitSequence, Identifier};
use crate::transcode::Transcoder;

/// Outcome of one successful measurement pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustnessReport {
    pub original: BitSequence,
    pub decoded: BitSequence,
    /// Identifier spelled by `decoded`, whether or not it matches.
    pub decoded_identifier: Identifier,
    /// Percentage of differing bits, in `[0, 100]`.
    pub bit_error_rate: f64,
    /// False if the transform changed width, channel count or sample rate.
    pub format_preserved: bool,
}

impl RobustnessReport {
    pub fn is_intact(&self) -> bool {
        self.bit_error_rate == 0.0
    }
}

/// A measurement either produces a report or records that the transform
/// itself failed. A failed transform never masquerades as a BER.
#[derive(Debug, Clone, PartialEq)]
pub enum RobustnessOutcome {
    Measured(RobustnessReport),
    TranscoderFailure(String),
}

impl RobustnessOutcome {
    pub fn report(&self) -> Option<&RobustnessReport> {
        match self {
            RobustnessOutcome::Measured(report) => Some(report),
            RobustnessOutcome::TranscoderFailure(_) => None,
        }
    }

    pub fn bit_error_rate(&self) -> Option<f64> {
        self.report().map(|r| r.bit_error_rate)
    }
}

/// Percentage of positions where `original` and `decoded` differ.
pub fn bit_error_rate(original: &[bool], decoded: &[bool]) -> Result<f64> {
    if original.len() != decoded.len() {
        return Err(Error::LengthMismatch {
            original: original.len(),
            decoded: decoded.len(),
        });
    }
    if original.is_empty() {
        return Err(Error::InvalidBitLength {
            len: 0,
            reason: "cannot rate an empty bit sequence",
        });
    }
    let errors = original
        .iter()
        .zip(decoded)
        .filter(|(a, b)| a != b)
        .count();
    Ok(errors as f64 / original.len() as f64 * 100.0)
}

/// Transform `embedded` once, read back `original_bits.len()` bits and rate
/// them against `original_bits`.
///
/// Transcoder errors become [`RobustnessOutcome::TranscoderFailure`]. A
/// transformed buffer with a different format is still read positionally;
/// the mismatch shows up as a higher BER. Other errors (for example a
/// transformed buffer too short to hold the bits) are returned as `Err`.
pub fn measure_robustness<T>(
    original_bits: &[bool],
    embedded: &SampleBuffer,
    transcoder: &T,
) -> Result<RobustnessOutcome>
where
    T: Transcoder + ?Sized,
{
    let transformed = match transcoder.transcode(embedded) {
        Ok(buffer) => buffer,
        Err(Error::TranscoderFailure(reason)) => {
            tracing::warn!(%reason, "transcoder failed, no BER measured");
            return Ok(RobustnessOutcome::TranscoderFailure(reason));
        }
        Err(e) => return Err(e),
    };

    let format_preserved = transformed.same_format(embedded);
    if !format_preserved {
        tracing::warn!(
            before_rate = embedded.sample_rate(),
            after_rate = transformed.sample_rate(),
            before_channels = embedded.channels(),
            after_channels = transformed.channels(),
            "transform changed the audio format; reading bits positionally"
        );
    }

    let decoded = extract(&transformed, original_bits.len())?;
    let ber = bit_error_rate(original_bits, &decoded.bits)?;
    tracing::info!(
        bits = original_bits.len(),
        ber,
        decoded = %decoded.identifier,
        "robustness measured"
    );

    Ok(RobustnessOutcome::Measured(RobustnessReport {
        original: original_bits.to_vec(),
        decoded: decoded.bits,
        decoded_identifier: decoded.identifier,
        bit_error_rate: ber,
        format_preserved,
    }))
}
