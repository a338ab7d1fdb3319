pub mod batch;
pub mod buffer;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod identifier;
pub mod robustness;
pub mod transcode;
pub mod wav;

// Re-export primary API types
pub use buffer::{SampleBuffer, SampleWidth};
pub use config::{BatchConfig, EmbedConfig, LossyCodec, Perturbation, TranscoderConfig};
pub use embed::EmbeddingResult;
pub use error::Error;
pub use extract::DecodeResult;
pub use identifier::{BitSequence, Identifier};
pub use robustness::{RobustnessOutcome, RobustnessReport, bit_error_rate};
pub use transcode::{FfmpegTranscoder, Transcoder};

/// Embed an identifier into a copy of `buffer`.
///
/// This is the one-shot API for file-based workflows: decode with
/// [`wav::decode`], embed, then write with [`wav::encode`].
pub fn embed(
    buffer: &SampleBuffer,
    identifier: &Identifier,
    config: &EmbedConfig,
) -> error::Result<EmbeddingResult> {
    embed::embed(buffer, &identifier.to_bits(), config)
}

/// Embed raw bits into a copy of `buffer`.
pub fn embed_bits(
    buffer: &SampleBuffer,
    bits: &[bool],
    config: &EmbedConfig,
) -> error::Result<EmbeddingResult> {
    embed::embed(buffer, bits, config)
}

/// Read back an identifier of `digits` hex digits.
pub fn extract(buffer: &SampleBuffer, digits: usize) -> error::Result<DecodeResult> {
    let bit_count = digits.checked_mul(4).ok_or(error::Error::InvalidBitLength {
        len: digits,
        reason: "hex digit count overflows the bit count",
    })?;
    extract::extract(buffer, bit_count)
}

/// Read back `bit_count` raw bits (must be a multiple of 4).
pub fn extract_bits(buffer: &SampleBuffer, bit_count: usize) -> error::Result<DecodeResult> {
    extract::extract(buffer, bit_count)
}

/// Transform `embedded` once with `transcoder` and measure how many of
/// `identifier`'s bits survive.
pub fn measure_robustness<T: Transcoder + ?Sized>(
    identifier: &Identifier,
    embedded: &SampleBuffer,
    transcoder: &T,
) -> error::Result<RobustnessOutcome> {
    robustness::measure_robustness(&identifier.to_bits(), embedded, transcoder)
}
