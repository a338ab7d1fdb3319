use crate::buffer::SampleBuffer;
use crate::error::{Error, Result};
use crate::identifier::{self, BitSequence, Identifier};

/// Bits read back from a buffer and the identifier they spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult {
    pub bits: BitSequence,
    pub identifier: Identifier,
}

/// Read the LSBs of the first `expected_bit_count` interleaved samples.
///
/// There is no validity check: a buffer that never carried a watermark still
/// yields bits and an identifier. Correctness is only observable by comparing
/// against a known original, see [`crate::robustness::bit_error_rate`].
pub fn extract(buffer: &SampleBuffer, expected_bit_count: usize) -> Result<DecodeResult> {
    if expected_bit_count == 0 || expected_bit_count % 4 != 0 {
        return Err(Error::InvalidBitLength {
            len: expected_bit_count,
            reason: "not a positive multiple of 4",
        });
    }
    if expected_bit_count > buffer.len() {
        return Err(Error::InvalidBitLength {
            len: expected_bit_count,
            reason: "exceeds the buffer's sample count",
        });
    }

    let bits: BitSequence = buffer.samples()[..expected_bit_count]
        .iter()
        .map(|&s| s & 1 == 1)
        .collect();
    let identifier = identifier::from_bits(&bits)?;

    tracing::debug!(bits = expected_bit_count, identifier = %identifier, "extracted watermark");

    Ok(DecodeResult { bits, identifier })
}
