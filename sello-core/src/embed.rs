use crate::buffer::SampleBuffer;
use crate::config::{EmbedConfig, Perturbation};
use crate::error::{Error, Result};

/// Watermarked audio plus the number of bits that actually fit.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub buffer: SampleBuffer,
    /// `min(requested_bits, buffer.len())`.
    pub embedded_bits: usize,
    pub requested_bits: usize,
}

impl EmbeddingResult {
    /// True if the buffer had fewer samples than bits requested.
    pub fn is_partial(&self) -> bool {
        self.embedded_bits < self.requested_bits
    }

    /// Reject a truncated embedding with [`Error::PartialEmbedding`].
    pub fn require_complete(self) -> Result<Self> {
        if self.is_partial() {
            return Err(Error::PartialEmbedding {
                embedded: self.embedded_bits,
                requested: self.requested_bits,
            });
        }
        Ok(self)
    }
}

/// Embed `bits` into the LSBs of the first `bits.len()` interleaved samples.
///
/// Every sample also receives the amplitude perturbation
/// `floor(sample * weight)`, ordered relative to the LSB write according to
/// `config.perturbation`. All results are saturated into the buffer's sample
/// width. The input buffer is left untouched.
///
/// A bit sequence longer than the buffer is truncated, never an error; check
/// [`EmbeddingResult::is_partial`].
pub fn embed(
    buffer: &SampleBuffer,
    bits: &[bool],
    config: &EmbedConfig,
) -> Result<EmbeddingResult> {
    let weight = config.weight;
    if !weight.is_finite() || !(0.0..1.0).contains(&weight) {
        return Err(Error::InvalidWeight(weight));
    }

    let width = buffer.width();
    let perturb = |s: i64| s + (s as f64 * weight).floor() as i64;
    let mark = |s: i64, bit: bool| (s & !1) | bit as i64;

    let out = buffer.samples().iter().enumerate().map(|(i, &s)| {
        let s = s as i64;
        match (bits.get(i).copied(), config.perturbation) {
            (None, Perturbation::Disabled) => s,
            (None, _) => perturb(s),
            (Some(bit), Perturbation::BeforeMark) => {
                // Saturate before marking so the final clip cannot touch bit 0.
                mark(width.saturate(perturb(s)) as i64, bit)
            }
            (Some(bit), Perturbation::AfterMark) => perturb(mark(s, bit)),
            (Some(bit), Perturbation::SkipCarriers | Perturbation::Disabled) => mark(s, bit),
        }
    });
    let watermarked = buffer.with_samples(out);

    let requested_bits = bits.len();
    let embedded_bits = requested_bits.min(buffer.len());
    if embedded_bits < requested_bits {
        tracing::warn!(
            embedded = embedded_bits,
            requested = requested_bits,
            "buffer too short for the full watermark"
        );
    }
    tracing::debug!(
        embedded = embedded_bits,
        samples = buffer.len(),
        weight,
        perturbation = ?config.perturbation,
        "embedded watermark"
    );

    Ok(EmbeddingResult {
        buffer: watermarked,
        embedded_bits,
        requested_bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleWidth;
    use crate::identifier::{Identifier, bits_to_string};

    fn ramp(n: usize) -> SampleBuffer {
        let samples: Vec<i16> = (0..n)
            .map(|i| ((i as i32 * 37) % 20000 - 10000) as i16)
            .collect();
        SampleBuffer::mono_i16(&samples, 44100)
    }

    #[test]
    fn silence_scenario() {
        let buffer = SampleBuffer::mono_i16(&[0; 1000], 16000);
        let bits = Identifier::parse("1a2b").unwrap().to_bits();

        let result = embed(&buffer, &bits, &EmbedConfig::default()).unwrap();

        assert_eq!(result.embedded_bits, 16);
        assert!(!result.is_partial());
        let lsbs: Vec<bool> = result.buffer.samples()[..16].iter().map(|s| s & 1 == 1).collect();
        assert_eq!(bits_to_string(&lsbs), "0001101000101011");
        assert!(result.buffer.samples()[16..].iter().all(|&s| s == 0));
    }

    #[test]
    fn length_and_format_preserved() {
        let buffer = SampleBuffer::new(vec![5; 64], SampleWidth::Bits24, 2, 48000).unwrap();
        let result = embed(&buffer, &[true; 10], &EmbedConfig::default()).unwrap();
        assert_eq!(result.buffer.len(), buffer.len());
        assert!(result.buffer.same_format(&buffer));
    }

    #[test]
    fn input_buffer_untouched() {
        let buffer = ramp(100);
        let before = buffer.clone();
        embed(&buffer, &[true, false, true, true], &EmbedConfig::default()).unwrap();
        assert_eq!(buffer, before);
    }

    #[test]
    fn perturbation_uses_floor() {
        let buffer = SampleBuffer::mono_i16(&[-150, 150, -1], 8000);
        let config = EmbedConfig {
            weight: 0.01,
            perturbation: Perturbation::BeforeMark,
        };
        let result = embed(&buffer, &[], &config).unwrap();
        // floor(-1.5) = -2, floor(1.5) = 1, floor(-0.01) = -1
        assert_eq!(result.buffer.samples(), &[-152, 151, -2]);
    }

    #[test]
    fn saturates_at_width_limits() {
        let buffer = SampleBuffer::mono_i16(&[32767, -32768, 32000, -32000], 8000);
        let config = EmbedConfig {
            weight: 0.5,
            perturbation: Perturbation::BeforeMark,
        };
        let result = embed(&buffer, &[false, true], &config).unwrap();
        assert_eq!(result.buffer.samples(), &[32766, -32767, 32767, -32768]);
    }

    #[test]
    fn mark_last_survives_odd_perturbation() {
        // floor(13 * 0.25) = 3, odd: marking first would flip the written bit.
        let buffer = SampleBuffer::mono_i16(&[13; 8], 8000);
        let bits = vec![false; 8];
        let config = EmbedConfig {
            weight: 0.25,
            perturbation: Perturbation::BeforeMark,
        };
        let result = embed(&buffer, &bits, &config).unwrap();
        assert!(result.buffer.samples().iter().all(|s| s & 1 == 0));
    }

    #[test]
    fn mark_first_flips_bits_on_odd_perturbation() {
        let buffer = SampleBuffer::mono_i16(&[13; 8], 8000);
        let bits = vec![false; 8];
        let config = EmbedConfig {
            weight: 0.25,
            perturbation: Perturbation::AfterMark,
        };
        let result = embed(&buffer, &bits, &config).unwrap();
        // 13 -> 12 after marking, + floor(3.0) = 15: LSB now 1.
        assert!(result.buffer.samples().iter().all(|&s| s == 15));
    }

    #[test]
    fn skip_carriers_perturbs_only_the_rest() {
        let buffer = SampleBuffer::mono_i16(&[1000, 1000, 1000, 1000], 8000);
        let config = EmbedConfig {
            weight: 0.125,
            perturbation: Perturbation::SkipCarriers,
        };
        let result = embed(&buffer, &[true, false], &config).unwrap();
        assert_eq!(result.buffer.samples(), &[1001, 1000, 1125, 1125]);
    }

    #[test]
    fn negative_samples_marked_in_twos_complement() {
        let buffer = SampleBuffer::mono_i16(&[-3, -4], 8000);
        let result = embed(&buffer, &[false, true], &EmbedConfig::lsb_only()).unwrap();
        assert_eq!(result.buffer.samples(), &[-4, -3]);
    }

    #[test]
    fn truncation_is_reported_not_raised() {
        let buffer = SampleBuffer::mono_i16(&[0; 6], 8000);
        let result = embed(&buffer, &[true; 16], &EmbedConfig::default()).unwrap();
        assert_eq!(result.embedded_bits, 6);
        assert!(result.is_partial());
        assert!(matches!(
            result.require_complete(),
            Err(Error::PartialEmbedding {
                embedded: 6,
                requested: 16
            })
        ));
    }

    #[test]
    fn weight_out_of_range() {
        let buffer = ramp(4);
        for weight in [-0.1, 1.0, f64::NAN] {
            let config = EmbedConfig {
                weight,
                ..EmbedConfig::default()
            };
            assert!(matches!(
                embed(&buffer, &[true], &config),
                Err(Error::InvalidWeight(_))
            ));
        }
    }
}
