use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Ordered watermark bits, MSB of the first hex digit first.
pub type BitSequence = Vec<bool>;

/// A fixed-width hexadecimal identifier.
///
/// The digit count is part of the value: `"00ab"` and `"ab"` are different
/// identifiers and expand to 16 and 8 bits respectively. Digits are stored
/// lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    hex: String,
}

impl Identifier {
    /// Parse a hex identifier. Surrounding whitespace is ignored.
    pub fn parse(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.is_empty() {
            return Err(Error::InvalidIdentifier("empty".to_string()));
        }
        if let Some(c) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(Error::InvalidIdentifier(format!(
                "{hex:?} contains non-hex character {c:?}"
            )));
        }
        Ok(Self {
            hex: hex.to_ascii_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Number of hex digits.
    pub fn digits(&self) -> usize {
        self.hex.len()
    }

    /// Number of bits this identifier expands to (`4 * digits`).
    pub fn bit_len(&self) -> usize {
        self.hex.len() * 4
    }

    pub fn to_bits(&self) -> BitSequence {
        to_bits(self)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identifier::parse(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Expand an identifier to exactly `4 * digits` bits.
///
/// Each digit contributes its four bits MSB first, which is the big-endian
/// binary expansion of the whole number zero-padded on the left, so leading
/// zero digits survive.
pub fn to_bits(id: &Identifier) -> BitSequence {
    let mut bits = Vec::with_capacity(id.bit_len());
    for c in id.hex.chars() {
        // Identifier::parse guarantees hex digits.
        let nibble = c.to_digit(16).unwrap_or(0);
        for j in (0..4).rev() {
            bits.push((nibble >> j) & 1 == 1);
        }
    }
    bits
}

/// Rebuild an identifier from bits produced by [`to_bits`].
pub fn from_bits(bits: &[bool]) -> Result<Identifier> {
    if bits.is_empty() {
        return Err(Error::InvalidBitLength {
            len: 0,
            reason: "empty bit sequence",
        });
    }
    if bits.len() % 4 != 0 {
        return Err(Error::InvalidBitLength {
            len: bits.len(),
            reason: "not a multiple of 4",
        });
    }
    let hex = bits
        .chunks_exact(4)
        .map(|nibble| {
            let v = nibble.iter().fold(0u32, |acc, &b| (acc << 1) | b as u32);
            char::from_digit(v, 16).unwrap_or('0')
        })
        .collect();
    Ok(Identifier { hex })
}

/// Render bits as a `0`/`1` string, mainly for logs and CLI output.
pub fn bits_to_string(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}
