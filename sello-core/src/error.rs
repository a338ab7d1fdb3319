use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid bit length {len}: {reason}")]
    InvalidBitLength { len: usize, reason: &'static str },

    #[error("invalid perturbation weight {0}: must be finite and in [0, 1)")]
    InvalidWeight(f64),

    #[error("partial embedding: {embedded} of {requested} bits fit into the buffer")]
    PartialEmbedding { embedded: usize, requested: usize },

    #[error("bit sequences differ in length: original {original}, decoded {decoded}")]
    LengthMismatch { original: usize, decoded: usize },

    #[error("transcoder failed: {0}")]
    TranscoderFailure(String),

    #[error("manifest is missing required column {0:?}")]
    MissingColumn(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
