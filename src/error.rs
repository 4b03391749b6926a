//! Error type shared by the whole engine.

use std::fmt;

/// Errors surfaced by parameter construction, encoding and evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Parameter set rejected at construction time.
    InvalidParameters(String),
    /// Operands live at different points of the modulus chain.
    LevelMismatch { expected: usize, got: usize },
    /// The operation would consume a modulus that is no longer there.
    LevelExhausted,
    /// Ciphertext degree outside what the operation supports.
    DegreeUnsupported { degree: usize, max: usize },
    /// More slot values than the ring can hold.
    TooManyValues { got: usize, capacity: usize },
    /// Batched encoding requested but the plaintext modulus does not
    /// split the ring (T not prime or T ≢ 1 mod 2N).
    BatchingUnsupported,
    /// Relinearization requested without a relinearization key.
    MissingRelinearizationKey,
    /// Rotation requested without the Galois key for this element.
    MissingGaloisKey(u64),
    /// A plaintext scale must be a unit of Z_T.
    ScaleNotUnit(u64),
    /// Internal invariant violated; indicates a bug, not a misuse.
    Internal(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameters(msg) => write!(f, "invalid parameters: {}", msg),
            Error::LevelMismatch { expected, got } => {
                write!(f, "level mismatch: expected {}, got {}", expected, got)
            }
            Error::LevelExhausted => write!(f, "modulus chain exhausted"),
            Error::DegreeUnsupported { degree, max } => {
                write!(f, "ciphertext degree {} unsupported (max {})", degree, max)
            }
            Error::TooManyValues { got, capacity } => {
                write!(f, "{} values exceed the {} available slots", got, capacity)
            }
            Error::BatchingUnsupported => {
                write!(f, "plaintext modulus does not support batched encoding")
            }
            Error::MissingRelinearizationKey => write!(f, "no relinearization key available"),
            Error::MissingGaloisKey(g) => write!(f, "no Galois key for element {}", g),
            Error::ScaleNotUnit(s) => {
                write!(f, "scale {} is not invertible mod the plaintext modulus", s)
            }
            Error::Internal(msg) => write!(f, "internal invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::LevelMismatch { expected: 2, got: 1 };
        assert_eq!(e.to_string(), "level mismatch: expected 2, got 1");

        let e = Error::MissingGaloisKey(25);
        assert!(e.to_string().contains("25"));
    }
}
