//! RNS-based leveled homomorphic encryption over power-of-two
//! cyclotomic rings.
//!
//! Messages live modulo a plaintext modulus T and are carried in the
//! high-order bits of the ciphertext modulus: every plaintext and
//! ciphertext polynomial stores `m·T⁻¹ mod Q`. That representation
//! makes additions and plaintext operations direct, lets standard
//! multiplication fold its factor of T into a single Montgomery
//! product, and keeps rescaling an exact RNS division.
//!
//! The pipeline is: [`params::Parameters`] → [`context::Context`] →
//! [`encoder::Encoder`] packs vectors into plaintexts →
//! [`rlwe::encrypt_symmetric`] → [`evaluator::Evaluator`] computes →
//! [`rlwe::decrypt`] → decode.

pub mod context;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod ks;
pub mod math;
pub mod params;
pub mod rlwe;
pub mod scale;

pub use context::Context;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use evaluator::{Evaluator, Operand};
pub use ks::EvaluationKeys;
pub use params::Parameters;
pub use rlwe::{decrypt, encrypt_symmetric, Ciphertext, Plaintext, SecretKey};
