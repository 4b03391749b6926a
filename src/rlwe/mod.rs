//! RLWE containers and the reference symmetric encryption path.

pub mod enc;
pub mod types;

pub use enc::{decrypt, encrypt_symmetric, GaussianSampler, SecretKey};
pub use types::{Ciphertext, Metadata, Plaintext, PlaintextRingT};
