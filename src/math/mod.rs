//! Number-theoretic building blocks: Montgomery modular arithmetic,
//! negacyclic NTT, RNS polynomials and base conversion.

pub mod basis;
pub mod modulus;
pub mod ntt;
pub mod rns;

pub use basis::{BasisExtender, RnsRescaler};
pub use modulus::{center, is_prime, mod_inverse, Modulus};
pub use ntt::{bit_reverse, NttTable};
pub use rns::{RnsPoly, RnsRing};
