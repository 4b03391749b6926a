//! Plaintext and ciphertext containers.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::RnsPoly;

/// Bookkeeping carried by every plaintext and ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Multiplicative factor (a unit of Z_T) the decoded values carry.
    pub scale: u64,
    /// Index into the modulus chain; `level + 1` limbs are active.
    pub level: usize,
    /// Components are in the NTT domain.
    pub is_ntt: bool,
    /// Components are in the Montgomery domain.
    pub is_montgomery: bool,
    /// Values were packed with the SIMD slot permutation.
    pub is_batched: bool,
}

/// A message polynomial lifted to the ciphertext basis.
///
/// The polynomial stores `m·T⁻¹ mod Q` (the "scaled-up" form), so it
/// can be added to or multiplied with ciphertext components directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plaintext {
    pub poly: RnsPoly,
    pub meta: Metadata,
}

/// A message polynomial still in coefficient form mod T.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextRingT {
    pub coeffs: Vec<u64>,
    pub scale: u64,
    pub is_batched: bool,
}

/// An RLWE ciphertext of arbitrary degree (`cts.len() - 1`).
///
/// Degree 1 is the fresh form `(c0, c1)` with phase `c0 + c1·s`;
/// tensoring produces degree 2, which relinearization brings back down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub cts: Vec<RnsPoly>,
    pub meta: Metadata,
}

impl Ciphertext {
    #[inline]
    pub fn degree(&self) -> usize {
        self.cts.len() - 1
    }

    #[inline]
    pub fn level(&self) -> usize {
        self.meta.level
    }

    #[inline]
    pub fn scale(&self) -> u64 {
        self.meta.scale
    }
}

impl Plaintext {
    #[inline]
    pub fn level(&self) -> usize {
        self.meta.level
    }

    #[inline]
    pub fn scale(&self) -> u64 {
        self.meta.scale
    }
}

/// Validate a scale as a unit of Z_T and a level against the chain.
pub(crate) fn check_scale_and_level(ctx: &Context, scale: u64, level: usize) -> Result<()> {
    if level > ctx.params().max_level() {
        return Err(Error::LevelMismatch { expected: ctx.params().max_level(), got: level });
    }
    if scale == 0 || ctx.inv_mod_t(scale).is_none() {
        return Err(Error::ScaleNotUnit(scale));
    }
    Ok(())
}

impl Context {
    /// Empty plaintext at the given level and scale, coefficient zero.
    pub fn new_plaintext(&self, level: usize, scale: u64) -> Result<Plaintext> {
        check_scale_and_level(self, scale, level)?;
        let mut poly = self.ring_q().zero(level + 1);
        poly.set_flags(true, false);
        Ok(Plaintext {
            poly,
            meta: Metadata {
                scale,
                level,
                is_ntt: true,
                is_montgomery: false,
                is_batched: self.params().supports_batching(),
            },
        })
    }

    /// Zero ciphertext of the given degree.
    pub fn new_ciphertext(&self, degree: usize, level: usize, scale: u64) -> Result<Ciphertext> {
        check_scale_and_level(self, scale, level)?;
        if degree == 0 || degree > 2 {
            return Err(Error::DegreeUnsupported { degree, max: 2 });
        }
        let cts = (0..=degree)
            .map(|_| {
                let mut p = self.ring_q().zero(level + 1);
                p.set_flags(true, false);
                p
            })
            .collect();
        Ok(Ciphertext {
            cts,
            meta: Metadata {
                scale,
                level,
                is_ntt: true,
                is_montgomery: false,
                is_batched: self.params().supports_batching(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    #[test]
    fn test_constructors_validate() {
        let ctx = Context::new(Parameters::insecure_toy()).unwrap();
        assert!(ctx.new_plaintext(1, 3).is_ok());
        assert!(matches!(ctx.new_plaintext(3, 3), Err(Error::LevelMismatch { .. })));
        assert!(matches!(ctx.new_plaintext(1, 0), Err(Error::ScaleNotUnit(0))));
        assert!(matches!(
            ctx.new_ciphertext(3, 1, 1),
            Err(Error::DegreeUnsupported { .. })
        ));

        let ct = ctx.new_ciphertext(1, 1, 1).unwrap();
        assert_eq!(ct.degree(), 1);
        assert_eq!(ct.cts[0].limbs(), 2);
    }
}
