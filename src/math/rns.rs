//! RNS polynomial arithmetic.
//!
//! An `RnsRing` holds the per-prime contexts (Montgomery constants and
//! NTT tables) for one basis of a modulus chain. An `RnsPoly` stores
//! the residues limb-major: limb `i` occupies `coeffs[i*n .. (i+1)*n]`.
//! A poly may use a prefix of the ring's limbs; the active count is the
//! poly's `limbs`, which the evaluator ties to the ciphertext level.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::modulus::Modulus;
use super::ntt::NttTable;
use crate::error::{Error, Result};

/// Per-basis context: moduli and their NTT tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RnsRing {
    n: usize,
    moduli: Vec<Modulus>,
    ntt: Vec<NttTable>,
}

impl RnsRing {
    pub fn new(n: usize, primes: &[u64]) -> Result<Self> {
        if primes.is_empty() {
            return Err(Error::InvalidParameters("empty modulus basis".into()));
        }
        let mut moduli = Vec::with_capacity(primes.len());
        let mut ntt = Vec::with_capacity(primes.len());
        for &q in primes {
            let table = NttTable::new(n, q).ok_or_else(|| {
                Error::InvalidParameters(format!("{} is not NTT-friendly for degree {}", q, n))
            })?;
            moduli.push(Modulus::new(q));
            ntt.push(table);
        }
        Ok(Self { n, moduli, ntt })
    }

    #[inline]
    pub fn ring_dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn limb_count(&self) -> usize {
        self.moduli.len()
    }

    #[inline]
    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }

    #[inline]
    pub fn modulus_at(&self, i: usize) -> &Modulus {
        &self.moduli[i]
    }

    pub fn zero(&self, limbs: usize) -> RnsPoly {
        debug_assert!(limbs >= 1 && limbs <= self.moduli.len());
        RnsPoly {
            coeffs: vec![0u64; limbs * self.n],
            n: self.n,
            limbs,
            is_ntt: false,
            is_montgomery: false,
        }
    }

    /// Poly with every limb holding the residues of the same centered
    /// integer coefficients.
    pub fn from_signed_coeffs(&self, coeffs: &[i64], limbs: usize) -> RnsPoly {
        debug_assert!(coeffs.len() <= self.n);
        let mut p = self.zero(limbs);
        for i in 0..limbs {
            let m = &self.moduli[i];
            let limb = p.limb_mut(i);
            for (j, &c) in coeffs.iter().enumerate() {
                limb[j] = m.reduce_signed(c);
            }
        }
        p
    }

    /// Uniformly random poly over the first `limbs` limbs.
    pub fn random<R: Rng>(&self, limbs: usize, rng: &mut R) -> RnsPoly {
        let mut p = self.zero(limbs);
        for i in 0..limbs {
            let q = self.moduli[i].value();
            for x in p.limb_mut(i) {
                *x = rng.gen_range(0..q);
            }
        }
        p
    }

    pub fn add_assign(&self, a: &mut RnsPoly, b: &RnsPoly) {
        debug_assert!(a.compatible(b) && a.is_montgomery == b.is_montgomery);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let (al, bl) = (i * a.n, i * b.n);
            for j in 0..a.n {
                a.coeffs[al + j] = m.add(a.coeffs[al + j], b.coeffs[bl + j]);
            }
        }
    }

    pub fn sub_assign(&self, a: &mut RnsPoly, b: &RnsPoly) {
        debug_assert!(a.compatible(b) && a.is_montgomery == b.is_montgomery);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let (al, bl) = (i * a.n, i * b.n);
            for j in 0..a.n {
                a.coeffs[al + j] = m.sub(a.coeffs[al + j], b.coeffs[bl + j]);
            }
        }
    }

    pub fn neg_assign(&self, a: &mut RnsPoly) {
        for i in 0..a.limbs {
            let m = self.moduli[i];
            for x in a.limb_mut(i) {
                *x = m.neg(*x);
            }
        }
    }

    /// Pointwise Montgomery product `a := a ⊙ b`. At least one operand
    /// must be in the Montgomery domain; the factor 2⁻⁶⁴ of the product
    /// cancels exactly one Montgomery factor.
    pub fn mul_mont_assign(&self, a: &mut RnsPoly, b: &RnsPoly) {
        debug_assert!(a.compatible(b));
        debug_assert!(a.is_ntt && b.is_ntt);
        debug_assert!(a.is_montgomery || b.is_montgomery);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let (al, bl) = (i * a.n, i * b.n);
            for j in 0..a.n {
                a.coeffs[al + j] = m.mul_mont(a.coeffs[al + j], b.coeffs[bl + j]);
            }
        }
        a.is_montgomery = a.is_montgomery && b.is_montgomery;
    }

    /// Pointwise Montgomery multiply-accumulate `out += a ⊙ b`.
    pub fn mul_mont_acc(&self, out: &mut RnsPoly, a: &RnsPoly, b: &RnsPoly) {
        debug_assert!(out.compatible(a) && a.compatible(b));
        debug_assert!(a.is_ntt && b.is_ntt && out.is_ntt);
        debug_assert!(a.is_montgomery || b.is_montgomery);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let base = i * a.n;
            for j in 0..a.n {
                let prod = m.mul_mont(a.coeffs[base + j], b.coeffs[base + j]);
                out.coeffs[base + j] = m.add(out.coeffs[base + j], prod);
            }
        }
    }

    /// Multiply limb `i` by `factors[i]` (plain residues).
    pub fn scalar_mul_assign(&self, a: &mut RnsPoly, factors: &[u64]) {
        debug_assert!(factors.len() >= a.limbs);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let f = factors[i];
            for x in a.limb_mut(i) {
                *x = m.mul(*x, f);
            }
        }
    }

    /// Multiply limb `i` by `factors[i]` stored as `f·2^128 mod q_i`;
    /// the Montgomery product leaves `f·a` in the Montgomery domain.
    pub fn scalar_mul_mont_entering(&self, a: &mut RnsPoly, factors: &[u64]) {
        debug_assert!(!a.is_montgomery);
        debug_assert!(factors.len() >= a.limbs);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let f = factors[i];
            for x in a.limb_mut(i) {
                *x = m.mul_mont(*x, f);
            }
        }
        a.is_montgomery = true;
    }

    /// Multiply every limb by the residues of one centered integer.
    pub fn scalar_mul_signed(&self, a: &mut RnsPoly, s: i64) {
        let factors: Vec<u64> = (0..a.limbs).map(|i| self.moduli[i].reduce_signed(s)).collect();
        self.scalar_mul_assign(a, &factors);
    }

    pub fn ntt_forward(&self, a: &mut RnsPoly) {
        debug_assert!(!a.is_ntt);
        for i in 0..a.limbs {
            let base = i * a.n;
            self.ntt[i].forward(&mut a.coeffs[base..base + a.n]);
        }
        a.is_ntt = true;
    }

    pub fn ntt_inverse(&self, a: &mut RnsPoly) {
        debug_assert!(a.is_ntt);
        for i in 0..a.limbs {
            let base = i * a.n;
            self.ntt[i].inverse(&mut a.coeffs[base..base + a.n]);
        }
        a.is_ntt = false;
    }

    pub fn to_montgomery(&self, a: &mut RnsPoly) {
        debug_assert!(!a.is_montgomery);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            for x in a.limb_mut(i) {
                *x = m.to_montgomery(*x);
            }
        }
        a.is_montgomery = true;
    }

    pub fn from_montgomery(&self, a: &mut RnsPoly) {
        debug_assert!(a.is_montgomery);
        for i in 0..a.limbs {
            let m = self.moduli[i];
            for x in a.limb_mut(i) {
                *x = m.from_montgomery(*x);
            }
        }
        a.is_montgomery = false;
    }

    /// Galois automorphism X → X^g on a coefficient-domain poly.
    /// `g` must be odd (a unit of Z_2n).
    pub fn automorphism(&self, a: &RnsPoly, g: u64) -> RnsPoly {
        debug_assert!(!a.is_ntt);
        debug_assert_eq!(g % 2, 1);
        let n = a.n as u64;
        let two_n = 2 * n;
        let mut out = self.zero(a.limbs);
        out.is_montgomery = a.is_montgomery;
        for i in 0..a.limbs {
            let m = self.moduli[i];
            let base = i * a.n;
            for j in 0..a.n {
                let idx = (j as u64 * g) % two_n;
                let v = a.coeffs[base + j];
                if idx < n {
                    out.coeffs[base + idx as usize] = v;
                } else {
                    out.coeffs[base + (idx - n) as usize] = m.neg(v);
                }
            }
        }
        out
    }
}

/// Residue polynomial over a prefix of an `RnsRing`'s limbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnsPoly {
    coeffs: Vec<u64>,
    n: usize,
    limbs: usize,
    is_ntt: bool,
    is_montgomery: bool,
}

impl RnsPoly {
    #[inline]
    pub fn ring_dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn limbs(&self) -> usize {
        self.limbs
    }

    #[inline]
    pub fn is_ntt(&self) -> bool {
        self.is_ntt
    }

    #[inline]
    pub fn is_montgomery(&self) -> bool {
        self.is_montgomery
    }

    #[inline]
    pub fn limb(&self, i: usize) -> &[u64] {
        &self.coeffs[i * self.n..(i + 1) * self.n]
    }

    #[inline]
    pub fn limb_mut(&mut self, i: usize) -> &mut [u64] {
        &mut self.coeffs[i * self.n..(i + 1) * self.n]
    }

    #[inline]
    fn compatible(&self, other: &RnsPoly) -> bool {
        self.n == other.n && self.limbs == other.limbs && self.is_ntt == other.is_ntt
    }

    /// Clone restricted to the first `limbs` limbs.
    pub fn truncated(&self, limbs: usize) -> RnsPoly {
        debug_assert!(limbs >= 1 && limbs <= self.limbs);
        RnsPoly {
            coeffs: self.coeffs[..limbs * self.n].to_vec(),
            n: self.n,
            limbs,
            is_ntt: self.is_ntt,
            is_montgomery: self.is_montgomery,
        }
    }

    /// Drop the last active limb (rescaling consumes one prime).
    pub fn drop_last_limb(&mut self) {
        debug_assert!(self.limbs > 1);
        self.limbs -= 1;
        self.coeffs.truncate(self.limbs * self.n);
    }

    pub(crate) fn from_raw(coeffs: Vec<u64>, n: usize, limbs: usize) -> Self {
        debug_assert_eq!(coeffs.len(), n * limbs);
        Self { coeffs, n, limbs, is_ntt: false, is_montgomery: false }
    }

    pub(crate) fn set_flags(&mut self, is_ntt: bool, is_montgomery: bool) {
        self.is_ntt = is_ntt;
        self.is_montgomery = is_montgomery;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn toy_ring() -> RnsRing {
        RnsRing::new(16, &[65537, 12289]).unwrap()
    }

    #[test]
    fn test_add_sub_roundtrip() {
        let ring = toy_ring();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let a = ring.random(2, &mut rng);
        let b = ring.random(2, &mut rng);
        let mut c = a.clone();
        ring.add_assign(&mut c, &b);
        ring.sub_assign(&mut c, &b);
        assert_eq!(c, a);
    }

    #[test]
    fn test_ntt_mul_is_negacyclic() {
        // (1 + X) * X^(n-1) = X^(n-1) + X^n = X^(n-1) - 1
        let ring = toy_ring();
        let n = ring.ring_dim();
        let mut a_coeffs = vec![0i64; n];
        a_coeffs[0] = 1;
        a_coeffs[1] = 1;
        let mut b_coeffs = vec![0i64; n];
        b_coeffs[n - 1] = 1;

        let mut a = ring.from_signed_coeffs(&a_coeffs, 2);
        let mut b = ring.from_signed_coeffs(&b_coeffs, 2);
        ring.ntt_forward(&mut a);
        ring.ntt_forward(&mut b);
        ring.to_montgomery(&mut a);
        ring.mul_mont_assign(&mut a, &b);
        ring.ntt_inverse(&mut a);

        for i in 0..2 {
            let m = ring.modulus_at(i);
            assert_eq!(a.limb(i)[0], m.neg(1));
            assert_eq!(a.limb(i)[n - 1], 1);
            for j in 1..n - 1 {
                assert_eq!(a.limb(i)[j], 0);
            }
        }
    }

    #[test]
    fn test_montgomery_flag_tracking() {
        let ring = toy_ring();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut a = ring.random(2, &mut rng);
        let b_plain = {
            let mut b = ring.random(2, &mut rng);
            b.set_flags(true, false);
            b
        };
        a.set_flags(true, false);
        ring.to_montgomery(&mut a);
        assert!(a.is_montgomery());
        ring.mul_mont_assign(&mut a, &b_plain);
        assert!(!a.is_montgomery());
    }

    #[test]
    fn test_automorphism_inverse_element() {
        // g = 2n-1 maps X -> X^(2n-1) = -X^(n-1)... applying twice is identity
        let ring = toy_ring();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let a = ring.random(2, &mut rng);
        let g = 2 * ring.ring_dim() as u64 - 1;
        let b = ring.automorphism(&ring.automorphism(&a, g), g);
        assert_eq!(a, b);
    }

    #[test]
    fn test_automorphism_on_constant() {
        let ring = toy_ring();
        let a = ring.from_signed_coeffs(&[42], 2);
        let b = ring.automorphism(&a, 5);
        assert_eq!(a, b);
    }
}
