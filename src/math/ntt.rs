//! Negacyclic number-theoretic transform over a single prime.
//!
//! Forward transform is Cooley–Tukey decimation-in-time, inverse is
//! Gentleman–Sande decimation-in-frequency, with the powers of the
//! primitive 2n-th root ψ stored in Montgomery form in bit-reversed
//! order. The forward output is in the usual scrambled evaluation
//! order `out[i] = m(ψ^(2·bitrev(i)+1))`; the encoder's slot table is
//! built against exactly this ordering.

use serde::{Deserialize, Serialize};

use super::modulus::Modulus;

/// Precomputed transform tables for one prime `q ≡ 1 mod 2n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NttTable {
    n: usize,
    modulus: Modulus,
    /// psi_powers[i] = ψ^bitrev(i) in Montgomery form
    psi_powers: Vec<u64>,
    /// psi_inv_powers[i] = ψ^-bitrev(i) in Montgomery form
    psi_inv_powers: Vec<u64>,
    /// n⁻¹ in Montgomery form
    n_inv: u64,
}

impl NttTable {
    /// Build tables for ring degree `n` (a power of two) and prime `q`.
    /// Returns `None` when no primitive 2n-th root exists (q ≢ 1 mod 2n).
    pub fn new(n: usize, q: u64) -> Option<Self> {
        assert!(n.is_power_of_two() && n >= 2);
        let modulus = Modulus::new(q);
        if (q - 1) % (2 * n as u64) != 0 {
            return None;
        }
        let psi = find_primitive_2n_root(&modulus, n)?;
        let psi_inv = modulus.inv(psi)?;
        let log_n = n.trailing_zeros();

        let mut psi_powers = vec![0u64; n];
        let mut psi_inv_powers = vec![0u64; n];
        let mut fwd = 1u64;
        let mut inv = 1u64;
        for i in 0..n {
            let r = bit_reverse(i, log_n);
            psi_powers[r] = modulus.to_montgomery(fwd);
            psi_inv_powers[r] = modulus.to_montgomery(inv);
            fwd = modulus.mul(fwd, psi);
            inv = modulus.mul(inv, psi_inv);
        }
        let n_inv = modulus.to_montgomery(modulus.inv(n as u64)?);

        Some(Self {
            n,
            modulus,
            psi_powers,
            psi_inv_powers,
            n_inv,
        })
    }

    #[inline]
    pub fn ring_dim(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    /// In-place forward negacyclic NTT of `a` (length n, values < q).
    pub fn forward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.n);
        let m = &self.modulus;
        let mut t = self.n;
        let mut groups = 1usize;
        while groups < self.n {
            t >>= 1;
            for i in 0..groups {
                let s = self.psi_powers[groups + i];
                let j1 = 2 * i * t;
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = m.mul_mont(a[j + t], s);
                    a[j] = m.add(u, v);
                    a[j + t] = m.sub(u, v);
                }
            }
            groups <<= 1;
        }
    }

    /// In-place inverse negacyclic NTT, including the 1/n factor.
    pub fn inverse(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.n);
        let m = &self.modulus;
        let mut t = 1usize;
        let mut groups = self.n;
        while groups > 1 {
            let h = groups >> 1;
            let mut j1 = 0usize;
            for i in 0..h {
                let s = self.psi_inv_powers[h + i];
                for j in j1..j1 + t {
                    let u = a[j];
                    let v = a[j + t];
                    a[j] = m.add(u, v);
                    a[j + t] = m.mul_mont(m.sub(u, v), s);
                }
                j1 += 2 * t;
            }
            t <<= 1;
            groups = h;
        }
        for x in a.iter_mut() {
            *x = m.mul_mont(*x, self.n_inv);
        }
    }
}

/// Reverse the low `bits` bits of `i`.
#[inline]
pub fn bit_reverse(i: usize, bits: u32) -> usize {
    i.reverse_bits() >> (usize::BITS - bits)
}

/// Find ψ with ψ^n ≡ -1 mod q, i.e. a primitive 2n-th root of unity.
fn find_primitive_2n_root(modulus: &Modulus, n: usize) -> Option<u64> {
    let q = modulus.value();
    let exponent = (q - 1) / (2 * n as u64);
    for g in 2..q {
        let candidate = modulus.pow(g, exponent);
        if modulus.pow(candidate, n as u64) == q - 1 {
            return Some(candidate);
        }
    }
    None
}
