//! RNS base conversion and rescaling.
//!
//! The conversion here is the almost-exact signed variant: for residues
//! of `x` over the source basis `Q` it returns the residues of the
//! centered representative of `x` over the target basis, using a
//! floating-point estimate of the overflow count. The estimate is off
//! by one only when `x` lands within a few ulps of ±Q/2, which the
//! callers absorb as noise.

use serde::{Deserialize, Serialize};

use super::modulus::{center, Modulus};
use super::rns::RnsPoly;

/// Per-source-level conversion tables from a prime basis `Q` to a
/// disjoint basis `B`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasisExtender {
    src: Vec<Modulus>,
    dst: Vec<Modulus>,
    levels: Vec<LevelTables>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LevelTables {
    /// (Q/q_i)⁻¹ mod q_i
    q_hat_inv: Vec<u64>,
    /// (Q/q_i) mod b_j, indexed [i][j]
    q_hat_mod_dst: Vec<Vec<u64>>,
    /// Q mod b_j
    q_mod_dst: Vec<u64>,
    /// Q⁻¹ mod b_j (for ModDown)
    q_inv_mod_dst: Vec<u64>,
}

impl BasisExtender {
    pub fn new(src_primes: &[u64], dst_primes: &[u64]) -> Self {
        let src: Vec<Modulus> = src_primes.iter().map(|&q| Modulus::new(q)).collect();
        let dst: Vec<Modulus> = dst_primes.iter().map(|&q| Modulus::new(q)).collect();

        let mut levels = Vec::with_capacity(src.len());
        for k in 1..=src.len() {
            let active = &src[..k];
            let mut q_hat_inv = Vec::with_capacity(k);
            let mut q_hat_mod_dst = Vec::with_capacity(k);
            for i in 0..k {
                // Q/q_i mod q_i and mod every target prime
                let mut hat_mod_qi = 1u64;
                let mut hat_mod_dst: Vec<u64> = vec![1; dst.len()];
                for (l, m) in active.iter().enumerate() {
                    if l == i {
                        continue;
                    }
                    hat_mod_qi = active[i].mul(hat_mod_qi, m.value() % active[i].value());
                    for (j, d) in dst.iter().enumerate() {
                        hat_mod_dst[j] = d.mul(hat_mod_dst[j], m.value() % d.value());
                    }
                }
                // active moduli are pairwise coprime, so the inverse exists
                q_hat_inv.push(active[i].inv(hat_mod_qi).unwrap());
                q_hat_mod_dst.push(hat_mod_dst);
            }
            let mut q_mod_dst = Vec::with_capacity(dst.len());
            let mut q_inv_mod_dst = Vec::with_capacity(dst.len());
            for d in &dst {
                let mut q_mod = 1u64;
                for m in active {
                    q_mod = d.mul(q_mod, m.value() % d.value());
                }
                q_mod_dst.push(q_mod);
                q_inv_mod_dst.push(d.inv(q_mod).unwrap());
            }
            levels.push(LevelTables { q_hat_inv, q_hat_mod_dst, q_mod_dst, q_inv_mod_dst });
        }

        Self { src, dst, levels }
    }

    /// Convert the centered value of `input` (coefficient domain, its
    /// active limbs forming the source level) onto the first
    /// `dst_limbs` target primes.
    pub fn convert(&self, input: &RnsPoly, dst_limbs: usize) -> RnsPoly {
        debug_assert!(!input.is_ntt() && !input.is_montgomery());
        debug_assert!(input.limbs() <= self.src.len());
        debug_assert!(dst_limbs <= self.dst.len());

        let k = input.limbs();
        let n = input.ring_dim();
        let tables = &self.levels[k - 1];
        let mut out = vec![0u64; dst_limbs * n];
        let mut omega = vec![0u64; k];

        for c in 0..n {
            let mut v_est = 0f64;
            for i in 0..k {
                let w = self.src[i].mul(input.limb(i)[c], tables.q_hat_inv[i]);
                omega[i] = w;
                v_est += w as f64 / self.src[i].value() as f64;
            }
            let v = v_est.round() as u64;
            for j in 0..dst_limbs {
                let d = &self.dst[j];
                let mut acc = 0u128;
                for i in 0..k {
                    acc += d.mul(omega[i], tables.q_hat_mod_dst[i][j]) as u128;
                }
                let sum = (acc % d.value() as u128) as u64;
                let corr = d.mul(v % d.value(), tables.q_mod_dst[j]);
                out[j * n + c] = d.sub(sum, corr);
            }
        }
        RnsPoly::from_raw(out, n, dst_limbs)
    }

    /// `a_dst := (a_dst − a) · Q⁻¹` over the target basis, where `a` is
    /// the same value represented on the source prefix; the result is
    /// `round(a_dst / Q)` up to the conversion error.
    pub fn mod_down(&self, a_src: &RnsPoly, a_dst: &mut RnsPoly) {
        debug_assert!(!a_dst.is_ntt() && !a_dst.is_montgomery());
        let tables = &self.levels[a_src.limbs() - 1];
        let lifted = self.convert(a_src, a_dst.limbs());
        let n = a_dst.ring_dim();
        for j in 0..a_dst.limbs() {
            let d = self.dst[j];
            let inv = tables.q_inv_mod_dst[j];
            let src_limb = lifted.limb(j);
            let dst_limb = a_dst.limb_mut(j);
            for c in 0..n {
                dst_limb[c] = d.mul(d.sub(dst_limb[c], src_limb[c]), inv);
            }
        }
    }
}

/// Exact division by the last prime of a chain, the core of rescaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RnsRescaler {
    primes: Vec<Modulus>,
    /// inv_last[l][j] = q_l⁻¹ mod q_j for j < l
    inv_last: Vec<Vec<u64>>,
}

impl RnsRescaler {
    pub fn new(chain: &[u64]) -> Self {
        let primes: Vec<Modulus> = chain.iter().map(|&q| Modulus::new(q)).collect();
        let mut inv_last = Vec::with_capacity(chain.len());
        for l in 0..chain.len() {
            let mut row = Vec::with_capacity(l);
            for j in 0..l {
                row.push(primes[j].inv(chain[l] % chain[j]).unwrap());
            }
            inv_last.push(row);
        }
        Self { primes, inv_last }
    }

    /// Divide by the last active prime: subtract the centered lift of
    /// the last-limb residue from every remaining limb, multiply by the
    /// prime's inverse, then drop the limb. The quotient differs from
    /// the exact rational by less than one.
    pub fn divide_by_last_prime(&self, a: &mut RnsPoly) {
        debug_assert!(!a.is_ntt() && !a.is_montgomery());
        debug_assert!(a.limbs() >= 2);
        let last = a.limbs() - 1;
        let q_last = self.primes[last].value();
        let n = a.ring_dim();
        let last_limb: Vec<u64> = a.limb(last).to_vec();
        for j in 0..last {
            let m = self.primes[j];
            let inv = self.inv_last[last][j];
            let limb = a.limb_mut(j);
            for c in 0..n {
                let lift = m.reduce_signed(center(last_limb[c], q_last));
                limb[c] = m.mul(m.sub(limb[c], lift), inv);
            }
        }
        a.drop_last_limb();
    }
}
