//! Gadget key-switching.
//!
//! A key-switching key encrypts `g·s'` under `s` for every gadget
//! element `g = q̃_i · 2^(w·j)`, where `q̃_i` is the CRT idempotent of
//! limb `i` (1 mod q_i, 0 mod the others) and `w` is the digit width.
//! Decomposing a polynomial per limb and per digit keeps every digit
//! below `2^w`, so the accumulated key noise stays linear in the digit
//! count. Keys are generated over the full chain; at a lower level the
//! rows are truncated, which preserves the idempotent congruences.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::RnsPoly;
use crate::rlwe::{GaussianSampler, SecretKey};

/// One key-switching key: rows ordered limb-major, digit-minor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySwitchingKey {
    rows_b: Vec<RnsPoly>,
    rows_a: Vec<RnsPoly>,
    base_bits: u32,
    /// digits per limb over the full chain
    digits: Vec<usize>,
    /// prefix sums of `digits` for row indexing
    offsets: Vec<usize>,
}

/// Relinearization plus rotation keys available to an evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationKeys {
    pub relin: Option<KeySwitchingKey>,
    pub galois: HashMap<u64, KeySwitchingKey>,
}

impl EvaluationKeys {
    /// Generate the relinearization key plus Galois keys for the given
    /// column rotations (and the row swap when `rows` is set).
    pub fn generate<R: Rng>(
        ctx: &Context,
        sk: &SecretKey,
        rotations: &[usize],
        rows: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let mut keys = Self { relin: Some(generate_relin_key(ctx, sk, rng)?), galois: HashMap::new() };
        for &k in rotations {
            let g = ctx.params().galois_element(k);
            keys.galois.insert(g, generate_galois_key(ctx, sk, g, rng)?);
        }
        if rows {
            let g = ctx.params().galois_element_rows();
            keys.galois.insert(g, generate_galois_key(ctx, sk, g, rng)?);
        }
        Ok(keys)
    }
}

/// Key for switching a degree-2 component back under `s`.
pub fn generate_relin_key<R: Rng>(
    ctx: &Context,
    sk: &SecretKey,
    rng: &mut R,
) -> Result<KeySwitchingKey> {
    let ring = ctx.ring_q();
    let s = sk.ntt_mont_at(ring.limb_count());
    let mut s_squared = s.clone();
    ring.mul_mont_assign(&mut s_squared, &s);
    ring.from_montgomery(&mut s_squared);
    debug!("generating relinearization key");
    generate_key_switching_key(ctx, sk, &s_squared, rng)
}

/// Key for undoing the automorphism X → X^g on the `c1` component.
pub fn generate_galois_key<R: Rng>(
    ctx: &Context,
    sk: &SecretKey,
    g: u64,
    rng: &mut R,
) -> Result<KeySwitchingKey> {
    let ring = ctx.ring_q();
    let s_coeff = ring.from_signed_coeffs(sk.ternary(), ring.limb_count());
    let mut s_conj = ring.automorphism(&s_coeff, g);
    ring.ntt_forward(&mut s_conj);
    debug!(galois_element = g, "generating Galois key");
    generate_key_switching_key(ctx, sk, &s_conj, rng)
}

/// Encrypt `g·target` under `sk` for every gadget element `g`.
/// `target` must be in the NTT domain over the full chain.
pub fn generate_key_switching_key<R: Rng>(
    ctx: &Context,
    sk: &SecretKey,
    target: &RnsPoly,
    rng: &mut R,
) -> Result<KeySwitchingKey> {
    let ring = ctx.ring_q();
    let limbs = ring.limb_count();
    debug_assert!(target.is_ntt() && !target.is_montgomery());
    debug_assert_eq!(target.limbs(), limbs);

    let base_bits = ctx.params().ks_base_bits();
    let digits = digit_counts(ctx, base_bits);
    let offsets = prefix_sums(&digits);
    let sampler = GaussianSampler::new(ctx.params().sigma());
    let s = sk.ntt_mont_at(limbs);

    let mut rows_b = Vec::new();
    let mut rows_a = Vec::new();
    for i in 0..limbs {
        for j in 0..digits[i] {
            // gadget residues: 2^(w·j) on limb i, zero elsewhere
            let mut factors = vec![0u64; limbs];
            let m = ring.modulus_at(i);
            factors[i] = m.pow(2, (base_bits as u64) * j as u64);

            let mut a = ring.random(limbs, rng);
            a.set_flags(true, false);
            let mut e = ring.from_signed_coeffs(&sampler.sample_vec(ring.ring_dim(), rng), limbs);
            ring.ntt_forward(&mut e);

            let mut b = a.clone();
            ring.mul_mont_assign(&mut b, &s);
            ring.neg_assign(&mut b);
            ring.add_assign(&mut b, &e);
            let mut g_target = target.clone();
            ring.scalar_mul_assign(&mut g_target, &factors);
            ring.add_assign(&mut b, &g_target);

            ring.to_montgomery(&mut a);
            ring.to_montgomery(&mut b);
            rows_b.push(b);
            rows_a.push(a);
        }
    }
    Ok(KeySwitchingKey { rows_b, rows_a, base_bits, digits, offsets })
}

/// Apply a key-switching key to a coefficient-domain polynomial `d`,
/// returning the NTT-domain pair `(p0, p1)` with
/// `p0 + p1·s ≈ d·s'` over the active limbs of `d`.
pub fn key_switch(ctx: &Context, key: &KeySwitchingKey, d: &RnsPoly) -> Result<(RnsPoly, RnsPoly)> {
    debug_assert!(!d.is_ntt() && !d.is_montgomery());
    let ring = ctx.ring_q();
    let limbs = d.limbs();
    if limbs > key.digits.len() {
        return Err(Error::Internal("key-switching key shorter than operand"));
    }
    let n = d.ring_dim();
    let mask = (1u64 << key.base_bits) - 1;

    let mut p0 = ring.zero(limbs);
    p0.set_flags(true, false);
    let mut p1 = p0.clone();

    for i in 0..limbs {
        for j in 0..key.digits[i] {
            let mut w = ring.zero(limbs);
            for c in 0..n {
                let digit = (d.limb(i)[c] >> (key.base_bits * j as u32)) & mask;
                for l in 0..limbs {
                    w.limb_mut(l)[c] = digit % ring.modulus_at(l).value();
                }
            }
            ring.ntt_forward(&mut w);
            let row = key.offsets[i] + j;
            ring.mul_mont_acc(&mut p0, &w, &key.rows_b[row].truncated(limbs));
            ring.mul_mont_acc(&mut p1, &w, &key.rows_a[row].truncated(limbs));
        }
    }
    Ok((p0, p1))
}

fn digit_counts(ctx: &Context, base_bits: u32) -> Vec<usize> {
    ctx.ring_q()
        .moduli()
        .iter()
        .map(|m| {
            let bits = 64 - m.value().leading_zeros();
            bits.div_ceil(base_bits) as usize
        })
        .collect()
}

fn prefix_sums(digits: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(digits.len());
    let mut acc = 0;
    for &d in digits {
        offsets.push(acc);
        acc += d;
    }
    offsets
}
