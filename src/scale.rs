//! Scale matching for additions between ciphertexts.
//!
//! Two ciphertexts carry messages `m0/s0` and `m1/s1` modulo T. Before
//! adding them, both are brought to a common scale by multiplying each
//! with a small integer correction factor. The factors come from the
//! extended Euclidean descent on `(T, s1·s0⁻¹ mod T)`: every remainder
//! pair `(a, b)` in the descent satisfies `a ≡ ratio·b (mod T)`, so
//! scaling the first ciphertext by `a` and the second by `b` lands both
//! at scale `s0·a`. The pair with the smallest combined centered
//! magnitude is chosen to keep the noise growth minimal.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::center;

/// Correction factors `(r0, r1)` and the common scale they produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleMatch {
    pub scale: u64,
    pub r0: i64,
    pub r1: i64,
}

/// Find small signed factors with `r0·s0 ≡ r1·s1 (mod T)`.
///
/// Requires both scales to be units modulo T; composite plaintext
/// moduli reject non-unit scales at encode time already.
pub fn match_scales(ctx: &Context, s0: u64, s1: u64) -> Result<ScaleMatch> {
    let t = ctx.plain_modulus();
    if s0 == s1 {
        return Ok(ScaleMatch { scale: s0, r0: 1, r1: 1 });
    }
    let s0_inv = ctx.inv_mod_t(s0).ok_or(Error::ScaleNotUnit(s0))?;
    ctx.inv_mod_t(s1).ok_or(Error::ScaleNotUnit(s1))?;
    let ratio = ctx.mul_mod_t(s1, s0_inv);

    let (r0, r1) = balance_correction_factors(t, ratio);
    let scale = ctx.mul_mod_t(s1, reduce_signed_mod(r1, t));
    Ok(ScaleMatch { scale, r0, r1 })
}

/// Euclidean descent on `(t, ratio)`: the remainder sequence paired
/// with its Bézout coefficients yields all candidates `(a, b)` with
/// `a ≡ ratio·b (mod t)`. Among the coprime-to-t candidates, keep the
/// one minimizing `|a| + |b|` over centered representatives.
fn balance_correction_factors(t: u64, ratio: u64) -> (i64, i64) {
    debug_assert!(ratio != 0 && ratio < t);

    let mut r_prev = t as i128;
    let mut r_cur = ratio as i128;
    let mut b_prev: i128 = 0;
    let mut b_cur: i128 = 1;

    let mut best: Option<(i64, i64, u64)> = None;
    // (a, b) = (r_cur, b_cur) satisfies r_cur ≡ ratio·b_cur (mod t)
    while r_cur != 0 {
        let a = center(r_cur.rem_euclid(t as i128) as u64, t);
        let b = center(b_cur.rem_euclid(t as i128) as u64, t);
        let cost = a.unsigned_abs() + b.unsigned_abs();
        if gcd(a.unsigned_abs(), t) == 1 {
            match best {
                Some((_, _, c)) if c <= cost => {}
                _ => best = Some((a, b, cost)),
            }
        }
        let quot = r_prev / r_cur;
        let r_next = r_prev - quot * r_cur;
        let b_next = b_prev - quot * b_cur;
        r_prev = r_cur;
        r_cur = r_next;
        b_prev = b_cur;
        b_cur = b_next;
    }
    // ratio is a unit, so (ratio, 1) was a valid candidate
    best.map(|(a, b, _)| (a, b)).unwrap_or((1, 1))
}

fn reduce_signed_mod(x: i64, t: u64) -> u64 {
    (x as i128).rem_euclid(t as i128) as u64
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
