//! Shared read-only tables derived from a parameter set.
//!
//! A `Context` is built once and shared behind an `Arc` by the encoder,
//! the evaluator and the key material. Everything in it is immutable
//! after construction; per-engine scratch lives in the engines
//! themselves, which is what makes `shallow_copy` safe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::{mod_inverse, BasisExtender, NttTable, RnsRescaler, RnsRing};
use crate::params::Parameters;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    params: Parameters,
    ring_q: RnsRing,
    ring_aux: Option<RnsRing>,
    q_to_aux: Option<BasisExtender>,
    aux_to_q: Option<BasisExtender>,
    q_to_t: BasisExtender,
    rescaler: RnsRescaler,
    /// negacyclic NTT over Z_T, present when batching is supported
    t_ntt: Option<NttTable>,
    t: u64,
    /// T⁻¹ mod q_i (encode scale-up)
    t_inv_mod_q: Vec<u64>,
    /// T mod q_i (decode scale-down)
    t_mod_q: Vec<u64>,
    /// T·2^128 mod q_i, the standard-tensoring pre-factor: one
    /// Montgomery product by this folds the T multiply into the domain
    /// entry
    t_mont_mod_q: Vec<u64>,
    /// T mod each auxiliary prime
    t_mod_aux: Vec<u64>,
    /// q_i⁻¹ mod T (rescale scale update)
    q_inv_mod_t: Vec<u64>,
    /// (−Q_l mod T)⁻¹ mod T per level l (scale-invariant scale update)
    neg_q_inv_mod_t: Vec<u64>,
}

impl Context {
    pub fn new(params: Parameters) -> Result<Arc<Self>> {
        let n = params.ring_dim();
        let t = params.plain_modulus();
        if t % 2 == 0 {
            return Err(Error::InvalidParameters(
                "plaintext modulus must be odd".into(),
            ));
        }

        let ring_q = RnsRing::new(n, params.moduli())?;
        let (ring_aux, q_to_aux, aux_to_q) = if params.aux_moduli().is_empty() {
            (None, None, None)
        } else {
            (
                Some(RnsRing::new(n, params.aux_moduli())?),
                Some(BasisExtender::new(params.moduli(), params.aux_moduli())),
                Some(BasisExtender::new(params.aux_moduli(), params.moduli())),
            )
        };
        let q_to_t = BasisExtender::new(params.moduli(), &[t]);
        let rescaler = RnsRescaler::new(params.moduli());
        let t_ntt = if params.supports_batching() {
            NttTable::new(n, t)
        } else {
            None
        };

        let mut t_inv_mod_q = Vec::new();
        let mut t_mod_q = Vec::new();
        let mut t_mont_mod_q = Vec::new();
        let mut q_inv_mod_t = Vec::new();
        for m in ring_q.moduli() {
            let t_red = t % m.value();
            t_mod_q.push(t_red);
            t_inv_mod_q.push(
                m.inv(t_red)
                    .ok_or(Error::Internal("T not invertible mod chain prime"))?,
            );
            t_mont_mod_q.push(m.to_montgomery(m.to_montgomery(t_red)));
            q_inv_mod_t.push(
                mod_inverse(m.value() % t, t)
                    .ok_or(Error::Internal("chain prime not invertible mod T"))?,
            );
        }
        let t_mod_aux = params.aux_moduli().iter().map(|&p| t % p).collect();

        let mut neg_q_inv_mod_t = Vec::new();
        let mut q_mod_t = 1u64;
        for &q in params.moduli() {
            q_mod_t = mul_mod(q_mod_t, q % t, t);
            let neg = (t - q_mod_t) % t;
            neg_q_inv_mod_t.push(
                mod_inverse(neg, t).ok_or(Error::Internal("-Q not invertible mod T"))?,
            );
        }

        Ok(Arc::new(Self {
            params,
            ring_q,
            ring_aux,
            q_to_aux,
            aux_to_q,
            q_to_t,
            rescaler,
            t_ntt,
            t,
            t_inv_mod_q,
            t_mod_q,
            t_mont_mod_q,
            t_mod_aux,
            q_inv_mod_t,
            neg_q_inv_mod_t,
        }))
    }

    #[inline]
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    #[inline]
    pub fn ring_q(&self) -> &RnsRing {
        &self.ring_q
    }

    pub fn ring_aux(&self) -> Result<&RnsRing> {
        self.ring_aux
            .as_ref()
            .ok_or(Error::InvalidParameters("no auxiliary basis configured".into()))
    }

    pub fn q_to_aux(&self) -> Result<&BasisExtender> {
        self.q_to_aux
            .as_ref()
            .ok_or(Error::InvalidParameters("no auxiliary basis configured".into()))
    }

    pub fn aux_to_q(&self) -> Result<&BasisExtender> {
        self.aux_to_q
            .as_ref()
            .ok_or(Error::InvalidParameters("no auxiliary basis configured".into()))
    }

    #[inline]
    pub fn q_to_t(&self) -> &BasisExtender {
        &self.q_to_t
    }

    #[inline]
    pub fn rescaler(&self) -> &RnsRescaler {
        &self.rescaler
    }

    #[inline]
    pub fn t_ntt(&self) -> Option<&NttTable> {
        self.t_ntt.as_ref()
    }

    #[inline]
    pub fn plain_modulus(&self) -> u64 {
        self.t
    }

    #[inline]
    pub fn t_inv_mod_q(&self) -> &[u64] {
        &self.t_inv_mod_q
    }

    #[inline]
    pub fn t_mod_q(&self) -> &[u64] {
        &self.t_mod_q
    }

    #[inline]
    pub fn t_mont_mod_q(&self) -> &[u64] {
        &self.t_mont_mod_q
    }

    #[inline]
    pub fn t_mod_aux(&self) -> &[u64] {
        &self.t_mod_aux
    }

    /// Scale divisor applied when dropping the prime at chain index `i`.
    #[inline]
    pub fn q_inv_mod_t(&self, i: usize) -> u64 {
        self.q_inv_mod_t[i]
    }

    /// Scale divisor of scale-invariant tensoring at the given level.
    #[inline]
    pub fn neg_q_inv_mod_t(&self, level: usize) -> u64 {
        self.neg_q_inv_mod_t[level]
    }

    /// `a·b mod T`.
    #[inline]
    pub fn mul_mod_t(&self, a: u64, b: u64) -> u64 {
        mul_mod(a, b, self.t)
    }

    /// Inverse mod T, `None` for non-units.
    #[inline]
    pub fn inv_mod_t(&self, a: u64) -> Option<u64> {
        mod_inverse(a % self.t, self.t)
    }
}

#[inline]
pub(crate) fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toy_context_tables() {
        let ctx = Context::new(Parameters::insecure_toy()).unwrap();
        let t = ctx.plain_modulus();
        assert_eq!(t, 65537);
        assert!(ctx.t_ntt().is_some());

        for (i, m) in ctx.ring_q().moduli().iter().enumerate() {
            assert_eq!(m.mul(ctx.t_inv_mod_q()[i], t % m.value()), 1);
            assert_eq!(mul_mod(ctx.q_inv_mod_t(i), m.value() % t, t), 1);
        }

        // (−Q mod T)·neg_q_inv ≡ 1 at the top level
        let q_mod_t = ctx
            .params()
            .moduli()
            .iter()
            .fold(1u64, |acc, &q| mul_mod(acc, q % t, t));
        let neg = (t - q_mod_t) % t;
        assert_eq!(mul_mod(neg, ctx.neg_q_inv_mod_t(ctx.params().max_level()), t), 1);
    }

    #[test]
    fn test_even_plain_modulus_rejected() {
        let params = Parameters::new(4, vec![167772161], vec![], 2, 4, 3.2, 10).unwrap();
        assert!(Context::new(params).is_err());
    }
}
