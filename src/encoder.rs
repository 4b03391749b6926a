//! SIMD plaintext encoder.
//!
//! Batched encoding views the N slots as a 2 × N/2 matrix: the odd
//! powers of the 2N-th root of unity mod T split into the orbit of 5
//! (row 0) and its negation (row 1). Values are placed at the
//! bit-reversed NTT positions of those exponents, inverse-transformed
//! over Z_T, then lifted to the ciphertext basis with the T⁻¹
//! scale-up. Galois automorphisms X → X^(5^k) then act as column
//! rotations and X → X^(2N−1) as the row swap.

use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::{bit_reverse, center};
use crate::rlwe::{Plaintext, PlaintextRingT};

/// Packs integer vectors into plaintexts and back.
///
/// Cheap to `shallow_copy`: the tables live in the shared context, the
/// scratch buffer is private.
///
/// # Example
///
/// ```
/// use bgv_rns::{context::Context, encoder::Encoder, params::Parameters};
///
/// let ctx = Context::new(Parameters::insecure_toy()).unwrap();
/// let mut encoder = Encoder::new(ctx.clone());
/// let mut pt = ctx.new_plaintext(ctx.params().max_level(), 1).unwrap();
/// encoder.encode(&[1, 2, 3, 4], &mut pt).unwrap();
/// let decoded = encoder.decode(&pt).unwrap();
/// assert_eq!(&decoded[..4], &[1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    ctx: Arc<Context>,
    index_matrix: Option<Vec<usize>>,
    buf: Vec<u64>,
}

impl Encoder {
    pub fn new(ctx: Arc<Context>) -> Self {
        let n = ctx.params().ring_dim();
        let index_matrix = if ctx.params().supports_batching() {
            Some(build_index_matrix(n))
        } else {
            None
        };
        Self { ctx, index_matrix, buf: vec![0u64; n] }
    }

    /// New encoder sharing the tables but owning fresh scratch.
    pub fn shallow_copy(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            index_matrix: self.index_matrix.clone(),
            buf: vec![0u64; self.buf.len()],
        }
    }

    /// Pack `values` (reduced mod T) into `pt` at its level and scale.
    pub fn encode(&mut self, values: &[u64], pt: &mut Plaintext) -> Result<()> {
        let rt = self.encode_ring_t(values, pt.meta.scale)?;
        self.embed(&rt, pt.level(), false, pt)
    }

    /// Pack signed values, centered into `[0, T)`.
    pub fn encode_signed(&mut self, values: &[i64], pt: &mut Plaintext) -> Result<()> {
        let t = self.ctx.plain_modulus() as i128;
        let unsigned: Vec<u64> = values.iter().map(|&v| (v as i128).rem_euclid(t) as u64).collect();
        self.encode(&unsigned, pt)
    }

    /// Unpack a plaintext into its N slot values.
    pub fn decode(&mut self, pt: &Plaintext) -> Result<Vec<u64>> {
        let rt = self.to_ring_t(pt)?;
        self.decode_ring_t(&rt)
    }

    /// Unpack into signed values centered in `(−T/2, T/2]`.
    pub fn decode_signed(&mut self, pt: &Plaintext) -> Result<Vec<i64>> {
        let t = self.ctx.plain_modulus();
        Ok(self.decode(pt)?.into_iter().map(|v| center(v, t)).collect())
    }

    /// Encode values into the coefficient-form mod-T polynomial.
    pub fn encode_ring_t(&mut self, values: &[u64], scale: u64) -> Result<PlaintextRingT> {
        let n = self.ctx.params().ring_dim();
        let t = self.ctx.plain_modulus();
        if values.len() > n {
            return Err(Error::TooManyValues { got: values.len(), capacity: n });
        }
        if self.ctx.inv_mod_t(scale).is_none() {
            return Err(Error::ScaleNotUnit(scale));
        }

        self.buf.iter_mut().for_each(|x| *x = 0);
        match &self.index_matrix {
            Some(index) => {
                for (i, &v) in values.iter().enumerate() {
                    self.buf[index[i]] = self.ctx.mul_mod_t(v % t, scale);
                }
                let table = self.ctx.t_ntt().ok_or(Error::Internal("batching table missing"))?;
                table.inverse(&mut self.buf);
            }
            None => {
                for (i, &v) in values.iter().enumerate() {
                    self.buf[i] = self.ctx.mul_mod_t(v % t, scale);
                }
            }
        }
        Ok(PlaintextRingT {
            coeffs: self.buf.clone(),
            scale,
            is_batched: self.index_matrix.is_some(),
        })
    }

    /// Read slot values back out of a mod-T polynomial. Shorter
    /// coefficient vectors are zero-padded to the ring degree.
    pub fn decode_ring_t(&mut self, rt: &PlaintextRingT) -> Result<Vec<u64>> {
        if rt.coeffs.len() > self.buf.len() {
            return Err(Error::TooManyValues { got: rt.coeffs.len(), capacity: self.buf.len() });
        }
        let scale_inv = self.ctx.inv_mod_t(rt.scale).ok_or(Error::ScaleNotUnit(rt.scale))?;
        self.buf.iter_mut().for_each(|x| *x = 0);
        self.buf[..rt.coeffs.len()].copy_from_slice(&rt.coeffs);
        for x in self.buf.iter_mut() {
            *x = self.ctx.mul_mod_t(*x, scale_inv);
        }
        match &self.index_matrix {
            Some(index) if rt.is_batched => {
                let table = self.ctx.t_ntt().ok_or(Error::Internal("batching table missing"))?;
                table.forward(&mut self.buf);
                Ok(index.iter().map(|&idx| self.buf[idx]).collect())
            }
            _ => Ok(self.buf.clone()),
        }
    }

    /// Lift a mod-T polynomial into the ciphertext basis at `level`,
    /// multiplying by T⁻¹ mod each prime so the message sits in the
    /// high-order bits. `montgomery` additionally enters the Montgomery
    /// domain for plaintexts meant for repeated multiplication.
    pub fn embed(
        &self,
        rt: &PlaintextRingT,
        level: usize,
        montgomery: bool,
        pt: &mut Plaintext,
    ) -> Result<()> {
        if level > self.ctx.params().max_level() {
            return Err(Error::LevelMismatch { expected: self.ctx.params().max_level(), got: level });
        }
        let n = self.ctx.params().ring_dim();
        if rt.coeffs.len() > n {
            return Err(Error::TooManyValues { got: rt.coeffs.len(), capacity: n });
        }
        let ring = self.ctx.ring_q();
        let mut poly = ring.zero(level + 1);
        for i in 0..=level {
            let m = ring.modulus_at(i);
            let inv_t = self.ctx.t_inv_mod_q()[i];
            let limb = poly.limb_mut(i);
            for (j, &c) in rt.coeffs.iter().enumerate() {
                limb[j] = m.mul(c % m.value(), inv_t);
            }
        }
        ring.ntt_forward(&mut poly);
        if montgomery {
            ring.to_montgomery(&mut poly);
        }
        pt.poly = poly;
        pt.meta.level = level;
        pt.meta.scale = rt.scale;
        pt.meta.is_ntt = true;
        pt.meta.is_montgomery = montgomery;
        pt.meta.is_batched = rt.is_batched;
        Ok(())
    }

    /// Undo `embed`: back to the coefficient-form mod-T polynomial,
    /// multiplying by T and reconstructing centered residues.
    pub fn to_ring_t(&self, pt: &Plaintext) -> Result<PlaintextRingT> {
        let ring = self.ctx.ring_q();
        let mut poly = pt.poly.clone();
        if poly.is_montgomery() {
            ring.from_montgomery(&mut poly);
        }
        if poly.is_ntt() {
            ring.ntt_inverse(&mut poly);
        }
        ring.scalar_mul_assign(&mut poly, self.ctx.t_mod_q());
        let reconstructed = self.ctx.q_to_t().convert(&poly, 1);
        Ok(PlaintextRingT {
            coeffs: reconstructed.limb(0).to_vec(),
            scale: pt.meta.scale,
            is_batched: pt.meta.is_batched,
        })
    }
}

/// Slot-to-coefficient placement: slot `i` of row 0 lives at the
/// bit-reversed NTT position of exponent 5^i, row 1 at its negation.
fn build_index_matrix(n: usize) -> Vec<usize> {
    let two_n = 2 * n as u64;
    let log_n = n.trailing_zeros();
    let mut index = vec![0usize; n];
    let mut pos = 1u64;
    for i in 0..n / 2 {
        let idx1 = ((pos - 1) / 2) as usize;
        let idx2 = ((two_n - pos - 1) / 2) as usize;
        index[i] = bit_reverse(idx1, log_n);
        index[i + n / 2] = bit_reverse(idx2, log_n);
        pos = pos * 5 % two_n;
    }
    index
}
