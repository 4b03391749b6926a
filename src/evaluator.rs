//! Homomorphic evaluation.
//!
//! The evaluator consumes ciphertexts whose components live in the NTT
//! domain and keep the message in the high-order bits (the scaled-up
//! form `m·T⁻¹ mod Q`). Additions realign scales with small correction
//! factors, standard multiplication folds the required factor of T into
//! one Montgomery product per component, and scale-invariant
//! multiplication tensors over the auxiliary basis and divides by Q.

use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::ks::{key_switch, EvaluationKeys};
use crate::math::RnsPoly;
use crate::rlwe::{Ciphertext, Plaintext};
use crate::scale::match_scales;

/// Right-hand side of a binary evaluator operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Ciphertext(&'a Ciphertext),
    Plaintext(&'a Plaintext),
    Scalar(i128),
    Vector(&'a [u64]),
    SignedVector(&'a [i64]),
}

impl<'a> From<&'a Ciphertext> for Operand<'a> {
    fn from(ct: &'a Ciphertext) -> Self {
        Operand::Ciphertext(ct)
    }
}

impl<'a> From<&'a Plaintext> for Operand<'a> {
    fn from(pt: &'a Plaintext) -> Self {
        Operand::Plaintext(pt)
    }
}

impl From<i128> for Operand<'_> {
    fn from(c: i128) -> Self {
        Operand::Scalar(c)
    }
}

impl From<i64> for Operand<'_> {
    fn from(c: i64) -> Self {
        Operand::Scalar(c as i128)
    }
}

impl<'a> From<&'a [u64]> for Operand<'a> {
    fn from(v: &'a [u64]) -> Self {
        Operand::Vector(v)
    }
}

impl<'a> From<&'a [i64]> for Operand<'a> {
    fn from(v: &'a [i64]) -> Self {
        Operand::SignedVector(v)
    }
}

/// Stateful evaluation engine; cheap to `shallow_copy` per thread.
#[derive(Debug, Clone)]
pub struct Evaluator {
    ctx: Arc<Context>,
    keys: Arc<EvaluationKeys>,
    encoder: Encoder,
}

impl Evaluator {
    pub fn new(ctx: Arc<Context>, keys: Arc<EvaluationKeys>) -> Self {
        let encoder = Encoder::new(ctx.clone());
        Self { ctx, keys, encoder }
    }

    /// New evaluator sharing the context and keys, owning fresh scratch.
    pub fn shallow_copy(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            keys: self.keys.clone(),
            encoder: self.encoder.shallow_copy(),
        }
    }

    pub fn add(&mut self, ct: &mut Ciphertext, rhs: Operand) -> Result<()> {
        self.add_sub(ct, rhs, false)
    }

    pub fn sub(&mut self, ct: &mut Ciphertext, rhs: Operand) -> Result<()> {
        self.add_sub(ct, rhs, true)
    }

    pub fn add_new(&mut self, ct: &Ciphertext, rhs: Operand) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.add_sub(&mut out, rhs, false)?;
        Ok(out)
    }

    pub fn sub_new(&mut self, ct: &Ciphertext, rhs: Operand) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.add_sub(&mut out, rhs, true)?;
        Ok(out)
    }

    pub fn negate(&self, ct: &mut Ciphertext) {
        let ring = self.ctx.ring_q();
        for c in &mut ct.cts {
            ring.neg_assign(c);
        }
    }

    fn add_sub(&mut self, ct: &mut Ciphertext, rhs: Operand, negate: bool) -> Result<()> {
        match rhs {
            Operand::Ciphertext(other) => {
                check_level(ct.level(), other.level())?;
                let m = match_scales(&self.ctx, ct.scale(), other.scale())?;
                let ring = self.ctx.ring_q();
                if m.r0 != 1 {
                    for c in &mut ct.cts {
                        ring.scalar_mul_signed(c, m.r0);
                    }
                }
                while ct.degree() < other.degree() {
                    let mut z = ring.zero(ct.level() + 1);
                    z.set_flags(true, false);
                    ct.cts.push(z);
                }
                for (i, comp) in other.cts.iter().enumerate() {
                    if m.r1 != 1 {
                        let mut c = comp.clone();
                        ring.scalar_mul_signed(&mut c, m.r1);
                        if negate {
                            ring.sub_assign(&mut ct.cts[i], &c);
                        } else {
                            ring.add_assign(&mut ct.cts[i], &c);
                        }
                    } else if negate {
                        ring.sub_assign(&mut ct.cts[i], comp);
                    } else {
                        ring.add_assign(&mut ct.cts[i], comp);
                    }
                }
                ct.meta.scale = m.scale;
                Ok(())
            }
            Operand::Plaintext(pt) => {
                check_level(ct.level(), pt.level())?;
                let m = match_scales(&self.ctx, ct.scale(), pt.scale())?;
                let ring = self.ctx.ring_q();
                if m.r0 != 1 {
                    for c in &mut ct.cts {
                        ring.scalar_mul_signed(c, m.r0);
                    }
                }
                let mut p = pt.poly.clone();
                if p.is_montgomery() {
                    ring.from_montgomery(&mut p);
                }
                if m.r1 != 1 {
                    ring.scalar_mul_signed(&mut p, m.r1);
                }
                if negate {
                    ring.sub_assign(&mut ct.cts[0], &p);
                } else {
                    ring.add_assign(&mut ct.cts[0], &p);
                }
                ct.meta.scale = m.scale;
                Ok(())
            }
            Operand::Scalar(c) => {
                let t = self.ctx.plain_modulus();
                // reduce before negating; -i128::MIN does not exist
                let mut c_t = c.rem_euclid(t as i128) as u64;
                if negate {
                    c_t = (t - c_t) % t;
                }
                // a constant polynomial evaluates to itself at every
                // NTT point, so one value per limb covers all coeffs
                let u = self.ctx.mul_mod_t(c_t, ct.scale());
                let ring = self.ctx.ring_q();
                for comp in &mut ct.cts[..1] {
                    for i in 0..comp.limbs() {
                        let m = ring.modulus_at(i);
                        let add_u = m.mul(u % m.value(), self.ctx.t_inv_mod_q()[i]);
                        for x in comp.limb_mut(i) {
                            *x = m.add(*x, add_u);
                        }
                    }
                }
                Ok(())
            }
            Operand::Vector(v) => {
                let rt = self.encoder.encode_ring_t(v, ct.scale())?;
                let mut pt = self.ctx.new_plaintext(ct.level(), ct.scale())?;
                self.encoder.embed(&rt, ct.level(), false, &mut pt)?;
                let ring = self.ctx.ring_q();
                if negate {
                    ring.sub_assign(&mut ct.cts[0], &pt.poly);
                } else {
                    ring.add_assign(&mut ct.cts[0], &pt.poly);
                }
                Ok(())
            }
            Operand::SignedVector(v) => {
                let t = self.ctx.plain_modulus() as i128;
                let unsigned: Vec<u64> =
                    v.iter().map(|&x| (x as i128).rem_euclid(t) as u64).collect();
                self.add_sub(ct, Operand::Vector(&unsigned), negate)
            }
        }
    }

    pub fn mul(&mut self, ct: &mut Ciphertext, rhs: Operand) -> Result<()> {
        let out = self.mul_new(ct, rhs)?;
        *ct = out;
        Ok(())
    }

    /// Standard multiplication: scales multiply, noise scales with the
    /// full message magnitude. Rescale afterwards to tame it.
    pub fn mul_new(&mut self, ct: &Ciphertext, rhs: Operand) -> Result<Ciphertext> {
        match rhs {
            Operand::Ciphertext(other) => {
                check_level(ct.level(), other.level())?;
                let out_degree = ct.degree() + other.degree();
                if out_degree > 2 {
                    return Err(Error::DegreeUnsupported { degree: out_degree, max: 2 });
                }
                let ring = self.ctx.ring_q();
                // fold the required factor of T into the Montgomery
                // entry of one operand: mul_mont(x, T·2^128) = MForm(T·x)
                let b_mont: Vec<RnsPoly> = other
                    .cts
                    .iter()
                    .map(|p| {
                        let mut c = p.clone();
                        ring.scalar_mul_mont_entering(&mut c, self.ctx.t_mont_mod_q());
                        c
                    })
                    .collect();
                let mut out = self.ctx.new_ciphertext(out_degree, ct.level(), 1)?;
                if std::ptr::eq(ct, other) {
                    // squaring: both degree-1, one cross product doubled
                    ring.mul_mont_acc(&mut out.cts[0], &ct.cts[0], &b_mont[0]);
                    ring.mul_mont_acc(&mut out.cts[1], &ct.cts[0], &b_mont[1]);
                    let cross = out.cts[1].clone();
                    ring.add_assign(&mut out.cts[1], &cross);
                    ring.mul_mont_acc(&mut out.cts[2], &ct.cts[1], &b_mont[1]);
                } else {
                    for i in 0..=ct.degree() {
                        for j in 0..=other.degree() {
                            ring.mul_mont_acc(&mut out.cts[i + j], &ct.cts[i], &b_mont[j]);
                        }
                    }
                }
                out.meta.scale = self.ctx.mul_mod_t(ct.scale(), other.scale());
                out.meta.is_batched = ct.meta.is_batched;
                Ok(out)
            }
            Operand::Plaintext(pt) => {
                check_level(ct.level(), pt.level())?;
                let ring = self.ctx.ring_q();
                let mut p = pt.poly.clone();
                if p.is_montgomery() {
                    // already Montgomery: a plain multiply by T suffices
                    ring.scalar_mul_assign(&mut p, self.ctx.t_mod_q());
                } else {
                    ring.scalar_mul_mont_entering(&mut p, self.ctx.t_mont_mod_q());
                }
                let mut out = ct.clone();
                for c in &mut out.cts {
                    ring.mul_mont_assign(c, &p);
                }
                out.meta.scale = self.ctx.mul_mod_t(ct.scale(), pt.scale());
                Ok(out)
            }
            Operand::Scalar(c) => {
                let ring = self.ctx.ring_q();
                let factors: Vec<u64> =
                    (0..=ct.level()).map(|i| ring.modulus_at(i).reduce_i128(c)).collect();
                let mut out = ct.clone();
                for comp in &mut out.cts {
                    ring.scalar_mul_assign(comp, &factors);
                }
                Ok(out)
            }
            Operand::Vector(v) => {
                let rt = self.encoder.encode_ring_t(v, 1)?;
                let mut pt = self.ctx.new_plaintext(ct.level(), 1)?;
                self.encoder.embed(&rt, ct.level(), false, &mut pt)?;
                self.mul_new(ct, Operand::Plaintext(&pt))
            }
            Operand::SignedVector(v) => {
                let t = self.ctx.plain_modulus() as i128;
                let unsigned: Vec<u64> =
                    v.iter().map(|&x| (x as i128).rem_euclid(t) as u64).collect();
                self.mul_new(ct, Operand::Vector(&unsigned))
            }
        }
    }

    pub fn mul_relin(&mut self, ct: &mut Ciphertext, rhs: Operand) -> Result<()> {
        let mut out = self.mul_new(ct, rhs)?;
        self.relinearize(&mut out)?;
        *ct = out;
        Ok(())
    }

    /// Multiply-accumulate: `acc += ct · rhs`, realigning scales.
    pub fn mul_then_add(
        &mut self,
        acc: &mut Ciphertext,
        ct: &Ciphertext,
        rhs: Operand,
    ) -> Result<()> {
        let prod = self.mul_new(ct, rhs)?;
        self.add_sub(acc, Operand::Ciphertext(&prod), false)
    }

    /// Like [`mul_then_add`](Self::mul_then_add) but relinearizes the
    /// product first, keeping the accumulator at degree 1.
    pub fn mul_relin_then_add(
        &mut self,
        acc: &mut Ciphertext,
        ct: &Ciphertext,
        rhs: Operand,
    ) -> Result<()> {
        let mut prod = self.mul_new(ct, rhs)?;
        self.relinearize(&mut prod)?;
        self.add_sub(acc, Operand::Ciphertext(&prod), false)
    }

    /// Scale-invariant multiplication: tensor over Q and the auxiliary
    /// basis jointly, multiply by T, divide by Q with rounding. Noise
    /// stays proportional to the inputs' noise rather than to Q.
    pub fn mul_scale_invariant(
        &self,
        ct: &Ciphertext,
        other: &Ciphertext,
    ) -> Result<Ciphertext> {
        check_level(ct.level(), other.level())?;
        let out_degree = ct.degree() + other.degree();
        if out_degree > 2 {
            return Err(Error::DegreeUnsupported { degree: out_degree, max: 2 });
        }
        let level = ct.level();
        let ring_q = self.ctx.ring_q();
        let ring_aux = self.ctx.ring_aux()?;
        let q_to_aux = self.ctx.q_to_aux()?;
        let aux_to_q = self.ctx.aux_to_q()?;
        let aux_limbs = ring_aux.limb_count();

        // lift both operands into the auxiliary basis
        let to_aux = |comps: &[RnsPoly]| -> Vec<RnsPoly> {
            comps
                .iter()
                .map(|p| {
                    let mut c = p.clone();
                    ring_q.ntt_inverse(&mut c);
                    let mut a = q_to_aux.convert(&c, aux_limbs);
                    ring_aux.ntt_forward(&mut a);
                    a
                })
                .collect()
        };
        let a_aux = to_aux(&ct.cts);
        let mut b_aux = to_aux(&other.cts);
        for p in &mut b_aux {
            ring_aux.to_montgomery(p);
        }
        let b_q: Vec<RnsPoly> = other
            .cts
            .iter()
            .map(|p| {
                let mut c = p.clone();
                ring_q.to_montgomery(&mut c);
                c
            })
            .collect();

        // tensor in both bases
        let mut d_q: Vec<RnsPoly> = (0..=out_degree)
            .map(|_| {
                let mut z = ring_q.zero(level + 1);
                z.set_flags(true, false);
                z
            })
            .collect();
        let mut d_aux: Vec<RnsPoly> = (0..=out_degree)
            .map(|_| {
                let mut z = ring_aux.zero(aux_limbs);
                z.set_flags(true, false);
                z
            })
            .collect();
        for i in 0..=ct.degree() {
            for j in 0..=other.degree() {
                ring_q.mul_mont_acc(&mut d_q[i + j], &ct.cts[i], &b_q[j]);
                ring_aux.mul_mont_acc(&mut d_aux[i + j], &a_aux[i], &b_aux[j]);
            }
        }

        // T·d over both bases, then round(T·d / Q) back onto Q
        let mut out = self.ctx.new_ciphertext(out_degree, level, 1)?;
        for k in 0..=out_degree {
            ring_q.ntt_inverse(&mut d_q[k]);
            ring_q.scalar_mul_assign(&mut d_q[k], self.ctx.t_mod_q());
            ring_aux.ntt_inverse(&mut d_aux[k]);
            ring_aux.scalar_mul_assign(&mut d_aux[k], self.ctx.t_mod_aux());
            q_to_aux.mod_down(&d_q[k], &mut d_aux[k]);
            let mut c = aux_to_q.convert(&d_aux[k], level + 1);
            ring_q.ntt_forward(&mut c);
            out.cts[k] = c;
        }
        let s = self.ctx.mul_mod_t(ct.scale(), other.scale());
        out.meta.scale = self.ctx.mul_mod_t(s, self.ctx.neg_q_inv_mod_t(level));
        out.meta.is_batched = ct.meta.is_batched;
        Ok(out)
    }

    pub fn mul_relin_scale_invariant(
        &self,
        ct: &Ciphertext,
        other: &Ciphertext,
    ) -> Result<Ciphertext> {
        let mut out = self.mul_scale_invariant(ct, other)?;
        self.relinearize(&mut out)?;
        Ok(out)
    }

    /// Switch the degree-2 component back under the secret key.
    pub fn relinearize(&self, ct: &mut Ciphertext) -> Result<()> {
        if ct.degree() < 2 {
            return Ok(());
        }
        let key = self.keys.relin.as_ref().ok_or(Error::MissingRelinearizationKey)?;
        let ring = self.ctx.ring_q();
        let mut d = ct.cts.pop().ok_or(Error::Internal("empty ciphertext"))?;
        ring.ntt_inverse(&mut d);
        let (p0, p1) = key_switch(&self.ctx, key, &d)?;
        ring.add_assign(&mut ct.cts[0], &p0);
        ring.add_assign(&mut ct.cts[1], &p1);
        Ok(())
    }

    pub fn relinearize_new(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        let mut out = ct.clone();
        self.relinearize(&mut out)?;
        Ok(out)
    }

    /// Drop the last prime of the chain, dividing message and noise by
    /// it. The scale absorbs the factor `q_L⁻¹ mod T`.
    pub fn rescale(&self, ct: &mut Ciphertext) -> Result<()> {
        if ct.level() == 0 {
            return Err(Error::LevelExhausted);
        }
        let ring = self.ctx.ring_q();
        let dropped = ct.level();
        for c in &mut ct.cts {
            ring.ntt_inverse(c);
            self.ctx.rescaler().divide_by_last_prime(c);
            ring.ntt_forward(c);
        }
        ct.meta.level = dropped - 1;
        ct.meta.scale = self.ctx.mul_mod_t(ct.meta.scale, self.ctx.q_inv_mod_t(dropped));
        debug!(level = ct.meta.level, scale = ct.meta.scale, "rescaled");
        Ok(())
    }

    /// Rotate the slot matrix columns left by `k`.
    pub fn rotate_columns(&self, ct: &Ciphertext, k: usize) -> Result<Ciphertext> {
        let half = self.ctx.params().ring_dim() / 2;
        let k = k % half;
        if k == 0 {
            return Ok(ct.clone());
        }
        self.apply_galois(ct, self.ctx.params().galois_element(k))
    }

    /// Swap the two rows of the slot matrix.
    pub fn rotate_rows(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.apply_galois(ct, self.ctx.params().galois_element_rows())
    }

    fn apply_galois(&self, ct: &Ciphertext, g: u64) -> Result<Ciphertext> {
        if !ct.meta.is_batched || !self.ctx.params().supports_batching() {
            return Err(Error::BatchingUnsupported);
        }
        if ct.degree() != 1 {
            return Err(Error::DegreeUnsupported { degree: ct.degree(), max: 1 });
        }
        let key = self.keys.galois.get(&g).ok_or(Error::MissingGaloisKey(g))?;
        let ring = self.ctx.ring_q();

        let mut c0 = ct.cts[0].clone();
        ring.ntt_inverse(&mut c0);
        let mut c0 = ring.automorphism(&c0, g);
        ring.ntt_forward(&mut c0);

        let mut c1 = ct.cts[1].clone();
        ring.ntt_inverse(&mut c1);
        let c1 = ring.automorphism(&c1, g);
        let (p0, p1) = key_switch(&self.ctx, key, &c1)?;
        ring.add_assign(&mut c0, &p0);

        Ok(Ciphertext { cts: vec![c0, p1], meta: ct.meta })
    }

    #[inline]
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    #[inline]
    pub fn keys(&self) -> &EvaluationKeys {
        &self.keys
    }
}

#[inline]
fn check_level(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::LevelMismatch { expected, got });
    }
    Ok(())
}
