//! Symmetric-key RLWE encryption.
//!
//! The engine itself only evaluates; this module provides the reference
//! cryptographic path the end-to-end tests (and any embedding
//! application) need: ternary secret keys, symmetric encryption and
//! decryption of ciphertexts up to degree 2.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::types::{Ciphertext, Plaintext};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::math::RnsPoly;

/// Discrete Gaussian sampler (Box–Muller with rounding).
#[derive(Debug, Clone)]
pub struct GaussianSampler {
    sigma: f64,
}

impl GaussianSampler {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> i64 {
        let u1: f64 = rng.gen();
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        (z * self.sigma).round() as i64
    }

    pub fn sample_vec<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<i64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}

/// Ternary secret key with its NTT+Montgomery form over the full chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKey {
    ternary: Vec<i64>,
    ntt_mont: RnsPoly,
}

impl SecretKey {
    pub fn generate<R: Rng>(ctx: &Context, rng: &mut R) -> Self {
        let n = ctx.params().ring_dim();
        let ternary: Vec<i64> = (0..n).map(|_| rng.gen_range(-1i64..=1)).collect();
        let ring = ctx.ring_q();
        let mut ntt_mont = ring.from_signed_coeffs(&ternary, ring.limb_count());
        ring.ntt_forward(&mut ntt_mont);
        ring.to_montgomery(&mut ntt_mont);
        Self { ternary, ntt_mont }
    }

    pub(crate) fn ternary(&self) -> &[i64] {
        &self.ternary
    }

    /// NTT+Montgomery form truncated to the first `limbs` limbs.
    pub(crate) fn ntt_mont_at(&self, limbs: usize) -> RnsPoly {
        self.ntt_mont.truncated(limbs)
    }
}

/// Encrypt a plaintext under `sk`: `(c0, c1) = (−a·s + e + pt, a)`.
pub fn encrypt_symmetric<R: Rng>(
    ctx: &Context,
    sk: &SecretKey,
    pt: &Plaintext,
    rng: &mut R,
) -> Result<Ciphertext> {
    debug_assert!(pt.poly.is_ntt() && !pt.poly.is_montgomery());
    let ring = ctx.ring_q();
    let limbs = pt.level() + 1;
    let sampler = GaussianSampler::new(ctx.params().sigma());

    let mut a = ring.random(limbs, rng);
    a.set_flags(true, false);

    let mut e = ring.from_signed_coeffs(&sampler.sample_vec(ring.ring_dim(), rng), limbs);
    ring.ntt_forward(&mut e);

    let s = sk.ntt_mont_at(limbs);
    let mut c0 = a.clone();
    ring.mul_mont_assign(&mut c0, &s);
    ring.neg_assign(&mut c0);
    ring.add_assign(&mut c0, &e);
    ring.add_assign(&mut c0, &pt.poly);

    Ok(Ciphertext { cts: vec![c0, a], meta: pt.meta })
}

/// Decrypt a ciphertext of degree at most 2 by evaluating the phase
/// `Σ c_i·s^i` with Horner's rule in the NTT domain.
pub fn decrypt(ctx: &Context, sk: &SecretKey, ct: &Ciphertext) -> Result<Plaintext> {
    if ct.degree() > 2 {
        return Err(Error::DegreeUnsupported { degree: ct.degree(), max: 2 });
    }
    debug_assert!(ct.meta.is_ntt && !ct.meta.is_montgomery);
    let ring = ctx.ring_q();
    let limbs = ct.level() + 1;
    let s = sk.ntt_mont_at(limbs);

    let mut phase = ct.cts[ct.degree()].clone();
    for i in (0..ct.degree()).rev() {
        ring.mul_mont_assign(&mut phase, &s);
        ring.add_assign(&mut phase, &ct.cts[i]);
    }

    let mut meta = ct.meta;
    meta.is_montgomery = false;
    Ok(Plaintext { poly: phase, meta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    /// Recover the mod-T message from a decrypted phase: scale down by
    /// T and reconstruct centered mod T.
    fn phase_to_ring_t(ctx: &Context, pt: &Plaintext) -> Vec<u64> {
        let ring = ctx.ring_q();
        let mut poly = pt.poly.clone();
        ring.ntt_inverse(&mut poly);
        ring.scalar_mul_assign(&mut poly, ctx.t_mod_q());
        let out = ctx.q_to_t().convert(&poly, 1);
        out.limb(0).to_vec()
    }

    /// Build the scaled-up plaintext m·T⁻¹ mod Q from mod-T coefficients.
    fn ring_t_to_plaintext(ctx: &Context, coeffs: &[u64], level: usize) -> Plaintext {
        let ring = ctx.ring_q();
        let mut pt = ctx.new_plaintext(level, 1).unwrap();
        let mut poly = ring.zero(level + 1);
        for i in 0..=level {
            let m = ring.modulus_at(i);
            let inv_t = ctx.t_inv_mod_q()[i];
            for (j, &c) in coeffs.iter().enumerate() {
                poly.limb_mut(i)[j] = m.mul(c % m.value(), inv_t);
            }
        }
        ring.ntt_forward(&mut poly);
        pt.poly = poly;
        pt
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let ctx = Context::new(Parameters::insecure_toy()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let sk = SecretKey::generate(&ctx, &mut rng);

        let msg: Vec<u64> = (0..16).map(|i| (i * i + 3) as u64 % 65537).collect();
        let pt = ring_t_to_plaintext(&ctx, &msg, 1);
        let ct = encrypt_symmetric(&ctx, &sk, &pt, &mut rng).unwrap();
        assert_eq!(ct.degree(), 1);

        let dec = decrypt(&ctx, &sk, &ct).unwrap();
        assert_eq!(phase_to_ring_t(&ctx, &dec), msg);
    }

    #[test]
    fn test_decrypt_rejects_high_degree() {
        let ctx = Context::new(Parameters::insecure_toy()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let sk = SecretKey::generate(&ctx, &mut rng);
        let mut ct = ctx.new_ciphertext(2, 1, 1).unwrap();
        ct.cts.push(ct.cts[0].clone());
        assert!(matches!(
            decrypt(&ctx, &sk, &ct),
            Err(Error::DegreeUnsupported { degree: 3, .. })
        ));
    }

    #[test]
    fn test_secret_key_is_ternary() {
        let ctx = Context::new(Parameters::insecure_toy()).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let sk = SecretKey::generate(&ctx, &mut rng);
        assert!(sk.ternary().iter().all(|&c| (-1..=1).contains(&c)));
    }
}
