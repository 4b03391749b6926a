//! Engine parameters: ring degree, modulus chains, plaintext modulus.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::is_prime;

/// Validated parameter set.
///
/// `moduli` is the ciphertext chain `Q` (the ciphertext level indexes a
/// prefix of it); `aux_moduli` is the disjoint basis `QMul` used by
/// scale-invariant tensoring, which must be large enough to hold the
/// degree-2 tensor product times the plaintext modulus. The plaintext
/// modulus is `plain_base^plain_power`; batched encoding additionally
/// requires it to be a prime congruent to 1 mod 2N.
///
/// # Example
///
/// ```
/// use bgv_rns::params::Parameters;
///
/// let params = Parameters::insecure_toy();
/// assert_eq!(params.ring_dim(), 16);
/// assert!(params.supports_batching());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    log_n: u32,
    moduli: Vec<u64>,
    aux_moduli: Vec<u64>,
    plain_base: u64,
    plain_power: u32,
    sigma: f64,
    ks_base_bits: u32,
}

impl Parameters {
    pub fn new(
        log_n: u32,
        moduli: Vec<u64>,
        aux_moduli: Vec<u64>,
        plain_base: u64,
        plain_power: u32,
        sigma: f64,
        ks_base_bits: u32,
    ) -> Result<Self> {
        let params = Self { log_n, moduli, aux_moduli, plain_base, plain_power, sigma, ks_base_bits };
        params.validate()?;
        Ok(params)
    }

    /// Tiny parameter set for tests and doctests. Offers no security.
    ///
    /// Noise budget: a coefficient-form plaintext reaches T/2 per
    /// coefficient even for small slot values, so multiplying by one
    /// costs a factor of up to `N·T/2 ≈ 2^19`. The ~86-bit chain keeps
    /// a tensoring (≈2^45 noise) followed by a plaintext multiplication
    /// under `Q/2`, with two rescaling levels to spend. The ~122-bit
    /// auxiliary basis covers the `T·N·Q/2` bound of scale-invariant
    /// tensoring.
    pub fn insecure_toy() -> Self {
        Self {
            log_n: 4,
            moduli: vec![167772161, 469762049, 1004535809],
            aux_moduli: vec![754974721, 998244353, 2013265921, 3221225473],
            plain_base: 65537,
            plain_power: 1,
            sigma: 3.2,
            ks_base_bits: 10,
        }
    }

    /// 128-bit-secure set at ring degree 4096 with one rescaling level.
    pub fn secure_128_n4096() -> Self {
        Self {
            log_n: 12,
            moduli: vec![1152921504606830593, 3221225473],
            aux_moduli: vec![2013265921, 998244353, 167772161, 469762049, 754974721],
            plain_base: 65537,
            plain_power: 1,
            sigma: 3.2,
            ks_base_bits: 20,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.log_n < 1 || self.log_n > 16 {
            return Err(Error::InvalidParameters(format!(
                "log_n {} outside supported range 1..=16",
                self.log_n
            )));
        }
        if self.moduli.is_empty() {
            return Err(Error::InvalidParameters("ciphertext chain is empty".into()));
        }
        let two_n = 2 * self.ring_dim() as u64;
        let mut seen = std::collections::HashSet::new();
        for &q in self.moduli.iter().chain(self.aux_moduli.iter()) {
            if !is_prime(q) {
                return Err(Error::InvalidParameters(format!("{} is not prime", q)));
            }
            if q >= (1u64 << 62) {
                return Err(Error::InvalidParameters(format!("{} exceeds 62 bits", q)));
            }
            if (q - 1) % two_n != 0 {
                return Err(Error::InvalidParameters(format!(
                    "{} is not NTT-friendly for degree {}",
                    q,
                    self.ring_dim()
                )));
            }
            if !seen.insert(q) {
                return Err(Error::InvalidParameters(format!("duplicate modulus {}", q)));
            }
        }
        let t = self
            .plain_base
            .checked_pow(self.plain_power)
            .filter(|&t| t >= 2)
            .ok_or_else(|| Error::InvalidParameters("plaintext modulus overflow".into()))?;
        if self.plain_power == 0 || (self.plain_power > 1 && !is_prime(self.plain_base)) {
            return Err(Error::InvalidParameters(
                "plaintext modulus must be a positive prime power".into(),
            ));
        }
        for &q in self.moduli.iter().chain(self.aux_moduli.iter()) {
            if gcd(t, q) != 1 {
                return Err(Error::InvalidParameters(format!(
                    "plaintext modulus {} shares a factor with modulus {}",
                    t, q
                )));
            }
        }
        if !(self.sigma > 0.0) {
            return Err(Error::InvalidParameters("sigma must be positive".into()));
        }
        if self.ks_base_bits == 0 || self.ks_base_bits > 32 {
            return Err(Error::InvalidParameters(
                "key-switching base must be between 1 and 32 bits".into(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn log_n(&self) -> u32 {
        self.log_n
    }

    #[inline]
    pub fn ring_dim(&self) -> usize {
        1usize << self.log_n
    }

    #[inline]
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    #[inline]
    pub fn aux_moduli(&self) -> &[u64] {
        &self.aux_moduli
    }

    /// Highest level: fresh ciphertexts carry `max_level() + 1` limbs.
    #[inline]
    pub fn max_level(&self) -> usize {
        self.moduli.len() - 1
    }

    #[inline]
    pub fn plain_modulus(&self) -> u64 {
        self.plain_base.pow(self.plain_power)
    }

    #[inline]
    pub fn plain_base(&self) -> u64 {
        self.plain_base
    }

    /// Euler totient of the plaintext modulus, the exponent group order
    /// used to invert scales when T is a prime power.
    pub fn plain_totient(&self) -> u64 {
        let t = self.plain_modulus();
        t / self.plain_base * (self.plain_base - 1)
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    #[inline]
    pub fn ks_base_bits(&self) -> u32 {
        self.ks_base_bits
    }

    /// SIMD batching needs the slot algebra to split completely, which
    /// holds when T is prime and T ≡ 1 mod 2N.
    pub fn supports_batching(&self) -> bool {
        let t = self.plain_modulus();
        self.plain_power == 1 && is_prime(t) && (t - 1) % (2 * self.ring_dim() as u64) == 0
    }

    /// Galois element realizing a column rotation by `k` slots.
    pub fn galois_element(&self, k: usize) -> u64 {
        let two_n = 2 * self.ring_dim() as u64;
        let mut g = 1u64;
        for _ in 0..(k % self.ring_dim()) {
            g = g * 5 % two_n;
        }
        g
    }

    /// Galois element swapping the two slot rows.
    pub fn galois_element_rows(&self) -> u64 {
        2 * self.ring_dim() as u64 - 1
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
