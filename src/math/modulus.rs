//! Single-prime modular arithmetic with Montgomery reduction.
//!
//! Each RNS limb carries its residues modulo one word-sized prime. The
//! `Modulus` struct precomputes the Montgomery constants for that prime
//! once, so the hot loops reduce products with shifts and multiplies
//! instead of divisions.

use serde::{Deserialize, Serialize};

/// Arithmetic context for one odd modulus `q < 2^62`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modulus {
    q: u64,
    /// -q⁻¹ mod 2^64
    q_inv_neg: u64,
    /// 2^128 mod q, used to enter the Montgomery domain
    r_squared: u64,
}

impl Modulus {
    /// Build the context for `q`. Panics if `q` is even, zero, or ≥ 2^62.
    pub fn new(q: u64) -> Self {
        assert!(q > 1 && q % 2 == 1, "modulus must be odd and > 1");
        assert!(q < (1u64 << 62), "modulus must fit below 2^62");
        Self {
            q,
            q_inv_neg: compute_q_inv_neg(q),
            r_squared: compute_r_squared(q),
        }
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.q
    }

    #[inline]
    pub fn add(&self, a: u64, b: u64) -> u64 {
        let s = a + b;
        if s >= self.q {
            s - self.q
        } else {
            s
        }
    }

    #[inline]
    pub fn sub(&self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            a + self.q - b
        }
    }

    #[inline]
    pub fn neg(&self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.q - a
        }
    }

    /// Plain modular product via 128-bit widening.
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        ((a as u128 * b as u128) % self.q as u128) as u64
    }

    /// Montgomery product: returns `a·b·2⁻⁶⁴ mod q`.
    #[inline]
    pub fn mul_mont(&self, a: u64, b: u64) -> u64 {
        let t = a as u128 * b as u128;
        let m = (t as u64).wrapping_mul(self.q_inv_neg);
        let u = ((t + m as u128 * self.q as u128) >> 64) as u64;
        if u >= self.q {
            u - self.q
        } else {
            u
        }
    }

    /// Map `a` into the Montgomery domain (`a·2⁶⁴ mod q`).
    #[inline]
    pub fn to_montgomery(&self, a: u64) -> u64 {
        self.mul_mont(a, self.r_squared)
    }

    /// Map `a` out of the Montgomery domain.
    #[inline]
    pub fn from_montgomery(&self, a: u64) -> u64 {
        self.mul_mont(a, 1)
    }

    /// `a^e mod q` by square-and-multiply.
    pub fn pow(&self, a: u64, mut e: u64) -> u64 {
        let mut base = self.to_montgomery(a % self.q);
        let mut acc = self.to_montgomery(1);
        while e > 0 {
            if e & 1 == 1 {
                acc = self.mul_mont(acc, base);
            }
            base = self.mul_mont(base, base);
            e >>= 1;
        }
        self.from_montgomery(acc)
    }

    /// Multiplicative inverse, or `None` when `gcd(a, q) ≠ 1`.
    pub fn inv(&self, a: u64) -> Option<u64> {
        mod_inverse(a % self.q, self.q)
    }

    /// Reduce a signed value into `[0, q)`.
    #[inline]
    pub fn reduce_signed(&self, v: i64) -> u64 {
        let q = self.q as i128;
        let r = (v as i128).rem_euclid(q);
        r as u64
    }

    /// Reduce a wide signed value into `[0, q)`.
    #[inline]
    pub fn reduce_i128(&self, v: i128) -> u64 {
        v.rem_euclid(self.q as i128) as u64
    }
}

/// Newton iteration for `-q⁻¹ mod 2^64`; `q` must be odd.
fn compute_q_inv_neg(q: u64) -> u64 {
    // q·q ≡ 1 (mod 8) for odd q, so q is already correct to 3 bits.
    let mut inv = q;
    for _ in 0..5 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(q.wrapping_mul(inv)));
    }
    debug_assert_eq!(q.wrapping_mul(inv), 1);
    inv.wrapping_neg()
}

fn compute_r_squared(q: u64) -> u64 {
    let r = ((1u128 << 64) % q as u128) as u64;
    ((r as u128 * r as u128) % q as u128) as u64
}

/// Extended Euclid inverse that also works for composite moduli
/// (needed for arithmetic modulo the plaintext modulus T).
pub fn mod_inverse(a: u64, m: u64) -> Option<u64> {
    if m == 0 {
        return None;
    }
    let (mut old_r, mut r) = (a as i128 % m as i128, m as i128);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quot = old_r / r;
        let tmp = old_r - quot * r;
        old_r = r;
        r = tmp;
        let tmp = old_s - quot * s;
        old_s = s;
        s = tmp;
    }
    if old_r != 1 && old_r != -1 {
        return None;
    }
    let inv = (old_s * old_r.signum()).rem_euclid(m as i128);
    Some(inv as u64)
}

/// Deterministic Miller–Rabin for 64-bit integers.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for p in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        if n == p {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }
    let mut d = n - 1;
    let mut s = 0u32;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    let mulmod = |a: u64, b: u64| ((a as u128 * b as u128) % n as u128) as u64;
    let powmod = |mut a: u64, mut e: u64| {
        let mut acc = 1u64;
        a %= n;
        while e > 0 {
            if e & 1 == 1 {
                acc = mulmod(acc, a);
            }
            a = mulmod(a, a);
            e >>= 1;
        }
        acc
    };
    // This base set decides primality for every n < 2^64.
    'witness: for a in [2u64, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37] {
        let mut x = powmod(a, d);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 0..s - 1 {
            x = mulmod(x, x);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Centered representative of `a mod m` in `(-m/2, m/2]`.
#[inline]
pub fn center(a: u64, m: u64) -> i64 {
    if a > m / 2 {
        a as i64 - m as i64
    } else {
        a as i64
    }
}
