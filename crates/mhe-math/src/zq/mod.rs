//! Modular arithmetic over primes of at most 62 bits, in plain, Shoup and
//! Montgomery representations.

pub mod primes;

use crate::{Error, Result};
use rand::{CryptoRng, RngCore};

/// A modulus of at most 62 bits, with precomputed constants for Barrett
/// reduction, Shoup multiplication, and (when the modulus is odd) Montgomery
/// arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modulus {
    pub(crate) p: u64,
    barrett_hi: u64,
    barrett_lo: u64,
    /// -p^{-1} mod 2^64; zero when p is even.
    mont_neg_inv: u64,
    /// 2^128 mod p.
    mont_r2: u64,
}

impl Modulus {
    /// Create a modulus from an integer in `[2, 2^62)`.
    pub fn new(p: u64) -> Result<Self> {
        if p < 2 || p >= (1u64 << 62) {
            return Err(Error::Default(
                "The modulus should be between 2 and 2^62 - 1".to_string(),
            ));
        }

        // barrett = floor(2^128 / p), exactly.
        let quotient = u128::MAX / (p as u128);
        let barrett = if u128::MAX % (p as u128) + 1 == p as u128 {
            quotient + 1
        } else {
            quotient
        };

        // p^{-1} mod 2^64 by Newton iteration, defined for odd p only.
        let mont_neg_inv = if p & 1 == 1 {
            let mut inv = p;
            for _ in 0..5 {
                inv = inv.wrapping_mul(2u64.wrapping_sub(p.wrapping_mul(inv)));
            }
            debug_assert_eq!(p.wrapping_mul(inv), 1);
            inv.wrapping_neg()
        } else {
            0
        };
        let mont_r2 = ((u128::MAX % (p as u128) + 1) % (p as u128)) as u64;

        Ok(Self {
            p,
            barrett_hi: (barrett >> 64) as u64,
            barrett_lo: barrett as u64,
            mont_neg_inv,
            mont_r2,
        })
    }

    /// Returns the value of the modulus.
    pub const fn modulus(&self) -> u64 {
        self.p
    }

    /// Conditional subtraction: reduce `a` in `[0, 2 * p)` to `[0, p)`.
    pub(crate) const fn reduce1(a: u64, p: u64) -> u64 {
        debug_assert!(a < 2 * p);
        if a >= p {
            a - p
        } else {
            a
        }
    }

    /// Modular addition of elements in `[0, p)`.
    pub const fn add(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        Self::reduce1(a + b, self.p)
    }

    /// Modular subtraction of elements in `[0, p)`.
    pub const fn sub(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        Self::reduce1(a + self.p - b, self.p)
    }

    /// Modular negation of an element in `[0, p)`.
    pub const fn neg(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        Self::reduce1(self.p - a, self.p)
    }

    /// Modular multiplication of elements in `[0, p)`.
    pub const fn mul(&self, a: u64, b: u64) -> u64 {
        debug_assert!(a < self.p && b < self.p);
        self.reduce_u128((a as u128) * (b as u128))
    }

    /// Barrett reduction of a 128-bit value into `[0, 4 * p)`. The
    /// approximate quotient undershoots by at most 3.
    const fn lazy_reduce_u128(&self, a: u128) -> u64 {
        let a_lo = a as u64;
        let a_hi = (a >> 64) as u64;
        let p_lo_lo = ((a_lo as u128) * (self.barrett_lo as u128)) >> 64;
        let p_hi_lo = (a_hi as u128) * (self.barrett_lo as u128);
        let p_lo_hi = (a_lo as u128) * (self.barrett_hi as u128);

        let q = ((p_lo_lo + (p_hi_lo as u64 as u128) + (p_lo_hi as u64 as u128)) >> 64)
            + (p_hi_lo >> 64)
            + (p_lo_hi >> 64)
            + (a_hi as u128) * (self.barrett_hi as u128);
        let r = a.wrapping_sub(q.wrapping_mul(self.p as u128)) as u64;
        debug_assert!((r as u128) < 4 * (self.p as u128));
        r
    }

    /// Barrett reduction of a 128-bit value into `[0, p)`.
    pub const fn reduce_u128(&self, a: u128) -> u64 {
        let r = Self::reduce1(self.lazy_reduce_u128(a), 2 * self.p);
        Self::reduce1(r, self.p)
    }

    /// Reduce a 64-bit value into `[0, p)`.
    pub const fn reduce(&self, a: u64) -> u64 {
        self.reduce_u128(a as u128)
    }

    /// Reduce a signed value into `[0, p)`.
    pub fn reduce_i64(&self, a: i64) -> u64 {
        let r = (a as i128).rem_euclid(self.p as i128);
        r as u64
    }

    /// Map a residue in `[0, p)` to its centered representative in
    /// `(-p/2, p/2]`.
    pub const fn center(&self, a: u64) -> i64 {
        debug_assert!(a < self.p);
        if a > self.p >> 1 {
            (a as i64).wrapping_sub(self.p as i64)
        } else {
            a as i64
        }
    }

    /// Shoup representation of `a`, for fast multiplication by `a`.
    pub const fn shoup(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        (((a as u128) << 64) / (self.p as u128)) as u64
    }

    /// Shoup representation of every element of `a`.
    pub fn shoup_vec(&self, a: &[u64]) -> Vec<u64> {
        a.iter().map(|ai| self.shoup(*ai)).collect()
    }

    /// Lazy Shoup multiplication of `a` by `b`, with output in `[0, 2 * p)`.
    pub const fn lazy_mul_shoup(&self, a: u64, b: u64, b_shoup: u64) -> u64 {
        debug_assert!(b < self.p);
        debug_assert!(b_shoup == self.shoup(b));
        let q = (((a as u128) * (b_shoup as u128)) >> 64) as u64;
        let r = a.wrapping_mul(b).wrapping_sub(q.wrapping_mul(self.p));
        debug_assert!(r < 2 * self.p);
        r
    }

    /// Shoup multiplication of `a` in `[0, p)` by `b`.
    pub const fn mul_shoup(&self, a: u64, b: u64, b_shoup: u64) -> u64 {
        Self::reduce1(self.lazy_mul_shoup(a, b, b_shoup), self.p)
    }

    /// Montgomery reduction of a value in `[0, p * 2^64)`, i.e. computes
    /// `a * 2^-64 mod p`. The modulus must be odd.
    const fn mont_reduce(&self, a: u128) -> u64 {
        debug_assert!(self.mont_neg_inv != 0);
        let m = (a as u64).wrapping_mul(self.mont_neg_inv);
        let t = ((a.wrapping_add((m as u128) * (self.p as u128))) >> 64) as u64;
        Self::reduce1(t, self.p)
    }

    /// Map `a` in `[0, p)` to its Montgomery form `a * 2^64 mod p`.
    pub const fn to_mont(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        self.mont_reduce((a as u128) * (self.mont_r2 as u128))
    }

    /// Map a Montgomery form value back to its plain representative.
    pub const fn from_mont(&self, a: u64) -> u64 {
        debug_assert!(a < self.p);
        self.mont_reduce(a as u128)
    }

    /// Multiply `a` in plain form by `b_mont` in Montgomery form; the result
    /// is in plain form. When both operands are in Montgomery form the result
    /// is in Montgomery form as well.
    pub const fn mul_mont(&self, a: u64, b_mont: u64) -> u64 {
        debug_assert!(a < self.p && b_mont < self.p);
        self.mont_reduce((a as u128) * (b_mont as u128))
    }

    /// Modular exponentiation.
    pub fn pow(&self, base: u64, exponent: u64) -> u64 {
        debug_assert!(base < self.p);
        let mut acc = 1u64;
        let mut b = base;
        let mut e = exponent;
        while e > 0 {
            if e & 1 == 1 {
                acc = self.mul(acc, b);
            }
            b = self.mul(b, b);
            e >>= 1;
        }
        acc
    }

    /// Modular inverse of `a`, when it exists. The modulus must be prime.
    pub fn inv(&self, a: u64) -> Option<u64> {
        if a == 0 {
            return None;
        }
        let inv = self.pow(a, self.p - 2);
        if self.mul(a, inv) == 1 {
            Some(inv)
        } else {
            None
        }
    }

    /// Element-wise addition in place: `a[i] = a[i] + b[i] mod p`.
    pub fn add_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut().zip(b.iter()).for_each(|(ai, bi)| *ai = self.add(*ai, *bi));
    }

    /// Element-wise subtraction in place: `a[i] = a[i] - b[i] mod p`.
    pub fn sub_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut().zip(b.iter()).for_each(|(ai, bi)| *ai = self.sub(*ai, *bi));
    }

    /// Element-wise negation in place.
    pub fn neg_vec(&self, a: &mut [u64]) {
        a.iter_mut().for_each(|ai| *ai = self.neg(*ai));
    }

    /// Element-wise multiplication in place: `a[i] = a[i] * b[i] mod p`.
    pub fn mul_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut().zip(b.iter()).for_each(|(ai, bi)| *ai = self.mul(*ai, *bi));
    }

    /// Element-wise Montgomery multiplication in place, where `b` holds
    /// Montgomery-form values.
    pub fn mul_mont_vec(&self, a: &mut [u64], b: &[u64]) {
        debug_assert_eq!(a.len(), b.len());
        a.iter_mut()
            .zip(b.iter())
            .for_each(|(ai, bi)| *ai = self.mul_mont(*ai, *bi));
    }

    /// Element-wise multiplication by a scalar, in place.
    pub fn scalar_mul_vec(&self, a: &mut [u64], b: u64) {
        let b_shoup = self.shoup(b);
        a.iter_mut()
            .for_each(|ai| *ai = self.mul_shoup(*ai, b, b_shoup));
    }

    /// Map every element to its Montgomery form, in place.
    pub fn to_mont_vec(&self, a: &mut [u64]) {
        a.iter_mut().for_each(|ai| *ai = self.to_mont(*ai));
    }

    /// Map every element back from its Montgomery form, in place.
    pub fn from_mont_vec(&self, a: &mut [u64]) {
        a.iter_mut().for_each(|ai| *ai = self.from_mont(*ai));
    }

    /// Reduce every element of `a` into `[0, p)`, in place.
    pub fn reduce_vec(&self, a: &mut [u64]) {
        a.iter_mut().for_each(|ai| *ai = self.reduce(*ai));
    }

    /// Reduce a slice of signed values into `[0, p)`.
    pub fn reduce_vec_i64(&self, a: &[i64]) -> Vec<u64> {
        a.iter().map(|ai| self.reduce_i64(*ai)).collect()
    }

    /// Sample a vector of uniform residues in `[0, p)`.
    pub fn random_vec<R: RngCore + CryptoRng>(&self, size: usize, rng: &mut R) -> Vec<u64> {
        let mask = u64::MAX >> self.p.leading_zeros();
        let mut out = Vec::with_capacity(size);
        while out.len() != size {
            let candidate = rng.next_u64() & mask;
            if candidate < self.p {
                out.push(candidate);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::Modulus;
    use proptest::prelude::*;
    use rand::thread_rng;

    const MODULI: &[u64] = &[2, 3, 17, 1153, 4611686018326724609];

    #[test]
    fn constructor() {
        assert!(Modulus::new(0).is_err());
        assert!(Modulus::new(1).is_err());
        assert!(Modulus::new(1 << 62).is_err());
        for p in MODULI {
            assert!(Modulus::new(*p).is_ok());
        }
    }

    #[test]
    fn arithmetic() {
        for p in MODULI {
            let q = Modulus::new(*p).unwrap();
            assert_eq!(q.add(*p - 1, 1), 0);
            assert_eq!(q.sub(0, 1), *p - 1);
            assert_eq!(q.neg(0), 0);
            assert_eq!(q.neg(1), *p - 1);
            assert_eq!(q.mul(*p - 1, *p - 1), q.reduce_u128((*p as u128 - 1) * (*p as u128 - 1)));
        }
    }

    #[test]
    fn montgomery_roundtrip() {
        let mut rng = thread_rng();
        for p in MODULI.iter().filter(|p| **p & 1 == 1) {
            let q = Modulus::new(*p).unwrap();
            for a in q.random_vec(128, &mut rng) {
                let am = q.to_mont(a);
                assert_eq!(q.from_mont(am), a);
            }
        }
    }

    #[test]
    fn montgomery_multiplication() {
        let mut rng = thread_rng();
        for p in MODULI.iter().filter(|p| **p & 1 == 1) {
            let q = Modulus::new(*p).unwrap();
            let a = q.random_vec(128, &mut rng);
            let b = q.random_vec(128, &mut rng);
            for (ai, bi) in a.iter().zip(b.iter()) {
                let bm = q.to_mont(*bi);
                assert_eq!(q.mul_mont(*ai, bm), q.mul(*ai, *bi));
            }
        }
    }

    #[test]
    fn shoup_multiplication() {
        let mut rng = thread_rng();
        for p in MODULI {
            let q = Modulus::new(*p).unwrap();
            let a = q.random_vec(128, &mut rng);
            let b = q.random_vec(128, &mut rng);
            for (ai, bi) in a.iter().zip(b.iter()) {
                let b_shoup = q.shoup(*bi);
                assert_eq!(q.mul_shoup(*ai, *bi, b_shoup), q.mul(*ai, *bi));
            }
        }
    }

    #[test]
    fn inverse() {
        let q = Modulus::new(1153).unwrap();
        assert!(q.inv(0).is_none());
        for a in 1..1153u64 {
            let inv = q.inv(a).unwrap();
            assert_eq!(q.mul(a, inv), 1);
        }
    }

    #[test]
    fn center() {
        let q = Modulus::new(17).unwrap();
        assert_eq!(q.center(0), 0);
        assert_eq!(q.center(8), 8);
        assert_eq!(q.center(9), -8);
        assert_eq!(q.center(16), -1);
    }

    proptest! {
        #[test]
        fn proptest_reduce_i64(a: i64) {
            let q = Modulus::new(4611686018326724609).unwrap();
            let r = q.reduce_i64(a);
            prop_assert!(r < q.modulus());
            let lifted = if a < 0 {
                q.neg(q.reduce_u128(a.unsigned_abs() as u128))
            } else {
                q.reduce_u128(a as u128)
            };
            prop_assert_eq!(r, lifted);
        }

        #[test]
        fn proptest_mul_commutes(a in 0u64..1153, b in 0u64..1153) {
            let q = Modulus::new(1153).unwrap();
            prop_assert_eq!(q.mul(a, b), q.mul(b, a));
        }
    }
}
