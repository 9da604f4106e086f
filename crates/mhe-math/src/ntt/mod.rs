//! Negacyclic number-theoretic transform.
//!
//! The forward transform maps a polynomial of degree `n` (a power of two) to
//! its evaluations at the odd powers of a primitive `2n`-th root of unity
//! `psi`, in bit-reversed order: output index `i` holds the evaluation at
//! `psi^(2 * bitrev(i) + 1)`. Pointwise multiplication in this domain is
//! multiplication modulo `X^n + 1`.

use crate::zq::Modulus;
use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::iter::successors;

/// Returns whether a modulus supports the negacyclic NTT of the given size.
///
/// The size must be a power of two, and the modulus congruent to 1 modulo
/// `2 * size`.
pub fn supports_ntt(p: u64, size: usize) -> bool {
    size.is_power_of_two() && size >= 8 && p % ((2 * size) as u64) == 1
}

/// Number-theoretic transform operator for a fixed modulus and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NttOperator {
    p: Modulus,
    p_twice: u64,
    size: usize,
    omegas: Box<[u64]>,
    omegas_shoup: Box<[u64]>,
    zetas_inv: Box<[u64]>,
    zetas_inv_shoup: Box<[u64]>,
    size_inv: u64,
    size_inv_shoup: u64,
}

impl NttOperator {
    /// Create an NTT operator for the modulus `p` and the given size.
    ///
    /// Returns `None` when the modulus does not support the NTT of this size.
    pub fn new(p: &Modulus, size: usize) -> Option<Self> {
        if !supports_ntt(p.modulus(), size) {
            return None;
        }

        let size_inv = p.inv(size as u64)?;
        let omega = Self::primitive_root(size, p);
        let omega_inv = p.inv(omega)?;

        let powers = successors(Some(1u64), |n| Some(p.mul(*n, omega)))
            .take(size)
            .collect_vec();
        let powers_inv = successors(Some(omega_inv), |n| Some(p.mul(*n, omega_inv)))
            .take(size)
            .collect_vec();

        let mut omegas = Vec::with_capacity(size);
        let mut zetas_inv = Vec::with_capacity(size);
        for i in 0..size {
            let j = i.reverse_bits() >> (size.leading_zeros() + 1);
            omegas.push(powers[j]);
            zetas_inv.push(powers_inv[j]);
        }
        let omegas_shoup = p.shoup_vec(&omegas);
        let zetas_inv_shoup = p.shoup_vec(&zetas_inv);

        Some(Self {
            p: p.clone(),
            p_twice: p.modulus() * 2,
            size,
            omegas: omegas.into_boxed_slice(),
            omegas_shoup: omegas_shoup.into_boxed_slice(),
            zetas_inv: zetas_inv.into_boxed_slice(),
            zetas_inv_shoup: zetas_inv_shoup.into_boxed_slice(),
            size_inv,
            size_inv_shoup: p.shoup(size_inv),
        })
    }

    /// Compute the forward NTT in place.
    pub fn forward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.size);

        let mut l = self.size >> 1;
        let mut m = 1;
        let mut k = 1;
        while l > 0 {
            for i in 0..m {
                let omega = self.omegas[k];
                let omega_shoup = self.omegas_shoup[k];
                k += 1;

                let s = 2 * i * l;
                for j in s..s + l {
                    let (mut x, mut y) = self.butterfly(a[j], a[j + l], omega, omega_shoup);
                    if l == 1 {
                        // The last level fully reduces the output.
                        x = self.reduce3(x);
                        y = self.reduce3(y);
                    }
                    a[j] = x;
                    a[j + l] = y;
                }
            }
            l >>= 1;
            m <<= 1;
        }
    }

    /// Compute the backward NTT in place.
    pub fn backward(&self, a: &mut [u64]) {
        debug_assert_eq!(a.len(), self.size);

        let mut k = 0;
        let mut m = self.size >> 1;
        let mut l = 1;
        while m > 0 {
            for i in 0..m {
                let zeta_inv = self.zetas_inv[k];
                let zeta_inv_shoup = self.zetas_inv_shoup[k];
                k += 1;

                let s = 2 * i * l;
                for j in s..s + l {
                    let (x, y) = self.inv_butterfly(a[j], a[j + l], zeta_inv, zeta_inv_shoup);
                    a[j] = x;
                    a[j + l] = y;
                }
            }
            l <<= 1;
            m >>= 1;
        }

        a.iter_mut()
            .for_each(|ai| *ai = self.p.mul_shoup(*ai, self.size_inv, self.size_inv_shoup));
    }

    /// NTT butterfly on values in `[0, 4p)`, with outputs in `[0, 4p)`.
    fn butterfly(&self, x: u64, y: u64, w: u64, w_shoup: u64) -> (u64, u64) {
        debug_assert!(x < 2 * self.p_twice);
        debug_assert!(y < 2 * self.p_twice);

        let x = Modulus::reduce1(x, self.p_twice);
        let t = self.p.lazy_mul_shoup(y, w, w_shoup);
        (x + t, x + self.p_twice - t)
    }

    /// Inverse NTT butterfly on values in `[0, 2p)`, with outputs in `[0, 2p)`.
    fn inv_butterfly(&self, x: u64, y: u64, z: u64, z_shoup: u64) -> (u64, u64) {
        debug_assert!(x < self.p_twice);
        debug_assert!(y < self.p_twice);

        (
            Modulus::reduce1(x + y, self.p_twice),
            self.p.lazy_mul_shoup(x + self.p_twice - y, z, z_shoup),
        )
    }

    /// Reduce a value in `[0, 4p)` into `[0, p)`.
    fn reduce3(&self, a: u64) -> u64 {
        debug_assert!(a < 2 * self.p_twice);
        Modulus::reduce1(Modulus::reduce1(a, self.p_twice), self.p.modulus())
    }

    /// Returns a primitive `2n`-th root of unity modulo `p`.
    fn primitive_root(size: usize, p: &Modulus) -> u64 {
        debug_assert!(supports_ntt(p.modulus(), size));

        let lambda = (p.modulus() - 1) / (2 * size as u64);

        // Deterministic search so that all parties derive the same tables.
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            let mut root = rng.gen_range(0..p.modulus());
            root = p.pow(root, lambda);
            if Self::is_primitive_root(root, 2 * size, p) {
                return root;
            }
        }

        debug_assert!(false, "Couldn't find a primitive root");
        0
    }

    /// Returns whether `a` is an `n`-th primitive root of unity modulo `p`,
    /// for `n` a power of two.
    fn is_primitive_root(a: u64, n: usize, p: &Modulus) -> bool {
        debug_assert!(a < p.modulus());
        (p.pow(a, n as u64) == 1) && (p.pow(a, (n / 2) as u64) != 1)
    }
}

#[cfg(test)]
mod tests {
    use super::{supports_ntt, NttOperator};
    use crate::zq::Modulus;
    use rand::thread_rng;

    #[test]
    fn support() {
        assert!(supports_ntt(1153, 8));
        assert!(!supports_ntt(1153, 128));
        assert!(!supports_ntt(1153, 9));
        assert!(supports_ntt(4611686018326724609, 8));
    }

    #[test]
    fn forward_backward_roundtrip() {
        let mut rng = thread_rng();
        for p in [1153u64, 4611686018326724609] {
            let q = Modulus::new(p).unwrap();
            let op = NttOperator::new(&q, 16).unwrap();
            for _ in 0..32 {
                let a = q.random_vec(16, &mut rng);
                let mut b = a.clone();
                op.forward(&mut b);
                op.backward(&mut b);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn matches_negacyclic_schoolbook_multiplication() {
        let mut rng = thread_rng();
        let n = 16usize;
        let p = 4611686018326724609u64;
        let q = Modulus::new(p).unwrap();
        let op = NttOperator::new(&q, n).unwrap();

        for _ in 0..16 {
            let a = q.random_vec(n, &mut rng);
            let b = q.random_vec(n, &mut rng);

            // Schoolbook product modulo X^n + 1.
            let mut expected = vec![0u64; n];
            for i in 0..n {
                for j in 0..n {
                    let prod = q.mul(a[i], b[j]);
                    if i + j < n {
                        expected[i + j] = q.add(expected[i + j], prod);
                    } else {
                        expected[i + j - n] = q.sub(expected[i + j - n], prod);
                    }
                }
            }

            let mut a_ntt = a.clone();
            let mut b_ntt = b.clone();
            op.forward(&mut a_ntt);
            op.forward(&mut b_ntt);
            q.mul_vec(&mut a_ntt, &b_ntt);
            op.backward(&mut a_ntt);
            assert_eq!(a_ntt, expected);
        }
    }

    #[test]
    fn transform_of_constant_is_constant_vector() {
        let p = 1153u64;
        let q = Modulus::new(p).unwrap();
        let op = NttOperator::new(&q, 8).unwrap();
        let mut a = vec![0u64; 8];
        a[0] = 7;
        op.forward(&mut a);
        assert_eq!(a, vec![7u64; 8]);
    }
}
