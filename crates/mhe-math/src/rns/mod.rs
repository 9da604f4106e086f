//! Residue number system (RNS) utilities: Chinese remainder reconstruction
//! and fast conversion between RNS bases.

use crate::{zq::Modulus, Error, Result};
use itertools::{izip, Itertools};
use ndarray::{ArrayView2, ArrayViewMut2};
use num_bigint::BigUint;

/// Context holding the Chinese remainder theorem constants of an RNS basis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RnsContext {
    moduli_u64: Box<[u64]>,
    q: Box<[Modulus]>,
    /// `(Q / q_i)^(-1) mod q_i`.
    q_tilde: Box<[u64]>,
    /// `Q / q_i`.
    q_star: Box<[BigUint]>,
    product: BigUint,
}

impl RnsContext {
    /// Create an RNS context from a list of pairwise distinct moduli.
    pub fn new(moduli: &[u64]) -> Result<Self> {
        if moduli.is_empty() {
            return Err(Error::Default(
                "The list of moduli should not be empty".to_string(),
            ));
        }
        if !moduli.iter().all_unique() {
            return Err(Error::Default(
                "The moduli should be distinct".to_string(),
            ));
        }

        let q = moduli
            .iter()
            .map(|m| Modulus::new(*m))
            .collect::<Result<Vec<_>>>()?;
        let product = moduli.iter().fold(BigUint::from(1u64), |acc, m| acc * m);

        let mut q_tilde = Vec::with_capacity(moduli.len());
        let mut q_star = Vec::with_capacity(moduli.len());
        for (m, qi) in izip!(moduli, &q) {
            let star = &product / *m;
            let star_mod_qi = (&star % *m)
                .to_u64_digits()
                .first()
                .copied()
                .unwrap_or_default();
            let tilde = qi.inv(star_mod_qi).ok_or_else(|| {
                Error::Default("The moduli should be pairwise coprime".to_string())
            })?;
            q_star.push(star);
            q_tilde.push(tilde);
        }

        Ok(Self {
            moduli_u64: moduli.to_vec().into_boxed_slice(),
            q: q.into_boxed_slice(),
            q_tilde: q_tilde.into_boxed_slice(),
            q_star: q_star.into_boxed_slice(),
            product,
        })
    }

    /// Returns the product of the moduli.
    pub fn modulus(&self) -> &BigUint {
        &self.product
    }

    /// Returns the moduli of this context.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli_u64
    }

    /// Lift RNS residues, one per modulus, into their representative in
    /// `[0, Q)`.
    pub fn lift(&self, residues: &[u64]) -> BigUint {
        debug_assert_eq!(residues.len(), self.q.len());
        let mut acc = BigUint::from(0u64);
        for (r, qi, tilde, star) in izip!(residues, &self.q, &self.q_tilde, &self.q_star) {
            acc += star * qi.mul(*r, *tilde);
        }
        acc % &self.product
    }
}

/// Fast conversion of RNS residues from one basis to another.
///
/// The conversion is the standard floating-point-corrected base conversion:
/// the output residues represent the *centered* representative of the input
/// (the value in `(-Q/2, Q/2]` congruent to the input modulo the product `Q`
/// of the source basis). The rounding happens once; re-extending an already
/// extended value is idempotent.
#[derive(Debug, Clone)]
pub struct BasisExtender {
    from: Box<[Modulus]>,
    to: Box<[Modulus]>,
    /// `1 / q_i` as f64, for the overflow-count estimate.
    from_inv: Box<[f64]>,
    /// `(Q / q_i)^(-1) mod q_i`.
    q_hat_inv: Box<[u64]>,
    /// `q_hat_to[j][i] = (Q / q_i) mod p_j`.
    q_hat_to: Box<[Box<[u64]>]>,
    /// `q_to[j][v] = (v * Q) mod p_j`, for `v` in `0..=from.len()`.
    q_to: Box<[Box<[u64]>]>,
}

impl BasisExtender {
    /// Create an extender from the basis `from` to the basis `to`.
    pub fn new(from: &[u64], to: &[u64]) -> Result<Self> {
        let from_ctx = RnsContext::new(from)?;
        let to_ops = to
            .iter()
            .map(|m| Modulus::new(*m))
            .collect::<Result<Vec<_>>>()?;

        let from_inv = from.iter().map(|m| 1.0 / (*m as f64)).collect_vec();
        let q_hat_inv = from_ctx.q_tilde.to_vec();

        let mut q_hat_to = Vec::with_capacity(to.len());
        let mut q_to = Vec::with_capacity(to.len());
        for pj in &to_ops {
            let hat = from_ctx
                .q_star
                .iter()
                .map(|star| {
                    (star % pj.modulus())
                        .to_u64_digits()
                        .first()
                        .copied()
                        .unwrap_or_default()
                })
                .collect_vec();
            let multiples = (0..=from.len() as u64)
                .map(|v| {
                    ((from_ctx.modulus() * v) % pj.modulus())
                        .to_u64_digits()
                        .first()
                        .copied()
                        .unwrap_or_default()
                })
                .collect_vec();
            q_hat_to.push(hat.into_boxed_slice());
            q_to.push(multiples.into_boxed_slice());
        }

        Ok(Self {
            from: from_ctx.q.to_vec().into_boxed_slice(),
            to: to_ops.into_boxed_slice(),
            from_inv: from_inv.into_boxed_slice(),
            q_hat_inv: q_hat_inv.into_boxed_slice(),
            q_hat_to: q_hat_to.into_boxed_slice(),
            q_to: q_to.into_boxed_slice(),
        })
    }

    /// Convert a matrix of residues (one row per source modulus) into the
    /// target basis (one row per target modulus).
    pub fn extend(&self, input: ArrayView2<u64>, mut output: ArrayViewMut2<u64>) {
        debug_assert_eq!(input.nrows(), self.from.len());
        debug_assert_eq!(output.nrows(), self.to.len());
        debug_assert_eq!(input.ncols(), output.ncols());

        let ncols = input.ncols();
        let mut y = vec![0u64; self.from.len()];
        for col in 0..ncols {
            // y_i = x_i * (Q/q_i)^{-1} mod q_i, and v = round(sum y_i / q_i)
            // counts the overflows of the CRT interpolation, rounding to the
            // centered representative.
            let mut v_float = 0.5f64;
            for (i, qi) in self.from.iter().enumerate() {
                y[i] = qi.mul(input[[i, col]], self.q_hat_inv[i]);
                v_float += (y[i] as f64) * self.from_inv[i];
            }
            let v = v_float as usize;

            for (j, pj) in self.to.iter().enumerate() {
                let mut acc = 0u128;
                for (yi, hat) in y.iter().zip(self.q_hat_to[j].iter()) {
                    acc += pj.reduce_u128((*yi as u128) * (*hat as u128)) as u128;
                }
                let sum = pj.reduce_u128(acc);
                output[[j, col]] = pj.sub(sum, self.q_to[j][v]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BasisExtender, RnsContext};
    use ndarray::Array2;
    use num_bigint::BigUint;
    use rand::thread_rng;

    const Q: &[u64] = &[1153, 4611686018326724609, 4611686018309947393];
    const P: &[u64] = &[4611686018232352769, 4611686018171535361];

    #[test]
    fn context_constructor() {
        assert!(RnsContext::new(&[]).is_err());
        assert!(RnsContext::new(&[2, 2]).is_err());
        assert!(RnsContext::new(&[4, 6]).is_err());
        assert!(RnsContext::new(Q).is_ok());
    }

    #[test]
    fn modulus_product() {
        let rns = RnsContext::new(Q).unwrap();
        let expected = Q.iter().fold(BigUint::from(1u64), |acc, m| acc * m);
        assert_eq!(rns.modulus(), &expected);
    }

    #[test]
    fn lift_roundtrip() {
        let rns = RnsContext::new(Q).unwrap();
        for value in [
            BigUint::from(0u64),
            BigUint::from(1u64),
            rns.modulus() - 1u64,
            rns.modulus() >> 1,
        ] {
            let residues = Q
                .iter()
                .map(|qi| (&value % *qi).iter_u64_digits().next().unwrap_or_default())
                .collect::<Vec<_>>();
            assert_eq!(rns.lift(&residues), value);
        }
    }

    #[test]
    fn extend_matches_centered_bigint_arithmetic() {
        let mut rng = thread_rng();
        let rns_q = RnsContext::new(Q).unwrap();
        let extender = BasisExtender::new(Q, P).unwrap();
        let big_q = rns_q.modulus().clone();

        let n = 16;
        let mut input = Array2::<u64>::zeros((Q.len(), n));
        for (i, qi) in Q.iter().enumerate() {
            let q = crate::zq::Modulus::new(*qi).unwrap();
            let row = q.random_vec(n, &mut rng);
            input.row_mut(i).iter_mut().zip(row).for_each(|(x, r)| *x = r);
        }

        let mut output = Array2::<u64>::zeros((P.len(), n));
        extender.extend(input.view(), output.view_mut());

        for col in 0..n {
            let residues = (0..Q.len()).map(|i| input[[i, col]]).collect::<Vec<_>>();
            let lifted = rns_q.lift(&residues);
            // Centered representative of the lifted value.
            let is_negative = &lifted > &(&big_q >> 1);
            for (j, pj) in P.iter().enumerate() {
                let expected = if is_negative {
                    // lifted - Q mod pj
                    let diff = &big_q - &lifted; // positive magnitude
                    let r = (&diff % *pj).iter_u64_digits().next().unwrap_or_default();
                    (*pj - r) % *pj
                } else {
                    (&lifted % *pj).iter_u64_digits().next().unwrap_or_default()
                };
                assert_eq!(output[[j, col]], expected);
            }
        }
    }

    #[test]
    fn extend_single_source_is_centered_lift() {
        let q = 1153u64;
        let extender = BasisExtender::new(&[q], P).unwrap();
        let n = q as usize;
        let mut input = Array2::<u64>::zeros((1, n));
        for x in 0..n {
            input[[0, x]] = x as u64;
        }
        let mut output = Array2::<u64>::zeros((P.len(), n));
        extender.extend(input.view(), output.view_mut());

        for x in 0..n {
            let centered = if x as u64 > q / 2 {
                x as i64 - q as i64
            } else {
                x as i64
            };
            for (j, pj) in P.iter().enumerate() {
                let expected = centered.rem_euclid(*pj as i64) as u64;
                assert_eq!(output[[j, x]], expected, "x = {x}");
            }
        }
    }
}
