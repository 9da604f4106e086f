//! Key-switching keys for the CKKS encryption scheme.
//!
//! A key-switching key from a secret `w` to the secret `s` is a vector of
//! pairs `(b_j, a_j)` over the extended ring QP, one per gadget digit, with
//! `b_j + a_j s = P w g_j + e_j` where `g_j` is the CRT basis vector of the
//! j-th limb of Q and `P` the special modulus. Applying the key to a
//! polynomial `c` decomposes `c` into its centered CRT digits, accumulates
//! the inner products with the key pairs over QP, and divides the result by
//! `P` with rounding, yielding `(d_0, d_1)` with `d_0 + d_1 s ~ c w`.

use crate::ckks::{CkksParameters, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{Poly, PolyQP, Representation};
use ndarray::{s, Array2};
use rayon::prelude::*;
use std::sync::Arc;
use zeroize::Zeroizing;

/// A key-switching key, stored in NTT Montgomery representation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct KeySwitchingKey {
    /// The scheme parameters.
    pub(crate) par: Arc<CkksParameters>,
    /// The gadget-decomposed key elements `(b_j, a_j)`.
    pub(crate) keys: Vec<(PolyQP, PolyQP)>,
}

impl KeySwitchingKey {
    /// Generate a key-switching key from the secret `w` to the secret key
    /// `sk`. `w` must be given modulo the full Q basis, in NTT
    /// representation.
    pub(crate) fn new<R: rand::RngCore + rand::CryptoRng>(
        sk: &SecretKey,
        w: &Poly,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk.par.clone();
        let ctx_q = par.ctx_at_level(0)?;
        let ctx_p = par.ctx_p();
        if w.ctx() != ctx_q || w.representation() != &Representation::Ntt {
            return Err(Error::DefaultError(
                "The target secret should be in NTT representation modulo the full Q basis"
                    .to_string(),
            ));
        }

        let s = Zeroizing::new(sk.poly_qp()?);
        let mut keys = Vec::with_capacity(par.beta());
        for j in 0..par.beta() {
            let a = PolyQP::random(ctx_q, ctx_p, Representation::Ntt, rng);
            let e = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
                .map_err(Error::MathError)?;

            let mut b = -(&a * s.as_ref());
            b += &e;
            add_gadget_term(&par, &mut b, w, j);

            keys.push((b, a));
        }
        Self::from_key_polys(keys, &par)
    }

    /// Assemble a key-switching key from already-computed key pairs over QP,
    /// converting them to the Montgomery storage form.
    pub(crate) fn from_key_polys(
        keys: Vec<(PolyQP, PolyQP)>,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        if keys.len() != par.beta() {
            return Err(Error::TooFewValues(keys.len(), par.beta()));
        }
        let ctx_q = par.ctx_at_level(0)?;
        let ctx_p = par.ctx_p();
        let mut converted = Vec::with_capacity(keys.len());
        for (mut b, mut a) in keys {
            if b.q.ctx() != ctx_q || b.p.ctx() != ctx_p {
                return Err(Error::DefaultError(
                    "A key element does not match the parameters".to_string(),
                ));
            }
            b.change_representation(Representation::NttMontgomery);
            a.change_representation(Representation::NttMontgomery);
            converted.push((b, a));
        }
        Ok(Self {
            par: par.clone(),
            keys: converted,
        })
    }

    /// Apply the key to the polynomial `c`, given in power-basis
    /// representation at any level, producing `(d_0, d_1)` in NTT
    /// representation at the same level.
    pub(crate) fn key_switch(&self, c: &Poly) -> Result<(Poly, Poly)> {
        if c.representation() != &Representation::PowerBasis {
            return Err(Error::DefaultError(
                "The input should be in power-basis representation".to_string(),
            ));
        }
        let level = self.par.level_of_ctx(c.ctx())?;
        let ctx = self.par.ctx_at_level(level)?;
        let ctx_p = self.par.ctx_p();
        let beta = self.par.beta_at_level(level);
        let degree = self.par.degree();
        let q_len = ctx.moduli().len();

        // Per-digit inner products, accumulated over Q and P independently.
        let zero = || {
            (
                Poly::zero(ctx, Representation::Ntt),
                Poly::zero(ctx_p, Representation::Ntt),
                Poly::zero(ctx, Representation::Ntt),
                Poly::zero(ctx_p, Representation::Ntt),
            )
        };
        let (acc0_q, acc0_p, acc1_q, acc1_p) = (0..beta)
            .into_par_iter()
            .map(|j| -> Result<(Poly, Poly, Poly, Poly)> {
                // Mod-up: extend the centered j-th digit to the Q u P basis.
                let extender = &self.par.digit_extenders[level][j];
                let mut extended = Array2::<u64>::zeros((q_len + 1, degree));
                extender.extend(
                    c.coefficients().slice(s![j..j + 1, ..]),
                    extended.view_mut(),
                );

                let mut d_q = Poly::zero(ctx, Representation::PowerBasis);
                d_q.coefficients_mut().assign(&extended.slice(s![..q_len, ..]));
                d_q.change_representation(Representation::Ntt);
                let mut d_p = Poly::zero(ctx_p, Representation::PowerBasis);
                d_p.coefficients_mut().assign(&extended.slice(s![q_len.., ..]));
                d_p.change_representation(Representation::Ntt);

                let (b, a) = &self.keys[j];
                let mut b_q = b.q.clone();
                b_q.shrink_to(ctx).map_err(Error::MathError)?;
                let mut a_q = a.q.clone();
                a_q.shrink_to(ctx).map_err(Error::MathError)?;

                Ok((&d_q * &b_q, &d_p * &b.p, &d_q * &a_q, &d_p * &a.p))
            })
            .try_reduce(zero, |x, y| {
                Ok((&x.0 + &y.0, &x.1 + &y.1, &x.2 + &y.2, &x.3 + &y.3))
            })?;

        // Mod-down: divide both accumulators by the special modulus.
        let d0 = self.mod_down(level, acc0_q, acc0_p)?;
        let d1 = self.mod_down(level, acc1_q, acc1_p)?;
        Ok((d0, d1))
    }

    /// Compute `round(x / P)` over the Q basis at the given level, where `x`
    /// is represented by its Q part `x_q` and P part `x_p`.
    fn mod_down(&self, level: usize, mut x_q: Poly, mut x_p: Poly) -> Result<Poly> {
        let ctx = self.par.ctx_at_level(level)?;

        x_p.change_representation(Representation::PowerBasis);
        let mut correction = Poly::zero(ctx, Representation::PowerBasis);
        self.par.mod_down_extenders[level].extend(
            x_p.coefficients().view(),
            correction.coefficients_mut().view_mut(),
        );
        correction.change_representation(Representation::Ntt);

        x_q -= &correction;
        for (i, (mut row, qi)) in x_q
            .coefficients_mut()
            .outer_iter_mut()
            .zip(ctx.moduli_operators().iter())
            .enumerate()
        {
            qi.scalar_mul_vec(row.as_slice_mut().unwrap(), self.par.p_inv_mod_qi[i]);
        }
        Ok(x_q)
    }
}

/// Add `P * w * g_j` to the key element `b`: only the j-th limb of the Q
/// part is affected, where the gadget contributes `(P mod q_j) * w`.
pub(crate) fn add_gadget_term(par: &Arc<CkksParameters>, b: &mut PolyQP, w: &Poly, j: usize) {
    debug_assert_eq!(b.q.representation(), &Representation::Ntt);
    debug_assert_eq!(w.representation(), &Representation::Ntt);

    let qj = b.q.ctx().moduli_operators()[j].clone();
    let p_mod_qj = par.p_mod_qi[j];
    let w_row = w.coefficients().row(j);
    let mut b_coeffs = b.q.coefficients_mut().row_mut(j);
    for (x, wv) in b_coeffs.iter_mut().zip(w_row.iter()) {
        *x = qj.add(*x, qj.mul(p_mod_qj, *wv));
    }
}
