//! Polynomials in RNS representation over the cyclotomic ring
//! `Z_Q[X] / (X^N + 1)`, and over the extended double-basis ring used for
//! key-switching material.

mod context;
mod poly_qp;
pub mod traits;

pub use context::Context;
pub use poly_qp::PolyQP;

use crate::{Error, Result};
use itertools::izip;
use ndarray::{s, Array2};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::sync::Arc;
use zeroize::Zeroize;

use mhe_traits::{DeserializeWithContext, Serialize};

/// A seed from which deterministic polynomials can be derived.
pub type Seed = <ChaCha8Rng as SeedableRng>::Seed;

/// The representation of a polynomial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    /// Coefficients of the polynomial, one row of residues per RNS limb.
    PowerBasis,
    /// Evaluations at the odd powers of a primitive 2N-th root of unity, in
    /// the NTT-internal (bit-reversed) order.
    Ntt,
    /// As `Ntt`, with every residue in Montgomery form. This is the storage
    /// form of key-switching material: multiplying a plain-NTT polynomial by
    /// an NttMontgomery polynomial yields a plain-NTT result with a single
    /// Montgomery reduction per coefficient.
    NttMontgomery,
}

/// A Galois substitution `X -> X^exponent`, with the NTT-domain permutation
/// table precomputed. The table depends only on the exponent and the ring
/// degree and can be cached and reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionExponent {
    /// The exponent of the substitution, an odd integer modulo `2 * degree`.
    pub exponent: usize,
    degree: usize,
    ntt_index: Box<[usize]>,
}

impl SubstitutionExponent {
    /// Create a substitution for the given ring degree and exponent. Returns
    /// an error if the exponent is even (such substitutions are not ring
    /// automorphisms).
    pub fn new(degree: usize, exponent: usize) -> Result<Self> {
        if !degree.is_power_of_two() || degree < 8 {
            return Err(Error::Default(
                "The degree is not a power of two larger or equal to 8".to_string(),
            ));
        }
        let exponent = exponent % (2 * degree);
        if exponent % 2 == 0 {
            return Err(Error::Default(
                "The substitution exponent should be odd".to_string(),
            ));
        }

        let mask = 2 * degree - 1;
        let bitrev = |x: usize| x.reverse_bits() >> (degree.leading_zeros() + 1);
        let ntt_index = (0..degree)
            .map(|i| {
                // Position i holds the evaluation at psi^(2 * bitrev(i) + 1);
                // the substituted polynomial takes its value from the position
                // holding the exponent multiplied by `exponent`.
                let e = ((2 * bitrev(i) + 1) * exponent) & mask;
                bitrev((e - 1) / 2)
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            exponent,
            degree,
            ntt_index,
        })
    }
}

/// A polynomial in RNS representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poly {
    ctx: Arc<Context>,
    representation: Representation,
    coefficients: Array2<u64>,
}

impl Poly {
    /// Creates the zero polynomial in the given context and representation.
    pub fn zero(ctx: &Arc<Context>, representation: Representation) -> Self {
        Self {
            ctx: ctx.clone(),
            representation,
            coefficients: Array2::zeros((ctx.moduli.len(), ctx.degree)),
        }
    }

    /// Creates a polynomial with uniform residues.
    pub fn random<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        representation: Representation,
        rng: &mut R,
    ) -> Self {
        let mut p = Self::zero(ctx, representation);
        for (mut row, qi) in izip!(p.coefficients.outer_iter_mut(), ctx.q.iter()) {
            let v = qi.random_vec(ctx.degree, rng);
            row.as_slice_mut().unwrap().copy_from_slice(&v);
        }
        p
    }

    /// Creates a polynomial with uniform residues derived deterministically
    /// from a seed.
    pub fn random_from_seed(ctx: &Arc<Context>, representation: Representation, seed: Seed) -> Self {
        let mut rng = ChaCha8Rng::from_seed(seed);
        Self::random(ctx, representation, &mut rng)
    }

    /// Creates a polynomial with small coefficients drawn from a centered
    /// binomial distribution of the given variance.
    pub fn small<R: RngCore + CryptoRng>(
        ctx: &Arc<Context>,
        representation: Representation,
        variance: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let coeffs = mhe_util::sample_vec_cbd(ctx.degree, variance, rng)?;
        let mut p = <Poly as traits::TryConvertFrom<&[i64]>>::try_convert_from(
            coeffs.as_slice(),
            ctx,
            Representation::PowerBasis,
        )?;
        p.change_representation(representation);
        Ok(p)
    }

    /// Returns the representation of the polynomial.
    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    /// Returns the context of the polynomial.
    pub fn ctx(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Returns a view of the residues, one row per RNS limb.
    pub fn coefficients(&self) -> &Array2<u64> {
        &self.coefficients
    }

    /// Returns a mutable view of the residues. The caller must keep every
    /// residue reduced modulo its limb's modulus.
    pub fn coefficients_mut(&mut self) -> &mut Array2<u64> {
        &mut self.coefficients
    }

    /// Changes the representation of the polynomial in place.
    pub fn change_representation(&mut self, to: Representation) {
        match (&self.representation, &to) {
            (Representation::PowerBasis, Representation::Ntt) => self.ntt_forward(),
            (Representation::PowerBasis, Representation::NttMontgomery) => {
                self.ntt_forward();
                self.to_montgomery();
            }
            (Representation::Ntt, Representation::PowerBasis) => self.ntt_backward(),
            (Representation::Ntt, Representation::NttMontgomery) => self.to_montgomery(),
            (Representation::NttMontgomery, Representation::Ntt) => self.from_montgomery(),
            (Representation::NttMontgomery, Representation::PowerBasis) => {
                self.from_montgomery();
                self.ntt_backward();
            }
            _ => {}
        }
        self.representation = to;
    }

    fn ntt_forward(&mut self) {
        for (mut row, op) in izip!(self.coefficients.outer_iter_mut(), self.ctx.ops.iter()) {
            op.forward(row.as_slice_mut().unwrap());
        }
    }

    fn ntt_backward(&mut self) {
        for (mut row, op) in izip!(self.coefficients.outer_iter_mut(), self.ctx.ops.iter()) {
            op.backward(row.as_slice_mut().unwrap());
        }
    }

    fn to_montgomery(&mut self) {
        for (mut row, qi) in izip!(self.coefficients.outer_iter_mut(), self.ctx.q.iter()) {
            qi.to_mont_vec(row.as_slice_mut().unwrap());
        }
    }

    fn from_montgomery(&mut self) {
        for (mut row, qi) in izip!(self.coefficients.outer_iter_mut(), self.ctx.q.iter()) {
            qi.from_mont_vec(row.as_slice_mut().unwrap());
        }
    }

    /// Applies the substitution `X -> X^e` to the polynomial.
    pub fn substitute(&self, s: &SubstitutionExponent) -> Result<Poly> {
        if s.degree != self.ctx.degree {
            return Err(Error::Default(
                "The substitution does not match the polynomial degree".to_string(),
            ));
        }
        let mut out = Poly::zero(&self.ctx, self.representation.clone());
        match self.representation {
            Representation::PowerBasis => {
                let n = self.ctx.degree;
                let mask = 2 * n - 1;
                for (row_in, mut row_out, qi) in izip!(
                    self.coefficients.outer_iter(),
                    out.coefficients.outer_iter_mut(),
                    self.ctx.q.iter()
                ) {
                    for (i, v) in row_in.iter().enumerate() {
                        let k = (i * s.exponent) & mask;
                        if k < n {
                            row_out[k] = *v;
                        } else {
                            row_out[k - n] = qi.neg(*v);
                        }
                    }
                }
            }
            Representation::Ntt | Representation::NttMontgomery => {
                for (row_in, mut row_out) in izip!(
                    self.coefficients.outer_iter(),
                    out.coefficients.outer_iter_mut()
                ) {
                    for (i, o) in row_out.iter_mut().enumerate() {
                        *o = row_in[s.ntt_index[i]];
                    }
                }
            }
        }
        Ok(out)
    }

    /// Multiplies the polynomial by an arbitrary-precision scalar.
    pub fn scalar_mul(&self, scalar: &BigUint) -> Poly {
        let mut out = self.clone();
        for (mut row, qi) in izip!(out.coefficients.outer_iter_mut(), self.ctx.q.iter()) {
            let s = (scalar % qi.modulus())
                .iter_u64_digits()
                .next()
                .unwrap_or_default();
            qi.scalar_mul_vec(row.as_slice_mut().unwrap(), s);
        }
        out
    }

    /// Rounded division by the last modulus of the context, moving the
    /// polynomial to the next context down the chain. The polynomial must be
    /// in power-basis representation.
    pub fn mod_switch_down_next(&mut self) -> Result<()> {
        if self.representation != Representation::PowerBasis {
            return Err(Error::Default(
                "The polynomial should be in power-basis representation".to_string(),
            ));
        }
        let next_ctx = self
            .ctx
            .next_context
            .as_ref()
            .ok_or(Error::InvalidContext)?
            .clone();

        let q_len = self.ctx.moduli.len();
        let q_last_ops = &self.ctx.q[q_len - 1];
        let q_last = q_last_ops.modulus();
        let q_last_half = q_last >> 1;
        let last_row = self.coefficients.row(q_len - 1).to_owned();

        for i in 0..q_len - 1 {
            let qi = &self.ctx.q[i];
            let q_last_mod_qi = qi.reduce(q_last);
            let inv = self.ctx.inv_last_qi_mod_qj[i];
            let inv_shoup = self.ctx.inv_last_qi_mod_qj_shoup[i];
            let mut row = self.coefficients.row_mut(i);
            for (x, r) in row.iter_mut().zip(last_row.iter()) {
                // Subtract the centered residue of the last limb, then divide.
                let mut rc = qi.reduce(*r);
                if *r > q_last_half {
                    rc = qi.sub(rc, q_last_mod_qi);
                }
                *x = qi.mul_shoup(qi.sub(*x, rc), inv, inv_shoup);
            }
        }

        self.coefficients = self.coefficients.slice(s![..q_len - 1, ..]).to_owned();
        self.ctx = next_ctx;
        Ok(())
    }

    /// Truncates the modulus chain of the polynomial down to the given child
    /// context, discarding the residues of the dropped limbs. Valid in every
    /// representation.
    pub fn shrink_to(&mut self, ctx: &Arc<Context>) -> Result<()> {
        let niterations = self.ctx.niterations_to(ctx)?;
        if niterations == 0 {
            return Ok(());
        }
        let keep = ctx.moduli.len();
        self.coefficients = self.coefficients.slice(s![..keep, ..]).to_owned();
        self.ctx = ctx.clone();
        Ok(())
    }
}

impl Zeroize for Poly {
    fn zeroize(&mut self) {
        self.coefficients.fill(0);
    }
}

impl AsRef<Poly> for Poly {
    fn as_ref(&self) -> &Poly {
        self
    }
}

impl AsMut<Poly> for Poly {
    fn as_mut(&mut self) -> &mut Poly {
        self
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, rhs: &Poly) {
        debug_assert_eq!(self.ctx, rhs.ctx);
        debug_assert_eq!(self.representation, rhs.representation);
        for (mut row, row_rhs, qi) in izip!(
            self.coefficients.outer_iter_mut(),
            rhs.coefficients.outer_iter(),
            self.ctx.q.iter()
        ) {
            qi.add_vec(row.as_slice_mut().unwrap(), row_rhs.as_slice().unwrap());
        }
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, rhs: &Poly) {
        debug_assert_eq!(self.ctx, rhs.ctx);
        debug_assert_eq!(self.representation, rhs.representation);
        for (mut row, row_rhs, qi) in izip!(
            self.coefficients.outer_iter_mut(),
            rhs.coefficients.outer_iter(),
            self.ctx.q.iter()
        ) {
            qi.sub_vec(row.as_slice_mut().unwrap(), row_rhs.as_slice().unwrap());
        }
    }
}

impl MulAssign<&Poly> for Poly {
    fn mul_assign(&mut self, rhs: &Poly) {
        debug_assert_eq!(self.ctx, rhs.ctx);
        assert!(
            self.representation != Representation::PowerBasis
                && rhs.representation != Representation::PowerBasis,
            "Multiplication requires NTT representation"
        );
        let montgomery_operands = matches!(self.representation, Representation::NttMontgomery)
            as u8
            + matches!(rhs.representation, Representation::NttMontgomery) as u8;
        for (mut row, row_rhs, qi) in izip!(
            self.coefficients.outer_iter_mut(),
            rhs.coefficients.outer_iter(),
            self.ctx.q.iter()
        ) {
            if montgomery_operands == 0 {
                qi.mul_vec(row.as_slice_mut().unwrap(), row_rhs.as_slice().unwrap());
            } else {
                qi.mul_mont_vec(row.as_slice_mut().unwrap(), row_rhs.as_slice().unwrap());
            }
        }
        // One Montgomery factor cancels per Montgomery reduction.
        self.representation = if montgomery_operands == 2 {
            Representation::NttMontgomery
        } else {
            Representation::Ntt
        };
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;
    fn add(self, rhs: &Poly) -> Poly {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;
    fn sub(self, rhs: &Poly) -> Poly {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;
    fn mul(self, rhs: &Poly) -> Poly {
        let mut out = self.clone();
        out *= rhs;
        out
    }
}

impl Neg for &Poly {
    type Output = Poly;
    fn neg(self) -> Poly {
        let mut out = self.clone();
        for (mut row, qi) in izip!(out.coefficients.outer_iter_mut(), out.ctx.q.iter()) {
            qi.neg_vec(row.as_slice_mut().unwrap());
        }
        out
    }
}

impl Neg for Poly {
    type Output = Poly;
    fn neg(self) -> Poly {
        -&self
    }
}

impl Serialize for Poly {
    fn to_bytes(&self) -> Vec<u8> {
        let tag = match self.representation {
            Representation::PowerBasis => 0u8,
            Representation::Ntt => 1,
            Representation::NttMontgomery => 2,
        };
        let mut bytes = Vec::with_capacity(1 + self.coefficients.len() * 8);
        bytes.push(tag);
        for v in &self.coefficients {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }
}

impl DeserializeWithContext for Poly {
    type Error = Error;
    type Context = Context;

    fn from_bytes(bytes: &[u8], ctx: &Arc<Context>) -> Result<Self> {
        let expected_len = 1 + ctx.moduli.len() * ctx.degree * 8;
        if bytes.len() != expected_len {
            return Err(Error::Serialization(format!(
                "Invalid length: expected {} bytes, got {}",
                expected_len,
                bytes.len()
            )));
        }
        let representation = match bytes[0] {
            0 => Representation::PowerBasis,
            1 => Representation::Ntt,
            2 => Representation::NttMontgomery,
            _ => {
                return Err(Error::Serialization(
                    "Invalid representation tag".to_string(),
                ))
            }
        };

        let mut p = Poly::zero(ctx, representation);
        let mut chunks = bytes[1..].chunks_exact(8);
        for (mut row, qi) in izip!(p.coefficients.outer_iter_mut(), ctx.q.iter()) {
            for v in row.iter_mut() {
                let residue = u64::from_le_bytes(chunks.next().unwrap().try_into().unwrap());
                if residue >= qi.modulus() {
                    return Err(Error::Serialization(
                        "A residue exceeds its modulus".to_string(),
                    ));
                }
                *v = residue;
            }
        }
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, Poly, Representation, SubstitutionExponent};
    use crate::rq::traits::TryConvertFrom;
    use mhe_traits::{DeserializeWithContext, Serialize};
    use rand::thread_rng;
    use std::{error::Error, sync::Arc};

    const MODULI: &[u64; 3] = &[1153, 4611686018326724609, 4611686018309947393];

    #[test]
    fn ntt_roundtrip() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        for _ in 0..16 {
            let p = Poly::random(&ctx, Representation::PowerBasis, &mut rng);
            let mut q = p.clone();
            q.change_representation(Representation::Ntt);
            q.change_representation(Representation::PowerBasis);
            assert_eq!(p, q);
        }
        Ok(())
    }

    #[test]
    fn montgomery_roundtrip() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        let p = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let mut q = p.clone();
        q.change_representation(Representation::NttMontgomery);
        assert_ne!(p, q);
        q.change_representation(Representation::Ntt);
        assert_eq!(p, q);
        Ok(())
    }

    #[test]
    fn montgomery_multiplication_matches_plain() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        let a = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let b = Poly::random(&ctx, Representation::Ntt, &mut rng);

        let plain = &a * &b;
        let mut b_mont = b.clone();
        b_mont.change_representation(Representation::NttMontgomery);
        let mixed = &a * &b_mont;

        assert_eq!(plain, mixed);
        assert_eq!(mixed.representation(), &Representation::Ntt);
        Ok(())
    }

    #[test]
    fn additive_algebra() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        let a = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let b = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let c = Poly::random(&ctx, Representation::Ntt, &mut rng);

        assert_eq!(&a + &b, &b + &a);
        assert_eq!(&(&a + &b) + &c, &a + &(&b + &c));
        assert_eq!(&(&a + &b) - &b, a);
        assert_eq!(&a + &(-&a), Poly::zero(&ctx, Representation::Ntt));
        Ok(())
    }

    #[test]
    fn substitution_consistent_across_domains() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let n = 16;
        let ctx = Context::new_arc(MODULI, n)?;
        for exponent in [3usize, 5, 2 * n - 1] {
            let sub = SubstitutionExponent::new(n, exponent)?;
            let p = Poly::random(&ctx, Representation::PowerBasis, &mut rng);

            let mut via_power = p.substitute(&sub)?;
            via_power.change_representation(Representation::Ntt);

            let mut p_ntt = p.clone();
            p_ntt.change_representation(Representation::Ntt);
            let via_ntt = p_ntt.substitute(&sub)?;

            assert_eq!(via_power, via_ntt, "exponent = {exponent}");
        }
        Ok(())
    }

    #[test]
    fn substitution_rejects_even_exponents() {
        assert!(SubstitutionExponent::new(16, 2).is_err());
        assert!(SubstitutionExponent::new(16, 0).is_err());
        assert!(SubstitutionExponent::new(16, 3).is_ok());
    }

    #[test]
    fn mod_switch_down_next_divides_and_rounds() -> Result<(), Box<dyn Error>> {
        let ctx = Context::new_arc(MODULI, 16)?;
        let q_last = *MODULI.last().unwrap();

        // A constant polynomial with known value k * q_last + r, built from
        // two separate polynomials since the value exceeds an i64.
        let k = 12345u64;
        let r = 17u64;
        let p_k = Poly::try_convert_from([k as i64].as_slice(), &ctx, Representation::PowerBasis)?;
        let p_qlast = p_k.scalar_mul(&num_bigint::BigUint::from(q_last));
        let p_r = Poly::try_convert_from([r as i64].as_slice(), &ctx, Representation::PowerBasis)?;
        let mut p = &p_qlast + &p_r;

        p.mod_switch_down_next()?;

        // (k * q_last + r) / q_last rounds to k since r < q_last / 2.
        let expected = Poly::try_convert_from(
            [k as i64].as_slice(),
            &Context::new_arc(&MODULI[..MODULI.len() - 1], 16)?,
            Representation::PowerBasis,
        )?;
        assert_eq!(p, expected);
        Ok(())
    }

    #[test]
    fn shrink_to_truncates_limbs() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        let child = Context::new_arc(&MODULI[..1], 16)?;
        let mut p = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let original = p.clone();
        p.shrink_to(&child)?;
        assert_eq!(p.ctx(), &child);
        assert_eq!(
            p.coefficients().row(0),
            original.coefficients().row(0)
        );

        let unrelated = Context::new_arc(&MODULI[1..], 16)?;
        let mut q = Poly::random(&ctx, Representation::Ntt, &mut rng);
        assert!(q.shrink_to(&unrelated).is_err());
        Ok(())
    }

    #[test]
    fn serialization_roundtrip() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        for representation in [
            Representation::PowerBasis,
            Representation::Ntt,
            Representation::NttMontgomery,
        ] {
            let p = Poly::random(&ctx, representation, &mut rng);
            let bytes = p.to_bytes();
            assert_eq!(Poly::from_bytes(&bytes, &ctx)?, p);
        }

        let p = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let mut bytes = p.to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(Poly::from_bytes(&bytes, &ctx).is_err());
        Ok(())
    }

    #[test]
    fn small_is_small() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let ctx = Context::new_arc(MODULI, 16)?;
        for variance in 1..=16 {
            let p = Poly::small(&ctx, Representation::PowerBasis, variance, &mut rng)?;
            let bound = 2 * variance as u64;
            for (row, qi) in p
                .coefficients()
                .outer_iter()
                .zip(ctx.moduli_operators().iter())
            {
                for v in row {
                    let c = qi.center(*v);
                    assert!(c.unsigned_abs() <= bound);
                }
            }
        }
        Ok(())
    }
}
