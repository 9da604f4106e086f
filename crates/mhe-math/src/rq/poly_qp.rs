//! Polynomials over the extended ring `R_QP = R_Q x R_P`, used for
//! noise-flooded key-switching material.

use super::{Context, Poly, Representation, Seed, SubstitutionExponent};
use crate::rq::traits::TryConvertFrom;
use crate::{Error, Result};
use mhe_traits::{Serialize as MheSerialize, DeserializeWithContext};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::sync::Arc;
use zeroize::Zeroize;

/// A polynomial in the extended ring `R_QP`: one element of `R_Q` and one
/// element of `R_P` representing the same underlying integer polynomial
/// modulo the two bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyQP {
    /// The residues modulo the Q basis.
    pub q: Poly,
    /// The residues modulo the P basis.
    pub p: Poly,
}

impl PolyQP {
    /// Creates the zero polynomial over both bases.
    pub fn zero(ctx_q: &Arc<Context>, ctx_p: &Arc<Context>, representation: Representation) -> Self {
        Self {
            q: Poly::zero(ctx_q, representation.clone()),
            p: Poly::zero(ctx_p, representation),
        }
    }

    /// Creates a polynomial with uniform residues over both bases.
    pub fn random<R: RngCore + CryptoRng>(
        ctx_q: &Arc<Context>,
        ctx_p: &Arc<Context>,
        representation: Representation,
        rng: &mut R,
    ) -> Self {
        Self {
            q: Poly::random(ctx_q, representation.clone(), rng),
            p: Poly::random(ctx_p, representation, rng),
        }
    }

    /// Creates a polynomial with uniform residues derived deterministically
    /// from a seed.
    pub fn random_from_seed(
        ctx_q: &Arc<Context>,
        ctx_p: &Arc<Context>,
        representation: Representation,
        seed: Seed,
    ) -> Self {
        let mut rng = ChaCha8Rng::from_seed(seed);
        Self::random(ctx_q, ctx_p, representation, &mut rng)
    }

    /// Creates a polynomial with small coefficients drawn from a centered
    /// binomial distribution: a single integer polynomial is sampled and
    /// reduced modulo both bases.
    pub fn small<R: RngCore + CryptoRng>(
        ctx_q: &Arc<Context>,
        ctx_p: &Arc<Context>,
        variance: usize,
        representation: Representation,
        rng: &mut R,
    ) -> Result<Self> {
        if ctx_q.degree != ctx_p.degree {
            return Err(Error::Default(
                "The two bases should have the same degree".to_string(),
            ));
        }
        let coeffs = mhe_util::sample_vec_cbd(ctx_q.degree, variance, rng)?;
        let mut q = Poly::try_convert_from(coeffs.as_slice(), ctx_q, Representation::PowerBasis)?;
        let mut p = Poly::try_convert_from(coeffs.as_slice(), ctx_p, Representation::PowerBasis)?;
        q.change_representation(representation.clone());
        p.change_representation(representation);
        Ok(Self { q, p })
    }

    /// Returns the representation of the polynomial.
    pub fn representation(&self) -> &Representation {
        debug_assert_eq!(self.q.representation(), self.p.representation());
        self.q.representation()
    }

    /// Changes the representation of both parts in place.
    pub fn change_representation(&mut self, to: Representation) {
        self.q.change_representation(to.clone());
        self.p.change_representation(to);
    }

    /// Applies the substitution `X -> X^e` to both parts.
    pub fn substitute(&self, s: &SubstitutionExponent) -> Result<PolyQP> {
        Ok(Self {
            q: self.q.substitute(s)?,
            p: self.p.substitute(s)?,
        })
    }
}

impl Zeroize for PolyQP {
    fn zeroize(&mut self) {
        self.q.zeroize();
        self.p.zeroize();
    }
}

impl AsRef<PolyQP> for PolyQP {
    fn as_ref(&self) -> &PolyQP {
        self
    }
}

impl AsMut<PolyQP> for PolyQP {
    fn as_mut(&mut self) -> &mut PolyQP {
        self
    }
}

impl AddAssign<&PolyQP> for PolyQP {
    fn add_assign(&mut self, rhs: &PolyQP) {
        self.q += &rhs.q;
        self.p += &rhs.p;
    }
}

impl SubAssign<&PolyQP> for PolyQP {
    fn sub_assign(&mut self, rhs: &PolyQP) {
        self.q -= &rhs.q;
        self.p -= &rhs.p;
    }
}

impl MulAssign<&PolyQP> for PolyQP {
    fn mul_assign(&mut self, rhs: &PolyQP) {
        self.q *= &rhs.q;
        self.p *= &rhs.p;
    }
}

impl Add<&PolyQP> for &PolyQP {
    type Output = PolyQP;
    fn add(self, rhs: &PolyQP) -> PolyQP {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub<&PolyQP> for &PolyQP {
    type Output = PolyQP;
    fn sub(self, rhs: &PolyQP) -> PolyQP {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl Mul<&PolyQP> for &PolyQP {
    type Output = PolyQP;
    fn mul(self, rhs: &PolyQP) -> PolyQP {
        let mut out = self.clone();
        out *= rhs;
        out
    }
}

impl Neg for &PolyQP {
    type Output = PolyQP;
    fn neg(self) -> PolyQP {
        PolyQP {
            q: -&self.q,
            p: -&self.p,
        }
    }
}

impl Neg for PolyQP {
    type Output = PolyQP;
    fn neg(self) -> PolyQP {
        -&self
    }
}

impl MheSerialize for PolyQP {
    fn to_bytes(&self) -> Vec<u8> {
        let q_bytes = self.q.to_bytes();
        let p_bytes = self.p.to_bytes();
        let mut bytes = Vec::with_capacity(8 + q_bytes.len() + p_bytes.len());
        bytes.extend_from_slice(&(q_bytes.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&q_bytes);
        bytes.extend_from_slice(&p_bytes);
        bytes
    }
}

impl PolyQP {
    /// Deserialize a `PolyQP` from bytes, within the two given bases.
    pub fn from_bytes(bytes: &[u8], ctx_q: &Arc<Context>, ctx_p: &Arc<Context>) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::Serialization("Truncated PolyQP".to_string()));
        }
        let q_len = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        if bytes.len() < 8 + q_len {
            return Err(Error::Serialization("Truncated PolyQP".to_string()));
        }
        let q = Poly::from_bytes(&bytes[8..8 + q_len], ctx_q)?;
        let p = Poly::from_bytes(&bytes[8 + q_len..], ctx_p)?;
        Ok(Self { q, p })
    }
}
