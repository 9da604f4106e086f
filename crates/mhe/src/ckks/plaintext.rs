//! Plaintext type for the CKKS encryption scheme.

use crate::ckks::CkksParameters;
use mhe_math::rq::Poly;
use mhe_traits::FheParametrized;
use std::sync::Arc;
use zeroize::Zeroize;

/// A plaintext object: a polynomial carrying an encoded vector of complex
/// values, at a given level of the modulus chain and with a given scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext {
    /// The parameters of the underlying scheme.
    pub(crate) par: Arc<CkksParameters>,
    /// The plaintext polynomial, in NTT representation.
    pub(crate) poly: Poly,
    /// The level of the plaintext.
    pub(crate) level: usize,
    /// The scale the values were encoded with.
    pub(crate) scale: f64,
}

impl Plaintext {
    /// Returns the level of this plaintext.
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Returns the scale of this plaintext.
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the plaintext polynomial.
    pub(crate) fn to_poly(&self) -> Poly {
        self.poly.clone()
    }
}

impl FheParametrized for Plaintext {
    type Parameters = CkksParameters;
}

impl Zeroize for Plaintext {
    fn zeroize(&mut self) {
        self.poly.zeroize();
    }
}
