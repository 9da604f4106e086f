//! Create parameters for the CKKS encryption scheme.

use crate::{Error, ParametersError, Result};
use mhe_math::{
    rns::BasisExtender,
    rq::Context,
    zq::{primes::generate_prime, Modulus},
};
use mhe_traits::{Deserialize, FheParameters, Serialize};
use itertools::Itertools;
use std::fmt::Debug;
use std::sync::Arc;

/// Parameters for the CKKS encryption scheme and its multiparty protocols.
///
/// The ciphertext modulus is a chain `q_0, ..., q_L` of NTT-friendly primes;
/// level 0 uses the full chain and each rescaling drops the last prime. One
/// additional special modulus `p` extends the chain into the ring QP over
/// which key-switching material lives, with the gadget decomposition indexed
/// by the CRT limbs of Q (digit count beta = number of limbs at the key
/// level).
pub struct CkksParameters {
    /// Number of coefficients in a polynomial.
    polynomial_degree: usize,

    /// Vector of coprime moduli q_i for the ciphertext.
    pub(crate) moduli: Box<[u64]>,

    /// Vector of the sizes of the coprime moduli q_i.
    moduli_sizes: Box<[usize]>,

    /// The special modulus used for key-switching material.
    special_modulus: u64,

    /// Error variance.
    pub(crate) variance: usize,

    /// Default encoding scale.
    default_scale: f64,

    /// Context for the underlying polynomials, one per level.
    pub(crate) ctx: Vec<Arc<Context>>,

    /// Context of the special modulus.
    pub(crate) ctx_p: Arc<Context>,

    /// The special modulus reduced modulo each q_i.
    pub(crate) p_mod_qi: Box<[u64]>,

    /// The inverse of the special modulus modulo each q_i.
    pub(crate) p_inv_mod_qi: Box<[u64]>,

    /// Extenders from each decomposition digit to the full basis at each
    /// level: `digit_extenders[level][digit]`.
    pub(crate) digit_extenders: Vec<Vec<BasisExtender>>,

    /// Extenders from the special modulus down to the Q basis at each level.
    pub(crate) mod_down_extenders: Vec<BasisExtender>,
}

impl Debug for CkksParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CkksParameters")
            .field("polynomial_degree", &self.polynomial_degree)
            .field("moduli", &self.moduli)
            .field("special_modulus", &self.special_modulus)
            .field("default_scale", &self.default_scale)
            .finish()
    }
}

impl PartialEq for CkksParameters {
    fn eq(&self, other: &Self) -> bool {
        self.polynomial_degree == other.polynomial_degree
            && self.moduli == other.moduli
            && self.special_modulus == other.special_modulus
            && self.variance == other.variance
            && self.default_scale.to_bits() == other.default_scale.to_bits()
    }
}

impl Eq for CkksParameters {}

impl FheParameters for CkksParameters {}

impl CkksParameters {
    /// Returns the underlying polynomial degree.
    pub const fn degree(&self) -> usize {
        self.polynomial_degree
    }

    /// Returns the number of plaintext slots.
    pub const fn slots(&self) -> usize {
        self.polynomial_degree >> 1
    }

    /// Returns a reference to the ciphertext moduli.
    pub fn moduli(&self) -> &[u64] {
        &self.moduli
    }

    /// Returns a reference to the sizes of the ciphertext moduli.
    pub fn moduli_sizes(&self) -> &[usize] {
        &self.moduli_sizes
    }

    /// Returns the special modulus.
    pub const fn special_modulus(&self) -> u64 {
        self.special_modulus
    }

    /// Returns the error variance.
    pub const fn variance(&self) -> usize {
        self.variance
    }

    /// Returns the default encoding scale.
    pub const fn default_scale(&self) -> f64 {
        self.default_scale
    }

    /// Returns the maximum level allowed by these parameters. Level 0 uses
    /// the full modulus chain; at the maximum level a single modulus remains.
    pub fn max_level(&self) -> usize {
        self.moduli.len() - 1
    }

    /// Returns the context corresponding to the level.
    pub fn ctx_at_level(&self, level: usize) -> Result<&Arc<Context>> {
        self.ctx
            .get(level)
            .ok_or_else(|| Error::DefaultError("No context at the given level".to_string()))
    }

    /// Returns the context of the special modulus.
    pub fn ctx_p(&self) -> &Arc<Context> {
        &self.ctx_p
    }

    /// Returns the level of a given context.
    pub(crate) fn level_of_ctx(&self, ctx: &Arc<Context>) -> Result<usize> {
        self.ctx[0].niterations_to(ctx).map_err(Error::MathError)
    }

    /// Returns the number of digits of the gadget decomposition used by
    /// key-switching keys generated at level 0.
    pub fn beta(&self) -> usize {
        self.moduli.len()
    }

    /// Returns the number of gadget digits available at a given level.
    pub fn beta_at_level(&self, level: usize) -> usize {
        self.moduli.len() - level
    }

    /// Returns the Galois element performing a cyclic rotation of the slots
    /// to the left by `k` positions.
    pub fn galois_element_for_rotation(&self, k: usize) -> u64 {
        let m = 2 * self.polynomial_degree as u64;
        let mut g = 1u64;
        let mut base = 5u64 % m;
        let mut e = (k % self.slots()) as u64;
        while e > 0 {
            if e & 1 == 1 {
                g = (g * base) % m;
            }
            base = (base * base) % m;
            e >>= 1;
        }
        g
    }

    /// Returns the Galois element performing the complex conjugation of the
    /// slots.
    pub fn galois_element_for_conjugation(&self) -> u64 {
        2 * self.polynomial_degree as u64 - 1
    }

    /// Returns the Galois elements of the power-of-two rotations needed to
    /// compute inner sums over the slots.
    pub fn galois_elements_for_inner_sum(&self) -> Vec<u64> {
        let mut elements = vec![];
        let mut k = 1;
        while k < self.slots() {
            elements.push(self.galois_element_for_rotation(k));
            k <<= 1;
        }
        elements
    }

    #[cfg(test)]
    #[allow(missing_docs)]
    pub fn default_arc(num_moduli: usize, degree: usize) -> Arc<Self> {
        let mut sizes = vec![60usize];
        sizes.resize(num_moduli, 40);
        CkksParametersBuilder::new()
            .set_degree(degree)
            .set_moduli_sizes(&sizes)
            .set_special_modulus_size(61)
            .set_scale((1u64 << 40) as f64)
            .build_arc()
            .unwrap()
    }
}

impl Serialize for CkksParameters {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.polynomial_degree as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.moduli.len() as u64).to_le_bytes());
        for m in self.moduli.iter() {
            bytes.extend_from_slice(&m.to_le_bytes());
        }
        bytes.extend_from_slice(&self.special_modulus.to_le_bytes());
        bytes.extend_from_slice(&(self.variance as u64).to_le_bytes());
        bytes.extend_from_slice(&self.default_scale.to_bits().to_le_bytes());
        bytes
    }
}

impl Deserialize for CkksParameters {
    type Error = Error;

    fn try_deserialize(bytes: &[u8]) -> Result<Self> {
        let word = |offset: usize| -> Result<u64> {
            bytes
                .get(offset..offset + 8)
                .map(|b| u64::from_le_bytes(b.try_into().unwrap()))
                .ok_or(Error::SerializationError)
        };

        let degree = word(0)? as usize;
        let n_moduli = word(8)? as usize;
        let mut moduli = Vec::with_capacity(n_moduli);
        for i in 0..n_moduli {
            moduli.push(word(16 + 8 * i)?);
        }
        let offset = 16 + 8 * n_moduli;
        let special_modulus = word(offset)?;
        let variance = word(offset + 8)? as usize;
        let scale = f64::from_bits(word(offset + 16)?);
        if bytes.len() != offset + 24 {
            return Err(Error::SerializationError);
        }

        CkksParametersBuilder::new()
            .set_degree(degree)
            .set_moduli(&moduli)
            .set_special_modulus(special_modulus)
            .set_variance(variance)
            .set_scale(scale)
            .build()
    }
}

/// Builder for parameters for the CKKS encryption scheme.
#[derive(Debug)]
pub struct CkksParametersBuilder {
    degree: usize,
    variance: usize,
    scale: f64,
    ciphertext_moduli: Vec<u64>,
    ciphertext_moduli_sizes: Vec<usize>,
    special_modulus: u64,
    special_modulus_size: usize,
}

impl CkksParametersBuilder {
    /// Creates a new instance of the builder.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            degree: Default::default(),
            variance: 10,
            scale: (1u64 << 40) as f64,
            ciphertext_moduli: Default::default(),
            ciphertext_moduli_sizes: Default::default(),
            special_modulus: Default::default(),
            special_modulus_size: 61,
        }
    }

    /// Sets the polynomial degree. The degree must be a power of two larger
    /// or equal to 8.
    pub fn set_degree(&mut self, degree: usize) -> &mut Self {
        self.degree = degree;
        self
    }

    /// Sets the sizes of the ciphertext moduli. Only one of
    /// `set_moduli_sizes` and `set_moduli` can be specified.
    pub fn set_moduli_sizes(&mut self, sizes: &[usize]) -> &mut Self {
        self.ciphertext_moduli_sizes = sizes.to_owned();
        self
    }

    /// Sets the ciphertext moduli to use. Only one of `set_moduli_sizes` and
    /// `set_moduli` can be specified.
    pub fn set_moduli(&mut self, moduli: &[u64]) -> &mut Self {
        self.ciphertext_moduli = moduli.to_owned();
        self
    }

    /// Sets the size of the special modulus used for key-switching material.
    pub fn set_special_modulus_size(&mut self, size: usize) -> &mut Self {
        self.special_modulus_size = size;
        self
    }

    /// Sets the special modulus used for key-switching material.
    pub fn set_special_modulus(&mut self, modulus: u64) -> &mut Self {
        self.special_modulus = modulus;
        self
    }

    /// Sets the default encoding scale.
    pub fn set_scale(&mut self, scale: f64) -> &mut Self {
        self.scale = scale;
        self
    }

    /// Sets the error variance. The variance should be between 1 and 16.
    pub fn set_variance(&mut self, variance: usize) -> &mut Self {
        self.variance = variance;
        self
    }

    /// Generate ciphertext moduli with the specified sizes.
    fn generate_moduli(moduli_sizes: &[usize], degree: usize) -> Result<Vec<u64>> {
        let mut moduli = vec![];
        for size in moduli_sizes {
            if *size > 62 || *size < 10 {
                return Err(Error::ParametersError(ParametersError::InvalidModulusSize(
                    *size, 10, 62,
                )));
            }

            let mut upper_bound = 1 << size;
            loop {
                if let Some(prime) = generate_prime(*size, 2 * degree as u64, upper_bound) {
                    if !moduli.contains(&prime) {
                        moduli.push(prime);
                        break;
                    } else {
                        upper_bound = prime;
                    }
                } else {
                    return Err(Error::ParametersError(ParametersError::NotEnoughPrimes(
                        *size, degree,
                    )));
                }
            }
        }

        Ok(moduli)
    }

    /// Build a new `CkksParameters` inside an `Arc`.
    pub fn build_arc(&self) -> Result<Arc<CkksParameters>> {
        self.build().map(Arc::new)
    }

    /// Build a new `CkksParameters`.
    pub fn build(&self) -> Result<CkksParameters> {
        if self.degree < 8 || !self.degree.is_power_of_two() {
            return Err(Error::ParametersError(ParametersError::InvalidDegree(
                self.degree,
            )));
        }
        if !(1..=16).contains(&self.variance) {
            return Err(Error::DefaultError(
                "The variance should be between 1 and 16".to_string(),
            ));
        }
        if !self.scale.is_finite() || self.scale < 1.0 {
            return Err(Error::ParametersError(ParametersError::InvalidScale(
                format!("{}", self.scale),
            )));
        }

        if !self.ciphertext_moduli.is_empty() && !self.ciphertext_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooManySpecified(
                "Only one of `ciphertext_moduli` and `ciphertext_moduli_sizes` can be specified"
                    .to_string(),
            )));
        } else if self.ciphertext_moduli.is_empty() && self.ciphertext_moduli_sizes.is_empty() {
            return Err(Error::ParametersError(ParametersError::TooFewSpecified(
                "One of `ciphertext_moduli` and `ciphertext_moduli_sizes` must be specified"
                    .to_string(),
            )));
        }

        let mut moduli = self.ciphertext_moduli.clone();
        if !self.ciphertext_moduli_sizes.is_empty() {
            moduli = Self::generate_moduli(&self.ciphertext_moduli_sizes, self.degree)?
        }
        let moduli_sizes = moduli
            .iter()
            .map(|m| 64 - m.leading_zeros() as usize)
            .collect_vec();

        // The special modulus, distinct from every ciphertext modulus.
        let special_modulus = if self.special_modulus != 0 {
            if moduli.contains(&self.special_modulus) {
                return Err(Error::DefaultError(
                    "The special modulus should be distinct from the ciphertext moduli"
                        .to_string(),
                ));
            }
            self.special_modulus
        } else {
            let size = self.special_modulus_size;
            if !(10..=62).contains(&size) {
                return Err(Error::ParametersError(ParametersError::InvalidModulusSize(
                    size, 10, 62,
                )));
            }
            let mut upper_bound = 1 << size;
            loop {
                if let Some(prime) = generate_prime(size, 2 * self.degree as u64, upper_bound) {
                    if !moduli.contains(&prime) {
                        break prime;
                    }
                    upper_bound = prime;
                } else {
                    return Err(Error::ParametersError(ParametersError::NotEnoughPrimes(
                        size,
                        self.degree,
                    )));
                }
            }
        };

        // Contexts share the `next_context` chain of the top-level context.
        let mut ctx = Vec::with_capacity(moduli.len());
        ctx.push(Context::new_arc(&moduli, self.degree)?);
        for i in 1..moduli.len() {
            let next = ctx[i - 1].next_context().unwrap().clone();
            ctx.push(next);
        }
        let ctx_p = Context::new_arc(&[special_modulus], self.degree)?;

        let mut p_mod_qi = Vec::with_capacity(moduli.len());
        let mut p_inv_mod_qi = Vec::with_capacity(moduli.len());
        for m in &moduli {
            let qi = Modulus::new(*m).map_err(Error::MathError)?;
            let p_mod = qi.reduce(special_modulus);
            p_mod_qi.push(p_mod);
            p_inv_mod_qi.push(qi.inv(p_mod).ok_or_else(|| {
                Error::DefaultError("The special modulus is not invertible".to_string())
            })?);
        }

        let mut digit_extenders = Vec::with_capacity(moduli.len());
        let mut mod_down_extenders = Vec::with_capacity(moduli.len());
        for level in 0..moduli.len() {
            let at_level = &moduli[..moduli.len() - level];
            let mut extended_basis = at_level.to_vec();
            extended_basis.push(special_modulus);

            let per_digit = (0..at_level.len())
                .map(|j| BasisExtender::new(&[moduli[j]], &extended_basis))
                .collect::<mhe_math::Result<Vec<_>>>()
                .map_err(Error::MathError)?;
            digit_extenders.push(per_digit);
            mod_down_extenders
                .push(BasisExtender::new(&[special_modulus], at_level).map_err(Error::MathError)?);
        }

        Ok(CkksParameters {
            polynomial_degree: self.degree,
            moduli: moduli.into_boxed_slice(),
            moduli_sizes: moduli_sizes.into_boxed_slice(),
            special_modulus,
            variance: self.variance,
            default_scale: self.scale,
            ctx,
            ctx_p,
            p_mod_qi: p_mod_qi.into_boxed_slice(),
            p_inv_mod_qi: p_inv_mod_qi.into_boxed_slice(),
            digit_extenders,
            mod_down_extenders,
        })
    }
}
