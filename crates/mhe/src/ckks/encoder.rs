//! Encoding of complex vectors into CKKS plaintexts through the canonical
//! embedding.
//!
//! The ring `R = Z[X]/(X^N + 1)` embeds into `C^(N/2)` by evaluating a
//! polynomial at the primitive 2N-th roots of unity `zeta^(5^t)`, one per
//! slot. Slot `t` of a plaintext is the evaluation at `zeta^(5^t mod 2N)`;
//! with this ordering the Galois automorphism `X -> X^(5^k)` rotates the
//! slots cyclically to the left by `k` positions, and `X -> X^(2N-1)`
//! conjugates them.

use crate::ckks::{CkksParameters, Plaintext};
use crate::{Error, Result};
use mhe_math::rq::{traits::TryConvertFrom, Representation};
use mhe_traits::{FheDecoder, FheEncoder};
use num_traits::ToPrimitive;
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;

/// A complex number with double-precision parts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    /// The real part.
    pub re: f64,
    /// The imaginary part.
    pub im: f64,
}

impl Complex {
    /// Creates a new complex number.
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Returns the complex conjugate.
    pub const fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    /// Returns the modulus of the complex number.
    pub fn abs(self) -> f64 {
        self.re.hypot(self.im)
    }
}

impl From<f64> for Complex {
    fn from(re: f64) -> Self {
        Self { re, im: 0.0 }
    }
}

impl Add for Complex {
    type Output = Complex;
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// An encoding configuration: the level of the modulus chain to encode at,
/// and optionally a scale overriding the parameters' default.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub(crate) level: usize,
    pub(crate) scale: Option<f64>,
}

impl Encoding {
    /// An encoding into the slots, at level 0 and the default scale.
    pub fn simd() -> Self {
        Self {
            level: 0,
            scale: None,
        }
    }

    /// An encoding into the slots at a given level.
    pub fn simd_at_level(level: usize) -> Self {
        Self { level, scale: None }
    }

    /// Overrides the scale of this encoding.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
}

/// Precomputed table of the 2N-th roots of unity.
fn roots_of_unity(degree: usize) -> Vec<Complex> {
    let m = 2 * degree;
    (0..m)
        .map(|i| {
            let angle = PI * (i as f64) / (degree as f64);
            Complex::new(angle.cos(), angle.sin())
        })
        .collect()
}

/// The exponents `5^t mod 2N` of the roots associated with each slot.
fn slot_exponents(degree: usize) -> Vec<usize> {
    let m = 2 * degree;
    let mut exponents = Vec::with_capacity(degree / 2);
    let mut e = 1usize;
    for _ in 0..degree / 2 {
        exponents.push(e);
        e = (e * 5) % m;
    }
    exponents
}

/// Inverse canonical embedding: project the slot values onto the space of
/// real coefficient vectors, scale, and round.
fn inverse_embedding(values: &[Complex], degree: usize, scale: f64) -> Result<Vec<i64>> {
    let m = 2 * degree;
    let roots = roots_of_unity(degree);
    let exponents = slot_exponents(degree);

    let mut coeffs = Vec::with_capacity(degree);
    for j in 0..degree {
        let mut acc = 0f64;
        for (z, e) in values.iter().zip(exponents.iter()) {
            // Re(z * conj(w^j)) for w the slot's root.
            let w = roots[(e * j) % m];
            acc += z.re * w.re + z.im * w.im;
        }
        let c = (acc * 2.0 / (degree as f64) * scale).round();
        if !c.is_finite() || c.abs() >= (i64::MAX as f64) {
            return Err(Error::DefaultError(
                "The scaled value does not fit the coefficient range".to_string(),
            ));
        }
        coeffs.push(c as i64);
    }
    Ok(coeffs)
}

/// Forward canonical embedding of real coefficients into the slots.
fn forward_embedding(coeffs: &[f64], degree: usize) -> Vec<Complex> {
    let m = 2 * degree;
    let roots = roots_of_unity(degree);
    let exponents = slot_exponents(degree);

    exponents
        .iter()
        .map(|e| {
            let mut acc = Complex::default();
            for (j, c) in coeffs.iter().enumerate() {
                let w = roots[(e * j) % m];
                acc = acc + Complex::new(c * w.re, c * w.im);
            }
            acc
        })
        .collect()
}

impl FheEncoder<&[Complex]> for Plaintext {
    type Error = Error;
    type Encoding = Encoding;

    fn try_encode(
        value: &[Complex],
        encoding: Encoding,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        if value.len() > par.slots() {
            return Err(Error::TooManyValues(value.len(), par.slots()));
        }
        let scale = encoding.scale.unwrap_or_else(|| par.default_scale());
        if !scale.is_finite() || scale < 1.0 {
            return Err(Error::DefaultError("Invalid encoding scale".to_string()));
        }
        let ctx = par.ctx_at_level(encoding.level)?;
        let coeffs = inverse_embedding(value, par.degree(), scale)?;
        let poly =
            mhe_math::rq::Poly::try_convert_from(coeffs.as_slice(), ctx, Representation::Ntt)
                .map_err(Error::MathError)?;
        Ok(Plaintext {
            par: par.clone(),
            poly,
            level: encoding.level,
            scale,
        })
    }
}

impl FheEncoder<&[f64]> for Plaintext {
    type Error = Error;
    type Encoding = Encoding;

    fn try_encode(value: &[f64], encoding: Encoding, par: &Arc<CkksParameters>) -> Result<Self> {
        let values = value.iter().map(|v| Complex::from(*v)).collect::<Vec<_>>();
        Plaintext::try_encode(values.as_slice(), encoding, par)
    }
}

impl FheDecoder<Plaintext> for Vec<Complex> {
    type Error = Error;

    fn try_decode(pt: &Plaintext) -> Result<Vec<Complex>> {
        let mut poly = pt.poly.clone();
        poly.change_representation(Representation::PowerBasis);
        let ctx = poly.ctx().clone();
        let rns = ctx.rns();
        let q = ctx.modulus();
        let q_half = q >> 1;

        let degree = pt.par.degree();
        let mut coeffs = Vec::with_capacity(degree);
        let residues = poly.coefficients();
        for col in 0..degree {
            let column = (0..ctx.moduli().len())
                .map(|row| residues[[row, col]])
                .collect::<Vec<_>>();
            let lifted = rns.lift(&column);
            let centered = if lifted > q_half {
                -(q - &lifted).to_f64().unwrap_or(f64::INFINITY)
            } else {
                lifted.to_f64().unwrap_or(f64::INFINITY)
            };
            if !centered.is_finite() {
                return Err(Error::DefaultError(
                    "The coefficient could not be represented".to_string(),
                ));
            }
            coeffs.push(centered / pt.scale);
        }

        Ok(forward_embedding(&coeffs, degree))
    }
}

impl FheDecoder<Plaintext> for Vec<f64> {
    type Error = Error;

    fn try_decode(pt: &Plaintext) -> Result<Vec<f64>> {
        let slots = Vec::<Complex>::try_decode(pt)?;
        Ok(slots.iter().map(|z| z.re).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Complex, Encoding};
    use crate::ckks::{CkksParameters, Plaintext};
    use mhe_traits::{FheDecoder, FheEncoder};
    use rand::{thread_rng, Rng};

    fn random_values(slots: usize, rng: &mut impl Rng) -> Vec<Complex> {
        (0..slots)
            .map(|_| Complex::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)))
            .collect()
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(3, 16);
        for level in 0..=par.max_level() {
            for _ in 0..10 {
                let values = random_values(par.slots(), &mut rng);
                let pt =
                    Plaintext::try_encode(values.as_slice(), Encoding::simd_at_level(level), &par)
                        .unwrap();
                assert_eq!(pt.level(), level);
                let decoded = Vec::<Complex>::try_decode(&pt).unwrap();
                for (a, b) in decoded.iter().zip(values.iter()) {
                    assert!((*a - *b).abs() < 1e-6, "{a:?} != {b:?}");
                }
            }
        }
    }

    #[test]
    fn encode_real_decode_real() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let values = (0..par.slots())
            .map(|_| rng.gen_range(-10.0..10.0))
            .collect::<Vec<f64>>();
        let pt = Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).unwrap();
        let decoded = Vec::<f64>::try_decode(&pt).unwrap();
        for (a, b) in decoded.iter().zip(values.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn short_vectors_are_padded() {
        let par = CkksParameters::default_arc(2, 16);
        let pt = Plaintext::try_encode([1.0f64].as_slice(), Encoding::simd(), &par).unwrap();
        let decoded = Vec::<Complex>::try_decode(&pt).unwrap();
        assert!((decoded[0] - Complex::from(1.0)).abs() < 1e-6);
        for z in &decoded[1..] {
            assert!(z.abs() < 1e-6);
        }
    }

    #[test]
    fn too_many_values() {
        let par = CkksParameters::default_arc(2, 16);
        let values = vec![1.0f64; par.slots() + 1];
        assert!(
            Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).is_err()
        );
    }
}
