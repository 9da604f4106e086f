//! Ciphertext type for the CKKS encryption scheme.

use crate::ckks::CkksParameters;
use crate::{Error, Result};
use mhe_math::rq::{Poly, Representation};
use mhe_traits::FheParametrized;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;

/// A ciphertext: a vector of polynomials `(c_0, ..., c_d)` decrypting to
/// `sum_i c_i s^i` under the secret `s`, at a level of the modulus chain and
/// with the scale of its encoded values.
#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext {
    /// The parameters of the underlying scheme.
    pub(crate) par: Arc<CkksParameters>,
    /// The ciphertext polynomials, in NTT representation.
    pub(crate) c: Vec<Poly>,
    /// The level of the ciphertext.
    pub(crate) level: usize,
    /// The scale of the encoded values.
    pub(crate) scale: f64,
}

impl Ciphertext {
    /// Create a ciphertext from a vector of polynomials, which must share a
    /// context from the parameters' modulus chain and be in NTT
    /// representation.
    pub fn new(c: Vec<Poly>, scale: f64, par: &Arc<CkksParameters>) -> Result<Self> {
        if c.len() < 2 {
            return Err(Error::TooFewValues(c.len(), 2));
        }
        let ctx = c[0].ctx().clone();
        let level = par.level_of_ctx(&ctx)?;
        for ci in &c {
            if ci.ctx() != &ctx {
                return Err(Error::DefaultError(
                    "The polynomials should share the same context".to_string(),
                ));
            }
            if ci.representation() != &Representation::Ntt {
                return Err(Error::DefaultError(
                    "The polynomials should be in NTT representation".to_string(),
                ));
            }
        }
        Ok(Self {
            par: par.clone(),
            c,
            level,
            scale,
        })
    }

    /// Returns the level of this ciphertext.
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Returns the scale of this ciphertext.
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns the number of polynomials of this ciphertext.
    pub fn len(&self) -> usize {
        self.c.len()
    }

    /// Returns whether the ciphertext is empty (never the case for a valid
    /// ciphertext).
    pub fn is_empty(&self) -> bool {
        self.c.is_empty()
    }

    /// Divide the ciphertext by the last modulus of its chain, rounding, and
    /// move one level down. The scale is divided by the dropped modulus.
    pub fn rescale(&mut self) -> Result<()> {
        if self.level == self.par.max_level() {
            return Err(Error::DefaultError(
                "No modulus left to rescale by".to_string(),
            ));
        }
        let q_len = self.par.moduli().len() - self.level;
        let q_last = self.par.moduli()[q_len - 1];
        for ci in self.c.iter_mut() {
            ci.change_representation(Representation::PowerBasis);
            ci.mod_switch_down_next().map_err(Error::MathError)?;
            ci.change_representation(Representation::Ntt);
        }
        self.level += 1;
        self.scale /= q_last as f64;
        Ok(())
    }

    /// Drop `levels` levels from the ciphertext by truncating its modulus
    /// chain. The scale is unchanged.
    pub fn drop_level(&mut self, levels: usize) -> Result<()> {
        if levels == 0 {
            return Ok(());
        }
        let target = self.par.ctx_at_level(self.level + levels)?.clone();
        for ci in self.c.iter_mut() {
            ci.shrink_to(&target).map_err(Error::MathError)?;
        }
        self.level += levels;
        Ok(())
    }
}

impl FheParametrized for Ciphertext {
    type Parameters = CkksParameters;
}

impl Add<&Ciphertext> for &Ciphertext {
    type Output = Ciphertext;

    fn add(self, rhs: &Ciphertext) -> Ciphertext {
        assert_eq!(self.par, rhs.par);
        assert_eq!(self.level, rhs.level);
        assert_eq!(self.c.len(), rhs.c.len());
        debug_assert!((self.scale / rhs.scale - 1.0).abs() < 1e-9);

        let c = self
            .c
            .iter()
            .zip(rhs.c.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ciphertext {
            par: self.par.clone(),
            c,
            level: self.level,
            scale: self.scale,
        }
    }
}

impl Sub<&Ciphertext> for &Ciphertext {
    type Output = Ciphertext;

    fn sub(self, rhs: &Ciphertext) -> Ciphertext {
        assert_eq!(self.par, rhs.par);
        assert_eq!(self.level, rhs.level);
        assert_eq!(self.c.len(), rhs.c.len());
        debug_assert!((self.scale / rhs.scale - 1.0).abs() < 1e-9);

        let c = self
            .c
            .iter()
            .zip(rhs.c.iter())
            .map(|(a, b)| a - b)
            .collect();
        Ciphertext {
            par: self.par.clone(),
            c,
            level: self.level,
            scale: self.scale,
        }
    }
}

/// Tensor multiplication of two degree-1 ciphertexts, producing a degree-2
/// ciphertext `(c_0, c_1, c_2)` to be relinearized and rescaled.
impl Mul<&Ciphertext> for &Ciphertext {
    type Output = Ciphertext;

    fn mul(self, rhs: &Ciphertext) -> Ciphertext {
        assert_eq!(self.par, rhs.par);
        assert_eq!(self.level, rhs.level);
        assert_eq!(self.c.len(), 2);
        assert_eq!(rhs.c.len(), 2);

        let c0 = &self.c[0] * &rhs.c[0];
        let mut c1 = &self.c[0] * &rhs.c[1];
        c1 += &(&self.c[1] * &rhs.c[0]);
        let c2 = &self.c[1] * &rhs.c[1];

        Ciphertext {
            par: self.par.clone(),
            c: vec![c0, c1, c2],
            level: self.level,
            scale: self.scale * rhs.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ckks::{CkksParameters, Ciphertext, Encoding, Plaintext, SecretKey};
    use mhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
    use rand::{thread_rng, Rng};

    #[test]
    fn add_sub() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::random(&par, &mut rng);

        let a = (0..par.slots())
            .map(|_| rng.gen_range(-10.0..10.0))
            .collect::<Vec<f64>>();
        let b = (0..par.slots())
            .map(|_| rng.gen_range(-10.0..10.0))
            .collect::<Vec<f64>>();

        let pt_a = Plaintext::try_encode(a.as_slice(), Encoding::simd(), &par).unwrap();
        let pt_b = Plaintext::try_encode(b.as_slice(), Encoding::simd(), &par).unwrap();
        let ct_a = sk.try_encrypt(&pt_a, &mut rng).unwrap();
        let ct_b = sk.try_encrypt(&pt_b, &mut rng).unwrap();

        let sum = sk.try_decrypt(&(&ct_a + &ct_b)).unwrap();
        let diff = sk.try_decrypt(&(&ct_a - &ct_b)).unwrap();
        let sum = Vec::<f64>::try_decode(&sum).unwrap();
        let diff = Vec::<f64>::try_decode(&diff).unwrap();

        for i in 0..par.slots() {
            assert!((sum[i] - (a[i] + b[i])).abs() < 1e-4);
            assert!((diff[i] - (a[i] - b[i])).abs() < 1e-4);
        }
    }

    #[test]
    fn drop_level_preserves_plaintext() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(3, 16);
        let sk = SecretKey::random(&par, &mut rng);

        let values = (0..par.slots())
            .map(|_| rng.gen_range(-10.0..10.0))
            .collect::<Vec<f64>>();
        let pt = Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).unwrap();
        let mut ct = sk.try_encrypt(&pt, &mut rng).unwrap();

        ct.drop_level(par.max_level()).unwrap();
        assert_eq!(ct.level(), par.max_level());

        let decoded = Vec::<f64>::try_decode(&sk.try_decrypt(&ct).unwrap()).unwrap();
        for (a, b) in decoded.iter().zip(values.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn ciphertext_constructor_validation() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::random(&par, &mut rng);
        let pt = Plaintext::try_encode([1.0f64].as_slice(), Encoding::simd(), &par).unwrap();
        let ct = sk.try_encrypt(&pt, &mut rng).unwrap();

        assert!(Ciphertext::new(vec![ct.c[0].clone()], ct.scale(), &par).is_err());
        assert!(Ciphertext::new(ct.c.clone(), ct.scale(), &par).is_ok());
    }
}
