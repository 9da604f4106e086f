//! Secret keys for the CKKS encryption scheme.

use crate::ckks::{CkksParameters, Ciphertext, Plaintext};
use crate::{Error, Result};
use mhe_math::rq::{traits::TryConvertFrom, Poly, PolyQP, Representation};
use mhe_traits::{FheDecrypter, FheEncrypter, FheParametrized};
use mhe_util::sample_vec_cbd_f32;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Secret key for the CKKS encryption scheme.
///
/// In the multiparty setting each party holds a `SecretKey` as its additive
/// share of the virtual collective secret; the combined key is never
/// materialized. A secret key never appears inside any protocol share.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SecretKey {
    /// The scheme parameters.
    pub(crate) par: Arc<CkksParameters>,
    /// The secret key coefficients.
    pub coeffs: Box<[i64]>,
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.coeffs.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl SecretKey {
    /// The variance of the ternary secret key distribution.
    pub const SK_VARIANCE: f32 = 0.5;

    /// Generate a random [`SecretKey`].
    pub fn random<R: RngCore + CryptoRng>(par: &Arc<CkksParameters>, rng: &mut R) -> Self {
        let coeffs = sample_vec_cbd_f32(par.degree(), Self::SK_VARIANCE, rng).unwrap();
        Self::new(coeffs, par)
    }

    /// Generate a [`SecretKey`] from its coefficients.
    pub fn new(coeffs: Vec<i64>, par: &Arc<CkksParameters>) -> Self {
        Self {
            par: par.clone(),
            coeffs: coeffs.into_boxed_slice(),
        }
    }

    /// The secret key as a polynomial modulo the Q basis at the given level,
    /// in NTT representation.
    pub(crate) fn poly_at_level(&self, level: usize) -> Result<Poly> {
        let ctx = self.par.ctx_at_level(level)?;
        let mut s = Poly::try_convert_from(
            self.coeffs.as_ref(),
            ctx,
            Representation::PowerBasis,
        )
        .map_err(Error::MathError)?;
        s.change_representation(Representation::Ntt);
        Ok(s)
    }

    /// The secret key as an element of the extended ring QP, in NTT
    /// representation.
    pub(crate) fn poly_qp(&self) -> Result<PolyQP> {
        let mut q = Poly::try_convert_from(
            self.coeffs.as_ref(),
            self.par.ctx_at_level(0)?,
            Representation::PowerBasis,
        )
        .map_err(Error::MathError)?;
        let mut p = Poly::try_convert_from(
            self.coeffs.as_ref(),
            self.par.ctx_p(),
            Representation::PowerBasis,
        )
        .map_err(Error::MathError)?;
        q.change_representation(Representation::Ntt);
        p.change_representation(Representation::Ntt);
        Ok(PolyQP { q, p })
    }

    /// Encrypt a polynomial, assumed to be in NTT representation.
    pub(crate) fn encrypt_poly<R: RngCore + CryptoRng>(
        &self,
        p: &Poly,
        scale: f64,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        debug_assert_eq!(p.representation(), &Representation::Ntt);

        let level = self.par.level_of_ctx(p.ctx())?;
        let s = Zeroizing::new(self.poly_at_level(level)?);

        let a = Poly::random(p.ctx(), Representation::Ntt, rng);
        let a_s = Zeroizing::new(&a * s.as_ref());

        let mut b = Poly::small(p.ctx(), Representation::Ntt, self.par.variance, rng)
            .map_err(Error::MathError)?;
        b -= a_s.as_ref();
        b += p;

        Ciphertext::new(vec![b, a], scale, &self.par)
    }
}

impl FheParametrized for SecretKey {
    type Parameters = CkksParameters;
}

impl FheEncrypter<Plaintext, Ciphertext> for SecretKey {
    type Error = Error;

    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        assert_eq!(self.par, pt.par);
        let m = Zeroizing::new(pt.to_poly());
        self.encrypt_poly(m.as_ref(), pt.scale, rng)
    }
}

impl FheDecrypter<Plaintext, Ciphertext> for SecretKey {
    type Error = Error;

    fn try_decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
        if self.par != ct.par {
            return Err(Error::DefaultError(
                "Incompatible CKKS parameters".to_string(),
            ));
        }

        let s = Zeroizing::new(self.poly_at_level(ct.level)?);
        let mut si = s.clone();

        // c_0 + c_1 s + c_2 s^2 + ...
        let mut c = Zeroizing::new(ct.c[0].clone());
        for i in 1..ct.c.len() {
            let mut cis = Zeroizing::new(ct.c[i].clone());
            *cis.as_mut() *= si.as_ref();
            *c.as_mut() += cis.as_ref();
            *si.as_mut() *= s.as_ref();
        }

        Ok(Plaintext {
            par: self.par.clone(),
            poly: c.as_ref().clone(),
            level: ct.level,
            scale: ct.scale,
        })
    }
}
