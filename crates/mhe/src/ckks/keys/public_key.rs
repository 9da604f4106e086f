//! Public keys for the CKKS encryption scheme.

use crate::ckks::{CkksParameters, Ciphertext, Plaintext, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{traits::TryConvertFrom, Poly, PolyQP, Representation};
use mhe_traits::{DeserializeParametrized, FheEncrypter, FheParametrized, Serialize};
use mhe_util::sample_vec_cbd_f32;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Public key for the CKKS encryption scheme.
///
/// The key is a pair `(c_0, c_1) = (-a s + e, a)` over the extended ring QP;
/// encryption at a given level uses the Q parts truncated to that level. In
/// the multiparty setting the same type holds the collective public key
/// produced by aggregating the parties' generation shares.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicKey {
    /// The scheme parameters.
    pub(crate) par: Arc<CkksParameters>,
    /// The first element of the key.
    pub(crate) c0: PolyQP,
    /// The second element of the key, uniformly random.
    pub(crate) c1: PolyQP,
}

impl PublicKey {
    /// Generate a [`PublicKey`] from a [`SecretKey`].
    pub fn new<R: RngCore + CryptoRng>(sk: &SecretKey, rng: &mut R) -> Result<Self> {
        let par = sk.par.clone();
        let ctx_q = par.ctx_at_level(0)?;
        let ctx_p = par.ctx_p();

        let s = Zeroizing::new(sk.poly_qp()?);
        let a = PolyQP::random(ctx_q, ctx_p, Representation::Ntt, rng);
        let e = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
            .map_err(Error::MathError)?;

        let mut c0 = -(&a * s.as_ref());
        c0 += &e;

        Ok(Self { par, c0, c1: a })
    }

    /// Create a public key from its two elements over the ring QP.
    pub(crate) fn from_elements(
        c0: PolyQP,
        c1: PolyQP,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        if c0.q.ctx() != par.ctx_at_level(0)? || c0.p.ctx() != par.ctx_p() {
            return Err(Error::DefaultError(
                "The elements do not match the parameters".to_string(),
            ));
        }
        Ok(Self {
            par: par.clone(),
            c0,
            c1,
        })
    }
}

impl FheParametrized for PublicKey {
    type Parameters = CkksParameters;
}

impl Serialize for PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        let c0 = self.c0.to_bytes();
        let c1 = self.c1.to_bytes();
        let mut bytes = Vec::with_capacity(8 + c0.len() + c1.len());
        bytes.extend_from_slice(&(c0.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&c0);
        bytes.extend_from_slice(&c1);
        bytes
    }
}

impl DeserializeParametrized for PublicKey {
    type Error = Error;

    fn from_bytes(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::SerializationError);
        }
        let c0_len = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        if bytes.len() < 8 + c0_len {
            return Err(Error::SerializationError);
        }
        let ctx_q = par.ctx_at_level(0)?;
        let c0 = PolyQP::from_bytes(&bytes[8..8 + c0_len], ctx_q, par.ctx_p())
            .map_err(Error::MathError)?;
        let c1 = PolyQP::from_bytes(&bytes[8 + c0_len..], ctx_q, par.ctx_p())
            .map_err(Error::MathError)?;
        PublicKey::from_elements(c0, c1, par)
    }
}

impl FheEncrypter<Plaintext, Ciphertext> for PublicKey {
    type Error = Error;

    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &Plaintext,
        rng: &mut R,
    ) -> Result<Ciphertext> {
        assert_eq!(self.par, pt.par);
        let ctx = self.par.ctx_at_level(pt.level)?;

        let u_coeffs = Zeroizing::new(
            sample_vec_cbd_f32(self.par.degree(), SecretKey::SK_VARIANCE, rng)
                .map_err(|e| Error::MathError(mhe_math::Error::from(e)))?,
        );
        let mut u = Zeroizing::new(
            Poly::try_convert_from(u_coeffs.as_slice(), ctx, Representation::PowerBasis)
                .map_err(Error::MathError)?,
        );
        u.change_representation(Representation::Ntt);

        let e0 = Poly::small(ctx, Representation::Ntt, self.par.variance, rng)
            .map_err(Error::MathError)?;
        let e1 = Poly::small(ctx, Representation::Ntt, self.par.variance, rng)
            .map_err(Error::MathError)?;

        let mut b = self.c0.q.clone();
        b.shrink_to(ctx).map_err(Error::MathError)?;
        let mut a = self.c1.q.clone();
        a.shrink_to(ctx).map_err(Error::MathError)?;

        let mut ct0 = &b * u.as_ref();
        ct0 += &e0;
        ct0 += &pt.poly;
        let mut ct1 = &a * u.as_ref();
        ct1 += &e1;

        Ciphertext::new(vec![ct0, ct1], pt.scale, &self.par)
    }
}

#[cfg(test)]
mod tests {
    use super::PublicKey;
    use crate::ckks::{CkksParameters, Encoding, Plaintext, SecretKey};
    use mhe_traits::{
        DeserializeParametrized, FheDecoder, FheDecrypter, FheEncoder, FheEncrypter, Serialize,
    };
    use rand::{thread_rng, Rng};
    use std::error::Error;

    #[test]
    fn serialization_roundtrip() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng)?;
        let bytes = pk.to_bytes();
        assert_eq!(PublicKey::from_bytes(&bytes, &par)?, pk);
        Ok(())
    }

    #[test]
    fn encrypt_decrypt() -> Result<(), Box<dyn Error>> {
        let mut rng = thread_rng();
        for par in [
            CkksParameters::default_arc(1, 16),
            CkksParameters::default_arc(3, 16),
        ] {
            for level in 0..=par.max_level() {
                let sk = SecretKey::random(&par, &mut rng);
                let pk = PublicKey::new(&sk, &mut rng)?;

                let values = (0..par.slots())
                    .map(|_| rng.gen_range(-10.0..10.0))
                    .collect::<Vec<f64>>();
                let pt = Plaintext::try_encode(
                    values.as_slice(),
                    Encoding::simd_at_level(level),
                    &par,
                )?;
                let ct = pk.try_encrypt(&pt, &mut rng)?;
                let decoded = Vec::<f64>::try_decode(&sk.try_decrypt(&ct)?)?;
                for (a, b) in decoded.iter().zip(values.iter()) {
                    assert!((a - b).abs() < 1e-4);
                }
            }
        }
        Ok(())
    }
}
