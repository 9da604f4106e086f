//! Collective rotation-key generation (RTG).

use crate::ckks::add_gadget_term;
use crate::ckks::{CkksParameters, GaloisKey, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{PolyQP, Representation, SubstitutionExponent};
use mhe_traits::Serialize;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::{Aggregate, CommonRandomPoly};

/// A party's share in the collective rotation-key generation protocol, run
/// once per Galois element.
///
/// Each party computes, per gadget digit,
/// `h_j = -a_j s_i + P sigma_g(s_i) g_j + e` over the ring QP, where
/// `sigma_g` is the Galois automorphism. The aggregated share together with
/// the CRPs forms the switching key `(h_j, a_j)` from `sigma_g(s)` back to
/// the collective secret `s`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RotationKeyShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) galois_element: u64,
    pub(crate) h: Vec<PolyQP>,
}

impl RotationKeyShare {
    /// Participate in a new rotation-key generation.
    ///
    /// 1. *Private input*: the party's secret-key share
    /// 2. *Public input*: the Galois element of the rotation
    /// 3. *Public input*: the common random polynomials, one per digit
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        galois_element: u64,
        crps: &[CommonRandomPoly],
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_share.par.clone();
        if crps.len() != par.beta() {
            return Err(Error::IncompatibleShare(format!(
                "Expected {} common random polynomials, got {}",
                par.beta(),
                crps.len()
            )));
        }
        let exponent = SubstitutionExponent::new(par.degree(), galois_element as usize)
            .map_err(Error::MathError)?;
        let ctx_q = par.ctx_at_level(0)?;
        let ctx_p = par.ctx_p();

        let s = Zeroizing::new(sk_share.poly_qp()?);
        let s_rotated = Zeroizing::new(s.q.substitute(&exponent).map_err(Error::MathError)?);

        let mut h = Vec::with_capacity(par.beta());
        for (j, crp) in crps.iter().enumerate() {
            // h_j = -a_j s_i + P sigma_g(s_i) g_j + e
            let mut h_j = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
                .map_err(Error::MathError)?;
            add_gadget_term(&par, &mut h_j, s_rotated.as_ref(), j);
            h_j -= &(s.as_ref() * &crp.poly);
            h.push(h_j);
        }

        Ok(Self {
            par,
            galois_element,
            h,
        })
    }

    /// Returns the Galois element this share was generated for.
    pub const fn galois_element(&self) -> u64 {
        self.galois_element
    }

    /// Assemble the collective switching key for this share's Galois
    /// element from the aggregated share and the CRPs used to generate it.
    pub fn finalize(&self, crps: &[CommonRandomPoly]) -> Result<GaloisKey> {
        if crps.len() != self.par.beta() {
            return Err(Error::IncompatibleShare(format!(
                "Expected {} common random polynomials, got {}",
                self.par.beta(),
                crps.len()
            )));
        }
        let keys = self
            .h
            .iter()
            .zip(crps.iter())
            .map(|(h_j, crp)| (h_j.clone(), crp.poly.clone()))
            .collect();
        GaloisKey::from_key_polys(keys, self.galois_element, &self.par)
    }
}

impl Aggregate<RotationKeyShare> for RotationKeyShare {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = RotationKeyShare>,
    {
        let mut shares = iter.into_iter();
        let mut agg = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        for sh in shares {
            if sh.par != agg.par {
                return Err(Error::IncompatibleShare(
                    "Mismatched parameters".to_string(),
                ));
            }
            if sh.galois_element != agg.galois_element {
                return Err(Error::IncompatibleShare(format!(
                    "Mismatched Galois elements: {} != {}",
                    sh.galois_element, agg.galois_element
                )));
            }
            for (a, b) in agg.h.iter_mut().zip(sh.h.iter()) {
                *a += b;
            }
        }
        Ok(agg)
    }
}

impl Serialize for RotationKeyShare {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.galois_element.to_le_bytes().to_vec();
        for h in &self.h {
            let b = h.to_bytes();
            bytes.extend_from_slice(&(b.len() as u64).to_le_bytes());
            bytes.extend_from_slice(&b);
        }
        bytes
    }
}

impl RotationKeyShare {
    /// Deserialize a share from bytes, within the given parameters.
    pub fn deserialize(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::SerializationError);
        }
        let galois_element = u64::from_le_bytes(bytes[..8].try_into().unwrap());

        let mut h = Vec::with_capacity(par.beta());
        let mut offset = 8;
        for _ in 0..par.beta() {
            if offset + 8 > bytes.len() {
                return Err(Error::SerializationError);
            }
            let len = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap()) as usize;
            offset += 8;
            if offset + len > bytes.len() {
                return Err(Error::SerializationError);
            }
            h.push(
                PolyQP::from_bytes(
                    &bytes[offset..offset + len],
                    par.ctx_at_level(0)?,
                    par.ctx_p(),
                )
                .map_err(Error::MathError)?,
            );
            offset += len;
        }
        if offset != bytes.len() {
            return Err(Error::SerializationError);
        }

        Ok(Self {
            par: par.clone(),
            galois_element,
            h,
        })
    }
}
