//! Collective public-key generation (CKG).

use crate::ckks::{CkksParameters, PublicKey, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{PolyQP, Representation};
use mhe_traits::Serialize;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::{Aggregate, CommonRandomPoly};

/// A party's share in the collective public-key generation protocol.
///
/// Each party computes `p0_share = -crp * s_i + e_i` over the ring QP from
/// its secret-key share and the common random polynomial; the aggregated
/// share together with the CRP forms the collective public key
/// `(-crp * s + e, crp)` for the virtual combined secret `s = sum_i s_i`.
///
/// All parties must use the same CRP: a share computed under a different
/// CRP aggregates silently into an incorrect public key, which the algebra
/// cannot detect. The orchestrator must guarantee CRP consistency.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublicKeyShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) crp: CommonRandomPoly,
    pub(crate) p0_share: PolyQP,
}

impl PublicKeyShare {
    /// Participate in a new collective key generation.
    ///
    /// 1. *Private input*: the party's secret-key share
    /// 2. *Public input*: the common random polynomial
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        crp: CommonRandomPoly,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_share.par.clone();
        if crp.poly.q.ctx() != par.ctx_at_level(0)? || crp.poly.p.ctx() != par.ctx_p() {
            return Err(Error::IncompatibleShare(
                "The CRP does not match the parameters".to_string(),
            ));
        }

        let s = Zeroizing::new(sk_share.poly_qp()?);
        let e = PolyQP::small(
            par.ctx_at_level(0)?,
            par.ctx_p(),
            par.variance,
            Representation::Ntt,
            rng,
        )
        .map_err(Error::MathError)?;

        // Fresh output storage: the party's secret material is never aliased
        // into the published share.
        let mut p0_share = -(&crp.poly * s.as_ref());
        p0_share += &e;

        Ok(Self { par, crp, p0_share })
    }

    /// Deserialize a share from bytes, within the given parameters and CRP.
    pub fn deserialize(
        bytes: &[u8],
        par: &Arc<CkksParameters>,
        crp: CommonRandomPoly,
    ) -> Result<Self> {
        let p0_share = PolyQP::from_bytes(bytes, par.ctx_at_level(0)?, par.ctx_p())
            .map_err(Error::MathError)?;
        Ok(Self {
            par: par.clone(),
            crp,
            p0_share,
        })
    }
}

impl Aggregate<PublicKeyShare> for PublicKeyShare {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = PublicKeyShare>,
    {
        let mut shares = iter.into_iter();
        let mut agg = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        for sh in shares {
            if sh.par != agg.par {
                return Err(Error::IncompatibleShare(
                    "Mismatched parameters".to_string(),
                ));
            }
            agg.p0_share += &sh.p0_share;
        }
        Ok(agg)
    }
}

impl Aggregate<PublicKeyShare> for PublicKey {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = PublicKeyShare>,
    {
        let agg = PublicKeyShare::from_shares(iter)?;
        PublicKey::from_elements(agg.p0_share, agg.crp.poly, &agg.par)
    }
}

impl Serialize for PublicKeyShare {
    fn to_bytes(&self) -> Vec<u8> {
        self.p0_share.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::{CkksParameters, Encoding, Plaintext};
    use crate::mckks::test_oracle::CombinedSecretKey;
    use crate::mckks::testing::{assert_slots_eq, random_values};
    use crate::mckks::AggregateIter;
    use mhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
    use rand::thread_rng;

    #[test]
    fn collective_key_encrypts_correctly() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(3, 16);
        for n_parties in [1usize, 2, 10] {
            let crp = CommonRandomPoly::new(&par, &mut rng).unwrap();

            let sk_shares = (0..n_parties)
                .map(|_| SecretKey::random(&par, &mut rng))
                .collect::<Vec<_>>();
            let public_key: PublicKey = sk_shares
                .iter()
                .map(|sk| PublicKeyShare::new(sk, crp.clone(), &mut rng))
                .aggregate()
                .unwrap();

            // Decrypting an encryption under the collective key with the
            // ideal combined secret (test oracle) recovers the plaintext.
            let oracle = CombinedSecretKey::from_parties(sk_shares.iter(), &par);
            let values = random_values(par.slots(), &mut rng);
            let pt = Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).unwrap();
            let ct = public_key.try_encrypt(&pt, &mut rng).unwrap();
            let decoded = Vec::<crate::ckks::Complex>::try_decode(
                &oracle.try_decrypt(&ct).unwrap(),
            )
            .unwrap();
            assert_slots_eq(&decoded, &values, 1e-3);
        }
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let crp = CommonRandomPoly::new(&par, &mut rng).unwrap();

        let shares = (0..5)
            .map(|_| {
                let sk = SecretKey::random(&par, &mut rng);
                PublicKeyShare::new(&sk, crp.clone(), &mut rng).unwrap()
            })
            .collect::<Vec<_>>();

        let sequential = PublicKeyShare::from_shares(shares.clone()).unwrap();

        // Reversed order.
        let mut reversed = shares.clone();
        reversed.reverse();
        let reversed = PublicKeyShare::from_shares(reversed).unwrap();
        assert_eq!(sequential, reversed);

        // Pairwise tree fold.
        let left = PublicKeyShare::from_shares(shares[..2].to_vec()).unwrap();
        let right = PublicKeyShare::from_shares(shares[2..].to_vec()).unwrap();
        let tree = PublicKeyShare::from_shares(vec![left, right]).unwrap();
        assert_eq!(sequential, tree);
    }

    #[test]
    fn aggregating_nothing_fails() {
        let shares: Vec<PublicKeyShare> = vec![];
        assert!(matches!(
            PublicKeyShare::from_shares(shares),
            Err(crate::Error::TooFewValues(0, 1))
        ));
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let crp = CommonRandomPoly::new(&par, &mut rng).unwrap();
        let sk = SecretKey::random(&par, &mut rng);
        let share = PublicKeyShare::new(&sk, crp.clone(), &mut rng).unwrap();
        let bytes = share.to_bytes();
        assert_eq!(
            PublicKeyShare::deserialize(&bytes, &par, crp).unwrap(),
            share
        );
    }
}
