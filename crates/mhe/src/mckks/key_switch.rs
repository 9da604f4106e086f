//! Collective key switching (CKS).

use crate::ckks::{CkksParameters, Ciphertext, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{traits::TryConvertFrom, Poly, Representation};
use mhe_traits::{DeserializeWithContext, Serialize};
use mhe_util::sample_vec_normal;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::Aggregate;

/// A party's share in the collective key-switching protocol, which
/// re-encrypts a ciphertext from one collectively-held secret key to
/// another without reconstructing either.
///
/// Each party computes `h_i = (s_from,i - s_to,i) c_1 + e_smudge` at the
/// ciphertext's level, where the smudging noise is Gaussian with a
/// caller-supplied standard deviation. The deviation is the one deliberate,
/// security-critical noise-injection point of the protocol layer: it must
/// be chosen large enough to statistically drown the information the
/// difference of key shares would otherwise leak. The protocol cannot
/// verify this choice.
///
/// The share is tagged with the level it was generated (or allocated) at;
/// applying it to a ciphertext at any other level is an incompatible-share
/// error.
#[derive(Debug, PartialEq, Clone)]
pub struct KeySwitchShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) level: usize,
    pub(crate) h_share: Poly,
}

impl KeySwitchShare {
    /// Allocate a zero share at a fixed level: the additive identity of the
    /// aggregation, usable as the accumulator of a fold. The level is fixed
    /// for the life of the share.
    pub fn allocate(par: &Arc<CkksParameters>, level: usize) -> Result<Self> {
        let ctx = par.ctx_at_level(level)?;
        Ok(Self {
            par: par.clone(),
            level,
            h_share: Poly::zero(ctx, Representation::Ntt),
        })
    }

    /// Participate in a new key-switch protocol.
    ///
    /// 1. *Private input*: the party's share of the input secret key
    /// 2. *Private input*: the party's share of the output secret key
    /// 3. *Public input*: the smudging standard deviation
    /// 4. *Public input*: the ciphertext to switch
    pub fn new<R: RngCore + CryptoRng>(
        sk_from_share: &SecretKey,
        sk_to_share: &SecretKey,
        sigma_smudging: f64,
        ct: &Ciphertext,
        rng: &mut R,
    ) -> Result<Self> {
        if sk_from_share.par != sk_to_share.par || sk_to_share.par != ct.par {
            return Err(Error::IncompatibleShare(
                "Mismatched parameters".to_string(),
            ));
        }
        if ct.c.len() != 2 {
            return Err(Error::TooManyValues(ct.c.len(), 2));
        }

        let par = sk_from_share.par.clone();
        let level = ct.level;
        let ctx = par.ctx_at_level(level)?;

        let s_from = Zeroizing::new(sk_from_share.poly_at_level(level)?);
        let s_to = Zeroizing::new(sk_to_share.poly_at_level(level)?);
        let delta = Zeroizing::new(s_from.as_ref() - s_to.as_ref());

        let e_coeffs = Zeroizing::new(
            sample_vec_normal(par.degree(), sigma_smudging, rng)
                .map_err(|e| Error::MathError(mhe_math::Error::from(e)))?,
        );
        let mut e = Poly::try_convert_from(
            e_coeffs.as_slice(),
            ctx,
            Representation::PowerBasis,
        )
        .map_err(Error::MathError)?;
        e.change_representation(Representation::Ntt);

        // h = (s_from - s_to) c_1 + e, in fresh storage.
        let mut h_share = delta.as_ref() * &ct.c[1];
        h_share += &e;

        Ok(Self {
            par,
            level,
            h_share,
        })
    }

    /// Returns the level this share is bound to.
    pub const fn level(&self) -> usize {
        self.level
    }

    /// Apply the aggregated share to a ciphertext, producing its
    /// re-encryption under the output key. The ciphertext must be the one
    /// the shares were generated for; the protocol can (and does) check the
    /// level, but not the identity of the ciphertext.
    pub fn key_switch(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        if ct.par != self.par {
            return Err(Error::IncompatibleShare(
                "Mismatched parameters".to_string(),
            ));
        }
        if ct.level != self.level {
            return Err(Error::IncompatibleShare(format!(
                "The share is bound to level {}, the ciphertext is at level {}",
                self.level, ct.level
            )));
        }
        if ct.c.len() != 2 {
            return Err(Error::TooManyValues(ct.c.len(), 2));
        }

        let c0 = &ct.c[0] + &self.h_share;
        Ciphertext::new(vec![c0, ct.c[1].clone()], ct.scale, &self.par)
    }
}

impl Aggregate<KeySwitchShare> for KeySwitchShare {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = KeySwitchShare>,
    {
        let mut shares = iter.into_iter();
        let mut agg = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        for sh in shares {
            if sh.par != agg.par || sh.level != agg.level {
                return Err(Error::IncompatibleShare(
                    "Mismatched parameters or level".to_string(),
                ));
            }
            agg.h_share += &sh.h_share;
        }
        Ok(agg)
    }
}

impl Serialize for KeySwitchShare {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = (self.level as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(&self.h_share.to_bytes());
        bytes
    }
}

impl KeySwitchShare {
    /// Deserialize a share from bytes, within the given parameters.
    pub fn deserialize(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::SerializationError);
        }
        let level = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
        let ctx = par.ctx_at_level(level)?;
        let h_share = Poly::from_bytes(&bytes[8..], ctx).map_err(Error::MathError)?;
        Ok(Self {
            par: par.clone(),
            level,
            h_share,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ckks::{CkksParameters, Encoding, Plaintext, PublicKey};
    use crate::mckks::test_oracle::CombinedSecretKey;
    use crate::mckks::testing::{assert_slots_eq, random_values};
    use crate::mckks::{AggregateIter, CommonRandomPoly, PublicKeyShare};
    use mhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
    use rand::thread_rng;

    const SIGMA_SMUDGING: f64 = 3.2;

    struct Party {
        sk0: SecretKey,
        sk1: SecretKey,
    }

    #[test]
    fn encrypt_keyswitch_decrypt() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(3, 16);
        for n_parties in [1usize, 2, 10] {
            // Both ends of the modulus chain are exercised.
            for drop_by in [0usize, par.max_level()] {
                let crp = CommonRandomPoly::new(&par, &mut rng).unwrap();

                let parties = (0..n_parties)
                    .map(|_| Party {
                        sk0: SecretKey::random(&par, &mut rng),
                        sk1: SecretKey::random(&par, &mut rng),
                    })
                    .collect::<Vec<_>>();

                // Collective key for the input key set.
                let pk0: PublicKey = parties
                    .iter()
                    .map(|p| PublicKeyShare::new(&p.sk0, crp.clone(), &mut rng))
                    .aggregate()
                    .unwrap();

                let values = random_values(par.slots(), &mut rng);
                let pt =
                    Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).unwrap();
                let mut ct = pk0.try_encrypt(&pt, &mut rng).unwrap();
                ct.drop_level(drop_by).unwrap();

                // Each party computes its share; any fold order works.
                let agg: KeySwitchShare = parties
                    .iter()
                    .map(|p| {
                        KeySwitchShare::new(&p.sk0, &p.sk1, SIGMA_SMUDGING, &ct, &mut rng)
                    })
                    .aggregate()
                    .unwrap();
                let ct_switched = agg.key_switch(&ct).unwrap();

                // Decrypting under the combined output key recovers the
                // plaintext.
                let oracle =
                    CombinedSecretKey::from_parties(parties.iter().map(|p| &p.sk1), &par);
                let decoded = Vec::<crate::ckks::Complex>::try_decode(
                    &oracle.try_decrypt(&ct_switched).unwrap(),
                )
                .unwrap();
                assert_slots_eq(&decoded, &values, 1e-3);
            }
        }
    }

    #[test]
    fn level_mismatch_is_rejected() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(3, 16);
        let sk0 = SecretKey::random(&par, &mut rng);
        let sk1 = SecretKey::random(&par, &mut rng);

        let values = random_values(par.slots(), &mut rng);
        let pt = Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).unwrap();
        let ct = sk0.try_encrypt(&pt, &mut rng).unwrap();

        let share = KeySwitchShare::new(&sk0, &sk1, SIGMA_SMUDGING, &ct, &mut rng).unwrap();
        assert_eq!(share.level(), 0);

        // The same ciphertext at a different level is rejected, never
        // silently processed.
        let mut ct_dropped = ct.clone();
        ct_dropped.drop_level(1).unwrap();
        assert!(matches!(
            share.key_switch(&ct_dropped),
            Err(crate::Error::IncompatibleShare(_))
        ));

        // Shares at different levels do not aggregate.
        let share_dropped =
            KeySwitchShare::new(&sk0, &sk1, SIGMA_SMUDGING, &ct_dropped, &mut rng).unwrap();
        assert!(matches!(
            KeySwitchShare::from_shares(vec![share.clone(), share_dropped]),
            Err(crate::Error::IncompatibleShare(_))
        ));
    }

    #[test]
    fn allocate_is_the_additive_identity() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk0 = SecretKey::random(&par, &mut rng);
        let sk1 = SecretKey::random(&par, &mut rng);

        let values = random_values(par.slots(), &mut rng);
        let pt = Plaintext::try_encode(values.as_slice(), Encoding::simd(), &par).unwrap();
        let ct = sk0.try_encrypt(&pt, &mut rng).unwrap();

        let share = KeySwitchShare::new(&sk0, &sk1, SIGMA_SMUDGING, &ct, &mut rng).unwrap();
        let zero = KeySwitchShare::allocate(&par, ct.level()).unwrap();
        let agg =
            KeySwitchShare::from_shares(vec![zero, share.clone()]).unwrap();
        assert_eq!(agg, share);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = thread_rng();
        let par = CkksParameters::default_arc(2, 16);
        let sk0 = SecretKey::random(&par, &mut rng);
        let sk1 = SecretKey::random(&par, &mut rng);
        let pt = Plaintext::try_encode([1.0f64].as_slice(), Encoding::simd(), &par).unwrap();
        let ct = sk0.try_encrypt(&pt, &mut rng).unwrap();

        let share = KeySwitchShare::new(&sk0, &sk1, SIGMA_SMUDGING, &ct, &mut rng).unwrap();
        let bytes = share.to_bytes();
        assert_eq!(KeySwitchShare::deserialize(&bytes, &par).unwrap(), share);
    }
}
