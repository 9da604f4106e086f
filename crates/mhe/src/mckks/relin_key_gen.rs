//! Collective relinearization-key generation (RKG).
//!
//! The relinearization target `s^2` is quadratic in the collective secret,
//! so it cannot be shared additively in one round: the protocol runs two
//! rounds, blinding the first with a fresh ephemeral secret `u_i` that each
//! party holds across both rounds and discards afterwards.
//!
//! With common random polynomials `a_j` (one per gadget digit) and the
//! gadget `g_j` scaled by the special modulus `P`:
//!
//! - Round 1: party i publishes, per digit,
//!   `h0 = -u_i a_j + P s_i g_j + e` and `h1 = s_i a_j + e`.
//! - Round 2: from the aggregated round-1 share `(h0_j, h1_j)`, party i
//!   publishes `h0' = s_i h0_j + e` and `h1' = (u_i - s_i) h1_j + e`.
//! - The aggregated round-2 share assembles into the key pairs
//!   `(h0'_j + h1'_j, h1_j)`, which satisfy `b_j + s a_j' = P s^2 g_j + e`
//!   without any party ever learning `s^2` or another party's ephemeral
//!   secret.

use crate::ckks::add_gadget_term;
use crate::ckks::{CkksParameters, KeySwitchingKey, RelinearizationKey, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{PolyQP, Representation};
use mhe_traits::Serialize;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use zeroize::Zeroizing;

use super::{Aggregate, CommonRandomPoly};

/// The round a relinearization-key share belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RkgRound {
    /// The first round, blinded by the ephemeral secrets.
    One,
    /// The second round, computed from the aggregated first round.
    Two,
}

/// A party's state in the relinearization-key generation protocol.
///
/// The generator holds the party's ephemeral secret for the lifetime of one
/// protocol run; it must not be reused across runs.
pub struct RelinKeyGenerator<'a> {
    sk_share: &'a SecretKey,
    eph_sk: SecretKey,
    crps: Vec<CommonRandomPoly>,
}

/// A party's (or an aggregated) share in the relinearization-key generation
/// protocol: one pair of QP polynomials per gadget digit, tagged with the
/// round it belongs to.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RelinKeyShare {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) round: RkgRound,
    pub(crate) h0: Vec<PolyQP>,
    pub(crate) h1: Vec<PolyQP>,
}

impl<'a> RelinKeyGenerator<'a> {
    /// Prepare a party for one run of the protocol, sampling the ephemeral
    /// secret held across both rounds.
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &'a SecretKey,
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
        let eph_sk = SecretKey::random(&par, rng);
        Ok(Self {
            sk_share,
            eph_sk,
            crps: crps.to_vec(),
        })
    }

    /// Compute this party's round-1 share.
    pub fn round_one<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<RelinKeyShare> {
        let par = self.sk_share.par.clone();
        let ctx_q = par.ctx_at_level(0)?;
        let ctx_p = par.ctx_p();

        let s = Zeroizing::new(self.sk_share.poly_qp()?);
        let u = Zeroizing::new(self.eph_sk.poly_qp()?);

        let mut h0 = Vec::with_capacity(par.beta());
        let mut h1 = Vec::with_capacity(par.beta());
        for (j, crp) in self.crps.iter().enumerate() {
            // h0 = -u_i a_j + P s_i g_j + e
            let mut h0_j = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
                .map_err(Error::MathError)?;
            add_gadget_term(&par, &mut h0_j, &s.q, j);
            h0_j -= &(u.as_ref() * &crp.poly);
            h0.push(h0_j);

            // h1 = s_i a_j + e
            let mut h1_j = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
                .map_err(Error::MathError)?;
            h1_j += &(s.as_ref() * &crp.poly);
            h1.push(h1_j);
        }

        Ok(RelinKeyShare {
            par,
            round: RkgRound::One,
            h0,
            h1,
        })
    }

    /// Compute this party's round-2 share from the aggregated round-1
    /// share.
    pub fn round_two<R: RngCore + CryptoRng>(
        &self,
        round1: &RelinKeyShare,
        rng: &mut R,
    ) -> Result<RelinKeyShare> {
        let par = self.sk_share.par.clone();
        if round1.round != RkgRound::One {
            return Err(Error::IncompatibleShare(
                "Round 2 requires an aggregated round-1 share".to_string(),
            ));
        }
        if round1.par != par {
            return Err(Error::IncompatibleShare(
                "Mismatched parameters".to_string(),
            ));
        }
        let ctx_q = par.ctx_at_level(0)?;
        let ctx_p = par.ctx_p();

        let s = Zeroizing::new(self.sk_share.poly_qp()?);
        let u = Zeroizing::new(self.eph_sk.poly_qp()?);
        // u_i - s_i
        let d = Zeroizing::new(u.as_ref() - s.as_ref());

        let mut h0 = Vec::with_capacity(par.beta());
        let mut h1 = Vec::with_capacity(par.beta());
        for j in 0..par.beta() {
            // h0' = s_i h0_j + e
            let mut h0_j = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
                .map_err(Error::MathError)?;
            h0_j += &(s.as_ref() * &round1.h0[j]);
            h0.push(h0_j);

            // h1' = (u_i - s_i) h1_j + e
            let mut h1_j = PolyQP::small(ctx_q, ctx_p, par.variance, Representation::Ntt, rng)
                .map_err(Error::MathError)?;
            h1_j += &(d.as_ref() * &round1.h1[j]);
            h1.push(h1_j);
        }

        Ok(RelinKeyShare {
            par,
            round: RkgRound::Two,
            h0,
            h1,
        })
    }
}

impl RelinKeyShare {
    /// Assemble the collective relinearization key from the aggregated
    /// round-1 and round-2 shares.
    pub fn assemble(round1: &RelinKeyShare, round2: &RelinKeyShare) -> Result<RelinearizationKey> {
        if round1.round != RkgRound::One || round2.round != RkgRound::Two {
            return Err(Error::IncompatibleShare(
                "Assembly requires one round-1 and one round-2 aggregate".to_string(),
            ));
        }
        if round1.par != round2.par {
            return Err(Error::IncompatibleShare(
                "Mismatched parameters".to_string(),
            ));
        }

        let keys = round1
            .h1
            .iter()
            .zip(round2.h0.iter().zip(round2.h1.iter()))
            .map(|(a, (b0, b1))| (b0 + b1, a.clone()))
            .collect();
        Ok(RelinearizationKey::from_key_switching_key(
            KeySwitchingKey::from_key_polys(keys, &round1.par)?,
        ))
    }
}

impl Aggregate<RelinKeyShare> for RelinKeyShare {
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = RelinKeyShare>,
    {
        let mut shares = iter.into_iter();
        let mut agg = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        for sh in shares {
            if sh.par != agg.par || sh.round != agg.round {
                return Err(Error::IncompatibleShare(
                    "Mismatched parameters or round".to_string(),
                ));
            }
            for (a, b) in agg.h0.iter_mut().zip(sh.h0.iter()) {
                *a += b;
            }
            for (a, b) in agg.h1.iter_mut().zip(sh.h1.iter()) {
                *a += b;
            }
        }
        Ok(agg)
    }
}

impl Serialize for RelinKeyShare {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![match self.round {
            RkgRound::One => 1u8,
            RkgRound::Two => 2,
        }];
        for h in self.h0.iter().chain(self.h1.iter()) {
            let b = h.to_bytes();
            bytes.extend_from_slice(&(b.len() as u64).to_le_bytes());
            bytes.extend_from_slice(&b);
        }
        bytes
    }
}

impl RelinKeyShare {
    /// Deserialize a share from bytes, within the given parameters.
    pub fn deserialize(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::SerializationError);
        }
        let round = match bytes[0] {
            1 => RkgRound::One,
            2 => RkgRound::Two,
            _ => return Err(Error::SerializationError),
        };

        let mut polys = Vec::with_capacity(2 * par.beta());
        let mut offset = 1;
        for _ in 0..2 * par.beta() {
            if offset + 8 > bytes.len() {
                return Err(Error::SerializationError);
            }
            let len = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap()) as usize;
            offset += 8;
            if offset + len > bytes.len() {
                return Err(Error::SerializationError);
            }
            polys.push(
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

        let h1 = polys.split_off(par.beta());
        Ok(Self {
            par: par.clone(),
            round,
            h0: polys,
            h1,
        })
    }
}
