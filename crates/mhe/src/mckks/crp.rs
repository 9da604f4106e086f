//! Common random polynomials.

use crate::ckks::CkksParameters;
use crate::{Error, Result};
use mhe_math::rq::{PolyQP, Representation, Seed};
use mhe_traits::Serialize;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A polynomial over the extended ring QP sampled from a common reference
/// string: all parties derive the same value, either from a shared RNG or
/// deterministically from a session seed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CommonRandomPoly {
    pub(crate) poly: PolyQP,
}

impl CommonRandomPoly {
    /// Generate a new random CRP.
    pub fn new<R: RngCore + CryptoRng>(par: &Arc<CkksParameters>, rng: &mut R) -> Result<Self> {
        Ok(Self {
            poly: PolyQP::random(
                par.ctx_at_level(0)?,
                par.ctx_p(),
                Representation::Ntt,
                rng,
            ),
        })
    }

    /// Generate a new CRP deterministically from a shared seed.
    pub fn new_deterministic(par: &Arc<CkksParameters>, seed: Seed) -> Result<Self> {
        Ok(Self {
            poly: PolyQP::random_from_seed(
                par.ctx_at_level(0)?,
                par.ctx_p(),
                Representation::Ntt,
                seed,
            ),
        })
    }

    /// Generate a new random CRP vector of length beta, as required by the
    /// relinearization and rotation key generation protocols.
    pub fn new_vec<R: RngCore + CryptoRng>(
        par: &Arc<CkksParameters>,
        rng: &mut R,
    ) -> Result<Vec<Self>> {
        (0..par.beta()).map(|_| Self::new(par, rng)).collect()
    }

    /// Generate a CRP vector of length beta deterministically from a shared
    /// session seed, domain-separating each entry.
    pub fn new_vec_deterministic(par: &Arc<CkksParameters>, seed: Seed) -> Result<Vec<Self>> {
        (0..par.beta())
            .map(|i| {
                let mut hasher = Sha256::new();
                hasher.update(seed);
                hasher.update((i as u64).to_le_bytes());
                let derived: Seed = hasher.finalize().into();
                Self::new_deterministic(par, derived)
            })
            .collect()
    }

    /// Deserialize a CRP from bytes.
    pub fn deserialize(bytes: &[u8], par: &Arc<CkksParameters>) -> Result<Self> {
        let poly = PolyQP::from_bytes(bytes, par.ctx_at_level(0)?, par.ctx_p())
            .map_err(Error::MathError)?;
        Ok(Self { poly })
    }
}

impl Serialize for CommonRandomPoly {
    fn to_bytes(&self) -> Vec<u8> {
        self.poly.to_bytes()
    }
}
