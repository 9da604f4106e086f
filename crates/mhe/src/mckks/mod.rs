//! Multiparty protocols for the CKKS encryption scheme.
//!
//! N parties, each holding a [`crate::ckks::SecretKey`] as its additive
//! share of a virtual collective secret `s = sum_i s_i`, jointly generate
//! key material and re-encrypt ciphertexts through four protocols:
//!
//! - [`PublicKeyShare`]: collective public-key generation (one round);
//! - [`RelinKeyGenerator`] / [`RelinKeyShare`]: collective relinearization
//!   key generation (two rounds);
//! - [`KeySwitchShare`]: collective key switching between two collective
//!   keys;
//! - [`RotationKeyShare`]: collective rotation-key generation, one run per
//!   Galois element.
//!
//! Every protocol follows the same shape: each party computes a share from
//! its private state and the round's public inputs (a [`CommonRandomPoly`]
//! or a previous round's aggregated share), and the shares are folded
//! together with the [`Aggregate`] trait. Aggregation is pointwise
//! polynomial addition: it is associative and commutative, so any fold
//! order produces the identical result.
//!
//! # Security preconditions
//!
//! The aggregation algebra cannot distinguish a partial aggregate from a
//! complete one, nor detect a reused ephemeral secret or a missing
//! smudging noise term. These are correctness obligations on the
//! orchestrator driving the rounds: every participating party's share must
//! be aggregated exactly once, RKG ephemeral secrets must be fresh per
//! protocol run, and the key-switch smudging deviation must be chosen
//! large enough to drown the secret-dependent terms it masks.

mod crp;
mod key_switch;
mod public_key_gen;
mod relin_key_gen;
mod rotation_key_gen;

pub use crp::CommonRandomPoly;
pub use key_switch::KeySwitchShare;
pub use public_key_gen::PublicKeyShare;
pub use relin_key_gen::{RelinKeyGenerator, RelinKeyShare, RkgRound};
pub use rotation_key_gen::RotationKeyShare;

use crate::Result;

/// A multiparty aggregation: combining shares into an output (either an
/// aggregated share of the same type, or the final key/ciphertext the
/// protocol produces).
pub trait Aggregate<A>: Sized {
    /// Aggregate the shares. Fails when no share is provided, or when the
    /// shares are mutually incompatible.
    fn from_shares<T>(iter: T) -> Result<Self>
    where
        T: IntoIterator<Item = A>;
}

/// Aggregate shares that are themselves the result of a fallible
/// computation.
impl<T, S> Aggregate<Result<T>> for S
where
    S: Aggregate<T>,
{
    fn from_shares<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        Self::from_shares(iter.into_iter().collect::<Result<Vec<T>>>()?)
    }
}

/// Convenience adapter to aggregate any iterator of shares.
pub trait AggregateIter: IntoIterator + Sized {
    /// Aggregate the items of this iterator.
    fn aggregate<S>(self) -> Result<S>
    where
        S: Aggregate<Self::Item>,
    {
        S::from_shares(self)
    }
}

impl<I: IntoIterator + Sized> AggregateIter for I {}

/// Verification-only test oracle.
///
/// Directly summing the parties' secret shares reconstructs the collective
/// secret key. An honest execution never materializes this value; it exists
/// only so that tests can decrypt ciphertexts produced under collective
/// keys. This type is compiled for tests only and is not reachable from any
/// production API.
#[cfg(test)]
pub(crate) mod test_oracle {
    use crate::ckks::{CkksParameters, Ciphertext, Plaintext, SecretKey};
    use crate::Result;
    use mhe_traits::{FheDecrypter, FheParametrized};
    use std::sync::Arc;

    /// The "ideal world" combined secret key of a set of parties.
    pub struct CombinedSecretKey {
        sk: SecretKey,
    }

    impl CombinedSecretKey {
        /// Sum the parties' secret-key shares.
        pub fn from_parties<'a, I>(parties: I, par: &Arc<CkksParameters>) -> Self
        where
            I: IntoIterator<Item = &'a SecretKey>,
        {
            let mut coeffs = vec![0i64; par.degree()];
            for sk in parties {
                for (c, s) in coeffs.iter_mut().zip(sk.coeffs.iter()) {
                    *c += *s;
                }
            }
            Self {
                sk: SecretKey::new(coeffs, par),
            }
        }
    }

    impl FheParametrized for CombinedSecretKey {
        type Parameters = CkksParameters;
    }

    impl FheDecrypter<Plaintext, Ciphertext> for CombinedSecretKey {
        type Error = crate::Error;

        fn try_decrypt(&self, ct: &Ciphertext) -> Result<Plaintext> {
            self.sk.try_decrypt(ct)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::ckks::Complex;
    use rand::Rng;

    pub fn random_values(slots: usize, rng: &mut impl Rng) -> Vec<Complex> {
        (0..slots)
            .map(|_| Complex::new(rng.gen_range(-10.0..10.0), rng.gen_range(-10.0..10.0)))
            .collect()
    }

    pub fn random_real_values(slots: usize, rng: &mut impl Rng) -> Vec<f64> {
        (0..slots).map(|_| rng.gen_range(-10.0..10.0)).collect()
    }

    pub fn assert_slots_eq(actual: &[Complex], expected: &[Complex], tolerance: f64) {
        assert_eq!(actual.len(), expected.len());
        for (a, b) in actual.iter().zip(expected.iter()) {
            assert!(
                (*a - *b).abs() < tolerance,
                "slot mismatch: {a:?} != {b:?} (tolerance {tolerance})"
            );
        }
    }
}
