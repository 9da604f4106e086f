//! Relinearization keys for the CKKS encryption scheme.

use crate::ckks::{Ciphertext, KeySwitchingKey, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::Representation;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

/// A relinearization key: a key-switching key from `s^2` to `s`, used to
/// bring a degree-2 ciphertext produced by a multiplication back to
/// degree 1.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RelinearizationKey {
    pub(crate) ksk: KeySwitchingKey,
}

impl RelinearizationKey {
    /// Generate a [`RelinearizationKey`] from a [`SecretKey`].
    pub fn new<R: RngCore + CryptoRng>(sk: &SecretKey, rng: &mut R) -> Result<Self> {
        let s = Zeroizing::new(sk.poly_at_level(0)?);
        let s2 = Zeroizing::new(s.as_ref() * s.as_ref());
        Ok(Self {
            ksk: KeySwitchingKey::new(sk, s2.as_ref(), rng)?,
        })
    }

    /// Assemble a relinearization key from an existing key-switching key
    /// (the collective generation path).
    pub(crate) fn from_key_switching_key(ksk: KeySwitchingKey) -> Self {
        Self { ksk }
    }

    /// Relinearize a degree-2 ciphertext `(c_0, c_1, c_2)` in place into a
    /// degree-1 ciphertext.
    pub fn relinearizes(&self, ct: &mut Ciphertext) -> Result<()> {
        if ct.c.len() != 3 {
            return Err(Error::DefaultError(
                "Only ciphertexts with 3 parts can be relinearized".to_string(),
            ));
        }
        if ct.par != self.ksk.par {
            return Err(Error::DefaultError(
                "Incompatible CKKS parameters".to_string(),
            ));
        }

        let mut c2 = ct.c[2].clone();
        c2.change_representation(Representation::PowerBasis);
        let (d0, d1) = self.ksk.key_switch(&c2)?;

        ct.c[0] += &d0;
        ct.c[1] += &d1;
        ct.c.truncate(2);
        Ok(())
    }
}
