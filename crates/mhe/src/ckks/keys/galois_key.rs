//! Galois (rotation) keys for the CKKS encryption scheme.

use crate::ckks::{CkksParameters, Ciphertext, KeySwitchingKey, SecretKey};
use crate::{Error, Result};
use mhe_math::rq::{PolyQP, Representation, SubstitutionExponent};
use rand::{CryptoRng, RngCore};
use std::collections::HashMap;
use std::sync::Arc;
use zeroize::Zeroizing;

/// A Galois key: a key-switching key from the automorphism image of the
/// secret back to the secret, enabling the homomorphic evaluation of one
/// slot rotation or of the conjugation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GaloisKey {
    pub(crate) par: Arc<CkksParameters>,
    pub(crate) galois_element: u64,
    pub(crate) exponent: SubstitutionExponent,
    pub(crate) ksk: KeySwitchingKey,
}

impl GaloisKey {
    /// Generate a [`GaloisKey`] for a Galois element from a [`SecretKey`].
    pub fn new<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        galois_element: u64,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk.par.clone();
        let exponent = SubstitutionExponent::new(par.degree(), galois_element as usize)
            .map_err(Error::MathError)?;

        let s = Zeroizing::new(sk.poly_at_level(0)?);
        let w = Zeroizing::new(s.substitute(&exponent).map_err(Error::MathError)?);
        let ksk = KeySwitchingKey::new(sk, w.as_ref(), rng)?;

        Ok(Self {
            par,
            galois_element,
            exponent,
            ksk,
        })
    }

    /// Assemble a Galois key from already-computed key pairs over QP (the
    /// collective generation path).
    pub(crate) fn from_key_polys(
        keys: Vec<(PolyQP, PolyQP)>,
        galois_element: u64,
        par: &Arc<CkksParameters>,
    ) -> Result<Self> {
        let exponent = SubstitutionExponent::new(par.degree(), galois_element as usize)
            .map_err(Error::MathError)?;
        Ok(Self {
            par: par.clone(),
            galois_element,
            exponent,
            ksk: KeySwitchingKey::from_key_polys(keys, par)?,
        })
    }

    /// Returns the Galois element of this key.
    pub const fn galois_element(&self) -> u64 {
        self.galois_element
    }

    /// Apply the automorphism to a degree-1 ciphertext and switch it back to
    /// the original secret key.
    pub fn rotates(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        if ct.c.len() != 2 {
            return Err(Error::TooManyValues(ct.c.len(), 2));
        }
        if ct.par != self.par {
            return Err(Error::DefaultError(
                "Incompatible CKKS parameters".to_string(),
            ));
        }

        let c0s = ct.c[0].substitute(&self.exponent).map_err(Error::MathError)?;
        let mut c1s = ct.c[1].substitute(&self.exponent).map_err(Error::MathError)?;
        c1s.change_representation(Representation::PowerBasis);

        let (d0, d1) = self.ksk.key_switch(&c1s)?;
        Ciphertext::new(vec![&c0s + &d0, d1], ct.scale, &self.par)
    }
}

/// A set of Galois keys indexed by their Galois element.
///
/// Looking up an element the set was never generated for fails with
/// [`Error::MissingGaloisKey`]; looking up a generated element always
/// returns the same key object.
#[derive(Debug, Clone)]
pub struct RotationKeySet {
    par: Arc<CkksParameters>,
    keys: HashMap<u64, GaloisKey>,
}

impl RotationKeySet {
    /// Creates an empty set.
    pub fn new(par: &Arc<CkksParameters>) -> Self {
        Self {
            par: par.clone(),
            keys: HashMap::new(),
        }
    }

    /// Generate a set for the given Galois elements from a single secret
    /// key.
    pub fn generate<R: RngCore + CryptoRng>(
        sk: &SecretKey,
        galois_elements: &[u64],
        rng: &mut R,
    ) -> Result<Self> {
        let mut set = Self::new(&sk.par);
        for g in galois_elements {
            set.insert(GaloisKey::new(sk, *g, rng)?)?;
        }
        Ok(set)
    }

    /// Insert a key into the set.
    pub fn insert(&mut self, key: GaloisKey) -> Result<()> {
        if key.par != self.par {
            return Err(Error::DefaultError(
                "Incompatible CKKS parameters".to_string(),
            ));
        }
        self.keys.insert(key.galois_element, key);
        Ok(())
    }

    /// Returns the switching key for a Galois element.
    pub fn get_switching_key(&self, galois_element: u64) -> Result<&GaloisKey> {
        self.keys
            .get(&galois_element)
            .ok_or(Error::MissingGaloisKey(galois_element))
    }

    /// Returns the Galois elements this set holds keys for.
    pub fn galois_elements(&self) -> Vec<u64> {
        self.keys.keys().copied().collect()
    }
}
