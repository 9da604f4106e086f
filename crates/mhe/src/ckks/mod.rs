//! The CKKS approximate homomorphic encryption scheme in its RNS flavour.
//!
//! This module provides the scheme engine consumed by the multiparty
//! protocol layer in [`crate::mckks`]: parameters, canonical-embedding
//! encoding, encryption and decryption, and the homomorphic operations
//! (addition, multiplication with relinearization, rescaling, slot
//! rotations).

mod ciphertext;
mod encoder;
mod keys;
mod parameters;
mod plaintext;

pub use ciphertext::Ciphertext;
pub use encoder::{Complex, Encoding};
pub use keys::{GaloisKey, KeySwitchingKey, PublicKey, RelinearizationKey, RotationKeySet, SecretKey};
pub(crate) use keys::add_gadget_term;
pub use parameters::{CkksParameters, CkksParametersBuilder};
pub use plaintext::Plaintext;
