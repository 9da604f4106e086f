#![crate_name = "mhe_traits"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Traits shared by the crates of the `mhe` multiparty homomorphic
//! encryption library.

use rand::{CryptoRng, RngCore};
use std::sync::Arc;

/// Marker trait for the parameters of a homomorphic encryption scheme.
pub trait FheParameters {}

/// Indicates that an object is parametrized by scheme parameters.
pub trait FheParametrized {
    /// The type of the scheme parameters.
    type Parameters: FheParameters;
}

/// Encode values into plaintexts.
pub trait FheEncoder<V>: FheParametrized + Sized {
    /// The error type returned when encoding fails.
    type Error;

    /// The encoding configuration (e.g. target level and scale).
    type Encoding;

    /// Attempt to encode `value` with the specified encoding.
    fn try_encode(
        value: V,
        encoding: Self::Encoding,
        par: &Arc<Self::Parameters>,
    ) -> Result<Self, Self::Error>;
}

/// Decode plaintexts into values.
pub trait FheDecoder<P>: Sized {
    /// The error type returned when decoding fails.
    type Error;

    /// Attempt to decode the plaintext `pt`.
    fn try_decode(pt: &P) -> Result<Self, Self::Error>;
}

/// Encrypt a plaintext into a ciphertext.
pub trait FheEncrypter<P, C>: FheParametrized {
    /// The error type returned when encryption fails.
    type Error;

    /// Attempt to encrypt the plaintext `pt`.
    fn try_encrypt<R: RngCore + CryptoRng>(
        &self,
        pt: &P,
        rng: &mut R,
    ) -> Result<C, Self::Error>;
}

/// Decrypt a ciphertext into a plaintext.
pub trait FheDecrypter<P, C>: FheParametrized {
    /// The error type returned when decryption fails.
    type Error;

    /// Attempt to decrypt the ciphertext `ct`.
    fn try_decrypt(&self, ct: &C) -> Result<P, Self::Error>;
}

/// Serialize an object into a vector of bytes.
pub trait Serialize {
    /// Serialize `self` into a vector of bytes.
    fn to_bytes(&self) -> Vec<u8>;
}

/// Deserialize an object from a slice of bytes.
pub trait Deserialize: Sized {
    /// The error type returned when deserialization fails.
    type Error;

    /// Attempt to deserialize from a slice of bytes.
    fn try_deserialize(bytes: &[u8]) -> Result<Self, Self::Error>;
}

/// Deserialize an object which requires scheme parameters.
pub trait DeserializeParametrized: FheParametrized + Sized {
    /// The error type returned when deserialization fails.
    type Error;

    /// Attempt to deserialize from a slice of bytes, within the given
    /// parameters.
    fn from_bytes(bytes: &[u8], par: &Arc<Self::Parameters>) -> Result<Self, Self::Error>;
}

/// Deserialize an object which requires a context (e.g. a polynomial ring).
pub trait DeserializeWithContext: Sized {
    /// The error type returned when deserialization fails.
    type Error;

    /// The context type.
    type Context;

    /// Attempt to deserialize from a slice of bytes, within the given
    /// context.
    fn from_bytes(bytes: &[u8], ctx: &Arc<Self::Context>) -> Result<Self, Self::Error>;
}
