#![crate_name = "mhe"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Multiparty (threshold) CKKS homomorphic encryption in Rust.
//!
//! This library implements the CKKS approximate homomorphic encryption
//! scheme in its RNS flavour ([`ckks`]), together with a multiparty
//! protocol layer ([`mckks`]) in which N parties holding additive shares of
//! a virtual collective secret key jointly generate public and evaluation
//! key material, and re-encrypt ciphertexts between collective keys,
//! without any party (or coalition of fewer than N parties) ever learning
//! the combined secret.

pub mod ckks;
pub mod mckks;

use thiserror::Error as ThisError;

/// Errors reported when building scheme parameters.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParametersError {
    /// The degree is invalid: it should be a power of two of at least 8.
    #[error("Invalid degree: {0}")]
    InvalidDegree(usize),

    /// A modulus size is out of the supported range.
    #[error("Invalid modulus size {0}: should be between {1} and {2}")]
    InvalidModulusSize(usize, usize, usize),

    /// Not enough NTT-friendly primes of the requested size exist.
    #[error("Not enough primes of size {0} for degree {1}")]
    NotEnoughPrimes(usize, usize),

    /// Too many of mutually exclusive options were specified.
    #[error("{0}")]
    TooManySpecified(String),

    /// Too few of the required options were specified.
    #[error("{0}")]
    TooFewSpecified(String),

    /// The scale is invalid.
    #[error("Invalid scale: {0}")]
    InvalidScale(String),
}

/// The errors that can occur in this crate.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// An error from the mathematical layer.
    #[error("{0}")]
    MathError(#[from] mhe_math::Error),

    /// An error when building parameters.
    #[error("{0}")]
    ParametersError(#[from] ParametersError),

    /// An error during serialization or deserialization.
    #[error("Serialization error")]
    SerializationError,

    /// Too few values were provided.
    #[error("Too few values: {0} is below the minimum of {1}")]
    TooFewValues(usize, usize),

    /// Too many values were provided.
    #[error("Too many values: {0} exceeds the maximum of {1}")]
    TooManyValues(usize, usize),

    /// A share does not match the ring context, level, round, or protocol
    /// instance of the operation it is used with.
    #[error("Incompatible share: {0}")]
    IncompatibleShare(String),

    /// No switching key was generated for the requested Galois element.
    #[error("No switching key for Galois element {0}")]
    MissingGaloisKey(u64),

    /// Any other error.
    #[error("Unexpected error: {0}")]
    DefaultError(String),
}

/// The result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
doc_comment::doctest!("../../../README.md");
