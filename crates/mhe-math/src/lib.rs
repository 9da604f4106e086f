#![crate_name = "mhe_math"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Mathematical utilities for the `mhe` multiparty homomorphic encryption
//! library: modular arithmetic, number-theoretic transforms, residue number
//! systems, and polynomial rings in RNS representation over one or two
//! moduli bases.

use thiserror::Error;

pub mod ntt;
pub mod rns;
pub mod rq;
pub mod zq;

/// The errors that can occur in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The provided context does not match, or is not a descendant of, the
    /// expected one.
    #[error("Invalid context provided")]
    InvalidContext,

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other error.
    #[error("{0}")]
    Default(String),
}

impl From<mhe_util::Error> for Error {
    fn from(e: mhe_util::Error) -> Self {
        Error::Default(e.to_string())
    }
}

/// The result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;
