//! Keys for the CKKS encryption scheme.

mod galois_key;
mod key_switching_key;
mod public_key;
mod relinearization_key;
mod secret_key;

pub use galois_key::{GaloisKey, RotationKeySet};
pub use key_switching_key::KeySwitchingKey;
pub(crate) use key_switching_key::add_gadget_term;
pub use public_key::PublicKey;
pub use relinearization_key::RelinearizationKey;
pub use secret_key::SecretKey;
