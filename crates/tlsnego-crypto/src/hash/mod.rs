//! Unified hash module.
//!
//! Re-exports the supported digests and maps [`HashAlgId`] to fresh
//! [`Digest`] instances, the form the key schedules consume.

pub use crate::provider::{Digest, HashAlgorithm};

#[cfg(feature = "sha2")]
pub use crate::sha2::{Sha256, Sha384};

use tlsnego_types::HashAlgId;

/// Create a fresh digest context for `alg`.
#[cfg(feature = "sha2")]
pub fn new_digest(alg: HashAlgId) -> Box<dyn Digest> {
    match alg {
        HashAlgId::Sha256 => Box::new(Sha256::new()),
        HashAlgId::Sha384 => Box::new(Sha384::new()),
    }
}

#[cfg(feature = "sha2")]
impl HashAlgorithm for HashAlgId {
    fn new_digest(&self) -> Box<dyn Digest> {
        new_digest(*self)
    }
}
