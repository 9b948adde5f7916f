#![forbid(unsafe_code)]
#![doc = "Hash primitives and external crypto-provider interfaces for tlsnego."]

// Core traits
pub mod provider;

// Hash algorithms
#[cfg(feature = "sha2")]
pub mod sha2;

pub mod hash;
pub mod rand;
