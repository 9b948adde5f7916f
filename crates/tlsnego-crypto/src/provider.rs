//! Trait-based provider mechanism.
//!
//! `Digest` and `HashAlgorithm` are implemented in-crate and drive the key
//! schedules. `CryptoProvider` is the boundary to asymmetric cryptography:
//! the handshake core calls it for signatures, key agreement and randomness
//! but implements none of the underlying math.

use tlsnego_types::{CryptoError, NamedGroup, SignatureScheme};

/// A hash / message digest algorithm.
pub trait Digest: Send + Sync {
    /// The output size in bytes.
    fn output_size(&self) -> usize;

    /// The internal block size in bytes.
    fn block_size(&self) -> usize;

    /// Feed data into the hash state.
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize the hash and write the digest to `out`.
    /// The length of `out` must be at least `output_size()`.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// Reset the hash state to process a new message.
    fn reset(&mut self);
}

/// A convenience wrapper trait for creating digest instances.
pub trait HashAlgorithm: Send + Sync {
    /// Create a new digest context.
    fn new_digest(&self) -> Box<dyn Digest>;

    /// One-shot hash computation.
    fn hash(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = self.new_digest();
        ctx.update(data)?;
        let mut out = vec![0u8; ctx.output_size()];
        ctx.finish(&mut out)?;
        Ok(out)
    }
}

/// An ephemeral key pair produced by the provider for a key share.
pub struct KeyPair {
    /// Encoded private key, opaque to the handshake core.
    pub private_key: Vec<u8>,
    /// Encoded public key as carried in key_share / ClientKeyExchange.
    pub public_key: Vec<u8>,
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.private_key.zeroize();
    }
}

/// External asymmetric cryptography used during negotiation.
///
/// Keys are passed as opaque encodings; the provider owns their format.
pub trait CryptoProvider: Send + Sync {
    /// Sign `data` with `private_key` under `scheme`.
    fn sign(
        &self,
        data: &[u8],
        private_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Verify `signature` over `data` with `public_key` under `scheme`.
    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool, CryptoError>;

    /// Compute the (EC)DH shared secret for `group`.
    fn ecdh(
        &self,
        group: NamedGroup,
        peer_public: &[u8],
        own_private: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Generate an ephemeral key pair for `group`.
    fn generate_key_pair(&self, group: NamedGroup) -> Result<KeyPair, CryptoError>;

    /// RSAES-PKCS1-v1_5 encrypt `plaintext` to `public_key`.
    fn rsa_encrypt(&self, _public_key: &[u8], _plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::NotSupported)
    }

    /// RSAES-PKCS1-v1_5 decrypt `ciphertext` with `private_key`.
    fn rsa_decrypt(&self, _private_key: &[u8], _ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::NotSupported)
    }

    /// Generate a finite-field DH key pair over prime `p` with generator `g`.
    fn dh_generate_key_pair(&self, _p: &[u8], _g: &[u8]) -> Result<KeyPair, CryptoError> {
        Err(CryptoError::NotSupported)
    }

    /// Finite-field DH agreement modulo `p`, as a big-endian integer.
    fn dh_compute(
        &self,
        _p: &[u8],
        _peer_public: &[u8],
        _own_private: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Err(CryptoError::NotSupported)
    }

    /// Fill a fresh buffer of `len` random bytes.
    fn random(&self, len: usize) -> Result<Vec<u8>, CryptoError> {
        crate::rand::random_bytes(len)
    }
}
