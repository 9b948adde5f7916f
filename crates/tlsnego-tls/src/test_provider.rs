//! Deterministic stand-in for the asymmetric crypto provider, for tests.
//!
//! Key agreement: public = SHA-256(private), shared = SHA-256(min(pub) ||
//! max(pub)). Finite-field DH is the same construction, with a leading
//! zero byte on the shared value. Signatures: the "private" and "public"
//! key are the same bytes and a signature is SHA-256(key || scheme ||
//! data). RSA encryption XORs with a SHA-256 keystream of the key and
//! prefixes a 4-byte check value.

use tlsnego_crypto::provider::{CryptoProvider, KeyPair};
use tlsnego_types::{CryptoError, HashAlgId, NamedGroup, SignatureScheme};

pub(crate) struct MockProvider;

fn sha256(parts: &[&[u8]]) -> Vec<u8> {
    crate::crypt::hmac::digest(HashAlgId::Sha256, parts).unwrap()
}

fn keystream_xor(key: &[u8], data: &[u8]) -> Vec<u8> {
    data.chunks(32)
        .enumerate()
        .flat_map(|(i, chunk)| {
            let block = sha256(&[key, &(i as u32).to_be_bytes()]);
            chunk.iter().zip(block).map(|(a, b)| a ^ b).collect::<Vec<_>>()
        })
        .collect()
}

fn agree(own_private: &[u8], peer_public: &[u8]) -> Vec<u8> {
    let own_public = sha256(&[own_private]);
    let (lo, hi) = if own_public.as_slice() <= peer_public {
        (own_public.as_slice(), peer_public)
    } else {
        (peer_public, own_public.as_slice())
    };
    sha256(&[lo, hi])
}

impl CryptoProvider for MockProvider {
    fn sign(
        &self,
        data: &[u8],
        private_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(sha256(&[private_key, &scheme.0.to_be_bytes(), data]))
    }

    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool, CryptoError> {
        Ok(sha256(&[public_key, &scheme.0.to_be_bytes(), data]) == signature)
    }

    fn ecdh(
        &self,
        group: NamedGroup,
        peer_public: &[u8],
        own_private: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if group != NamedGroup::X25519 && group != NamedGroup::SECP256R1 {
            return Err(CryptoError::NotSupported);
        }
        Ok(agree(own_private, peer_public))
    }

    fn rsa_encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = sha256(&[public_key, plaintext])[..4].to_vec();
        out.extend(keystream_xor(public_key, plaintext));
        Ok(out)
    }

    fn rsa_decrypt(&self, private_key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < 4 {
            return Err(CryptoError::InvalidArg);
        }
        let plaintext = keystream_xor(private_key, &ciphertext[4..]);
        if sha256(&[private_key, &plaintext])[..4] != ciphertext[..4] {
            return Err(CryptoError::ProviderFailed("decryption error".into()));
        }
        Ok(plaintext)
    }

    fn dh_generate_key_pair(&self, p: &[u8], g: &[u8]) -> Result<KeyPair, CryptoError> {
        if p.is_empty() || g.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        let private_key = self.random(32)?;
        let public_key = sha256(&[&private_key]);
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    fn dh_compute(
        &self,
        p: &[u8],
        peer_public: &[u8],
        own_private: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if p.is_empty() {
            return Err(CryptoError::InvalidArg);
        }
        let mut shared = vec![0u8];
        shared.extend(agree(own_private, peer_public));
        Ok(shared)
    }

    fn generate_key_pair(&self, group: NamedGroup) -> Result<KeyPair, CryptoError> {
        if group != NamedGroup::X25519 && group != NamedGroup::SECP256R1 {
            return Err(CryptoError::NotSupported);
        }
        let private_key = self.random(32)?;
        let public_key = sha256(&[&private_key]);
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }
}
