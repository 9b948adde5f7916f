//! Key schedule and transcript machinery.
//!
//! Everything here is a pure function of its inputs: no global state,
//! no caches. Hash selection happens once, when a cipher suite is mapped
//! to its parameters; an unsupported suite fails at that point.

pub mod hkdf;
pub mod hmac;
pub mod key_schedule;
pub mod key_schedule12;
pub mod keylog;
pub mod prf;
pub mod traffic_keys;
pub mod transcript;

use crate::CipherSuite;
use subtle::ConstantTimeEq;
use tlsnego_types::{HashAlgId, TlsError};

pub use tlsnego_types::{NamedGroup, SignatureScheme};

/// Parameters associated with a TLS 1.3 cipher suite.
#[derive(Debug, Clone)]
pub struct CipherSuiteParams {
    /// The cipher suite identifier.
    pub suite: CipherSuite,
    /// Hash output size in bytes (32 for SHA-256, 48 for SHA-384).
    pub hash_len: usize,
    /// AEAD key length in bytes.
    pub key_len: usize,
    /// AEAD IV/nonce length in bytes (always 12 for TLS 1.3).
    pub iv_len: usize,
    /// AEAD tag length in bytes (always 16).
    pub tag_len: usize,
}

impl CipherSuiteParams {
    /// Look up parameters for a TLS 1.3 cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Result<Self, TlsError> {
        let (hash_len, key_len) = match suite {
            CipherSuite::TLS_AES_128_GCM_SHA256 => (32, 16),
            CipherSuite::TLS_AES_256_GCM_SHA384 => (48, 32),
            CipherSuite::TLS_CHACHA20_POLY1305_SHA256 => (32, 32),
            _ => return Err(unsupported_suite(suite)),
        };
        Ok(Self {
            suite,
            hash_len,
            key_len,
            iv_len: 12,
            tag_len: 16,
        })
    }

    /// Hash algorithm driving HKDF and the transcript for this suite.
    pub fn hash_alg(&self) -> HashAlgId {
        hash_alg_for_len(self.hash_len)
    }
}

/// TLS 1.2 authentication algorithm carried by the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlg {
    Rsa,
    Ecdsa,
    /// The pre-shared key authenticates both sides; no certificate.
    Psk,
}

/// TLS 1.2 key exchange carried by the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeAlg {
    Ecdhe,
    Dhe,
    /// Premaster encrypted to the server's RSA key.
    Rsa,
    Psk,
}

impl KeyExchangeAlg {
    /// Whether the server must send a signed ServerKeyExchange.
    pub fn requires_server_key_exchange(self) -> bool {
        matches!(self, KeyExchangeAlg::Ecdhe | KeyExchangeAlg::Dhe)
    }

    /// Whether the server sends a Certificate.
    pub fn uses_certificate(self) -> bool {
        self != KeyExchangeAlg::Psk
    }
}

/// Parameters associated with a TLS 1.2 AEAD cipher suite.
#[derive(Debug, Clone)]
pub struct Tls12CipherSuiteParams {
    /// The cipher suite identifier.
    pub suite: CipherSuite,
    /// How the premaster secret is established.
    pub kx_alg: KeyExchangeAlg,
    /// Authentication algorithm of the server certificate.
    pub auth_alg: AuthAlg,
    /// PRF hash output size in bytes (32 for SHA-256, 48 for SHA-384).
    pub hash_len: usize,
    /// MAC key length in bytes (0 for AEAD suites).
    pub mac_key_len: usize,
    /// Encryption key length in bytes (16 or 32).
    pub key_len: usize,
    /// Fixed IV length from the key block (4 for GCM, 12 for ChaCha20).
    pub fixed_iv_len: usize,
    /// Explicit nonce length sent with each record (8 for GCM, 0 for ChaCha20).
    pub record_iv_len: usize,
    /// AEAD tag length in bytes.
    pub tag_len: usize,
}

impl Tls12CipherSuiteParams {
    /// Look up parameters for a TLS 1.2 cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Result<Self, TlsError> {
        use KeyExchangeAlg as Kx;
        let (kx_alg, auth_alg, hash_len, key_len, fixed_iv_len, record_iv_len) = match suite {
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => {
                (Kx::Ecdhe, AuthAlg::Rsa, 32, 16, 4, 8)
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => {
                (Kx::Ecdhe, AuthAlg::Rsa, 48, 32, 4, 8)
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => {
                (Kx::Ecdhe, AuthAlg::Ecdsa, 32, 16, 4, 8)
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => {
                (Kx::Ecdhe, AuthAlg::Ecdsa, 48, 32, 4, 8)
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
                (Kx::Ecdhe, AuthAlg::Rsa, 32, 32, 12, 0)
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 => {
                (Kx::Ecdhe, AuthAlg::Ecdsa, 32, 32, 12, 0)
            }
            CipherSuite::TLS_DHE_RSA_WITH_AES_128_GCM_SHA256 => {
                (Kx::Dhe, AuthAlg::Rsa, 32, 16, 4, 8)
            }
            CipherSuite::TLS_DHE_RSA_WITH_AES_256_GCM_SHA384 => {
                (Kx::Dhe, AuthAlg::Rsa, 48, 32, 4, 8)
            }
            CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256 => (Kx::Rsa, AuthAlg::Rsa, 32, 16, 4, 8),
            CipherSuite::TLS_RSA_WITH_AES_256_GCM_SHA384 => (Kx::Rsa, AuthAlg::Rsa, 48, 32, 4, 8),
            CipherSuite::TLS_PSK_WITH_AES_128_GCM_SHA256 => (Kx::Psk, AuthAlg::Psk, 32, 16, 4, 8),
            CipherSuite::TLS_PSK_WITH_AES_256_GCM_SHA384 => (Kx::Psk, AuthAlg::Psk, 48, 32, 4, 8),
            _ => return Err(unsupported_suite(suite)),
        };
        Ok(Self {
            suite,
            kx_alg,
            auth_alg,
            hash_len,
            mac_key_len: 0,
            key_len,
            fixed_iv_len,
            record_iv_len,
            tag_len: 16,
        })
    }

    /// PRF hash algorithm for this suite.
    pub fn hash_alg(&self) -> HashAlgId {
        hash_alg_for_len(self.hash_len)
    }

    /// Total key material needed from the key block:
    /// 2*mac_key + 2*enc_key + 2*fixed_iv.
    pub fn key_block_len(&self) -> usize {
        2 * self.mac_key_len + 2 * self.key_len + 2 * self.fixed_iv_len
    }
}

/// Returns true if the cipher suite is a TLS 1.2 suite.
pub fn is_tls12_suite(suite: CipherSuite) -> bool {
    Tls12CipherSuiteParams::from_suite(suite).is_ok()
}

/// Returns true if the cipher suite is a TLS 1.3 suite.
pub fn is_tls13_suite(suite: CipherSuite) -> bool {
    CipherSuiteParams::from_suite(suite).is_ok()
}

/// Compare received Finished verify_data against the expected value in
/// constant time.
pub fn verify_finished(expected: &[u8], received: &[u8]) -> Result<(), TlsError> {
    if expected.len() != received.len() || !bool::from(expected.ct_eq(received)) {
        return Err(TlsError::ValidationFailure(
            "Finished verify_data mismatch".into(),
        ));
    }
    Ok(())
}

fn hash_alg_for_len(hash_len: usize) -> HashAlgId {
    match hash_len {
        48 => HashAlgId::Sha384,
        _ => HashAlgId::Sha256,
    }
}

fn unsupported_suite(suite: CipherSuite) -> TlsError {
    TlsError::DerivationError(format!("unsupported cipher suite 0x{:04x}", suite.0))
}
