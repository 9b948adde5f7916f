//! Key exchange through the crypto provider.
//!
//! TLS 1.3 always uses key_share groups. A TLS 1.2 suite picks one of
//! ECDHE, finite-field DHE, static RSA or plain PSK; the premaster secret
//! for each is produced here and handed to the TLS 1.2 key schedule.

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroizing;

use super::codec::MAX_VEC16_LEN;
use crate::crypt::{is_tls13_suite, KeyExchangeAlg, Tls12CipherSuiteParams};
use crate::{CipherSuite, TlsVersion};
use tlsnego_crypto::provider::{CryptoProvider, KeyPair};
use tlsnego_types::{NamedGroup, TlsError};

/// How the shared secret is agreed for a negotiated suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeMethod {
    /// TLS 1.3 key_share (EC)DHE.
    KeyShare,
    Tls12(KeyExchangeAlg),
}

/// Pick the key exchange for `suite` under `version`.
pub fn select_key_exchange(
    suite: CipherSuite,
    version: TlsVersion,
) -> Result<KeyExchangeMethod, TlsError> {
    match version {
        TlsVersion::Tls13 if is_tls13_suite(suite) => Ok(KeyExchangeMethod::KeyShare),
        TlsVersion::Tls13 => Err(TlsError::ValidationFailure(format!(
            "cipher suite 0x{:04x} is not a TLS 1.3 suite",
            suite.0
        ))),
        TlsVersion::Tls12 => {
            let kx = Tls12CipherSuiteParams::from_suite(suite)?.kx_alg;
            tracing::debug!(suite = ?suite, ?kx, "selected TLS 1.2 key exchange");
            Ok(KeyExchangeMethod::Tls12(kx))
        }
    }
}

/// Ephemeral key-exchange state for one handshake.
///
/// The private half never leaves this value and is zeroized with it.
pub struct KeyExchange {
    group: NamedGroup,
    key_pair: KeyPair,
}

impl KeyExchange {
    /// Generate a fresh key pair for `group`.
    pub fn generate(provider: &dyn CryptoProvider, group: NamedGroup) -> Result<Self, TlsError> {
        let key_pair = provider.generate_key_pair(group)?;
        if key_pair.public_key.is_empty() {
            return Err(TlsError::ValidationFailure(format!(
                "empty public key for group 0x{:04x}",
                group.0
            )));
        }
        tracing::trace!(group = ?group.name(), "generated ephemeral key share");
        Ok(Self { group, key_pair })
    }

    pub fn group(&self) -> NamedGroup {
        self.group
    }

    /// Public value for key_share / ServerKeyExchange / ClientKeyExchange.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.key_pair.public_key
    }

    /// Shared secret with the peer's public value.
    pub fn compute_shared_secret(
        &self,
        provider: &dyn CryptoProvider,
        peer_public: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        if peer_public.is_empty() {
            return Err(TlsError::ValidationFailure(
                "empty peer key exchange value".into(),
            ));
        }
        let shared = provider.ecdh(self.group, peer_public, &self.key_pair.private_key)?;
        if shared.is_empty() {
            return Err(TlsError::DerivationError("empty shared secret".into()));
        }
        Ok(shared)
    }
}

impl std::fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchange")
            .field("group", &self.group)
            .field("public_key_len", &self.key_pair.public_key.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Static RSA (RFC 5246 §7.4.7.1)
// ---------------------------------------------------------------------------

pub const RSA_PREMASTER_LEN: usize = 48;

/// client_version(2) || random(46), from the version offered in ClientHello.
pub fn generate_rsa_premaster(
    provider: &dyn CryptoProvider,
    client_version: u16,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut pms = Zeroizing::new(Vec::with_capacity(RSA_PREMASTER_LEN));
    pms.extend_from_slice(&client_version.to_be_bytes());
    pms.extend_from_slice(&provider.random(RSA_PREMASTER_LEN - 2)?);
    Ok(pms)
}

/// Encrypt the premaster to the server certificate's key; the result is
/// the ClientKeyExchange body.
pub fn encrypt_rsa_premaster(
    provider: &dyn CryptoProvider,
    server_public_key: &[u8],
    premaster: &[u8],
) -> Result<Vec<u8>, TlsError> {
    if premaster.len() != RSA_PREMASTER_LEN {
        return Err(TlsError::ValidationFailure(format!(
            "RSA premaster must be {RSA_PREMASTER_LEN} bytes, got {}",
            premaster.len()
        )));
    }
    let encrypted = provider.rsa_encrypt(server_public_key, premaster)?;
    if encrypted.is_empty() || encrypted.len() > MAX_VEC16_LEN {
        return Err(TlsError::ValidationFailure(
            "encrypted premaster length out of range".into(),
        ));
    }
    Ok(encrypted)
}

/// Server side. A failed decryption, a wrong length or a version other
/// than `client_version` yields a random premaster instead of an error,
/// and the handshake then fails at Finished.
pub fn decrypt_rsa_premaster(
    provider: &dyn CryptoProvider,
    server_private_key: &[u8],
    encrypted: &[u8],
    client_version: u16,
) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let fallback = generate_rsa_premaster(provider, client_version)?;
    let decrypted = Zeroizing::new(
        provider
            .rsa_decrypt(server_private_key, encrypted)
            .unwrap_or_default(),
    );

    let len_ok = Choice::from((decrypted.len() == RSA_PREMASTER_LEN) as u8);
    let mut candidate = Zeroizing::new([0u8; RSA_PREMASTER_LEN]);
    let n = decrypted.len().min(RSA_PREMASTER_LEN);
    candidate[..n].copy_from_slice(&decrypted[..n]);
    let version_ok = candidate[..2].ct_eq(&client_version.to_be_bytes());
    let use_decrypted = len_ok & version_ok;

    let pms: Vec<u8> = fallback
        .iter()
        .zip(candidate.iter())
        .map(|(f, c)| u8::conditional_select(f, c, use_decrypted))
        .collect();
    Ok(Zeroizing::new(pms))
}

// ---------------------------------------------------------------------------
// Finite-field DHE (RFC 5246 §8.1.2)
// ---------------------------------------------------------------------------

fn strip_leading_zeros(v: &[u8]) -> &[u8] {
    let start = v.iter().position(|b| *b != 0).unwrap_or(v.len());
    &v[start..]
}

/// Reject peer values outside 1 < Y < p - 1.
fn check_dh_public(p: &[u8], y: &[u8]) -> Result<(), TlsError> {
    let p = strip_leading_zeros(p);
    let y = strip_leading_zeros(y);
    let out_of_range = || TlsError::ValidationFailure("DH public value out of range".into());
    if y.is_empty() || y == [1] {
        return Err(out_of_range());
    }
    if y.len() < p.len() {
        return Ok(());
    }
    if y.len() > p.len() {
        return Err(out_of_range());
    }
    // p is odd, so p - 1 differs from p only in the last byte.
    let mut p_minus_one = p.to_vec();
    if let Some(last) = p_minus_one.last_mut() {
        *last = last.wrapping_sub(1);
    }
    if y >= p_minus_one.as_slice() {
        return Err(out_of_range());
    }
    Ok(())
}

/// Ephemeral finite-field DH state for one handshake.
pub struct DheKeyExchange {
    p: Vec<u8>,
    g: Vec<u8>,
    key_pair: KeyPair,
}

impl DheKeyExchange {
    /// Generate a key pair over the group (p, g). The server picks the
    /// group; the client reuses the one from ServerKeyExchange.
    pub fn generate(provider: &dyn CryptoProvider, p: &[u8], g: &[u8]) -> Result<Self, TlsError> {
        let p_len = strip_leading_zeros(p).len();
        if p_len == 0 || strip_leading_zeros(g).is_empty() || p.len() > MAX_VEC16_LEN {
            return Err(TlsError::ValidationFailure("invalid DH group".into()));
        }
        let key_pair = provider.dh_generate_key_pair(p, g)?;
        if key_pair.public_key.is_empty() {
            return Err(TlsError::ValidationFailure("empty DH public value".into()));
        }
        tracing::trace!(prime_bits = p_len * 8, "generated ephemeral DH key");
        Ok(Self {
            p: p.to_vec(),
            g: g.to_vec(),
            key_pair,
        })
    }

    pub fn prime(&self) -> &[u8] {
        &self.p
    }

    pub fn generator(&self) -> &[u8] {
        &self.g
    }

    /// Ys / Yc as carried in ServerKeyExchange / ClientKeyExchange.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.key_pair.public_key
    }

    /// Z with leading zero bytes stripped, which is the premaster secret.
    pub fn compute_shared_secret(
        &self,
        provider: &dyn CryptoProvider,
        peer_public: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, TlsError> {
        check_dh_public(&self.p, peer_public)?;
        let z = Zeroizing::new(provider.dh_compute(&self.p, peer_public, &self.key_pair.private_key)?);
        let stripped = strip_leading_zeros(&z);
        if stripped.is_empty() {
            return Err(TlsError::DerivationError("zero DH shared secret".into()));
        }
        Ok(Zeroizing::new(stripped.to_vec()))
    }
}

impl std::fmt::Debug for DheKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DheKeyExchange")
            .field("prime_len", &self.p.len())
            .field("public_key_len", &self.key_pair.public_key.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PSK (RFC 4279 §2)
// ---------------------------------------------------------------------------

/// uint16 len || other_secret || uint16 len || psk.
pub fn psk_premaster(other_secret: &[u8], psk: &[u8]) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    if psk.is_empty() || psk.len() > MAX_VEC16_LEN || other_secret.len() > MAX_VEC16_LEN {
        return Err(TlsError::ValidationFailure("PSK length out of range".into()));
    }
    let mut pms = Zeroizing::new(Vec::with_capacity(4 + other_secret.len() + psk.len()));
    pms.extend_from_slice(&(other_secret.len() as u16).to_be_bytes());
    pms.extend_from_slice(other_secret);
    pms.extend_from_slice(&(psk.len() as u16).to_be_bytes());
    pms.extend_from_slice(psk);
    Ok(pms)
}

/// Plain PSK key exchange: other_secret is as many zero bytes as the PSK.
pub fn plain_psk_premaster(psk: &[u8]) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    psk_premaster(&vec![0u8; psk.len()], psk)
}
