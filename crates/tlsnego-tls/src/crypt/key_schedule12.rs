//! TLS 1.2 key derivation using the PRF (RFC 5246 §6.3, §7.4.9, §8.1).
//!
//! Derives the master secret from the pre-master secret, then expands the
//! master secret into a key block of per-direction keys and IVs.

use super::prf::prf;
use super::Tls12CipherSuiteParams;
use tlsnego_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

/// Length of a TLS 1.2 master secret.
pub const MASTER_SECRET_LEN: usize = 48;

/// Length of TLS 1.2 Finished verify_data.
pub const VERIFY_DATA_LEN: usize = 12;

/// Label for the client's Finished message.
pub const CLIENT_FINISHED_LABEL: &str = "client finished";

/// Label for the server's Finished message.
pub const SERVER_FINISHED_LABEL: &str = "server finished";

/// TLS 1.2 key block.
///
/// MAC keys are empty for AEAD suites.
pub struct Tls12KeyBlock {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl Drop for Tls12KeyBlock {
    fn drop(&mut self) {
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

impl std::fmt::Debug for Tls12KeyBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tls12KeyBlock")
            .field("key_len", &self.client_write_key.len())
            .field("iv_len", &self.client_write_iv.len())
            .finish_non_exhaustive()
    }
}

fn check_random(name: &str, random: &[u8]) -> Result<(), TlsError> {
    if random.len() != 32 {
        return Err(TlsError::DerivationError(format!(
            "{name} must be 32 bytes, got {}",
            random.len()
        )));
    }
    Ok(())
}

fn check_pre_master(pre_master_secret: &[u8]) -> Result<(), TlsError> {
    if pre_master_secret.is_empty() {
        return Err(TlsError::DerivationError(
            "pre-master secret is empty".into(),
        ));
    }
    Ok(())
}

/// Derive the 48-byte master secret.
///
/// ```text
/// master_secret = PRF(pre_master_secret, "master secret",
///                     ClientHello.random + ServerHello.random)[0..47]
/// ```
pub fn derive_master_secret(
    alg: HashAlgId,
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>, TlsError> {
    check_pre_master(pre_master_secret)?;
    check_random("client random", client_random)?;
    check_random("server random", server_random)?;
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(
        alg,
        pre_master_secret,
        "master secret",
        &seed,
        MASTER_SECRET_LEN,
    )
}

/// One-shot master secret derivation with the default SHA-256 PRF.
pub fn derive_tls12_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>, TlsError> {
    derive_master_secret(
        HashAlgId::Sha256,
        pre_master_secret,
        client_random,
        server_random,
    )
}

/// Derive the master secret with the Extended Master Secret extension (RFC 7627).
///
/// `session_hash` covers every handshake message up to and including
/// ClientKeyExchange.
pub fn derive_extended_master_secret(
    alg: HashAlgId,
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    check_pre_master(pre_master_secret)?;
    if session_hash.len() != alg.output_size() {
        return Err(TlsError::DerivationError(format!(
            "session hash must be {} bytes, got {}",
            alg.output_size(),
            session_hash.len()
        )));
    }
    prf(
        alg,
        pre_master_secret,
        "extended master secret",
        session_hash,
        MASTER_SECRET_LEN,
    )
}

/// Expand the master secret into the key block.
///
/// The seed is `server_random + client_random`, the reverse of the master
/// secret seed. Layout: MAC keys, then write keys, then fixed IVs.
pub fn derive_key_block(
    master_secret: &[u8],
    server_random: &[u8],
    client_random: &[u8],
    params: &Tls12CipherSuiteParams,
) -> Result<Tls12KeyBlock, TlsError> {
    if master_secret.len() != MASTER_SECRET_LEN {
        return Err(TlsError::DerivationError(format!(
            "master secret must be {MASTER_SECRET_LEN} bytes, got {}",
            master_secret.len()
        )));
    }
    check_random("server random", server_random)?;
    check_random("client random", client_random)?;

    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let mut key_block = prf(
        params.hash_alg(),
        master_secret,
        "key expansion",
        &seed,
        params.key_block_len(),
    )?;

    let mut rest: &[u8] = &key_block;
    let mut take = |n: usize| {
        let (head, tail) = rest.split_at(n);
        rest = tail;
        head.to_vec()
    };
    let block = Tls12KeyBlock {
        client_write_mac_key: take(params.mac_key_len),
        server_write_mac_key: take(params.mac_key_len),
        client_write_key: take(params.key_len),
        server_write_key: take(params.key_len),
        client_write_iv: take(params.fixed_iv_len),
        server_write_iv: take(params.fixed_iv_len),
    };
    key_block.zeroize();
    Ok(block)
}

/// Compute the 12-byte Finished verify_data.
///
/// `label` is [`CLIENT_FINISHED_LABEL`] or [`SERVER_FINISHED_LABEL`].
pub fn compute_verify_data(
    alg: HashAlgId,
    master_secret: &[u8],
    label: &str,
    handshake_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    if label != CLIENT_FINISHED_LABEL && label != SERVER_FINISHED_LABEL {
        return Err(TlsError::DerivationError(format!(
            "unknown finished label {label:?}"
        )));
    }
    prf(alg, master_secret, label, handshake_hash, VERIFY_DATA_LEN)
}
