//! TLS 1.3 key schedule (RFC 8446 §7.1).
//!
//! ```text
//!              0
//!              |
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!        Derive-Secret(., "derived", "")
//!              |
//!  (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!        Derive-Secret(., "derived", "")
//!              |
//!     0 -> HKDF-Extract = Master Secret
//! ```
//!
//! The free functions compute one link of the chain each; [`KeySchedule`]
//! walks the chain in order and refuses out-of-order derivations.

use super::hkdf::{derive_secret, hkdf_expand_label, hkdf_extract};
use super::hmac::{digest, hmac};
use super::CipherSuiteParams;
use tlsnego_types::{HashAlgId, TlsError};
use tracing::trace;
use zeroize::Zeroize;

/// Early Secret: `HKDF-Extract(0, PSK)`, a zero PSK when none is offered.
pub fn early_secret(alg: HashAlgId, psk: Option<&[u8]>) -> Result<Vec<u8>, TlsError> {
    let zero_psk = vec![0u8; alg.output_size()];
    hkdf_extract(alg, &[], psk.unwrap_or(&zero_psk))
}

/// Handshake Secret: `HKDF-Extract(Derive-Secret(ES, "derived", ""), shared)`.
pub fn handshake_secret(
    alg: HashAlgId,
    early_secret: &[u8],
    shared_secret: &[u8],
) -> Result<Vec<u8>, TlsError> {
    if shared_secret.is_empty() {
        return Err(TlsError::DerivationError("empty (EC)DHE shared secret".into()));
    }
    let mut salt = derived_salt(alg, early_secret)?;
    let secret = hkdf_extract(alg, &salt, shared_secret);
    salt.zeroize();
    secret
}

/// Master Secret: `HKDF-Extract(Derive-Secret(HS, "derived", ""), 0)`.
pub fn master_secret(alg: HashAlgId, handshake_secret: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut salt = derived_salt(alg, handshake_secret)?;
    let zero_ikm = vec![0u8; alg.output_size()];
    let secret = hkdf_extract(alg, &salt, &zero_ikm);
    salt.zeroize();
    secret
}

/// `finished_key = HKDF-Expand-Label(base_key, "finished", "", Hash.length)`.
pub fn finished_key(alg: HashAlgId, base_key: &[u8]) -> Result<Vec<u8>, TlsError> {
    hkdf_expand_label(alg, base_key, b"finished", b"", alg.output_size())
}

/// `verify_data = HMAC(finished_key(base_key), transcript_hash)`.
pub fn finished_verify_data(
    alg: HashAlgId,
    base_key: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let mut key = finished_key(alg, base_key)?;
    let verify_data = hmac(alg, &key, transcript_hash);
    key.zeroize();
    verify_data
}

fn derived_salt(alg: HashAlgId, secret: &[u8]) -> Result<Vec<u8>, TlsError> {
    if secret.len() != alg.output_size() {
        return Err(TlsError::DerivationError(format!(
            "secret is {} bytes, expected {}",
            secret.len(),
            alg.output_size()
        )));
    }
    let empty_hash = digest(alg, &[])?;
    derive_secret(alg, secret, b"derived", &empty_hash)
}

/// Current stage of the TLS 1.3 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScheduleStage {
    Initial,
    EarlySecret,
    HandshakeSecret,
    MasterSecret,
}

/// TLS 1.3 key schedule state.
///
/// Holds the secret of the current stage; zeroized on drop.
pub struct KeySchedule {
    params: CipherSuiteParams,
    stage: KeyScheduleStage,
    current_secret: Vec<u8>,
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.current_secret.zeroize();
    }
}

impl KeySchedule {
    pub fn new(params: CipherSuiteParams) -> Self {
        Self {
            params,
            stage: KeyScheduleStage::Initial,
            current_secret: Vec::new(),
        }
    }

    pub fn stage(&self) -> KeyScheduleStage {
        self.stage
    }

    pub fn hash_len(&self) -> usize {
        self.params.hash_len
    }

    pub fn hash_alg(&self) -> HashAlgId {
        self.params.hash_alg()
    }

    fn require(&self, stage: KeyScheduleStage, op: &str) -> Result<(), TlsError> {
        if self.stage != stage {
            return Err(TlsError::DerivationError(format!(
                "{op}: key schedule is at {:?}, expected {stage:?}",
                self.stage
            )));
        }
        Ok(())
    }

    fn advance(&mut self, secret: Vec<u8>, stage: KeyScheduleStage) {
        self.current_secret.zeroize();
        self.current_secret = secret;
        trace!(from = ?self.stage, to = ?stage, "key schedule advanced");
        self.stage = stage;
    }

    /// Initial → EarlySecret.
    pub fn derive_early_secret(&mut self, psk: Option<&[u8]>) -> Result<(), TlsError> {
        self.require(KeyScheduleStage::Initial, "derive_early_secret")?;
        let secret = early_secret(self.hash_alg(), psk)?;
        self.advance(secret, KeyScheduleStage::EarlySecret);
        Ok(())
    }

    /// EarlySecret → HandshakeSecret.
    pub fn derive_handshake_secret(&mut self, dhe_shared_secret: &[u8]) -> Result<(), TlsError> {
        self.require(KeyScheduleStage::EarlySecret, "derive_handshake_secret")?;
        let secret = handshake_secret(self.hash_alg(), &self.current_secret, dhe_shared_secret)?;
        self.advance(secret, KeyScheduleStage::HandshakeSecret);
        Ok(())
    }

    /// `(client, server)` handshake traffic secrets over Hash(ClientHello..ServerHello).
    pub fn derive_handshake_traffic_secrets(
        &self,
        transcript_hash: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        self.require(
            KeyScheduleStage::HandshakeSecret,
            "derive_handshake_traffic_secrets",
        )?;
        self.derive_pair(b"c hs traffic", b"s hs traffic", transcript_hash)
    }

    /// HandshakeSecret → MasterSecret.
    pub fn derive_master_secret(&mut self) -> Result<(), TlsError> {
        self.require(KeyScheduleStage::HandshakeSecret, "derive_master_secret")?;
        let secret = master_secret(self.hash_alg(), &self.current_secret)?;
        self.advance(secret, KeyScheduleStage::MasterSecret);
        Ok(())
    }

    /// `(client, server)` application traffic secrets over
    /// Hash(ClientHello..server Finished).
    pub fn derive_app_traffic_secrets(
        &self,
        transcript_hash: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        self.require(KeyScheduleStage::MasterSecret, "derive_app_traffic_secrets")?;
        self.derive_pair(b"c ap traffic", b"s ap traffic", transcript_hash)
    }

    fn derive_pair(
        &self,
        client_label: &[u8],
        server_label: &[u8],
        transcript_hash: &[u8],
    ) -> Result<(Vec<u8>, Vec<u8>), TlsError> {
        let alg = self.hash_alg();
        let client = derive_secret(alg, &self.current_secret, client_label, transcript_hash)?;
        let server = derive_secret(alg, &self.current_secret, server_label, transcript_hash)?;
        Ok((client, server))
    }

    pub fn derive_exporter_master_secret(
        &self,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        self.require(
            KeyScheduleStage::MasterSecret,
            "derive_exporter_master_secret",
        )?;
        derive_secret(
            self.hash_alg(),
            &self.current_secret,
            b"exp master",
            transcript_hash,
        )
    }

    /// `transcript_hash` = Hash(ClientHello..client Finished).
    pub fn derive_resumption_master_secret(
        &self,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        self.require(
            KeyScheduleStage::MasterSecret,
            "derive_resumption_master_secret",
        )?;
        derive_secret(
            self.hash_alg(),
            &self.current_secret,
            b"res master",
            transcript_hash,
        )
    }

    pub fn derive_finished_key(&self, base_key: &[u8]) -> Result<Vec<u8>, TlsError> {
        finished_key(self.hash_alg(), base_key)
    }

    pub fn compute_finished_verify_data(
        &self,
        finished_key: &[u8],
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        hmac(self.hash_alg(), finished_key, transcript_hash)
    }

    /// `client_early_traffic_secret = Derive-Secret(ES, "c e traffic", Hash(ClientHello))`.
    pub fn derive_early_traffic_secret(&self, transcript_hash: &[u8]) -> Result<Vec<u8>, TlsError> {
        self.require(KeyScheduleStage::EarlySecret, "derive_early_traffic_secret")?;
        derive_secret(
            self.hash_alg(),
            &self.current_secret,
            b"c e traffic",
            transcript_hash,
        )
    }

    /// Binder key: "ext binder" for external PSKs, "res binder" for resumption.
    pub fn derive_binder_key(&self, external: bool) -> Result<Vec<u8>, TlsError> {
        self.require(KeyScheduleStage::EarlySecret, "derive_binder_key")?;
        let label: &[u8] = if external {
            b"ext binder"
        } else {
            b"res binder"
        };
        let empty_hash = digest(self.hash_alg(), &[])?;
        derive_secret(self.hash_alg(), &self.current_secret, label, &empty_hash)
    }

    /// `HKDF-Expand-Label(rms, "resumption", ticket_nonce, Hash.length)`.
    ///
    /// Stage independent: the resumption master secret is passed in.
    pub fn derive_resumption_psk(&self, rms: &[u8], nonce: &[u8]) -> Result<Vec<u8>, TlsError> {
        hkdf_expand_label(self.hash_alg(), rms, b"resumption", nonce, self.hash_len())
    }

    /// `HKDF-Expand-Label(secret, "traffic upd", "", Hash.length)`.
    pub fn update_traffic_secret(&self, current_secret: &[u8]) -> Result<Vec<u8>, TlsError> {
        hkdf_expand_label(
            self.hash_alg(),
            current_secret,
            b"traffic upd",
            b"",
            self.hash_len(),
        )
    }
}
