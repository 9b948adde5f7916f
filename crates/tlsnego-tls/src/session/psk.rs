//! TLS 1.3 PSK selection and binders (RFC 8446 §4.2.11).

use std::sync::Arc;

use tlsnego_types::TlsError;
use zeroize::{Zeroize, Zeroizing};

use super::SessionStore;
use crate::crypt::hmac::digest;
use crate::crypt::key_schedule::KeySchedule;
use crate::crypt::{verify_finished, CipherSuiteParams};
use crate::handshake::extensions_codec::{PskIdentity, PskKeyExchangeMode};

/// Picks the PSK identity and key-exchange mode for a resumed handshake.
pub struct PskNegotiator {
    store: Arc<dyn SessionStore>,
    preferred_mode: PskKeyExchangeMode,
    require_preferred_mode: bool,
    negotiated: Option<(usize, Vec<u8>)>,
    negotiated_mode: Option<PskKeyExchangeMode>,
}

impl PskNegotiator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            preferred_mode: PskKeyExchangeMode::PskDheKe,
            require_preferred_mode: false,
            negotiated: None,
            negotiated_mode: None,
        }
    }

    pub fn preferred_mode(&self) -> PskKeyExchangeMode {
        self.preferred_mode
    }

    pub fn set_preferred_mode(&mut self, mode: PskKeyExchangeMode) {
        self.preferred_mode = mode;
    }

    pub fn require_preferred_mode(&self) -> bool {
        self.require_preferred_mode
    }

    pub fn set_require_preferred_mode(&mut self, require: bool) {
        self.require_preferred_mode = require;
    }

    /// Index of the first offered identity the store knows.
    pub fn select_best_psk(&self, identities: &[PskIdentity]) -> Option<usize> {
        identities
            .iter()
            .position(|id| self.store.lookup(&id.identity).is_some())
    }

    /// The preferred mode if offered; otherwise the first offered mode,
    /// unless the preferred one is required.
    pub fn select_best_psk_mode(
        &self,
        modes: &[PskKeyExchangeMode],
    ) -> Option<PskKeyExchangeMode> {
        if modes.contains(&self.preferred_mode) {
            return Some(self.preferred_mode);
        }
        if self.require_preferred_mode {
            return None;
        }
        modes.first().copied()
    }

    /// Select both identity and mode. On failure nothing is recorded.
    pub fn negotiate(&mut self, identities: &[PskIdentity], modes: &[PskKeyExchangeMode]) -> bool {
        self.negotiated = None;
        self.negotiated_mode = None;

        let Some(mode) = self.select_best_psk_mode(modes) else {
            tracing::debug!("no acceptable PSK key exchange mode");
            return false;
        };
        let Some(index) = self.select_best_psk(identities) else {
            tracing::debug!(offered = identities.len(), "no known PSK identity");
            return false;
        };
        tracing::debug!(index, ?mode, "PSK negotiated");
        self.negotiated = Some((index, identities[index].identity.clone()));
        self.negotiated_mode = Some(mode);
        true
    }

    /// `selected_identity` for the ServerHello pre_shared_key extension.
    pub fn negotiated_index(&self) -> Option<u16> {
        self.negotiated.as_ref().map(|(i, _)| *i as u16)
    }

    pub fn negotiated_identity(&self) -> Option<&[u8]> {
        self.negotiated.as_ref().map(|(_, id)| id.as_slice())
    }

    pub fn negotiated_mode(&self) -> Option<PskKeyExchangeMode> {
        self.negotiated_mode
    }

    pub fn is_successful(&self) -> bool {
        self.negotiated.is_some() && self.negotiated_mode.is_some()
    }

    /// Secret for the negotiated identity.
    pub fn negotiated_psk(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.negotiated
            .as_ref()
            .and_then(|(_, id)| self.store.lookup(id))
    }

    /// Anti-replay for 0-RTT: fails if `identity` was already used.
    pub fn check_replay(&self, identity: &[u8]) -> Result<(), TlsError> {
        if self.store.mark_consumed(identity) {
            return Err(TlsError::ValidationFailure("PSK identity replayed".into()));
        }
        Ok(())
    }
}

/// Hash of a ClientHello truncated before its binders list.
pub fn truncated_client_hello_hash(
    params: &CipherSuiteParams,
    encoded_client_hello: &[u8],
    binders_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let end = encoded_client_hello
        .len()
        .checked_sub(binders_len)
        .ok_or_else(|| TlsError::MalformedMessage("ClientHello: binders exceed message".into()))?;
    digest(params.hash_alg(), &[&encoded_client_hello[..end]])
}

/// PSK binder: `HMAC(finished_key(binder_key), Hash(truncated ClientHello))`.
pub fn compute_binder(
    params: &CipherSuiteParams,
    psk: &[u8],
    external: bool,
    truncated_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let mut ks = KeySchedule::new(params.clone());
    ks.derive_early_secret(Some(psk))?;
    let mut binder_key = ks.derive_binder_key(external)?;
    let mut finished_key = ks.derive_finished_key(&binder_key)?;
    let binder = ks.compute_finished_verify_data(&finished_key, truncated_hash);
    binder_key.zeroize();
    finished_key.zeroize();
    binder
}

/// Recompute and compare a received binder in constant time.
pub fn verify_binder(
    params: &CipherSuiteParams,
    psk: &[u8],
    external: bool,
    truncated_hash: &[u8],
    received: &[u8],
) -> Result<(), TlsError> {
    let expected = compute_binder(params, psk, external, truncated_hash)?;
    verify_finished(&expected, received)
        .map_err(|_| TlsError::ValidationFailure("PSK binder mismatch".into()))
}
