//! Stateless session tickets (RFC 5077 style) under rotating AES-256-GCM keys.
//!
//! Ticket format: `key_name(16) || nonce(12) || AES-256-GCM(state) || tag(16)`,
//! with the key name as associated data.

use std::time::Duration;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use parking_lot::Mutex;
use tlsnego_crypto::rand::fill_random;
use tlsnego_types::{CryptoError, TlsError};
use zeroize::Zeroizing;

use super::{decode_session_state, encode_session_state, now_secs, TlsSession};

pub const KEY_NAME_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Default ticket lifetime: 24 hours.
pub const DEFAULT_TICKET_LIFETIME: Duration = Duration::from_secs(24 * 3600);

struct TicketKey {
    name: [u8; KEY_NAME_LEN],
    key: Zeroizing<[u8; 32]>,
}

struct KeyRing {
    /// Newest last; the last key is the active one.
    keys: Vec<TicketKey>,
}

/// Issues and opens session tickets.
pub struct SessionTicketManager {
    ring: Mutex<KeyRing>,
    ticket_lifetime: Duration,
}

impl SessionTicketManager {
    /// Create a manager with one fresh key.
    pub fn new() -> Result<Self, TlsError> {
        let mgr = Self {
            ring: Mutex::new(KeyRing { keys: Vec::new() }),
            ticket_lifetime: DEFAULT_TICKET_LIFETIME,
        };
        mgr.generate_new_key()?;
        Ok(mgr)
    }

    pub fn with_lifetime(ticket_lifetime: Duration) -> Result<Self, TlsError> {
        let mut mgr = Self::new()?;
        mgr.ticket_lifetime = ticket_lifetime;
        Ok(mgr)
    }

    pub fn ticket_lifetime(&self) -> Duration {
        self.ticket_lifetime
    }

    pub fn set_ticket_lifetime(&mut self, lifetime: Duration) {
        self.ticket_lifetime = lifetime;
    }

    /// Add a fresh key and make it active. Returns its name.
    pub fn generate_new_key(&self) -> Result<[u8; KEY_NAME_LEN], TlsError> {
        let mut name = [0u8; KEY_NAME_LEN];
        fill_random(&mut name)?;
        let mut key = Zeroizing::new([0u8; 32]);
        fill_random(key.as_mut())?;
        self.ring.lock().keys.push(TicketKey { name, key });
        tracing::debug!("new session ticket key");
        Ok(name)
    }

    /// Add a fresh active key and keep only the newest `max_keys` (at
    /// least one). Tickets under dropped keys no longer open.
    pub fn rotate_keys(&self, max_keys: usize) -> Result<[u8; KEY_NAME_LEN], TlsError> {
        let name = self.generate_new_key()?;
        let mut ring = self.ring.lock();
        let keep = max_keys.max(1);
        if ring.keys.len() > keep {
            let drop_count = ring.keys.len() - keep;
            ring.keys.drain(..drop_count);
        }
        tracing::debug!(keys = ring.keys.len(), "ticket keys rotated");
        Ok(name)
    }

    pub fn active_key_name(&self) -> Option<[u8; KEY_NAME_LEN]> {
        self.ring.lock().keys.last().map(|k| k.name)
    }

    pub fn key_count(&self) -> usize {
        self.ring.lock().keys.len()
    }

    /// Seal `session` under the active key.
    pub fn create_ticket(&self, session: &TlsSession) -> Result<Vec<u8>, TlsError> {
        let ring = self.ring.lock();
        let active = ring
            .keys
            .last()
            .ok_or_else(|| TlsError::ValidationFailure("no active ticket key".into()))?;

        let mut nonce = [0u8; NONCE_LEN];
        fill_random(&mut nonce)?;
        let state = encode_session_state(session)?;
        let cipher = Aes256Gcm::new(GenericArray::from_slice(active.key.as_ref()));
        let sealed = cipher
            .encrypt(
                GenericArray::from_slice(&nonce),
                Payload {
                    msg: &state,
                    aad: &active.name,
                },
            )
            .map_err(|_| CryptoError::AeadFailed)?;

        let mut ticket = Vec::with_capacity(KEY_NAME_LEN + NONCE_LEN + sealed.len());
        ticket.extend_from_slice(&active.name);
        ticket.extend_from_slice(&nonce);
        ticket.extend_from_slice(&sealed);
        tracing::debug!(len = ticket.len(), "issued session ticket");
        Ok(ticket)
    }

    /// Open a ticket. Unknown key, tampering, a malformed state or an
    /// expired session all yield `None` (fall back to a full handshake).
    pub fn open_ticket(&self, ticket: &[u8]) -> Option<TlsSession> {
        self.open_ticket_at(ticket, now_secs())
    }

    fn open_ticket_at(&self, ticket: &[u8], now: u64) -> Option<TlsSession> {
        if ticket.len() < KEY_NAME_LEN + NONCE_LEN + TAG_LEN {
            tracing::debug!(len = ticket.len(), "ticket rejected: too short");
            return None;
        }
        let (name, rest) = ticket.split_at(KEY_NAME_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);

        let plaintext = {
            let ring = self.ring.lock();
            let Some(key) = ring.keys.iter().find(|k| k.name[..] == *name) else {
                tracing::debug!("ticket rejected: unknown key");
                return None;
            };
            let cipher = Aes256Gcm::new(GenericArray::from_slice(key.key.as_ref()));
            match cipher.decrypt(
                GenericArray::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: name,
                },
            ) {
                Ok(p) => Zeroizing::new(p),
                Err(_) => {
                    tracing::debug!("ticket rejected: authentication failed");
                    return None;
                }
            }
        };

        let mut session = decode_session_state(&plaintext).ok()?;
        let age = now.saturating_sub(session.created_at);
        if age >= self.ticket_lifetime.as_secs() {
            tracing::debug!(age, "ticket rejected: expired");
            return None;
        }
        session.ticket = Some(ticket.to_vec());
        Some(session)
    }
}
