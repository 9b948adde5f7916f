//! Session resumption: session state, the PSK store, stateless tickets,
//! PSK negotiation and resumption checks.

pub mod psk;
pub mod ticket;
pub mod validator;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::handshake::codec::{
    put_u16, put_u32, put_vec16, put_vec8, Reader, MAX_VEC16_LEN, MAX_VEC8_LEN,
};
use crate::{CipherSuite, TlsVersion};
use parking_lot::Mutex;
use tlsnego_types::TlsError;
use zeroize::{Zeroize, Zeroizing};

pub use psk::PskNegotiator;
pub use ticket::SessionTicketManager;
pub use validator::SessionSecurityValidator;

/// Seconds since the UNIX epoch.
pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A TLS session that can be used for resumption.
#[derive(Clone)]
pub struct TlsSession {
    /// Session identifier (TLS 1.2 session id or ticket identity).
    pub id: Vec<u8>,
    pub version: TlsVersion,
    pub cipher_suite: CipherSuite,
    /// TLS 1.2 master secret or TLS 1.3 resumption PSK.
    pub master_secret: Vec<u8>,
    /// Opaque ticket as sent to the client.
    pub ticket: Option<Vec<u8>>,
    /// Ticket lifetime in seconds.
    pub ticket_lifetime: u32,
    pub ticket_age_add: u32,
    pub ticket_nonce: Vec<u8>,
    /// Maximum early data size (TLS 1.3 0-RTT).
    pub max_early_data: u32,
    /// Seconds since the UNIX epoch.
    pub created_at: u64,
    /// Whether the Extended Master Secret extension (RFC 7627) was used.
    pub extended_master_secret: bool,
}

impl TlsSession {
    /// A fresh session created now.
    pub fn new(
        id: Vec<u8>,
        version: TlsVersion,
        cipher_suite: CipherSuite,
        master_secret: Vec<u8>,
        ticket_lifetime: u32,
    ) -> Self {
        Self {
            id,
            version,
            cipher_suite,
            master_secret,
            ticket: None,
            ticket_lifetime,
            ticket_age_add: 0,
            ticket_nonce: Vec::new(),
            max_early_data: 0,
            created_at: now_secs(),
            extended_master_secret: false,
        }
    }

    /// Expired once `ticket_lifetime` seconds have passed since creation.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) >= self.ticket_lifetime as u64
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_secs())
    }
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSession")
            .field("id_len", &self.id.len())
            .field("version", &self.version)
            .field("cipher_suite", &format_args!("0x{:04x}", self.cipher_suite.0))
            .field("master_secret", &format_args!("[{} bytes]", self.master_secret.len()))
            .field("has_ticket", &self.ticket.is_some())
            .field("ticket_lifetime", &self.ticket_lifetime)
            .field("max_early_data", &self.max_early_data)
            .field("created_at", &self.created_at)
            .field("extended_master_secret", &self.extended_master_secret)
            .finish_non_exhaustive()
    }
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

/// Serialize session state for ticket encryption.
///
/// Format: `version(2) || suite(2) || id(1-byte len) || secret(2-byte len) ||
/// created_at(8) || lifetime(4) || age_add(4) || nonce(1-byte len) ||
/// max_early_data(4) || ems(1)`
///
/// Fails if the id, secret or nonce does not fit its length prefix.
pub fn encode_session_state(session: &TlsSession) -> Result<Zeroizing<Vec<u8>>, TlsError> {
    if session.id.len() > MAX_VEC8_LEN
        || session.ticket_nonce.len() > MAX_VEC8_LEN
        || session.master_secret.len() > MAX_VEC16_LEN
    {
        return Err(TlsError::ValidationFailure(format!(
            "session state field too long (id {}, nonce {}, secret {})",
            session.id.len(),
            session.ticket_nonce.len(),
            session.master_secret.len()
        )));
    }
    let mut data = Zeroizing::new(Vec::with_capacity(
        32 + session.id.len() + session.master_secret.len() + session.ticket_nonce.len(),
    ));
    put_u16(&mut data, session.version.wire_version());
    put_u16(&mut data, session.cipher_suite.0);
    put_vec8(&mut data, &session.id);
    put_vec16(&mut data, &session.master_secret);
    data.extend_from_slice(&session.created_at.to_be_bytes());
    put_u32(&mut data, session.ticket_lifetime);
    put_u32(&mut data, session.ticket_age_add);
    put_vec8(&mut data, &session.ticket_nonce);
    put_u32(&mut data, session.max_early_data);
    data.push(session.extended_master_secret as u8);
    Ok(data)
}

pub fn decode_session_state(data: &[u8]) -> Result<TlsSession, TlsError> {
    let mut r = Reader::new("session state", data);
    let raw_version = r.read_u16("version")?;
    let version = TlsVersion::from_wire(raw_version)
        .ok_or_else(|| r.err(&format!("unknown version 0x{raw_version:04x}")))?;
    let cipher_suite = CipherSuite(r.read_u16("cipher_suite")?);
    let id = r.read_vec8("id")?.to_vec();
    let master_secret = r.read_vec16("master_secret")?.to_vec();
    let hi = r.read_u32("created_at")? as u64;
    let lo = r.read_u32("created_at")? as u64;
    let ticket_lifetime = r.read_u32("ticket_lifetime")?;
    let ticket_age_add = r.read_u32("ticket_age_add")?;
    let ticket_nonce = r.read_vec8("ticket_nonce")?.to_vec();
    let max_early_data = r.read_u32("max_early_data")?;
    let extended_master_secret = r.read_u8("ems")? != 0;
    r.finish()?;

    Ok(TlsSession {
        id,
        version,
        cipher_suite,
        master_secret,
        ticket: None,
        ticket_lifetime,
        ticket_age_add,
        ticket_nonce,
        max_early_data,
        created_at: (hi << 32) | lo,
        extended_master_secret,
    })
}

// ---------------------------------------------------------------------------
// PSK store
// ---------------------------------------------------------------------------

/// Session / PSK store consulted during resumption.
pub trait SessionStore: Send + Sync {
    /// Secret stored under `identity`, unless unknown or expired.
    fn lookup(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>>;

    /// Store `secret` under `identity` for `ttl`.
    fn store(&self, identity: &[u8], secret: &[u8], ttl: Duration);

    /// Record that `id` has been used. Returns true if it was already
    /// consumed, which means a replay.
    fn mark_consumed(&self, id: &[u8]) -> bool;
}

struct StoreEntry {
    secret: Zeroizing<Vec<u8>>,
    expires_at: u64,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<Vec<u8>, StoreEntry>,
    /// Consumed identities and when their record may be forgotten.
    consumed: HashMap<Vec<u8>, u64>,
}

/// How long a consumed identity with no stored entry is remembered.
pub const REPLAY_WINDOW: Duration = Duration::from_secs(7200);

/// In-memory [`SessionStore`] with TTL expiry and a size limit.
///
/// `max_size` bounds both the stored entries and the consumed-identity
/// records kept for anti-replay.
pub struct InMemorySessionStore {
    inner: Mutex<StoreInner>,
    max_size: usize,
}

impl InMemorySessionStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            max_size,
        }
    }

    /// Number of stored entries, expired ones included until `cleanup()`.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of consumed-identity records currently kept.
    pub fn consumed_len(&self) -> usize {
        self.inner.lock().consumed.len()
    }

    pub fn remove(&self, identity: &[u8]) -> bool {
        self.inner.lock().entries.remove(identity).is_some()
    }

    /// Drop expired entries and expired consumed-identity records; returns
    /// how many stored entries were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(now_secs())
    }

    fn cleanup_at(&self, now: u64) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.expires_at > now);
        let removed = before - inner.entries.len();
        let consumed_before = inner.consumed.len();
        inner.consumed.retain(|_, expires_at| *expires_at > now);
        let forgotten = consumed_before - inner.consumed.len();
        if removed > 0 || forgotten > 0 {
            tracing::debug!(removed, forgotten, "expired sessions removed");
        }
        removed
    }

    fn mark_consumed_at(&self, id: &[u8], now: u64) -> bool {
        let mut inner = self.inner.lock();
        if let Some(expires_at) = inner.consumed.get(id) {
            if *expires_at > now {
                tracing::warn!(id_len = id.len(), "replayed session identity");
                return true;
            }
        }

        let expires_at = match inner.entries.get(id) {
            Some(e) if e.expires_at > now => e.expires_at,
            _ => now.saturating_add(REPLAY_WINDOW.as_secs()),
        };
        let capacity = self.max_size.max(1);
        if inner.consumed.len() >= capacity && !inner.consumed.contains_key(id) {
            inner.consumed.retain(|_, exp| *exp > now);
            if inner.consumed.len() >= capacity {
                if let Some(oldest) = inner
                    .consumed
                    .iter()
                    .min_by_key(|(_, exp)| **exp)
                    .map(|(k, _)| k.clone())
                {
                    inner.consumed.remove(&oldest);
                }
            }
        }
        inner.consumed.insert(id.to_vec(), expires_at);
        false
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl SessionStore for InMemorySessionStore {
    fn lookup(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        let now = now_secs();
        let mut inner = self.inner.lock();
        match inner.entries.get(identity) {
            Some(e) if e.expires_at > now => Some(e.secret.clone()),
            Some(_) => {
                inner.entries.remove(identity);
                None
            }
            None => None,
        }
    }

    fn store(&self, identity: &[u8], secret: &[u8], ttl: Duration) {
        let mut inner = self.inner.lock();
        if self.max_size == 0 {
            return;
        }
        if inner.entries.len() >= self.max_size && !inner.entries.contains_key(identity) {
            // Evict the entry closest to expiry.
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
            }
        }
        inner.entries.insert(
            identity.to_vec(),
            StoreEntry {
                secret: Zeroizing::new(secret.to_vec()),
                expires_at: now_secs().saturating_add(ttl.as_secs()),
            },
        );
    }

    fn mark_consumed(&self, id: &[u8]) -> bool {
        self.mark_consumed_at(id, now_secs())
    }
}
