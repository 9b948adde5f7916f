//! Checks a stored session before it is resumed.
//!
//! A resumed session must not silently change its cipher suite or drop to
//! a lower protocol version. Every check answers yes/no; a "no" means the
//! server falls back to a full handshake.

use super::TlsSession;
use crate::{CipherSuite, TlsVersion};

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionSecurityValidator;

impl SessionSecurityValidator {
    pub fn new() -> Self {
        Self
    }

    /// TLS 1.2 abbreviated handshake: same suite, and no version lower
    /// than the session's unless `allow_downgrade`.
    pub fn validate_tls12_session(
        &self,
        session: &TlsSession,
        proposed_suite: CipherSuite,
        proposed_version: TlsVersion,
        allow_downgrade: bool,
    ) -> bool {
        if session.is_expired() {
            tracing::debug!("session rejected: expired");
            return false;
        }
        if session.cipher_suite != proposed_suite {
            tracing::debug!(
                session_suite = session.cipher_suite.0,
                proposed = proposed_suite.0,
                "session rejected: cipher suite changed"
            );
            return false;
        }
        if !allow_downgrade && proposed_version < session.version {
            tracing::debug!("session rejected: version downgrade");
            return false;
        }
        true
    }

    /// TLS 1.3 resumption PSK: a 1.3 session with the same suite.
    pub fn validate_tls13_psk(&self, session: &TlsSession, proposed_suite: CipherSuite) -> bool {
        session.version == TlsVersion::Tls13
            && !session.is_expired()
            && session.cipher_suite == proposed_suite
    }

    /// Server policy: minimum version (unless `allow_downgrade`) and an
    /// allow-list of suites, where an empty list allows any suite.
    pub fn validate_against_server_options(
        &self,
        session: &TlsSession,
        allowed_suites: &[CipherSuite],
        min_version: TlsVersion,
        allow_downgrade: bool,
    ) -> bool {
        if !allow_downgrade && session.version < min_version {
            return false;
        }
        allowed_suites.is_empty() || allowed_suites.contains(&session.cipher_suite)
    }
}
