//! Table-driven handshake state machine.
//!
//! One table is built per protocol variant and mode-flag combination when
//! the machine is created. Any (state, message) pair missing from the table
//! drives the machine to `Error`, which only `reset()` leaves.

use std::collections::HashMap;

use super::{HandshakeState, HandshakeType, ModeFlags, ProtocolVariant};
use tlsnego_types::TlsError;

use super::HandshakeState as S;
use super::HandshakeType as M;

type Table = HashMap<(HandshakeState, HandshakeType), HandshakeState>;

#[derive(Debug, Clone)]
pub struct HandshakeStateMachine {
    variant: ProtocolVariant,
    flags: ModeFlags,
    current: HandshakeState,
    table: Table,
}

impl HandshakeStateMachine {
    pub fn new(variant: ProtocolVariant, flags: ModeFlags) -> Self {
        let table = match variant {
            ProtocolVariant::Tls12Client => tls12_table(flags, false),
            ProtocolVariant::Tls12Server => tls12_table(flags, true),
            ProtocolVariant::Tls13Client => tls13_client_table(flags),
            ProtocolVariant::Tls13Server => tls13_server_table(flags),
        };
        Self {
            variant,
            flags,
            current: HandshakeState::Initial,
            table,
        }
    }

    pub fn current_state(&self) -> HandshakeState {
        self.current
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    /// Pure lookup: the state reached from `current` on `msg_type`.
    pub fn get_next_state(&self, current: HandshakeState, msg_type: HandshakeType) -> HandshakeState {
        self.table
            .get(&(current, msg_type))
            .copied()
            .unwrap_or(HandshakeState::Error)
    }

    /// Apply a handshake message event to the current state.
    pub fn process_message(&mut self, msg_type: HandshakeType) -> HandshakeState {
        let next = self.get_next_state(self.current, msg_type);
        self.advance(msg_type.name(), next)
    }

    /// ChangeCipherSpec is a separate record type, not a handshake message.
    pub fn process_change_cipher_spec(&mut self) -> HandshakeState {
        let next = match (self.version_is_tls12(), self.current) {
            (true, S::WaitChangeCipherSpec) => S::WaitFinished,
            _ => S::Error,
        };
        self.advance("ChangeCipherSpec", next)
    }

    /// TLS 1.3 server: 0-RTT data has been consumed.
    pub fn early_data_processed(&mut self) -> HandshakeState {
        let next = match (self.variant, self.current) {
            (ProtocolVariant::Tls13Server, S::ProcessEarlyData) => S::WaitServerHello,
            _ => S::Error,
        };
        self.advance("EarlyDataProcessed", next)
    }

    /// TLS 1.2 server: its own Finished has been sent.
    pub fn server_finished_sent(&mut self) -> HandshakeState {
        let next = match (self.variant, self.current) {
            (ProtocolVariant::Tls12Server, S::WaitClientFinished) => S::Connected,
            _ => S::Error,
        };
        self.advance("ServerFinishedSent", next)
    }

    /// Force the current state.
    ///
    /// Any state may be targeted, except that `Error` is only left through
    /// [`reset`](Self::reset).
    pub fn transition_to(&mut self, state: HandshakeState) -> Result<(), TlsError> {
        if self.current == S::Error && state != S::Error {
            return Err(TlsError::InvalidTransition(format!(
                "{:?}: {} -> {} requires reset",
                self.variant, self.current, state
            )));
        }
        self.advance("transition_to", state);
        Ok(())
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.current == S::Connected
    }

    pub fn is_in_error_state(&self) -> bool {
        self.current == S::Error
    }

    pub fn reset(&mut self) {
        tracing::debug!(variant = ?self.variant, from = %self.current, "state machine reset");
        self.current = S::Initial;
    }

    fn version_is_tls12(&self) -> bool {
        matches!(
            self.variant,
            ProtocolVariant::Tls12Client | ProtocolVariant::Tls12Server
        )
    }

    fn advance(&mut self, event: &str, next: HandshakeState) -> HandshakeState {
        if next == S::Error && self.current != S::Error {
            tracing::warn!(
                variant = ?self.variant,
                from = %self.current,
                event,
                "unexpected handshake event"
            );
        } else {
            tracing::debug!(
                variant = ?self.variant,
                from = %self.current,
                event,
                to = %next,
                "handshake transition"
            );
        }
        self.current = next;
        next
    }
}

fn tls12_table(flags: ModeFlags, server: bool) -> Table {
    let mut t = Table::new();
    t.insert((S::Initial, M::ClientHello), S::WaitServerHello);
    t.insert((S::WaitServerHello, M::ServerHello), S::WaitCertificate);
    t.insert((S::WaitCertificate, M::Certificate), S::WaitServerKeyExchange);
    t.insert(
        (S::WaitServerKeyExchange, M::ServerKeyExchange),
        S::WaitServerHelloDone,
    );
    t.insert((S::WaitClientKeyExchange, M::ClientKeyExchange), S::WaitChangeCipherSpec);

    if flags.client_certificate_required {
        t.insert(
            (S::WaitServerKeyExchange, M::CertificateRequest),
            S::WaitServerHelloDone,
        );
        t.insert(
            (S::WaitServerHelloDone, M::CertificateRequest),
            S::WaitServerHelloDone,
        );
        t.insert(
            (S::WaitServerHelloDone, M::ServerHelloDone),
            S::WaitClientCertificate,
        );
        t.insert(
            (S::WaitClientCertificate, M::Certificate),
            S::WaitClientKeyExchangeWithCert,
        );
        t.insert(
            (S::WaitClientKeyExchangeWithCert, M::ClientKeyExchange),
            S::WaitCertificateVerify,
        );
        t.insert(
            (S::WaitCertificateVerify, M::CertificateVerify),
            S::WaitChangeCipherSpec,
        );
        if server {
            t.insert(
                (S::WaitClientKeyExchange, M::Certificate),
                S::WaitClientKeyExchangeWithCert,
            );
        }
    } else {
        t.insert(
            (S::WaitServerHelloDone, M::ServerHelloDone),
            S::WaitClientKeyExchange,
        );
    }

    let after_finished = if server {
        S::WaitClientFinished
    } else {
        S::Connected
    };
    t.insert((S::WaitFinished, M::Finished), after_finished);
    t
}

fn tls13_client_table(flags: ModeFlags) -> Table {
    let mut t = Table::new();
    t.insert((S::Initial, M::ClientHello), S::WaitServerHello);
    t.insert((S::WaitServerHello, M::ServerHello), S::WaitEncryptedExtensions);
    if flags.psk_mode {
        t.insert((S::WaitEncryptedExtensions, M::EncryptedExtensions), S::WaitFinished);
    } else {
        t.insert(
            (S::WaitEncryptedExtensions, M::EncryptedExtensions),
            S::WaitCertificate,
        );
        if flags.client_certificate_required {
            t.insert((S::WaitCertificate, M::CertificateRequest), S::WaitCertificate);
        }
        t.insert((S::WaitCertificate, M::Certificate), S::WaitCertificateVerify);
        t.insert((S::WaitCertificateVerify, M::CertificateVerify), S::WaitFinished);
    }
    t.insert((S::WaitFinished, M::Finished), S::WaitNewSessionTicket);
    t.insert((S::WaitNewSessionTicket, M::NewSessionTicket), S::Connected);
    t
}

fn tls13_server_table(flags: ModeFlags) -> Table {
    let mut t = Table::new();
    let after_client_hello = if flags.early_data_enabled {
        S::ProcessEarlyData
    } else {
        S::WaitServerHello
    };
    t.insert((S::Initial, M::ClientHello), after_client_hello);
    t.insert((S::WaitServerHello, M::ServerHello), S::WaitEncryptedExtensions);

    let client_auth = flags.client_certificate_required && !flags.psk_mode;
    if flags.psk_mode {
        t.insert((S::WaitEncryptedExtensions, M::EncryptedExtensions), S::WaitFinished);
    } else {
        t.insert(
            (S::WaitEncryptedExtensions, M::EncryptedExtensions),
            S::WaitCertificate,
        );
        if client_auth {
            t.insert((S::WaitCertificate, M::CertificateRequest), S::WaitCertificate);
        }
        t.insert((S::WaitCertificate, M::Certificate), S::WaitCertificateVerify);
        t.insert((S::WaitCertificateVerify, M::CertificateVerify), S::WaitFinished);
    }

    if client_auth {
        t.insert((S::WaitFinished, M::Finished), S::WaitClientCertificate);
        t.insert((S::WaitClientCertificate, M::Certificate), S::WaitClientVerify);
        t.insert((S::WaitClientVerify, M::CertificateVerify), S::WaitClientFinished);
    } else {
        t.insert((S::WaitFinished, M::Finished), S::WaitClientFinished);
    }
    t.insert((S::WaitClientFinished, M::Finished), S::WaitNewSessionTicket);
    t.insert((S::WaitNewSessionTicket, M::NewSessionTicket), S::Connected);
    t
}
