//! Per-connection handshake driver.
//!
//! `HandshakeFlow` frames and decodes messages, validates them, feeds the
//! state machine and keeps the transcript hash. Key derivation stays with
//! the caller, which reads [`HandshakeFlow::transcript_hash`] (or
//! [`HandshakeFlow::hash_before_last_message`]) where the key schedule
//! needs it.
//!
//! Every state-machine event goes through [`send`](HandshakeFlow::send) or
//! [`receive`](HandshakeFlow::receive). A few messages are part of the
//! transcript without being events of the local table:
//!
//! - TLS 1.2 client: its own Finished, sent in WAIT_CHANGE_CIPHER_SPEC.
//! - TLS 1.2 server: its own Finished, sent in WAIT_CLIENT_FINISHED and
//!   followed by [`server_finished_sent`](HandshakeFlow::server_finished_sent).
//! - TLS 1.3 client: its own Certificate, CertificateVerify and Finished,
//!   sent in WAIT_NEW_SESSION_TICKET.
//!
//! Those go through [`send_untracked`](HandshakeFlow::send_untracked).
//!
//! A TLS 1.3 HelloRetryRequest is not a table event either. It collapses
//! ClientHello1 into a `message_hash`, is added to the transcript and allows
//! exactly one more ClientHello while the machine stays in
//! WAIT_SERVER_HELLO. [`send`](HandshakeFlow::send) and
//! [`receive`](HandshakeFlow::receive) recognise it by its random.
//!
//! For TLS 1.2 the flow also keeps the concatenated handshake messages,
//! which CertificateVerify signs, and learns the key exchange from the
//! ServerHello suite. That decides how a ServerKeyExchange is decoded and
//! which server messages are left out: static RSA sends no
//! ServerKeyExchange, PSK sends no Certificate and only an optional
//! ServerKeyExchange.
//!
//! Any failure moves the machine to ERROR; nothing is accepted after that
//! until [`reset`](HandshakeFlow::reset).

use super::codec::ServerHello;
use super::message::HandshakeMessage;
use super::state_machine::HandshakeStateMachine;
use super::{HandshakeState, HandshakeType, ModeFlags, ProtocolVariant};
use crate::alert::Alert;
use crate::config::HandshakeConfig;
use crate::crypt::transcript::TranscriptHash;
use crate::crypt::{CipherSuiteParams, KeyExchangeAlg, Tls12CipherSuiteParams};
use crate::{TlsRole, TlsVersion};
use tlsnego_types::{HashAlgId, TlsError};

enum Transcript {
    /// Encoded messages held until the cipher suite fixes the hash.
    Buffered(Vec<Vec<u8>>),
    Hashing(TranscriptHash),
}

/// HelloRetryRequest progress; at most one per handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HelloRetry {
    NotSeen,
    /// HRR is in the transcript; ClientHello2 has not been seen yet.
    AwaitingClientHello,
    Done,
}

/// Which side sends a message type, when only one side can.
fn sender_of(msg_type: HandshakeType) -> Option<TlsRole> {
    match msg_type {
        HandshakeType::ClientHello | HandshakeType::ClientKeyExchange => Some(TlsRole::Client),
        HandshakeType::HelloRequest
        | HandshakeType::ServerHello
        | HandshakeType::NewSessionTicket
        | HandshakeType::EncryptedExtensions
        | HandshakeType::ServerKeyExchange
        | HandshakeType::CertificateRequest
        | HandshakeType::ServerHelloDone => Some(TlsRole::Server),
        HandshakeType::Certificate
        | HandshakeType::CertificateVerify
        | HandshakeType::Finished => None,
    }
}

fn peer_of(role: TlsRole) -> TlsRole {
    match role {
        TlsRole::Client => TlsRole::Server,
        TlsRole::Server => TlsRole::Client,
    }
}

/// Own messages that may be sent outside the table, and where.
fn untracked_allowed(
    variant: ProtocolVariant,
    state: HandshakeState,
    msg_type: HandshakeType,
) -> bool {
    use HandshakeState as S;
    use HandshakeType as M;
    match variant {
        ProtocolVariant::Tls12Client => state == S::WaitChangeCipherSpec && msg_type == M::Finished,
        ProtocolVariant::Tls12Server => state == S::WaitClientFinished && msg_type == M::Finished,
        ProtocolVariant::Tls13Client => {
            state == S::WaitNewSessionTicket
                && matches!(msg_type, M::Certificate | M::CertificateVerify | M::Finished)
        }
        ProtocolVariant::Tls13Server => false,
    }
}

/// Handshake driver for one connection.
pub struct HandshakeFlow {
    machine: HandshakeStateMachine,
    transcript: Transcript,
    hash_before_last: Option<Vec<u8>>,
    hello_retry: HelloRetry,
    /// TLS 1.2 only: every handshake message so far, concatenated.
    messages: Vec<u8>,
    messages_before_last: usize,
    /// TLS 1.2 only: taken from the ServerHello suite.
    key_exchange: Option<KeyExchangeAlg>,
}

impl HandshakeFlow {
    pub fn new(variant: ProtocolVariant, flags: ModeFlags) -> Self {
        Self {
            machine: HandshakeStateMachine::new(variant, flags),
            transcript: Transcript::Buffered(Vec::new()),
            hash_before_last: None,
            hello_retry: HelloRetry::NotSeen,
            messages: Vec::new(),
            messages_before_last: 0,
            key_exchange: None,
        }
    }

    /// Flow for `version` with the role and mode flags of `config`.
    pub fn from_config(config: &HandshakeConfig, version: TlsVersion) -> Self {
        Self::new(config.variant(version), config.mode_flags())
    }

    pub fn state(&self) -> HandshakeState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &HandshakeStateMachine {
        &self.machine
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.machine.variant()
    }

    pub fn is_complete(&self) -> bool {
        self.machine.is_handshake_completed()
    }

    pub fn is_failed(&self) -> bool {
        self.machine.is_in_error_state()
    }

    /// Fix the transcript hash once the cipher suite is known. Messages
    /// seen so far are hashed in order.
    pub fn set_hash_alg(&mut self, alg: HashAlgId) -> Result<(), TlsError> {
        match &mut self.transcript {
            Transcript::Hashing(t) if t.hash_alg() == alg => Ok(()),
            Transcript::Hashing(_) => Err(TlsError::ProtocolViolation(
                "transcript hash already fixed".into(),
            )),
            Transcript::Buffered(pending) => {
                let mut t = TranscriptHash::new(alg);
                for msg in pending.iter() {
                    t.update(msg)?;
                }
                tracing::trace!(?alg, replayed = pending.len(), "transcript hash fixed");
                self.transcript = Transcript::Hashing(t);
                Ok(())
            }
        }
    }

    fn hashing(&self) -> Result<&TranscriptHash, TlsError> {
        match &self.transcript {
            Transcript::Hashing(t) => Ok(t),
            Transcript::Buffered(_) => Err(TlsError::DerivationError(
                "transcript hash algorithm not set".into(),
            )),
        }
    }

    /// Hash of every message sent or received so far.
    pub fn transcript_hash(&self) -> Result<Vec<u8>, TlsError> {
        self.hashing()?.current_hash()
    }

    /// Transcript hash just before the most recent message, for checking a
    /// received CertificateVerify or Finished.
    pub fn hash_before_last_message(&self) -> Option<&[u8]> {
        self.hash_before_last.as_deref()
    }

    /// TLS 1.2: the concatenated handshake messages sent or received so
    /// far, as signed by the client's CertificateVerify. Empty for TLS 1.3.
    pub fn handshake_messages(&self) -> &[u8] {
        &self.messages
    }

    /// TLS 1.2: the handshake messages before the most recent one, for
    /// checking a received CertificateVerify.
    pub fn handshake_messages_before_last(&self) -> &[u8] {
        &self.messages[..self.messages_before_last]
    }

    /// TLS 1.2 key exchange of the negotiated suite, once ServerHello is
    /// through.
    pub fn key_exchange(&self) -> Option<KeyExchangeAlg> {
        self.key_exchange
    }

    /// Set the TLS 1.2 key exchange explicitly, e.g. for a suite the
    /// parameter table does not know.
    pub fn set_key_exchange(&mut self, kx: KeyExchangeAlg) -> Result<(), TlsError> {
        if self.variant().version() != TlsVersion::Tls12 {
            return Err(TlsError::ProtocolViolation(
                "key exchange is only tracked for TLS 1.2".into(),
            ));
        }
        self.key_exchange = Some(kx);
        Ok(())
    }

    /// Whether a HelloRetryRequest has been sent or received.
    pub fn hello_retry_seen(&self) -> bool {
        self.hello_retry != HelloRetry::NotSeen
    }

    /// TLS 1.3 client: apply a framed HelloRetryRequest.
    ///
    /// The HRR cipher suite fixes the transcript hash, ClientHello1 is
    /// replaced by its `message_hash` and the HRR is appended. The machine
    /// stays in WAIT_SERVER_HELLO and the next [`send`](Self::send) must be
    /// ClientHello2.
    pub fn receive_hello_retry(&mut self, data: &[u8]) -> Result<HandshakeMessage, TlsError> {
        self.ensure_running()?;
        let msg = match HandshakeMessage::decode_framed(data) {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e)),
        };
        self.apply_hello_retry(&msg, TlsRole::Client, data)?;
        Ok(msg)
    }

    /// TLS 1.3 server: send a HelloRetryRequest after ClientHello1.
    pub fn send_hello_retry(&mut self, msg: &HandshakeMessage) -> Result<Vec<u8>, TlsError> {
        self.ensure_running()?;
        let encoded = msg.encode();
        self.apply_hello_retry(msg, TlsRole::Server, &encoded)?;
        tracing::trace!(len = encoded.len(), "sent HelloRetryRequest");
        Ok(encoded)
    }

    /// Decode one framed message from the peer and apply it.
    pub fn receive(&mut self, data: &[u8]) -> Result<HandshakeMessage, TlsError> {
        self.ensure_running()?;
        let kx = self.key_exchange.unwrap_or(KeyExchangeAlg::Ecdhe);
        let msg = match HandshakeMessage::decode_framed_with(data, kx) {
            Ok(m) => m,
            Err(e) => return Err(self.fail(e)),
        };
        if as_hello_retry(&msg).is_some() {
            self.apply_hello_retry(&msg, TlsRole::Client, data)?;
            return Ok(msg);
        }
        if let Err(e) = msg.validate() {
            return Err(self.fail(e));
        }
        let peer = peer_of(self.variant().role());
        self.apply_event(msg.msg_type(), peer)?;
        self.note_server_hello(&msg);
        self.record(data)?;
        Ok(msg)
    }

    /// Apply and encode one of our own messages.
    pub fn send(&mut self, msg: &HandshakeMessage) -> Result<Vec<u8>, TlsError> {
        if as_hello_retry(msg).is_some() {
            return self.send_hello_retry(msg);
        }
        self.ensure_running()?;
        if let Err(e) = msg.validate() {
            return Err(self.fail(e));
        }
        let own = self.variant().role();
        self.apply_event(msg.msg_type(), own)?;
        self.note_server_hello(msg);
        let encoded = msg.encode();
        self.record(&encoded)?;
        tracing::trace!(msg_type = %msg.msg_type(), len = encoded.len(), "sent handshake message");
        Ok(encoded)
    }

    /// Encode one of our own messages that the local table does not track
    /// and add it to the transcript.
    pub fn send_untracked(&mut self, msg: &HandshakeMessage) -> Result<Vec<u8>, TlsError> {
        self.ensure_running()?;
        let state = self.state();
        if !untracked_allowed(self.variant(), state, msg.msg_type()) {
            let err = TlsError::ProtocolViolation(format!(
                "cannot send {} in {state}",
                msg.msg_type()
            ));
            return Err(self.fail(err));
        }
        if let Err(e) = msg.validate() {
            return Err(self.fail(e));
        }
        let encoded = msg.encode();
        self.record(&encoded)?;
        Ok(encoded)
    }

    /// The peer's ChangeCipherSpec (TLS 1.2).
    pub fn receive_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        self.ensure_running()?;
        let from = self.state();
        if self.machine.process_change_cipher_spec() == HandshakeState::Error {
            return Err(TlsError::ProtocolViolation(format!(
                "unexpected ChangeCipherSpec in {from}"
            )));
        }
        Ok(())
    }

    /// TLS 1.3 server: early data has been consumed.
    pub fn early_data_processed(&mut self) -> Result<(), TlsError> {
        self.ensure_running()?;
        let from = self.state();
        if self.machine.early_data_processed() == HandshakeState::Error {
            return Err(TlsError::ProtocolViolation(format!(
                "no early data to process in {from}"
            )));
        }
        Ok(())
    }

    /// TLS 1.2 server: own ChangeCipherSpec and Finished are out.
    pub fn server_finished_sent(&mut self) -> Result<(), TlsError> {
        self.ensure_running()?;
        let from = self.state();
        if self.machine.server_finished_sent() == HandshakeState::Error {
            return Err(TlsError::ProtocolViolation(format!(
                "server Finished not expected in {from}"
            )));
        }
        Ok(())
    }

    /// Abort the handshake with `err`; returns the alert to send.
    pub fn abort(&mut self, err: &TlsError) -> Alert {
        self.enter_error();
        Alert::for_error(err)
    }

    /// Back to INITIAL with an empty transcript.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.transcript = Transcript::Buffered(Vec::new());
        self.hash_before_last = None;
        self.hello_retry = HelloRetry::NotSeen;
        self.messages.clear();
        self.messages_before_last = 0;
        self.key_exchange = None;
    }

    fn ensure_running(&self) -> Result<(), TlsError> {
        if self.machine.is_in_error_state() {
            return Err(TlsError::ProtocolViolation("handshake already failed".into()));
        }
        Ok(())
    }

    fn apply_hello_retry(
        &mut self,
        msg: &HandshakeMessage,
        local: TlsRole,
        encoded: &[u8],
    ) -> Result<(), TlsError> {
        let from = self.state();
        let expected = match local {
            TlsRole::Client => ProtocolVariant::Tls13Client,
            TlsRole::Server => ProtocolVariant::Tls13Server,
        };
        if self.variant() != expected
            || from != HandshakeState::WaitServerHello
            || self.hello_retry != HelloRetry::NotSeen
        {
            let err = TlsError::ProtocolViolation(format!("unexpected HelloRetryRequest in {from}"));
            return Err(self.fail(err));
        }
        let Some(hrr) = as_hello_retry(msg) else {
            let err = TlsError::ProtocolViolation(format!(
                "{} is not a HelloRetryRequest",
                msg.msg_type()
            ));
            return Err(self.fail(err));
        };
        if let Err(e) = msg.validate() {
            return Err(self.fail(e));
        }
        let alg = match CipherSuiteParams::from_suite(hrr.cipher_suite) {
            Ok(params) => params.hash_alg(),
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = self.collapse_client_hello(alg) {
            return Err(self.fail(e));
        }
        self.record(encoded)?;
        self.hello_retry = HelloRetry::AwaitingClientHello;
        tracing::debug!(variant = ?self.variant(), suite = ?hrr.cipher_suite, "HelloRetryRequest applied");
        Ok(())
    }

    fn collapse_client_hello(&mut self, alg: HashAlgId) -> Result<(), TlsError> {
        self.set_hash_alg(alg)?;
        match &mut self.transcript {
            Transcript::Hashing(t) => t.replace_with_message_hash(),
            Transcript::Buffered(_) => Err(TlsError::DerivationError(
                "transcript hash algorithm not set".into(),
            )),
        }
    }

    fn apply_event(&mut self, msg_type: HandshakeType, sender: TlsRole) -> Result<(), TlsError> {
        let from = self.state();
        if let Some(expected) = sender_of(msg_type) {
            if expected != sender {
                let err = TlsError::ProtocolViolation(format!(
                    "{msg_type} cannot come from the {sender:?}"
                ));
                return Err(self.fail(err));
            }
        }
        if self.hello_retry == HelloRetry::AwaitingClientHello {
            if msg_type != HandshakeType::ClientHello {
                let err = TlsError::ProtocolViolation(format!(
                    "{msg_type} before the second ClientHello"
                ));
                return Err(self.fail(err));
            }
            // ClientHello2 keeps the machine in WAIT_SERVER_HELLO.
            self.hello_retry = HelloRetry::Done;
            return Ok(());
        }
        if let Err(e) = self.skip_omitted(msg_type) {
            return Err(self.fail(e));
        }
        if self.machine.process_message(msg_type) == HandshakeState::Error {
            return Err(TlsError::ProtocolViolation(format!(
                "unexpected {msg_type} in {from}"
            )));
        }
        Ok(())
    }

    /// TLS 1.2: step over the server messages the key exchange leaves out.
    fn skip_omitted(&mut self, msg_type: HandshakeType) -> Result<(), TlsError> {
        let Some(kx) = self.key_exchange else {
            return Ok(());
        };
        if !kx.uses_certificate()
            && self.state() == HandshakeState::WaitCertificate
            && msg_type != HandshakeType::Certificate
        {
            self.machine.transition_to(HandshakeState::WaitServerKeyExchange)?;
        }
        if self.state() == HandshakeState::WaitServerKeyExchange {
            if kx == KeyExchangeAlg::Rsa && msg_type == HandshakeType::ServerKeyExchange {
                return Err(TlsError::ProtocolViolation(
                    "ServerKeyExchange with RSA key exchange".into(),
                ));
            }
            if !kx.requires_server_key_exchange() && msg_type != HandshakeType::ServerKeyExchange {
                self.machine.transition_to(HandshakeState::WaitServerHelloDone)?;
            }
        }
        Ok(())
    }

    /// TLS 1.2: take the key exchange from the ServerHello suite, unless
    /// one was set explicitly. Unknown suites leave it unset and every
    /// server message is then expected.
    fn note_server_hello(&mut self, msg: &HandshakeMessage) {
        let HandshakeMessage::ServerHello(sh) = msg else {
            return;
        };
        if self.variant().version() != TlsVersion::Tls12 || self.key_exchange.is_some() {
            return;
        }
        if let Ok(params) = Tls12CipherSuiteParams::from_suite(sh.cipher_suite) {
            tracing::debug!(suite = ?sh.cipher_suite, kx = ?params.kx_alg, "TLS 1.2 key exchange");
            self.key_exchange = Some(params.kx_alg);
        }
    }

    fn record(&mut self, encoded: &[u8]) -> Result<(), TlsError> {
        match &mut self.transcript {
            Transcript::Buffered(pending) => pending.push(encoded.to_vec()),
            Transcript::Hashing(t) => {
                self.hash_before_last = Some(t.current_hash()?);
                t.update(encoded)?;
            }
        }
        if self.variant().version() == TlsVersion::Tls12 {
            self.messages_before_last = self.messages.len();
            self.messages.extend_from_slice(encoded);
        }
        Ok(())
    }

    fn enter_error(&mut self) {
        // Entering ERROR never fails.
        let _ = self.machine.transition_to(HandshakeState::Error);
    }

    fn fail(&mut self, err: TlsError) -> TlsError {
        self.enter_error();
        err
    }
}

fn as_hello_retry(msg: &HandshakeMessage) -> Option<&ServerHello> {
    match msg {
        HandshakeMessage::ServerHello(sh) if sh.is_hello_retry_request() => Some(sh),
        _ => None,
    }
}

impl std::fmt::Debug for HandshakeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeFlow")
            .field("variant", &self.variant())
            .field("state", &self.state())
            .field(
                "hashing",
                &matches!(self.transcript, Transcript::Hashing(_)),
            )
            .field("hello_retry", &self.hello_retry)
            .field("key_exchange", &self.key_exchange)
            .finish()
    }
}
