//! TLS handshake: message types, states, codec, state machine and flow.

pub mod codec;
pub mod codec12;
pub mod extensions_codec;
pub mod flow;
pub mod key_exchange;
pub mod message;
pub mod state_machine;
pub mod verify;

use std::fmt;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    NewSessionTicket = 4,
    EncryptedExtensions = 8,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub const ALL: [HandshakeType; 12] = [
        HandshakeType::HelloRequest,
        HandshakeType::ClientHello,
        HandshakeType::ServerHello,
        HandshakeType::NewSessionTicket,
        HandshakeType::EncryptedExtensions,
        HandshakeType::Certificate,
        HandshakeType::ServerKeyExchange,
        HandshakeType::CertificateRequest,
        HandshakeType::ServerHelloDone,
        HandshakeType::CertificateVerify,
        HandshakeType::ClientKeyExchange,
        HandshakeType::Finished,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == v)
    }

    pub fn name(self) -> &'static str {
        match self {
            HandshakeType::HelloRequest => "HelloRequest",
            HandshakeType::ClientHello => "ClientHello",
            HandshakeType::ServerHello => "ServerHello",
            HandshakeType::NewSessionTicket => "NewSessionTicket",
            HandshakeType::EncryptedExtensions => "EncryptedExtensions",
            HandshakeType::Certificate => "Certificate",
            HandshakeType::ServerKeyExchange => "ServerKeyExchange",
            HandshakeType::CertificateRequest => "CertificateRequest",
            HandshakeType::ServerHelloDone => "ServerHelloDone",
            HandshakeType::CertificateVerify => "CertificateVerify",
            HandshakeType::ClientKeyExchange => "ClientKeyExchange",
            HandshakeType::Finished => "Finished",
        }
    }
}

impl fmt::Display for HandshakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse progress of a handshake, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandshakeStage {
    Initial = 1,
    Negotiating = 2,
    KeyExchange = 3,
    Authentication = 4,
    Finished = 5,
}

/// Handshake state shared by all four state-machine variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    Initial,
    WaitServerHello,
    WaitCertificate,
    WaitServerKeyExchange,
    WaitServerHelloDone,
    WaitClientCertificate,
    WaitClientKeyExchange,
    WaitClientKeyExchangeWithCert,
    WaitCertificateVerify,
    WaitChangeCipherSpec,
    WaitFinished,
    WaitClientFinished,
    WaitEncryptedExtensions,
    WaitNewSessionTicket,
    ProcessEarlyData,
    WaitClientVerify,
    Connected,
    Error,
}

impl HandshakeState {
    pub const ALL: [HandshakeState; 18] = [
        HandshakeState::Initial,
        HandshakeState::WaitServerHello,
        HandshakeState::WaitCertificate,
        HandshakeState::WaitServerKeyExchange,
        HandshakeState::WaitServerHelloDone,
        HandshakeState::WaitClientCertificate,
        HandshakeState::WaitClientKeyExchange,
        HandshakeState::WaitClientKeyExchangeWithCert,
        HandshakeState::WaitCertificateVerify,
        HandshakeState::WaitChangeCipherSpec,
        HandshakeState::WaitFinished,
        HandshakeState::WaitClientFinished,
        HandshakeState::WaitEncryptedExtensions,
        HandshakeState::WaitNewSessionTicket,
        HandshakeState::ProcessEarlyData,
        HandshakeState::WaitClientVerify,
        HandshakeState::Connected,
        HandshakeState::Error,
    ];

    /// Stable upper-case name, e.g. `"WAIT_SERVER_HELLO"`.
    pub fn name(self) -> &'static str {
        match self {
            HandshakeState::Initial => "INITIAL",
            HandshakeState::WaitServerHello => "WAIT_SERVER_HELLO",
            HandshakeState::WaitCertificate => "WAIT_CERTIFICATE",
            HandshakeState::WaitServerKeyExchange => "WAIT_SERVER_KEY_EXCHANGE",
            HandshakeState::WaitServerHelloDone => "WAIT_SERVER_HELLO_DONE",
            HandshakeState::WaitClientCertificate => "WAIT_CLIENT_CERTIFICATE",
            HandshakeState::WaitClientKeyExchange => "WAIT_CLIENT_KEY_EXCHANGE",
            HandshakeState::WaitClientKeyExchangeWithCert => {
                "WAIT_CLIENT_KEY_EXCHANGE_WITH_CERT"
            }
            HandshakeState::WaitCertificateVerify => "WAIT_CERTIFICATE_VERIFY",
            HandshakeState::WaitChangeCipherSpec => "WAIT_CHANGE_CIPHER_SPEC",
            HandshakeState::WaitFinished => "WAIT_FINISHED",
            HandshakeState::WaitClientFinished => "WAIT_CLIENT_FINISHED",
            HandshakeState::WaitEncryptedExtensions => "WAIT_ENCRYPTED_EXTENSIONS",
            HandshakeState::WaitNewSessionTicket => "WAIT_NEW_SESSION_TICKET",
            HandshakeState::ProcessEarlyData => "PROCESS_EARLY_DATA",
            HandshakeState::WaitClientVerify => "WAIT_CLIENT_VERIFY",
            HandshakeState::Connected => "CONNECTED",
            HandshakeState::Error => "ERROR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Terminal states (CONNECTED, ERROR) report `Finished`.
    pub fn stage(self) -> HandshakeStage {
        match self {
            HandshakeState::Initial => HandshakeStage::Initial,
            HandshakeState::WaitServerHello
            | HandshakeState::WaitEncryptedExtensions
            | HandshakeState::ProcessEarlyData => HandshakeStage::Negotiating,
            HandshakeState::WaitServerKeyExchange
            | HandshakeState::WaitServerHelloDone
            | HandshakeState::WaitClientKeyExchange
            | HandshakeState::WaitClientKeyExchangeWithCert
            | HandshakeState::WaitChangeCipherSpec => HandshakeStage::KeyExchange,
            HandshakeState::WaitCertificate
            | HandshakeState::WaitClientCertificate
            | HandshakeState::WaitCertificateVerify
            | HandshakeState::WaitClientVerify => HandshakeStage::Authentication,
            HandshakeState::WaitFinished
            | HandshakeState::WaitClientFinished
            | HandshakeState::WaitNewSessionTicket
            | HandshakeState::Connected
            | HandshakeState::Error => HandshakeStage::Finished,
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role × version combination a state machine is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    Tls12Client,
    Tls12Server,
    Tls13Client,
    Tls13Server,
}

impl ProtocolVariant {
    pub fn new(role: crate::TlsRole, version: crate::TlsVersion) -> Self {
        use crate::{TlsRole, TlsVersion};
        match (role, version) {
            (TlsRole::Client, TlsVersion::Tls12) => ProtocolVariant::Tls12Client,
            (TlsRole::Server, TlsVersion::Tls12) => ProtocolVariant::Tls12Server,
            (TlsRole::Client, TlsVersion::Tls13) => ProtocolVariant::Tls13Client,
            (TlsRole::Server, TlsVersion::Tls13) => ProtocolVariant::Tls13Server,
        }
    }

    pub fn role(self) -> crate::TlsRole {
        match self {
            ProtocolVariant::Tls12Client | ProtocolVariant::Tls13Client => crate::TlsRole::Client,
            ProtocolVariant::Tls12Server | ProtocolVariant::Tls13Server => crate::TlsRole::Server,
        }
    }

    pub fn version(self) -> crate::TlsVersion {
        match self {
            ProtocolVariant::Tls12Client | ProtocolVariant::Tls12Server => crate::TlsVersion::Tls12,
            ProtocolVariant::Tls13Client | ProtocolVariant::Tls13Server => crate::TlsVersion::Tls13,
        }
    }
}

/// Handshake mode switches, fixed before the first message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModeFlags {
    /// TLS 1.3 PSK handshake: no server Certificate/CertificateVerify.
    pub psk_mode: bool,
    pub client_certificate_required: bool,
    /// TLS 1.3 server accepts 0-RTT data.
    pub early_data_enabled: bool,
}
