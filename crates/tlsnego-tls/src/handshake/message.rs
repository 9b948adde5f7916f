//! `HandshakeMessage`: one sum type over every handshake message body.

use super::codec::{self, parse_handshake_header, wrap_handshake};
use super::codec12;
use super::HandshakeType;
use crate::crypt::KeyExchangeAlg;
use crate::extensions::check_no_duplicates;
use tlsnego_types::TlsError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    HelloRequest,
    ClientHello(codec::ClientHello),
    ServerHello(codec::ServerHello),
    NewSessionTicket(codec::NewSessionTicketMsg),
    EncryptedExtensions(codec::EncryptedExtensions),
    Certificate(codec::CertificateMsg),
    ServerKeyExchange(codec12::ServerKeyExchange),
    CertificateRequest(codec12::CertificateRequest),
    ServerHelloDone,
    CertificateVerify(codec12::CertificateVerifyMsg),
    ClientKeyExchange(codec12::ClientKeyExchange),
    Finished(codec::FinishedMsg),
}

impl HandshakeMessage {
    pub fn msg_type(&self) -> HandshakeType {
        match self {
            HandshakeMessage::HelloRequest => HandshakeType::HelloRequest,
            HandshakeMessage::ClientHello(_) => HandshakeType::ClientHello,
            HandshakeMessage::ServerHello(_) => HandshakeType::ServerHello,
            HandshakeMessage::NewSessionTicket(_) => HandshakeType::NewSessionTicket,
            HandshakeMessage::EncryptedExtensions(_) => HandshakeType::EncryptedExtensions,
            HandshakeMessage::Certificate(_) => HandshakeType::Certificate,
            HandshakeMessage::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            HandshakeMessage::CertificateRequest(_) => HandshakeType::CertificateRequest,
            HandshakeMessage::ServerHelloDone => HandshakeType::ServerHelloDone,
            HandshakeMessage::CertificateVerify(_) => HandshakeType::CertificateVerify,
            HandshakeMessage::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            HandshakeMessage::Finished(_) => HandshakeType::Finished,
        }
    }

    /// Encode the message body, without the handshake header.
    pub fn encode_body(&self) -> Vec<u8> {
        match self {
            HandshakeMessage::HelloRequest | HandshakeMessage::ServerHelloDone => Vec::new(),
            HandshakeMessage::ClientHello(m) => codec::encode_client_hello(m),
            HandshakeMessage::ServerHello(m) => codec::encode_server_hello(m),
            HandshakeMessage::NewSessionTicket(m) => codec::encode_new_session_ticket(m),
            HandshakeMessage::EncryptedExtensions(m) => codec::encode_encrypted_extensions(m),
            HandshakeMessage::Certificate(m) => codec::encode_certificate(m),
            HandshakeMessage::ServerKeyExchange(m) => codec12::encode_server_key_exchange(m),
            HandshakeMessage::CertificateRequest(m) => codec12::encode_certificate_request(m),
            HandshakeMessage::CertificateVerify(m) => codec12::encode_certificate_verify(m),
            HandshakeMessage::ClientKeyExchange(m) => codec12::encode_client_key_exchange(m),
            HandshakeMessage::Finished(m) => codec::encode_finished(m),
        }
    }

    /// Encode with the 4-byte handshake header.
    pub fn encode(&self) -> Vec<u8> {
        wrap_handshake(self.msg_type(), &self.encode_body())
    }

    /// Decode a message body of the given type. Extension lists carrying a
    /// type twice are rejected. A ServerKeyExchange is read as ECDHE.
    pub fn decode(msg_type: HandshakeType, body: &[u8]) -> Result<Self, TlsError> {
        Self::decode_with(msg_type, body, KeyExchangeAlg::Ecdhe)
    }

    /// Like [`decode`](Self::decode), reading a ServerKeyExchange with the
    /// layout of `kx`.
    pub fn decode_with(
        msg_type: HandshakeType,
        body: &[u8],
        kx: KeyExchangeAlg,
    ) -> Result<Self, TlsError> {
        let msg = match msg_type {
            HandshakeType::HelloRequest => {
                codec12::decode_empty("HelloRequest", body)?;
                HandshakeMessage::HelloRequest
            }
            HandshakeType::ServerHelloDone => {
                codec12::decode_empty("ServerHelloDone", body)?;
                HandshakeMessage::ServerHelloDone
            }
            HandshakeType::ClientHello => {
                HandshakeMessage::ClientHello(codec::decode_client_hello(body)?)
            }
            HandshakeType::ServerHello => {
                HandshakeMessage::ServerHello(codec::decode_server_hello(body)?)
            }
            HandshakeType::NewSessionTicket => {
                HandshakeMessage::NewSessionTicket(codec::decode_new_session_ticket(body)?)
            }
            HandshakeType::EncryptedExtensions => {
                HandshakeMessage::EncryptedExtensions(codec::decode_encrypted_extensions(body)?)
            }
            HandshakeType::Certificate => {
                HandshakeMessage::Certificate(codec::decode_certificate(body)?)
            }
            HandshakeType::ServerKeyExchange => {
                HandshakeMessage::ServerKeyExchange(codec12::decode_server_key_exchange(body, kx)?)
            }
            HandshakeType::CertificateRequest => {
                HandshakeMessage::CertificateRequest(codec12::decode_certificate_request(body)?)
            }
            HandshakeType::CertificateVerify => {
                HandshakeMessage::CertificateVerify(codec12::decode_certificate_verify(body)?)
            }
            HandshakeType::ClientKeyExchange => {
                HandshakeMessage::ClientKeyExchange(codec12::decode_client_key_exchange(body)?)
            }
            HandshakeType::Finished => HandshakeMessage::Finished(codec::decode_finished(body)?),
        };
        if let Some(exts) = msg.extensions() {
            check_no_duplicates(exts)?;
        }
        tracing::trace!(msg_type = %msg_type, len = body.len(), "decoded handshake message");
        Ok(msg)
    }

    /// Decode exactly one framed message; trailing bytes are rejected.
    pub fn decode_framed(data: &[u8]) -> Result<Self, TlsError> {
        Self::decode_framed_with(data, KeyExchangeAlg::Ecdhe)
    }

    pub fn decode_framed_with(data: &[u8], kx: KeyExchangeAlg) -> Result<Self, TlsError> {
        let (msg_type, body, total) = parse_handshake_header(data)?;
        if total != data.len() {
            return Err(TlsError::MalformedMessage(format!(
                "{msg_type}: {} bytes after message",
                data.len() - total
            )));
        }
        Self::decode_with(msg_type, body, kx)
    }

    /// Extension list of the messages that carry one.
    pub fn extensions(&self) -> Option<&[crate::extensions::Extension]> {
        match self {
            HandshakeMessage::ClientHello(m) => Some(&m.extensions),
            HandshakeMessage::ServerHello(m) => Some(&m.extensions),
            HandshakeMessage::EncryptedExtensions(m) => Some(&m.extensions),
            HandshakeMessage::NewSessionTicket(m) => Some(&m.extensions),
            _ => None,
        }
    }

    /// Semantic validity beyond what decoding enforces.
    pub fn is_valid(&self) -> bool {
        match self {
            HandshakeMessage::HelloRequest | HandshakeMessage::ServerHelloDone => true,
            HandshakeMessage::EncryptedExtensions(m) => m.is_valid(),
            HandshakeMessage::ClientHello(m) => m.is_valid(),
            HandshakeMessage::ServerHello(m) => m.is_valid(),
            HandshakeMessage::NewSessionTicket(m) => m.is_valid(),
            HandshakeMessage::Certificate(m) => m.is_valid(),
            HandshakeMessage::ServerKeyExchange(m) => m.is_valid(),
            HandshakeMessage::CertificateRequest(m) => m.is_valid(),
            HandshakeMessage::CertificateVerify(m) => m.is_valid(),
            HandshakeMessage::ClientKeyExchange(m) => m.is_valid(),
            HandshakeMessage::Finished(m) => m.is_valid(),
        }
    }

    pub fn validate(&self) -> Result<(), TlsError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(TlsError::ValidationFailure(format!(
                "invalid {}",
                self.msg_type()
            )))
        }
    }
}
