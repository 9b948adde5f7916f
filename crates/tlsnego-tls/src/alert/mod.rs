//! TLS alerts raised by the negotiation core.

use tlsnego_types::TlsError;

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes (RFC 8446 Section 6) a handshake can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    HandshakeFailure = 40,
    BadCertificate = 42,
    IllegalParameter = 47,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InternalError = 80,
    MissingExtension = 109,
    UnsupportedExtension = 110,
    UnknownPskIdentity = 115,
}

impl AlertLevel {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

impl AlertDescription {
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            40 => Ok(AlertDescription::HandshakeFailure),
            42 => Ok(AlertDescription::BadCertificate),
            47 => Ok(AlertDescription::IllegalParameter),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            70 => Ok(AlertDescription::ProtocolVersion),
            80 => Ok(AlertDescription::InternalError),
            109 => Ok(AlertDescription::MissingExtension),
            110 => Ok(AlertDescription::UnsupportedExtension),
            115 => Ok(AlertDescription::UnknownPskIdentity),
            _ => Err(v),
        }
    }
}

/// A TLS alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    /// The alert sent to the peer when a handshake fails with `err`.
    ///
    /// Every failure collapses to a fatal `handshake_failure`, so a peer
    /// cannot tell a bad signature from a transcript mismatch or a decode
    /// error.
    pub fn for_error(err: &TlsError) -> Self {
        tracing::debug!(error = %err, "handshake aborted");
        Alert {
            level: AlertLevel::Fatal,
            description: AlertDescription::HandshakeFailure,
        }
    }

    /// Two-byte alert record payload.
    pub fn encode(&self) -> [u8; 2] {
        [self.level as u8, self.description as u8]
    }

    pub fn decode(data: &[u8]) -> Result<Self, TlsError> {
        match data {
            [level, description] => Ok(Alert {
                level: AlertLevel::from_u8(*level)
                    .map_err(|v| TlsError::MalformedMessage(format!("alert level {v}")))?,
                description: AlertDescription::from_u8(*description).map_err(|v| {
                    TlsError::MalformedMessage(format!("alert description {v}"))
                })?,
            }),
            _ => Err(TlsError::MalformedMessage(format!(
                "alert must be 2 bytes, got {}",
                data.len()
            ))),
        }
    }
}
