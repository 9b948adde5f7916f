//! TLS extension framework: type codes, raw extensions and the message
//! context an extension travels in.

use tlsnego_types::TlsError;

/// TLS extension type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: Self = Self(0);
    pub const STATUS_REQUEST: Self = Self(5);
    pub const SUPPORTED_GROUPS: Self = Self(10);
    pub const EC_POINT_FORMATS: Self = Self(11);
    pub const SIGNATURE_ALGORITHMS: Self = Self(13);
    pub const APPLICATION_LAYER_PROTOCOL_NEGOTIATION: Self = Self(16);
    pub const SIGNED_CERTIFICATE_TIMESTAMP: Self = Self(18);
    pub const EXTENDED_MASTER_SECRET: Self = Self(23);
    pub const SESSION_TICKET: Self = Self(35);
    pub const PRE_SHARED_KEY: Self = Self(41);
    pub const EARLY_DATA: Self = Self(42);
    pub const SUPPORTED_VERSIONS: Self = Self(43);
    pub const PSK_KEY_EXCHANGE_MODES: Self = Self(45);
    pub const POST_HANDSHAKE_AUTH: Self = Self(49);
    pub const KEY_SHARE: Self = Self(51);
    pub const RENEGOTIATION_INFO: Self = Self(0xFF01);

    /// Registry name, as used for enabling extensions in configuration.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::SERVER_NAME => "server_name",
            Self::STATUS_REQUEST => "status_request",
            Self::SUPPORTED_GROUPS => "supported_groups",
            Self::EC_POINT_FORMATS => "ec_point_formats",
            Self::SIGNATURE_ALGORITHMS => "signature_algorithms",
            Self::APPLICATION_LAYER_PROTOCOL_NEGOTIATION => {
                "application_layer_protocol_negotiation"
            }
            Self::SIGNED_CERTIFICATE_TIMESTAMP => "signed_certificate_timestamp",
            Self::EXTENDED_MASTER_SECRET => "extended_master_secret",
            Self::SESSION_TICKET => "session_ticket",
            Self::PRE_SHARED_KEY => "pre_shared_key",
            Self::EARLY_DATA => "early_data",
            Self::SUPPORTED_VERSIONS => "supported_versions",
            Self::PSK_KEY_EXCHANGE_MODES => "psk_key_exchange_modes",
            Self::POST_HANDSHAKE_AUTH => "post_handshake_auth",
            Self::KEY_SHARE => "key_share",
            Self::RENEGOTIATION_INFO => "renegotiation_info",
            _ => return None,
        };
        Some(name)
    }
}

/// A raw TLS extension: type plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: ExtensionType,
    pub data: Vec<u8>,
}

impl Extension {
    pub fn new(extension_type: ExtensionType, data: Vec<u8>) -> Self {
        Self {
            extension_type,
            data,
        }
    }
}

/// The handshake message an extension is carried in.
///
/// Several extensions have a different body shape per message
/// (key_share, pre_shared_key, supported_versions, early_data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionContext {
    ClientHello,
    ServerHello,
    HelloRetryRequest,
    EncryptedExtensions,
    CertificateRequest,
    NewSessionTicket,
}

/// First extension of type `ty` in `exts`.
pub fn find_extension(exts: &[Extension], ty: ExtensionType) -> Option<&Extension> {
    exts.iter().find(|e| e.extension_type == ty)
}

/// Reject a list that carries the same extension type twice (RFC 8446 §4.2).
pub fn check_no_duplicates(exts: &[Extension]) -> Result<(), TlsError> {
    for (i, ext) in exts.iter().enumerate() {
        if exts[..i]
            .iter()
            .any(|prev| prev.extension_type == ext.extension_type)
        {
            return Err(TlsError::MalformedMessage(format!(
                "duplicate extension 0x{:04x}",
                ext.extension_type.0
            )));
        }
    }
    Ok(())
}
