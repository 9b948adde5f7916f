//! Handshake configuration with builder pattern.

mod certificate;

pub use certificate::{select_certificate, CertificateKeyType, CertifiedKey};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::crypt::{is_tls12_suite, is_tls13_suite, NamedGroup, SignatureScheme};
use crate::extensions::ExtensionType;
use crate::handshake::extensions_codec::PskKeyExchangeMode;
use crate::handshake::{ModeFlags, ProtocolVariant};
use crate::{CipherSuite, TlsRole, TlsVersion};
use tlsnego_types::TlsError;
use zeroize::Zeroizing;

/// Receives one NSS key log line per exported secret.
pub type KeyLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Default session ticket lifetime (RFC 8446 allows up to 7 days).
pub const DEFAULT_TICKET_LIFETIME: Duration = Duration::from_secs(7200);

/// Handshake configuration.
#[derive(Clone)]
pub struct HandshakeConfig {
    /// The role (client or server).
    pub role: TlsRole,
    /// Minimum supported TLS version.
    pub min_version: TlsVersion,
    /// Maximum supported TLS version.
    pub max_version: TlsVersion,
    /// Enabled cipher suites (in preference order).
    pub cipher_suites: Vec<CipherSuite>,
    /// Supported named groups for key exchange (in preference order).
    pub supported_groups: Vec<NamedGroup>,
    /// Supported signature algorithms (in preference order).
    pub signature_algorithms: Vec<SignatureScheme>,
    /// Extensions this endpoint sends and accepts.
    pub enabled_extensions: BTreeSet<ExtensionType>,
    /// TLS 1.3 PSK handshake (resumption or external PSK).
    pub psk_mode: bool,
    /// Server requests / client expects a client certificate.
    pub client_certificate_required: bool,
    /// TLS 1.3 0-RTT.
    pub early_data_enabled: bool,
    /// Advertised in NewSessionTicket when early data is enabled.
    pub max_early_data_size: u32,
    /// Lifetime of issued session tickets.
    pub ticket_lifetime: Duration,
    /// PSK key-exchange modes (in preference order).
    pub psk_ke_modes: Vec<PskKeyExchangeMode>,
    /// Own certificate chain (DER, leaf first).
    pub certificate_chain: Vec<Vec<u8>>,
    /// Own signing key, in the crypto provider's encoding.
    pub private_key: Option<Zeroizing<Vec<u8>>>,
    /// Server chains to choose from by the client's signature_algorithms.
    pub certificates: Vec<CertifiedKey>,
    /// NSS key log sink (SSLKEYLOGFILE format).
    pub key_log_callback: Option<KeyLogCallback>,
}

impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("role", &self.role)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("supported_groups", &self.supported_groups)
            .field("psk_mode", &self.psk_mode)
            .field("client_certificate_required", &self.client_certificate_required)
            .field("early_data_enabled", &self.early_data_enabled)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|k| format!("[{} bytes]", k.len())),
            )
            .field("certificates", &self.certificates)
            .field(
                "key_log_callback",
                &self.key_log_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl HandshakeConfig {
    /// Create a builder for handshake configuration.
    pub fn builder() -> HandshakeConfigBuilder {
        HandshakeConfigBuilder::default()
    }

    /// State-machine variant for this role at `version`.
    pub fn variant(&self, version: TlsVersion) -> ProtocolVariant {
        ProtocolVariant::new(self.role, version)
    }

    pub fn mode_flags(&self) -> ModeFlags {
        ModeFlags {
            psk_mode: self.psk_mode,
            client_certificate_required: self.client_certificate_required,
            early_data_enabled: self.early_data_enabled,
        }
    }

    pub fn is_extension_enabled(&self, ty: ExtensionType) -> bool {
        self.enabled_extensions.contains(&ty)
    }

    pub fn supports_version(&self, version: TlsVersion) -> bool {
        self.min_version <= version && version <= self.max_version
    }

    /// Enabled versions as wire values, highest first.
    pub fn supported_wire_versions(&self) -> Vec<u16> {
        [TlsVersion::Tls13, TlsVersion::Tls12]
            .into_iter()
            .filter(|v| self.supports_version(*v))
            .map(TlsVersion::wire_version)
            .collect()
    }

    /// Highest version enabled here and offered by the peer.
    pub fn negotiate_version(&self, peer_versions: &[u16]) -> Result<TlsVersion, TlsError> {
        let chosen = peer_versions
            .iter()
            .filter_map(|v| TlsVersion::from_wire(*v))
            .filter(|v| self.supports_version(*v))
            .max()
            .ok_or(TlsError::UnsupportedVersion)?;
        tracing::debug!(version = chosen.name(), "negotiated protocol version");
        Ok(chosen)
    }

    /// First suite in local preference order that the peer offered and that
    /// belongs to `version`.
    pub fn negotiate_cipher_suite(
        &self,
        offered: &[CipherSuite],
        version: TlsVersion,
    ) -> Result<CipherSuite, TlsError> {
        let fits = |s: CipherSuite| match version {
            TlsVersion::Tls13 => is_tls13_suite(s),
            TlsVersion::Tls12 => is_tls12_suite(s),
        };
        let suite = self
            .cipher_suites
            .iter()
            .copied()
            .find(|s| fits(*s) && offered.contains(s))
            .ok_or(TlsError::NoSharedCipherSuite)?;
        tracing::debug!(suite = format_args!("0x{:04x}", suite.0), "negotiated cipher suite");
        Ok(suite)
    }

    /// First local group the peer also supports.
    pub fn negotiate_group(&self, peer_groups: &[NamedGroup]) -> Result<NamedGroup, TlsError> {
        self.supported_groups
            .iter()
            .copied()
            .find(|g| peer_groups.contains(g))
            .ok_or_else(|| TlsError::ValidationFailure("no shared named group".into()))
    }

    /// Signature scheme to sign with: first local scheme the peer accepts
    /// that is usable at `version`.
    pub fn select_signature_scheme(
        &self,
        peer_schemes: &[SignatureScheme],
        version: TlsVersion,
    ) -> Result<SignatureScheme, TlsError> {
        self.signature_algorithms
            .iter()
            .copied()
            .filter(|s| version == TlsVersion::Tls12 || s.allowed_in_tls13())
            .find(|s| peer_schemes.contains(s))
            .ok_or_else(|| TlsError::ValidationFailure("no shared signature scheme".into()))
    }

    /// Server chain for a client that sent `peer_schemes`.
    pub fn select_certificate(
        &self,
        peer_schemes: &[SignatureScheme],
    ) -> Result<&CertifiedKey, TlsError> {
        select_certificate(&self.certificates, peer_schemes)
    }
}

/// Builder for `HandshakeConfig`.
pub struct HandshakeConfigBuilder {
    config: HandshakeConfig,
}

impl Default for HandshakeConfigBuilder {
    fn default() -> Self {
        let enabled_extensions = [
            ExtensionType::SERVER_NAME,
            ExtensionType::SUPPORTED_GROUPS,
            ExtensionType::EC_POINT_FORMATS,
            ExtensionType::SIGNATURE_ALGORITHMS,
            ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
            ExtensionType::KEY_SHARE,
            ExtensionType::SUPPORTED_VERSIONS,
        ]
        .into_iter()
        .collect();

        Self {
            config: HandshakeConfig {
                role: TlsRole::Client,
                min_version: TlsVersion::Tls12,
                max_version: TlsVersion::Tls13,
                cipher_suites: vec![
                    CipherSuite::TLS_AES_128_GCM_SHA256,
                    CipherSuite::TLS_AES_256_GCM_SHA384,
                    CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
                    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                    CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                    CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
                    CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
                    CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
                ],
                supported_groups: vec![
                    NamedGroup::X25519,
                    NamedGroup::SECP256R1,
                    NamedGroup::SECP384R1,
                ],
                signature_algorithms: vec![
                    SignatureScheme::ECDSA_SECP256R1_SHA256,
                    SignatureScheme::RSA_PSS_RSAE_SHA256,
                    SignatureScheme::ED25519,
                    SignatureScheme::ECDSA_SECP384R1_SHA384,
                    SignatureScheme::RSA_PKCS1_SHA256,
                ],
                enabled_extensions,
                psk_mode: false,
                client_certificate_required: false,
                early_data_enabled: false,
                max_early_data_size: 0,
                ticket_lifetime: DEFAULT_TICKET_LIFETIME,
                psk_ke_modes: vec![PskKeyExchangeMode::PskDheKe],
                certificate_chain: Vec::new(),
                private_key: None,
                certificates: Vec::new(),
                key_log_callback: None,
            },
        }
    }
}

impl fmt::Debug for HandshakeConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfigBuilder")
            .field("role", &self.config.role)
            .field("cipher_suites", &self.config.cipher_suites)
            .finish_non_exhaustive()
    }
}

impl HandshakeConfigBuilder {
    pub fn role(mut self, role: TlsRole) -> Self {
        self.config.role = role;
        self
    }

    pub fn min_version(mut self, version: TlsVersion) -> Self {
        self.config.min_version = version;
        self
    }

    pub fn max_version(mut self, version: TlsVersion) -> Self {
        self.config.max_version = version;
        self
    }

    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    pub fn supported_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    pub fn signature_algorithms(mut self, schemes: &[SignatureScheme]) -> Self {
        self.config.signature_algorithms = schemes.to_vec();
        self
    }

    pub fn enable_extension(mut self, ty: ExtensionType) -> Self {
        self.config.enabled_extensions.insert(ty);
        self
    }

    pub fn disable_extension(mut self, ty: ExtensionType) -> Self {
        self.config.enabled_extensions.remove(&ty);
        self
    }

    /// Turns on TLS 1.3 PSK mode and the pre_shared_key extension.
    pub fn psk_mode(mut self, enabled: bool) -> Self {
        self.config.psk_mode = enabled;
        if enabled {
            self.config
                .enabled_extensions
                .insert(ExtensionType::PRE_SHARED_KEY);
            self.config
                .enabled_extensions
                .insert(ExtensionType::PSK_KEY_EXCHANGE_MODES);
        }
        self
    }

    pub fn client_certificate_required(mut self, required: bool) -> Self {
        self.config.client_certificate_required = required;
        self
    }

    /// Enables 0-RTT with the given max_early_data_size.
    pub fn early_data(mut self, max_early_data_size: u32) -> Self {
        self.config.early_data_enabled = max_early_data_size > 0;
        self.config.max_early_data_size = max_early_data_size;
        if max_early_data_size > 0 {
            self.config.enabled_extensions.insert(ExtensionType::EARLY_DATA);
        }
        self
    }

    pub fn ticket_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.ticket_lifetime = lifetime;
        self
    }

    pub fn psk_ke_modes(mut self, modes: &[PskKeyExchangeMode]) -> Self {
        self.config.psk_ke_modes = modes.to_vec();
        self
    }

    pub fn certificate_chain(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.config.certificate_chain = certs;
        self
    }

    pub fn private_key(mut self, key: Vec<u8>) -> Self {
        self.config.private_key = Some(Zeroizing::new(key));
        self
    }

    /// Add a server chain; earlier chains are preferred.
    pub fn add_certificate(mut self, cert: CertifiedKey) -> Self {
        self.config.certificates.push(cert);
        self
    }

    pub fn key_log(mut self, cb: KeyLogCallback) -> Self {
        self.config.key_log_callback = Some(cb);
        self
    }

    pub fn build(self) -> HandshakeConfig {
        self.config
    }
}
