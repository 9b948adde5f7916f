//! Server certificate selection by the peer's signature_algorithms.

use std::fmt;

use crate::crypt::SignatureScheme;
use tlsnego_types::TlsError;
use zeroize::Zeroizing;

/// Public-key algorithm of a certificate's subject key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKeyType {
    Rsa,
    Ecdsa,
    EdDsa,
}

/// A certificate chain with its signing key.
#[derive(Clone)]
pub struct CertifiedKey {
    /// DER, leaf first.
    pub chain: Vec<Vec<u8>>,
    /// In the crypto provider's encoding.
    pub private_key: Zeroizing<Vec<u8>>,
    pub key_type: CertificateKeyType,
    /// Scheme the leaf certificate is signed with.
    pub signature_scheme: SignatureScheme,
}

impl CertifiedKey {
    pub fn new(
        chain: Vec<Vec<u8>>,
        private_key: Vec<u8>,
        key_type: CertificateKeyType,
        signature_scheme: SignatureScheme,
    ) -> Self {
        Self {
            chain,
            private_key: Zeroizing::new(private_key),
            key_type,
            signature_scheme,
        }
    }

    /// The leaf certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.chain.first().map(Vec::as_slice)
    }
}

impl fmt::Debug for CertifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertifiedKey")
            .field("chain_len", &self.chain.len())
            .field("key_type", &self.key_type)
            .field("signature_scheme", &self.signature_scheme)
            .field("private_key", &format!("[{} bytes]", self.private_key.len()))
            .finish()
    }
}

const RSA_PSS_RSAE: [SignatureScheme; 3] = [
    SignatureScheme::RSA_PSS_RSAE_SHA256,
    SignatureScheme::RSA_PSS_RSAE_SHA384,
    SignatureScheme::RSA_PSS_RSAE_SHA512,
];

/// Pick the first configured chain whose signature scheme the peer
/// accepts. A peer that sent no signature_algorithms gets the first chain.
/// An RSA key also signs RSA-PSS, so any RSA chain serves a peer that only
/// lists rsa_pss_rsae schemes.
pub fn select_certificate<'a>(
    certificates: &'a [CertifiedKey],
    peer_schemes: &[SignatureScheme],
) -> Result<&'a CertifiedKey, TlsError> {
    let no_match =
        || TlsError::ValidationFailure("no certificate matches the peer's signature algorithms".into());
    if peer_schemes.is_empty() {
        return certificates.first().ok_or_else(no_match);
    }
    let chosen = certificates
        .iter()
        .find(|c| peer_schemes.contains(&c.signature_scheme))
        .or_else(|| {
            if peer_schemes.iter().any(|s| RSA_PSS_RSAE.contains(s)) {
                certificates
                    .iter()
                    .find(|c| c.key_type == CertificateKeyType::Rsa)
            } else {
                None
            }
        })
        .ok_or_else(no_match)?;
    tracing::debug!(
        scheme = format_args!("0x{:04x}", chosen.signature_scheme.0),
        key_type = ?chosen.key_type,
        "selected server certificate"
    );
    Ok(chosen)
}
