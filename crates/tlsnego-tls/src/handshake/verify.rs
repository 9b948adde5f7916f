//! Handshake signatures: TLS 1.3 CertificateVerify (RFC 8446 §4.4.3) and
//! TLS 1.2 ServerKeyExchange / CertificateVerify.
//!
//! The signed content is built here; signing and verification are done by
//! the crypto provider. Public keys are the provider's opaque encoding.

use super::codec12::{
    build_ske_signed_data, CertificateVerifyMsg, ServerKeyExchange, ServerKeyExchangeParams,
};
use crate::TlsRole;
use tlsnego_crypto::provider::CryptoProvider;
use tlsnego_types::{SignatureScheme, TlsError};

const SERVER_CONTEXT: &[u8] = b"TLS 1.3, server CertificateVerify";
const CLIENT_CONTEXT: &[u8] = b"TLS 1.3, client CertificateVerify";

/// 64 spaces || context_string || 0x00 || transcript_hash
pub fn build_verify_content(transcript_hash: &[u8], signer: TlsRole) -> Vec<u8> {
    let context = match signer {
        TlsRole::Server => SERVER_CONTEXT,
        TlsRole::Client => CLIENT_CONTEXT,
    };
    let mut content = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    content.extend_from_slice(&[0x20u8; 64]);
    content.extend_from_slice(context);
    content.push(0x00);
    content.extend_from_slice(transcript_hash);
    content
}

fn check_verified(ok: bool, what: &str) -> Result<(), TlsError> {
    if ok {
        Ok(())
    } else {
        Err(TlsError::ValidationFailure(format!(
            "{what} signature verification failed"
        )))
    }
}

/// Produce a TLS 1.3 CertificateVerify for `signer`.
pub fn sign_certificate_verify(
    provider: &dyn CryptoProvider,
    scheme: SignatureScheme,
    private_key: &[u8],
    transcript_hash: &[u8],
    signer: TlsRole,
) -> Result<CertificateVerifyMsg, TlsError> {
    if !scheme.allowed_in_tls13() {
        return Err(TlsError::ValidationFailure(format!(
            "signature scheme 0x{:04x} not allowed in TLS 1.3",
            scheme.0
        )));
    }
    let content = build_verify_content(transcript_hash, signer);
    let signature = provider.sign(&content, private_key, scheme)?;
    Ok(CertificateVerifyMsg {
        algorithm: scheme,
        signature,
    })
}

/// Check a TLS 1.3 CertificateVerify sent by `signer`.
pub fn verify_certificate_verify(
    provider: &dyn CryptoProvider,
    public_key: &[u8],
    cv: &CertificateVerifyMsg,
    transcript_hash: &[u8],
    signer: TlsRole,
) -> Result<(), TlsError> {
    if !cv.algorithm.allowed_in_tls13() {
        return Err(TlsError::ValidationFailure(format!(
            "signature scheme 0x{:04x} not allowed in TLS 1.3",
            cv.algorithm.0
        )));
    }
    let content = build_verify_content(transcript_hash, signer);
    let ok = provider.verify(&content, &cv.signature, public_key, cv.algorithm)?;
    check_verified(ok, "CertificateVerify")
}

/// Build and sign an ECDHE or DHE ServerKeyExchange.
pub fn sign_server_key_exchange(
    provider: &dyn CryptoProvider,
    scheme: SignatureScheme,
    private_key: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    params: ServerKeyExchangeParams,
) -> Result<ServerKeyExchange, TlsError> {
    if matches!(params, ServerKeyExchangeParams::PskIdentityHint(_)) {
        return Err(TlsError::ProtocolViolation(
            "PSK ServerKeyExchange is not signed".into(),
        ));
    }
    let signed = build_ske_signed_data(client_random, server_random, &params.to_bytes());
    let signature = provider.sign(&signed, private_key, scheme)?;
    Ok(ServerKeyExchange {
        params,
        signature_algorithm: scheme,
        signature,
    })
}

/// Check the ServerKeyExchange signature over both randoms and the params.
pub fn verify_server_key_exchange(
    provider: &dyn CryptoProvider,
    public_key: &[u8],
    ske: &ServerKeyExchange,
    client_random: &[u8],
    server_random: &[u8],
) -> Result<(), TlsError> {
    if !ske.is_signed() {
        return Err(TlsError::ValidationFailure(
            "ServerKeyExchange carries no signature".into(),
        ));
    }
    let signed = build_ske_signed_data(client_random, server_random, &ske.params_bytes());
    let ok = provider.verify(&signed, &ske.signature, public_key, ske.signature_algorithm)?;
    check_verified(ok, "ServerKeyExchange")
}

/// TLS 1.2 client CertificateVerify (RFC 5246 §7.4.8).
///
/// `handshake_messages` is every handshake message from ClientHello up to
/// this one, concatenated; the signature scheme hashes it.
pub fn sign_tls12_certificate_verify(
    provider: &dyn CryptoProvider,
    scheme: SignatureScheme,
    private_key: &[u8],
    handshake_messages: &[u8],
) -> Result<CertificateVerifyMsg, TlsError> {
    let signature = provider.sign(handshake_messages, private_key, scheme)?;
    Ok(CertificateVerifyMsg {
        algorithm: scheme,
        signature,
    })
}

pub fn verify_tls12_certificate_verify(
    provider: &dyn CryptoProvider,
    public_key: &[u8],
    cv: &CertificateVerifyMsg,
    handshake_messages: &[u8],
) -> Result<(), TlsError> {
    let ok = provider.verify(handshake_messages, &cv.signature, public_key, cv.algorithm)?;
    check_verified(ok, "CertificateVerify")
}
