//! TLS 1.3 HKDF primitives (RFC 5869, RFC 8446 Section 7.1).
//!
//! Extract and Expand come from the `hkdf` crate; the TLS label encoding
//! and Derive-Secret are built on top.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384};
use tlsnego_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

const LABEL_PREFIX: &[u8] = b"tls13 ";

/// HKDF-Extract(salt, IKM) -> PRK.
///
/// An empty salt means `Hash.length` zero bytes, which `Hkdf` applies for
/// `None`.
pub fn hkdf_extract(alg: HashAlgId, salt: &[u8], ikm: &[u8]) -> Result<Vec<u8>, TlsError> {
    let salt = (!salt.is_empty()).then_some(salt);
    Ok(match alg {
        HashAlgId::Sha256 => Hkdf::<Sha256>::extract(salt, ikm).0.to_vec(),
        HashAlgId::Sha384 => Hkdf::<Sha384>::extract(salt, ikm).0.to_vec(),
    })
}

/// HKDF-Expand(PRK, info, length) -> OKM.
///
/// Fails if `length` exceeds 255 * Hash.length or the PRK is shorter than
/// Hash.length.
pub fn hkdf_expand(
    alg: HashAlgId,
    prk: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Vec<u8>, TlsError> {
    let hash_len = alg.output_size();
    if length > 255 * hash_len {
        return Err(TlsError::DerivationError(format!(
            "HKDF-Expand: {length} bytes exceeds 255 * {hash_len}"
        )));
    }
    let mut okm = vec![0u8; length];
    let expanded = match alg {
        HashAlgId::Sha256 => Hkdf::<Sha256>::from_prk(prk)
            .map_err(|_| short_prk(prk.len()))?
            .expand(info, &mut okm),
        HashAlgId::Sha384 => Hkdf::<Sha384>::from_prk(prk)
            .map_err(|_| short_prk(prk.len()))?
            .expand(info, &mut okm),
    };
    if expanded.is_err() {
        okm.zeroize();
        return Err(TlsError::DerivationError(format!(
            "HKDF-Expand: cannot produce {length} bytes"
        )));
    }
    Ok(okm)
}

fn short_prk(len: usize) -> TlsError {
    TlsError::DerivationError(format!("HKDF-Expand: PRK of {len} bytes is too short"))
}

/// Encode the HkdfLabel structure:
///
/// ```text
/// struct {
///     uint16 length;
///     opaque label<7..255>;   // "tls13 " + label
///     opaque context<0..255>;
/// } HkdfLabel;
/// ```
fn encode_hkdf_label(length: usize, label: &[u8], context: &[u8]) -> Result<Vec<u8>, TlsError> {
    let full_label_len = LABEL_PREFIX.len() + label.len();
    if length > u16::MAX as usize || full_label_len > 255 || context.len() > 255 {
        return Err(TlsError::DerivationError(
            "HkdfLabel: field exceeds its length prefix".into(),
        ));
    }
    let mut buf = Vec::with_capacity(2 + 1 + full_label_len + 1 + context.len());
    buf.extend_from_slice(&(length as u16).to_be_bytes());
    buf.push(full_label_len as u8);
    buf.extend_from_slice(LABEL_PREFIX);
    buf.extend_from_slice(label);
    buf.push(context.len() as u8);
    buf.extend_from_slice(context);
    Ok(buf)
}

/// HKDF-Expand-Label(Secret, Label, Context, Length).
pub fn hkdf_expand_label(
    alg: HashAlgId,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>, TlsError> {
    let hkdf_label = encode_hkdf_label(length, label, context)?;
    hkdf_expand(alg, secret, &hkdf_label, length)
}

/// Derive-Secret(Secret, Label, Messages).
///
/// `transcript_hash` is the already-computed `Transcript-Hash(Messages)`;
/// the output is `Hash.length` bytes.
pub fn derive_secret(
    alg: HashAlgId,
    secret: &[u8],
    label: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    if transcript_hash.len() != alg.output_size() {
        return Err(TlsError::DerivationError(format!(
            "Derive-Secret: transcript hash is {} bytes, expected {}",
            transcript_hash.len(),
            alg.output_size()
        )));
    }
    hkdf_expand_label(alg, secret, label, transcript_hash, alg.output_size())
}
