//! TLS 1.2 PRF (RFC 5246 §5).
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                         HMAC_hash(secret, A(2) + seed) || ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```

use super::hmac::HmacKey;
use tlsnego_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

/// Derive `output_len` bytes from `secret`, `label` and `seed`.
pub fn prf(
    alg: HashAlgId,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);
    p_hash(alg, secret, &label_seed, output_len)
}

fn p_hash(
    alg: HashAlgId,
    secret: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let key = HmacKey::new(alg, secret)?;
    let mut result = Vec::with_capacity(output_len + alg.output_size());
    let mut a = seed.to_vec();

    while result.len() < output_len {
        let next = key.sign(&[&a])?;
        a.zeroize();
        a = next;
        let block = key.sign(&[&a, seed])?;
        result.extend_from_slice(&block);
    }
    a.zeroize();

    result.truncate(output_len);
    Ok(result)
}
