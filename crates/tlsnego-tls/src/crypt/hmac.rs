//! HMAC (RFC 2104) over the runtime-selected key schedule hash, backed by
//! the `hmac` crate.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};
use tlsnego_crypto::hash::new_digest;
use tlsnego_types::{HashAlgId, TlsError};

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;

/// Keyed HMAC state, prepared once and cloned for each MAC.
///
/// Reused across the iterations of P_hash so the key is only processed
/// once per call.
#[derive(Clone)]
pub(crate) enum HmacKey {
    Sha256(HmacSha256),
    Sha384(HmacSha384),
}

impl HmacKey {
    pub(crate) fn new(alg: HashAlgId, key: &[u8]) -> Result<Self, TlsError> {
        // HMAC accepts keys of any length; the error arm is unreachable.
        let bad_key = |_| TlsError::DerivationError("invalid HMAC key".into());
        Ok(match alg {
            HashAlgId::Sha256 => Self::Sha256(HmacSha256::new_from_slice(key).map_err(bad_key)?),
            HashAlgId::Sha384 => Self::Sha384(HmacSha384::new_from_slice(key).map_err(bad_key)?),
        })
    }

    /// MAC the concatenation of `parts`.
    pub(crate) fn sign(&self, parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
        Ok(match self.clone() {
            Self::Sha256(mut mac) => {
                parts.iter().for_each(|p| mac.update(p));
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha384(mut mac) => {
                parts.iter().for_each(|p| mac.update(p));
                mac.finalize().into_bytes().to_vec()
            }
        })
    }
}

/// One-shot HMAC: `HMAC(key, data)`.
pub fn hmac(alg: HashAlgId, key: &[u8], data: &[u8]) -> Result<Vec<u8>, TlsError> {
    HmacKey::new(alg, key)?.sign(&[data])
}

/// Hash the concatenation of `parts`.
pub fn digest(alg: HashAlgId, parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
    let mut ctx = new_digest(alg);
    for part in parts {
        ctx.update(part)?;
    }
    let mut out = vec![0u8; alg.output_size()];
    ctx.finish(&mut out)?;
    Ok(out)
}
