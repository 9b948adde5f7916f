//! Record-protection key and IV from a TLS 1.3 traffic secret.

use super::hkdf::hkdf_expand_label;
use super::CipherSuiteParams;
use tlsnego_types::TlsError;
use zeroize::Zeroize;

/// AEAD key and IV handed to the record layer.
pub struct TrafficKeys {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

impl Drop for TrafficKeys {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for TrafficKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TrafficKeys {{ key: <{} bytes>, iv: <{} bytes> }}",
            self.key.len(),
            self.iv.len()
        )
    }
}

impl TrafficKeys {
    /// ```text
    /// key = HKDF-Expand-Label(secret, "key", "", key_length)
    /// iv  = HKDF-Expand-Label(secret, "iv", "", iv_length)
    /// ```
    pub fn derive(params: &CipherSuiteParams, traffic_secret: &[u8]) -> Result<Self, TlsError> {
        if traffic_secret.len() != params.hash_len {
            return Err(TlsError::DerivationError(format!(
                "traffic secret is {} bytes, suite hash is {}",
                traffic_secret.len(),
                params.hash_len
            )));
        }
        let alg = params.hash_alg();
        let key = hkdf_expand_label(alg, traffic_secret, b"key", b"", params.key_len)?;
        let iv = hkdf_expand_label(alg, traffic_secret, b"iv", b"", params.iv_len)?;
        Ok(TrafficKeys { key, iv })
    }
}
