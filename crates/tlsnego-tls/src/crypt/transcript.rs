//! Running transcript hash over handshake messages.

use tlsnego_crypto::provider::Digest;
use tlsnego_crypto::sha2::{Sha256, Sha384};
use tlsnego_types::{HashAlgId, TlsError};

/// Handshake type of the synthetic `message_hash` message (RFC 8446 §4.4.1).
const MESSAGE_HASH_TYPE: u8 = 254;

#[derive(Clone)]
enum RunningDigest {
    Sha256(Sha256),
    Sha384(Sha384),
}

impl RunningDigest {
    fn new(alg: HashAlgId) -> Self {
        match alg {
            HashAlgId::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgId::Sha384 => Self::Sha384(Sha384::new()),
        }
    }

    fn as_digest(&mut self) -> &mut dyn Digest {
        match self {
            Self::Sha256(d) => d,
            Self::Sha384(d) => d,
        }
    }
}

/// Hash over the exact encoded bytes (header and body) of every handshake
/// message, in wire order.
///
/// `current_hash()` finalizes a clone of the running state, so the
/// transcript keeps accepting messages afterwards.
#[derive(Clone)]
pub struct TranscriptHash {
    alg: HashAlgId,
    running: RunningDigest,
    message_count: usize,
}

impl std::fmt::Debug for TranscriptHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptHash")
            .field("alg", &self.alg)
            .field("message_count", &self.message_count)
            .finish()
    }
}

impl TranscriptHash {
    pub fn new(alg: HashAlgId) -> Self {
        Self {
            alg,
            running: RunningDigest::new(alg),
            message_count: 0,
        }
    }

    /// Append one encoded handshake message.
    pub fn update(&mut self, data: &[u8]) -> Result<(), TlsError> {
        self.running.as_digest().update(data)?;
        self.message_count += 1;
        Ok(())
    }

    /// Hash of everything appended so far.
    pub fn current_hash(&self) -> Result<Vec<u8>, TlsError> {
        let mut snapshot = self.running.clone();
        let mut out = vec![0u8; self.hash_len()];
        snapshot.as_digest().finish(&mut out)?;
        Ok(out)
    }

    /// `Hash("")`, the context of `Derive-Secret(secret, "derived", "")`.
    pub fn empty_hash(&self) -> Result<Vec<u8>, TlsError> {
        let mut fresh = RunningDigest::new(self.alg);
        let mut out = vec![0u8; self.hash_len()];
        fresh.as_digest().finish(&mut out)?;
        Ok(out)
    }

    pub fn hash_len(&self) -> usize {
        self.alg.output_size()
    }

    pub fn hash_alg(&self) -> HashAlgId {
        self.alg
    }

    /// Number of messages appended since creation.
    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// Collapse the transcript into `message_hash || 00 00 Hash.length || Hash(messages)`.
    ///
    /// Applied when a HelloRetryRequest is received; ClientHello1 is replaced
    /// by the synthetic message.
    pub fn replace_with_message_hash(&mut self) -> Result<(), TlsError> {
        let hash = self.current_hash()?;
        let mut running = RunningDigest::new(self.alg);
        let header = [MESSAGE_HASH_TYPE, 0, 0, hash.len() as u8];
        running.as_digest().update(&header)?;
        running.as_digest().update(&hash)?;
        self.running = running;
        self.message_count = 1;
        Ok(())
    }
}
