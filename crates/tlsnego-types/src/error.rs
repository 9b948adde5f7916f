/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("kdf: derived key length overflow")]
    KdfDkLenOverflow,
    #[error("random generation failed")]
    RandomFailed,
    #[error("aead: seal or open failed")]
    AeadFailed,
    #[error("provider failure: {0}")]
    ProviderFailed(String),
}

/// TLS negotiation errors.
///
/// The first five variants form the handshake taxonomy: a protocol
/// violation is what a state machine reports after entering its error
/// state, the others are raised directly by the codec and key schedule.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("derivation error: {0}")]
    DerivationError(String),
    #[error("validation failure: {0}")]
    ValidationFailure(String),
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("no shared cipher suite")]
    NoSharedCipherSuite,
    #[error("session expired")]
    SessionExpired,
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}
