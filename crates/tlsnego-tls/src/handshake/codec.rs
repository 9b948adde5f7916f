//! Wire primitives, handshake framing, the extension list, and the
//! hello / certificate / ticket / finished message codecs.
//!
//! Decoders take the handshake body (after the 4-byte header), check every
//! length before slicing and reject trailing bytes.

use crate::extensions::{Extension, ExtensionType};
use crate::handshake::HandshakeType;
use crate::{CipherSuite, TlsVersion};
use tlsnego_types::TlsError;

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Bounds-checked big-endian cursor over a message body.
pub struct Reader<'a> {
    what: &'static str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// `what` names the structure being decoded in error messages.
    pub fn new(what: &'static str, data: &'a [u8]) -> Self {
        Self { what, data, pos: 0 }
    }

    pub fn err(&self, msg: &str) -> TlsError {
        TlsError::MalformedMessage(format!("{}: {msg}", self.what))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize, field: &str) -> Result<&'a [u8], TlsError> {
        if self.remaining() < n {
            return Err(self.err(&format!(
                "truncated {field}: need {n}, have {}",
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &str) -> Result<u8, TlsError> {
        Ok(self.read_bytes(1, field)?[0])
    }

    pub fn read_u16(&mut self, field: &str) -> Result<u16, TlsError> {
        let b = self.read_bytes(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self, field: &str) -> Result<u32, TlsError> {
        let b = self.read_bytes(3, field)?;
        Ok(read_u24(b))
    }

    pub fn read_u32(&mut self, field: &str) -> Result<u32, TlsError> {
        let b = self.read_bytes(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Opaque vector with a 1-byte length prefix.
    pub fn read_vec8(&mut self, field: &str) -> Result<&'a [u8], TlsError> {
        let len = self.read_u8(field)? as usize;
        self.read_bytes(len, field)
    }

    /// Opaque vector with a 2-byte length prefix.
    pub fn read_vec16(&mut self, field: &str) -> Result<&'a [u8], TlsError> {
        let len = self.read_u16(field)? as usize;
        self.read_bytes(len, field)
    }

    /// Opaque vector with a 3-byte length prefix.
    pub fn read_vec24(&mut self, field: &str) -> Result<&'a [u8], TlsError> {
        let len = self.read_u24(field)? as usize;
        self.read_bytes(len, field)
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }

    /// Fail if any bytes remain.
    pub fn finish(&self) -> Result<(), TlsError> {
        if !self.is_empty() {
            return Err(self.err(&format!("{} trailing bytes", self.remaining())));
        }
        Ok(())
    }
}

/// Read a 3-byte big-endian integer. `data` must hold at least 3 bytes.
pub(crate) fn read_u24(data: &[u8]) -> u32 {
    ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32)
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

// The `put_vec*` writers assume the data fits its prefix; every `is_valid`
// checks the fields against these limits before a message is encoded.

/// Largest length a 1-byte prefix can carry.
pub const MAX_VEC8_LEN: usize = 0xFF;
/// Largest length a 2-byte prefix can carry.
pub const MAX_VEC16_LEN: usize = 0xFFFF;
/// Largest length a 3-byte prefix can carry.
pub const MAX_VEC24_LEN: usize = 0xFF_FFFF;

/// Encoded size of an extension list, outer length prefix excluded.
pub fn extensions_len(exts: &[Extension]) -> usize {
    exts.iter().map(|e| 4 + e.data.len()).sum()
}

/// Whether every extension body and the whole block fit their 2-byte prefixes.
pub fn extensions_fit(exts: &[Extension]) -> bool {
    exts.iter().all(|e| e.data.len() <= MAX_VEC16_LEN) && extensions_len(exts) <= MAX_VEC16_LEN
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_u24(buf: &mut Vec<u8>, v: usize) {
    buf.push((v >> 16) as u8);
    buf.push((v >> 8) as u8);
    buf.push(v as u8);
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub(crate) fn put_vec8(buf: &mut Vec<u8>, data: &[u8]) {
    buf.push(data.len() as u8);
    buf.extend_from_slice(data);
}

pub(crate) fn put_vec16(buf: &mut Vec<u8>, data: &[u8]) {
    put_u16(buf, data.len() as u16);
    buf.extend_from_slice(data);
}

pub(crate) fn put_vec24(buf: &mut Vec<u8>, data: &[u8]) {
    put_u24(buf, data.len());
    buf.extend_from_slice(data);
}

// ---------------------------------------------------------------------------
// Handshake header
// ---------------------------------------------------------------------------

/// Parse a handshake header: msg_type(1) || length(3).
///
/// Returns (type, body, total bytes consumed). Bytes after the first
/// message are left to the caller.
pub fn parse_handshake_header(data: &[u8]) -> Result<(HandshakeType, &[u8], usize), TlsError> {
    let mut r = Reader::new("handshake header", data);
    let raw_type = r.read_u8("msg_type")?;
    let msg_type = HandshakeType::from_u8(raw_type)
        .ok_or_else(|| r.err(&format!("unknown handshake type {raw_type}")))?;
    let body = r.read_vec24("body")?;
    Ok((msg_type, body, 4 + body.len()))
}

/// Wrap a handshake body with the 4-byte header.
pub fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(msg_type as u8);
    put_vec24(&mut out, body);
    out
}

// ---------------------------------------------------------------------------
// Extension list
// ---------------------------------------------------------------------------

/// Encode an extension block: 2-byte total length, then type(2) len(2) body.
pub fn encode_extensions(buf: &mut Vec<u8>, exts: &[Extension]) {
    let mut list = Vec::new();
    for ext in exts {
        put_u16(&mut list, ext.extension_type.0);
        put_vec16(&mut list, &ext.data);
    }
    put_vec16(buf, &list);
}

/// Parse a raw extension list (no outer length prefix), which must be
/// consumed exactly.
pub fn parse_extensions_list(data: &[u8]) -> Result<Vec<Extension>, TlsError> {
    let mut r = Reader::new("extensions", data);
    let mut exts = Vec::new();
    while !r.is_empty() {
        let ty = ExtensionType(r.read_u16("extension type")?);
        let body = r.read_vec16("extension data")?;
        exts.push(Extension::new(ty, body.to_vec()));
    }
    Ok(exts)
}

/// Read an extension block from `r`.
pub fn read_extensions(r: &mut Reader<'_>) -> Result<Vec<Extension>, TlsError> {
    let block = r.read_vec16("extensions")?;
    parse_extensions_list(block)
}

/// Read an extension block if any bytes are left, otherwise an empty list.
fn read_optional_extensions(r: &mut Reader<'_>) -> Result<Vec<Extension>, TlsError> {
    if r.is_empty() {
        return Ok(Vec::new());
    }
    read_extensions(r)
}

// ---------------------------------------------------------------------------
// ClientHello
// ---------------------------------------------------------------------------

/// Smallest ClientHello body: version, random and three empty vectors.
pub const CLIENT_HELLO_MIN_LEN: usize = 2 + 32 + 1 + 2 + 1;

/// ClientHello (RFC 5246 §7.4.1.2, RFC 8446 §4.1.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub version: u16,
    pub random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl Default for ClientHello {
    fn default() -> Self {
        Self {
            version: TlsVersion::LEGACY_WIRE,
            random: vec![0u8; 32],
            session_id: Vec::new(),
            cipher_suites: Vec::new(),
            compression_methods: vec![0],
            extensions: Vec::new(),
        }
    }
}

impl ClientHello {
    pub fn is_valid(&self) -> bool {
        self.random.len() == 32
            && self.session_id.len() <= 32
            && !self.cipher_suites.is_empty()
            && self.cipher_suites.len() * 2 <= MAX_VEC16_LEN - 1
            && self.compression_methods.len() <= MAX_VEC8_LEN
            && extensions_fit(&self.extensions)
    }
}

pub fn encode_client_hello(ch: &ClientHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(CLIENT_HELLO_MIN_LEN + 64);
    put_u16(&mut body, ch.version);
    body.extend_from_slice(&ch.random);
    put_vec8(&mut body, &ch.session_id);

    let mut suites = Vec::with_capacity(ch.cipher_suites.len() * 2);
    for s in &ch.cipher_suites {
        put_u16(&mut suites, s.0);
    }
    put_vec16(&mut body, &suites);
    put_vec8(&mut body, &ch.compression_methods);
    encode_extensions(&mut body, &ch.extensions);
    body
}

pub fn decode_client_hello(data: &[u8]) -> Result<ClientHello, TlsError> {
    let mut r = Reader::new("ClientHello", data);
    if data.len() < CLIENT_HELLO_MIN_LEN {
        return Err(r.err(&format!("too short ({} bytes)", data.len())));
    }
    let version = r.read_u16("version")?;
    let random = r.read_bytes(32, "random")?.to_vec();
    let session_id = r.read_vec8("session_id")?.to_vec();
    if session_id.len() > 32 {
        return Err(r.err("session_id longer than 32 bytes"));
    }

    let suites = r.read_vec16("cipher_suites")?;
    if suites.len() % 2 != 0 {
        return Err(r.err("odd cipher_suites length"));
    }
    let cipher_suites = suites
        .chunks_exact(2)
        .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
        .collect();

    let compression_methods = r.read_vec8("compression_methods")?.to_vec();
    let extensions = read_optional_extensions(&mut r)?;
    r.finish()?;

    Ok(ClientHello {
        version,
        random,
        session_id,
        cipher_suites,
        compression_methods,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// ServerHello
// ---------------------------------------------------------------------------

/// ServerHello (RFC 5246 §7.4.1.3, RFC 8446 §4.1.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub version: u16,
    pub random: Vec<u8>,
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl Default for ServerHello {
    fn default() -> Self {
        Self {
            version: TlsVersion::LEGACY_WIRE,
            random: vec![0u8; 32],
            session_id: Vec::new(),
            cipher_suite: CipherSuite(0),
            compression_method: 0,
            extensions: Vec::new(),
        }
    }
}

/// ServerHello.random marking a HelloRetryRequest (RFC 8446 §4.1.3).
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

impl ServerHello {
    /// A HelloRetryRequest shares the ServerHello layout.
    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    pub fn is_valid(&self) -> bool {
        self.random.len() == 32
            && self.session_id.len() <= 32
            && self.cipher_suite.0 != 0
            && extensions_fit(&self.extensions)
    }
}

pub fn encode_server_hello(sh: &ServerHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + 32 + 1 + sh.session_id.len() + 3 + 64);
    put_u16(&mut body, sh.version);
    body.extend_from_slice(&sh.random);
    put_vec8(&mut body, &sh.session_id);
    put_u16(&mut body, sh.cipher_suite.0);
    body.push(sh.compression_method);
    encode_extensions(&mut body, &sh.extensions);
    body
}

pub fn decode_server_hello(data: &[u8]) -> Result<ServerHello, TlsError> {
    let mut r = Reader::new("ServerHello", data);
    let version = r.read_u16("version")?;
    let random = r.read_bytes(32, "random")?.to_vec();
    let session_id = r.read_vec8("session_id")?.to_vec();
    if session_id.len() > 32 {
        return Err(r.err("session_id longer than 32 bytes"));
    }
    let cipher_suite = CipherSuite(r.read_u16("cipher_suite")?);
    let compression_method = r.read_u8("compression_method")?;
    let extensions = read_optional_extensions(&mut r)?;
    r.finish()?;

    Ok(ServerHello {
        version,
        random,
        session_id,
        cipher_suite,
        compression_method,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Certificate message: DER certificates, leaf first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateMsg {
    pub certificate_list: Vec<Vec<u8>>,
}

impl CertificateMsg {
    /// Encoded size of certificate_list, its own prefix excluded.
    pub fn list_len(&self) -> usize {
        self.certificate_list.iter().map(|c| 3 + c.len()).sum()
    }

    pub fn is_valid(&self) -> bool {
        !self.certificate_list.is_empty()
            && self
                .certificate_list
                .iter()
                .all(|c| !c.is_empty() && c.len() <= MAX_VEC24_LEN)
            && self.list_len() <= MAX_VEC24_LEN - 3
    }
}

pub fn encode_certificate(cert: &CertificateMsg) -> Vec<u8> {
    let mut list = Vec::new();
    for der in &cert.certificate_list {
        put_vec24(&mut list, der);
    }
    let mut body = Vec::with_capacity(3 + list.len());
    put_vec24(&mut body, &list);
    body
}

pub fn decode_certificate(data: &[u8]) -> Result<CertificateMsg, TlsError> {
    let mut r = Reader::new("Certificate", data);
    let list = r.read_vec24("certificate_list")?;
    r.finish()?;

    let mut entries = Reader::new("Certificate", list);
    let mut certificate_list = Vec::new();
    while !entries.is_empty() {
        certificate_list.push(entries.read_vec24("certificate")?.to_vec());
    }
    Ok(CertificateMsg { certificate_list })
}

// ---------------------------------------------------------------------------
// EncryptedExtensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptedExtensions {
    pub extensions: Vec<Extension>,
}

impl EncryptedExtensions {
    pub fn is_valid(&self) -> bool {
        extensions_fit(&self.extensions)
    }
}

pub fn encode_encrypted_extensions(ee: &EncryptedExtensions) -> Vec<u8> {
    let mut body = Vec::new();
    encode_extensions(&mut body, &ee.extensions);
    body
}

pub fn decode_encrypted_extensions(data: &[u8]) -> Result<EncryptedExtensions, TlsError> {
    let mut r = Reader::new("EncryptedExtensions", data);
    let extensions = read_extensions(&mut r)?;
    r.finish()?;
    Ok(EncryptedExtensions { extensions })
}

// ---------------------------------------------------------------------------
// NewSessionTicket
// ---------------------------------------------------------------------------

/// NewSessionTicket (RFC 8446 §4.6.1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSessionTicketMsg {
    /// Seconds the ticket may be used for.
    pub ticket_lifetime: u32,
    pub ticket_age_add: u32,
    pub ticket_nonce: Vec<u8>,
    pub ticket: Vec<u8>,
    pub extensions: Vec<Extension>,
}

impl NewSessionTicketMsg {
    pub fn is_valid(&self) -> bool {
        !self.ticket.is_empty()
            && self.ticket.len() <= MAX_VEC16_LEN
            && self.ticket_nonce.len() <= MAX_VEC8_LEN
            && extensions_fit(&self.extensions)
    }
}

pub fn encode_new_session_ticket(nst: &NewSessionTicketMsg) -> Vec<u8> {
    let mut body = Vec::with_capacity(8 + 1 + nst.ticket_nonce.len() + 2 + nst.ticket.len() + 2);
    put_u32(&mut body, nst.ticket_lifetime);
    put_u32(&mut body, nst.ticket_age_add);
    put_vec8(&mut body, &nst.ticket_nonce);
    put_vec16(&mut body, &nst.ticket);
    encode_extensions(&mut body, &nst.extensions);
    body
}

pub fn decode_new_session_ticket(data: &[u8]) -> Result<NewSessionTicketMsg, TlsError> {
    let mut r = Reader::new("NewSessionTicket", data);
    let ticket_lifetime = r.read_u32("ticket_lifetime")?;
    let ticket_age_add = r.read_u32("ticket_age_add")?;
    let ticket_nonce = r.read_vec8("ticket_nonce")?.to_vec();
    let ticket = r.read_vec16("ticket")?.to_vec();
    let extensions = read_extensions(&mut r)?;
    r.finish()?;
    Ok(NewSessionTicketMsg {
        ticket_lifetime,
        ticket_age_add,
        ticket_nonce,
        ticket,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// Finished
// ---------------------------------------------------------------------------

/// Finished: verify_data, 12 bytes in TLS 1.2, Hash.length in TLS 1.3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishedMsg {
    pub verify_data: Vec<u8>,
}

impl FinishedMsg {
    pub fn is_valid(&self) -> bool {
        !self.verify_data.is_empty() && self.verify_data.len() <= MAX_VEC24_LEN
    }
}

pub fn encode_finished(fin: &FinishedMsg) -> Vec<u8> {
    fin.verify_data.clone()
}

/// The whole body is verify_data; its length comes from the outer frame.
pub fn decode_finished(data: &[u8]) -> Result<FinishedMsg, TlsError> {
    Ok(FinishedMsg {
        verify_data: data.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn sample_client_hello() -> ClientHello {
        ClientHello {
            random: vec![0xAA; 32],
            session_id: vec![0x11; 32],
            cipher_suites: vec![
                CipherSuite::TLS_AES_128_GCM_SHA256,
                CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
            ],
            extensions: vec![
                Extension::new(ExtensionType::SUPPORTED_GROUPS, vec![0x00, 0x02, 0x00, 0x1d]),
                Extension::new(ExtensionType::POST_HANDSHAKE_AUTH, vec![]),
            ],
            ..ClientHello::default()
        }
    }

    #[test]
    fn test_reader_bounds() {
        let mut r = Reader::new("test", &[0x01, 0x02, 0x03]);
        assert_eq!(r.read_u16("a").unwrap(), 0x0102);
        assert!(matches!(
            r.read_u16("b"),
            Err(TlsError::MalformedMessage(_))
        ));
        assert_eq!(r.read_u8("c").unwrap(), 0x03);
        assert!(r.finish().is_ok());

        let mut r = Reader::new("test", &[0x05, 0x01]);
        assert!(r.read_vec8("v").is_err());
    }

    #[test]
    fn test_reader_u24_u32() {
        let mut r = Reader::new("test", &[0x01, 0x02, 0x03, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(r.read_u24("a").unwrap(), 0x010203);
        assert_eq!(r.read_u32("b").unwrap(), 0xDEADBEEF);
        assert!(r.is_empty());
    }

    #[test]
    fn test_header_wrap_and_parse() {
        let framed = wrap_handshake(HandshakeType::Finished, &[0xAB; 12]);
        assert_eq!(&framed[..4], &[20, 0, 0, 12]);
        let (ty, body, total) = parse_handshake_header(&framed).unwrap();
        assert_eq!(ty, HandshakeType::Finished);
        assert_eq!(body, &[0xAB; 12]);
        assert_eq!(total, 16);
    }

    #[test]
    fn test_header_rejects_unknown_type_and_truncation() {
        assert!(parse_handshake_header(&[3, 0, 0, 0]).is_err());
        assert!(parse_handshake_header(&[20, 0, 0, 5, 1, 2]).is_err());
        assert!(parse_handshake_header(&[20, 0]).is_err());
        // Trailing data after the first message is returned to the caller.
        let (_, body, total) = parse_handshake_header(&[14, 0, 0, 0, 0xFF]).unwrap();
        assert!(body.is_empty());
        assert_eq!(total, 4);
    }

    #[test]
    fn test_client_hello_round_trip() {
        let ch = sample_client_hello();
        let body = encode_client_hello(&ch);
        let decoded = decode_client_hello(&body).unwrap();
        assert_eq!(decoded, ch);
        assert!(decoded.is_valid());
        assert_eq!(encode_client_hello(&decoded), body);
    }

    #[test]
    fn test_client_hello_known_bytes() {
        let ch = ClientHello {
            random: vec![0x01; 32],
            cipher_suites: vec![CipherSuite::TLS_AES_128_GCM_SHA256],
            ..ClientHello::default()
        };
        let body = encode_client_hello(&ch);
        let mut expected = hex("0303");
        expected.extend_from_slice(&[0x01; 32]);
        expected.extend_from_slice(&hex("00" /* sid */));
        expected.extend_from_slice(&hex("00021301" /* suites */));
        expected.extend_from_slice(&hex("0100" /* compression */));
        expected.extend_from_slice(&hex("0000" /* extensions */));
        assert_eq!(body, expected);
    }

    #[test]
    fn test_client_hello_without_extensions_block() {
        let mut body = hex("0303");
        body.extend_from_slice(&[0x02; 32]);
        body.extend_from_slice(&hex("00" /* sid */));
        body.extend_from_slice(&hex("0002c02f"));
        body.extend_from_slice(&hex("0100"));
        let ch = decode_client_hello(&body).unwrap();
        assert!(ch.extensions.is_empty());
        assert_eq!(ch.cipher_suites, vec![CipherSuite(0xC02F)]);
    }

    #[test]
    fn test_client_hello_odd_suite_length() {
        let mut body = hex("0303");
        body.extend_from_slice(&[0x02; 32]);
        body.push(0);
        body.extend_from_slice(&hex("0003c02f00"));
        body.extend_from_slice(&hex("0100"));
        assert!(matches!(
            decode_client_hello(&body),
            Err(TlsError::MalformedMessage(m)) if m.contains("odd")
        ));
    }

    #[test]
    fn test_client_hello_too_short_and_trailing() {
        assert!(decode_client_hello(&[0x03, 0x03, 0x00]).is_err());
        let mut body = encode_client_hello(&sample_client_hello());
        body.push(0x00);
        assert!(decode_client_hello(&body).is_err());
    }

    #[test]
    fn test_client_hello_session_id_too_long() {
        let mut body = hex("0303");
        body.extend_from_slice(&[0x02; 32]);
        body.push(33);
        body.extend_from_slice(&[0x00; 33]);
        body.extend_from_slice(&hex("0002c02f0100"));
        assert!(decode_client_hello(&body).is_err());
    }

    #[test]
    fn test_client_hello_validity() {
        let mut ch = sample_client_hello();
        assert!(ch.is_valid());
        ch.cipher_suites.clear();
        assert!(!ch.is_valid());

        let mut ch = sample_client_hello();
        ch.random = vec![0; 31];
        assert!(!ch.is_valid());

        let mut ch = sample_client_hello();
        ch.session_id = vec![0; 33];
        assert!(!ch.is_valid());
    }

    #[test]
    fn test_length_prefix_limits_enforced() {
        // One extension body at the 2-byte limit leaves no room in the block.
        let mut ch = sample_client_hello();
        ch.extensions = vec![Extension::new(ExtensionType(0xff01), vec![0; MAX_VEC16_LEN + 1])];
        assert!(!ch.is_valid());
        ch.extensions = vec![Extension::new(ExtensionType(0xff01), vec![0; MAX_VEC16_LEN - 4])];
        assert!(ch.is_valid());
        let decoded = decode_client_hello(&encode_client_hello(&ch)).unwrap();
        assert_eq!(decoded.extensions[0].data.len(), MAX_VEC16_LEN - 4);
        ch.extensions.push(Extension::new(ExtensionType(0xff02), vec![]));
        assert!(!ch.is_valid());

        let mut ch = sample_client_hello();
        ch.cipher_suites = vec![CipherSuite(0x1301); 32768];
        assert!(!ch.is_valid());
        ch.cipher_suites.truncate(32767);
        assert!(ch.is_valid());

        let mut ch = sample_client_hello();
        ch.compression_methods = vec![0; 256];
        assert!(!ch.is_valid());

        let mut nst = NewSessionTicketMsg {
            ticket: vec![0xCC; 16],
            ticket_nonce: vec![0; 256],
            ..NewSessionTicketMsg::default()
        };
        assert!(!nst.is_valid());
        nst.ticket_nonce.truncate(255);
        assert!(nst.is_valid());
        nst.ticket = vec![0xCC; MAX_VEC16_LEN + 1];
        assert!(!nst.is_valid());

        let ee = EncryptedExtensions {
            extensions: vec![Extension::new(ExtensionType(0xff01), vec![0; 70000])],
        };
        assert!(!ee.is_valid());

        let sh = ServerHello {
            cipher_suite: CipherSuite(0x1301),
            extensions: vec![Extension::new(ExtensionType(0xff01), vec![0; 70000])],
            ..ServerHello::default()
        };
        assert!(!sh.is_valid());
    }

    #[test]
    fn test_certificate_chain_limit() {
        let mut cert = CertificateMsg {
            certificate_list: vec![vec![0x30; MAX_VEC24_LEN - 6]],
        };
        assert!(cert.is_valid());
        cert.certificate_list[0].push(0x30);
        assert!(!cert.is_valid());

        let cert = CertificateMsg {
            certificate_list: vec![vec![0x30; MAX_VEC24_LEN / 2]; 3],
        };
        assert!(!cert.is_valid());
    }

    #[test]
    fn test_server_hello_round_trip() {
        let sh = ServerHello {
            random: vec![0xBB; 32],
            session_id: vec![],
            cipher_suite: CipherSuite::TLS_AES_256_GCM_SHA384,
            extensions: vec![Extension::new(
                ExtensionType::SUPPORTED_VERSIONS,
                vec![0x03, 0x04],
            )],
            ..ServerHello::default()
        };
        let body = encode_server_hello(&sh);
        let decoded = decode_server_hello(&body).unwrap();
        assert_eq!(decoded, sh);
        assert!(decoded.is_valid());

        let mut zero_suite = sh.clone();
        zero_suite.cipher_suite = CipherSuite(0);
        assert!(!zero_suite.is_valid());
    }

    #[test]
    fn test_server_hello_truncated() {
        let body = encode_server_hello(&ServerHello {
            cipher_suite: CipherSuite(0x1301),
            ..ServerHello::default()
        });
        for cut in [1, 10, 34, 35, 37] {
            assert!(decode_server_hello(&body[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn test_certificate_round_trip() {
        let cert = CertificateMsg {
            certificate_list: vec![vec![0x30, 0x82, 0x01], vec![0x30; 300]],
        };
        let body = encode_certificate(&cert);
        assert_eq!(&body[..3], &[0x00, 0x01, 0x35]);
        assert_eq!(decode_certificate(&body).unwrap(), cert);
    }

    #[test]
    fn test_empty_certificate_decodes_but_is_invalid() {
        let cert = decode_certificate(&[0, 0, 0]).unwrap();
        assert!(cert.certificate_list.is_empty());
        assert!(!cert.is_valid());
    }

    #[test]
    fn test_certificate_entry_overruns_list() {
        // list length 4, entry claims 5 bytes
        assert!(decode_certificate(&hex("00000400000501")).is_err());
    }

    #[test]
    fn test_encrypted_extensions_round_trip() {
        let ee = EncryptedExtensions {
            extensions: vec![Extension::new(ExtensionType::EARLY_DATA, vec![])],
        };
        let body = encode_encrypted_extensions(&ee);
        assert_eq!(body, hex("0004002a0000"));
        assert_eq!(decode_encrypted_extensions(&body).unwrap(), ee);
        assert!(decode_encrypted_extensions(&[]).is_err());
    }

    #[test]
    fn test_extension_list_truncated_entry() {
        assert!(parse_extensions_list(&hex("000a0004001d")).is_err());
        assert!(parse_extensions_list(&hex("000a00")).is_err());
        assert!(parse_extensions_list(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_new_session_ticket_round_trip() {
        let nst = NewSessionTicketMsg {
            ticket_lifetime: 86400,
            ticket_age_add: 0x01020304,
            ticket_nonce: vec![0x00, 0x01],
            ticket: vec![0xCC; 48],
            extensions: vec![Extension::new(
                ExtensionType::EARLY_DATA,
                vec![0x00, 0x00, 0x40, 0x00],
            )],
        };
        let body = encode_new_session_ticket(&nst);
        assert_eq!(&body[..4], &86400u32.to_be_bytes());
        let decoded = decode_new_session_ticket(&body).unwrap();
        assert_eq!(decoded, nst);
        assert!(decoded.is_valid());

        let empty = NewSessionTicketMsg::default();
        assert!(!empty.is_valid());
    }

    #[test]
    fn test_finished_round_trip() {
        let fin = FinishedMsg {
            verify_data: vec![0x5A; 12],
        };
        assert_eq!(decode_finished(&encode_finished(&fin)).unwrap(), fin);
        assert!(!decode_finished(&[]).unwrap().is_valid());
    }
}
