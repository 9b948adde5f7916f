//! TLS 1.2 handshake message codecs: ServerKeyExchange, ClientKeyExchange,
//! CertificateRequest, CertificateVerify, ServerHelloDone and HelloRequest.
//!
//! CertificateVerify has the same layout in TLS 1.3 and is shared by both
//! versions.

use super::codec::{put_u16, put_vec16, put_vec8, Reader, MAX_VEC16_LEN, MAX_VEC8_LEN};
use crate::crypt::KeyExchangeAlg;
use tlsnego_types::{NamedGroup, SignatureScheme, TlsError};

/// ECParameters.curve_type for a named curve (RFC 8422 §5.4).
pub const NAMED_CURVE_TYPE: u8 = 3;

// ---------------------------------------------------------------------------
// ServerKeyExchange
// ---------------------------------------------------------------------------

/// ServerDHParams (RFC 5246 §7.4.3), big-endian integers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhParams {
    pub p: Vec<u8>,
    pub g: Vec<u8>,
    /// The server's public value Ys.
    pub public: Vec<u8>,
}

impl DhParams {
    pub fn is_valid(&self) -> bool {
        [&self.p, &self.g, &self.public]
            .iter()
            .all(|v| !v.is_empty() && v.len() <= MAX_VEC16_LEN)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        put_vec16(buf, &self.p);
        put_vec16(buf, &self.g);
        put_vec16(buf, &self.public);
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, TlsError> {
        Ok(Self {
            p: r.read_vec16("dh_p")?.to_vec(),
            g: r.read_vec16("dh_g")?.to_vec(),
            public: r.read_vec16("dh_Ys")?.to_vec(),
        })
    }
}

/// Key-exchange parameters carried by ServerKeyExchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchangeParams {
    /// ServerECDHParams for a named curve (RFC 8422 §5.4).
    Ecdhe {
        named_group: NamedGroup,
        public_key: Vec<u8>,
    },
    Dhe(DhParams),
    /// psk_identity_hint (RFC 4279 §2); never signed.
    PskIdentityHint(Vec<u8>),
}

impl ServerKeyExchangeParams {
    pub fn key_exchange(&self) -> KeyExchangeAlg {
        match self {
            ServerKeyExchangeParams::Ecdhe { .. } => KeyExchangeAlg::Ecdhe,
            ServerKeyExchangeParams::Dhe(_) => KeyExchangeAlg::Dhe,
            ServerKeyExchangeParams::PskIdentityHint(_) => KeyExchangeAlg::Psk,
        }
    }

    /// Wire encoding, which is also the signed part.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ServerKeyExchangeParams::Ecdhe {
                named_group,
                public_key,
            } => build_ske_params(*named_group, public_key),
            ServerKeyExchangeParams::Dhe(dh) => {
                let mut buf = Vec::with_capacity(6 + dh.p.len() + dh.g.len() + dh.public.len());
                dh.encode(&mut buf);
                buf
            }
            ServerKeyExchangeParams::PskIdentityHint(hint) => {
                let mut buf = Vec::with_capacity(2 + hint.len());
                put_vec16(&mut buf, hint);
                buf
            }
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            ServerKeyExchangeParams::Ecdhe { public_key, .. } => {
                !public_key.is_empty() && public_key.len() <= MAX_VEC8_LEN
            }
            ServerKeyExchangeParams::Dhe(dh) => dh.is_valid(),
            ServerKeyExchangeParams::PskIdentityHint(hint) => hint.len() <= MAX_VEC16_LEN,
        }
    }
}

/// ServerKeyExchange (RFC 5246 §7.4.3). ECDHE and DHE params are signed;
/// a PSK identity hint is sent bare and carries no signature fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub params: ServerKeyExchangeParams,
    pub signature_algorithm: SignatureScheme,
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    /// Unsigned PSK ServerKeyExchange carrying an identity hint.
    pub fn psk_identity_hint(hint: &[u8]) -> Self {
        Self {
            params: ServerKeyExchangeParams::PskIdentityHint(hint.to_vec()),
            signature_algorithm: SignatureScheme(0),
            signature: Vec::new(),
        }
    }

    /// The signed params as they appear on the wire.
    pub fn params_bytes(&self) -> Vec<u8> {
        self.params.to_bytes()
    }

    pub fn is_signed(&self) -> bool {
        !matches!(self.params, ServerKeyExchangeParams::PskIdentityHint(_))
    }

    /// The ECDHE group and server point, when these are ECDHE params.
    pub fn ecdhe_public(&self) -> Option<(NamedGroup, &[u8])> {
        match &self.params {
            ServerKeyExchangeParams::Ecdhe {
                named_group,
                public_key,
            } => Some((*named_group, public_key)),
            _ => None,
        }
    }

    pub fn dh_params(&self) -> Option<&DhParams> {
        match &self.params {
            ServerKeyExchangeParams::Dhe(dh) => Some(dh),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        let signature_ok = if self.is_signed() {
            !self.signature.is_empty() && self.signature.len() <= MAX_VEC16_LEN
        } else {
            self.signature.is_empty()
        };
        self.params.is_valid() && signature_ok
    }
}

/// Build ServerECDHParams: curve_type(1) || named_curve(2) || point(1-byte len).
pub fn build_ske_params(group: NamedGroup, public_key: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + public_key.len());
    buf.push(NAMED_CURVE_TYPE);
    put_u16(&mut buf, group.0);
    put_vec8(&mut buf, public_key);
    buf
}

/// Data covered by the ServerKeyExchange signature:
/// client_random(32) || server_random(32) || params.
pub fn build_ske_signed_data(
    client_random: &[u8],
    server_random: &[u8],
    params: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(client_random.len() + server_random.len() + params.len());
    data.extend_from_slice(client_random);
    data.extend_from_slice(server_random);
    data.extend_from_slice(params);
    data
}

pub fn encode_server_key_exchange(ske: &ServerKeyExchange) -> Vec<u8> {
    let mut body = ske.params_bytes();
    if ske.is_signed() {
        put_u16(&mut body, ske.signature_algorithm.0);
        put_vec16(&mut body, &ske.signature);
    }
    body
}

/// Decode a ServerKeyExchange; its layout depends on the negotiated key
/// exchange. Static RSA has no ServerKeyExchange at all.
pub fn decode_server_key_exchange(
    data: &[u8],
    kx: KeyExchangeAlg,
) -> Result<ServerKeyExchange, TlsError> {
    let mut r = Reader::new("ServerKeyExchange", data);
    let params = match kx {
        KeyExchangeAlg::Ecdhe => {
            let curve_type = r.read_u8("curve_type")?;
            if curve_type != NAMED_CURVE_TYPE {
                return Err(r.err(&format!("unsupported curve_type {curve_type}")));
            }
            ServerKeyExchangeParams::Ecdhe {
                named_group: NamedGroup(r.read_u16("named_curve")?),
                public_key: r.read_vec8("public")?.to_vec(),
            }
        }
        KeyExchangeAlg::Dhe => ServerKeyExchangeParams::Dhe(DhParams::decode(&mut r)?),
        KeyExchangeAlg::Psk => {
            let hint = r.read_vec16("psk_identity_hint")?.to_vec();
            r.finish()?;
            return Ok(ServerKeyExchange::psk_identity_hint(&hint));
        }
        KeyExchangeAlg::Rsa => {
            return Err(r.err("not sent with RSA key exchange"));
        }
    };
    let signature_algorithm = SignatureScheme(r.read_u16("signature_algorithm")?);
    let signature = r.read_vec16("signature")?.to_vec();
    r.finish()?;

    Ok(ServerKeyExchange {
        params,
        signature_algorithm,
        signature,
    })
}

// ---------------------------------------------------------------------------
// ClientKeyExchange
// ---------------------------------------------------------------------------

/// ClientKeyExchange. `exchange_keys` is the client's public value, the
/// encrypted premaster (RSA) or the psk_identity (PSK).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientKeyExchange {
    pub exchange_keys: Vec<u8>,
}

impl ClientKeyExchange {
    pub fn is_valid(&self) -> bool {
        !self.exchange_keys.is_empty() && self.exchange_keys.len() <= MAX_VEC16_LEN
    }
}

pub fn encode_client_key_exchange(cke: &ClientKeyExchange) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + cke.exchange_keys.len());
    put_vec16(&mut body, &cke.exchange_keys);
    body
}

pub fn decode_client_key_exchange(data: &[u8]) -> Result<ClientKeyExchange, TlsError> {
    let mut r = Reader::new("ClientKeyExchange", data);
    let exchange_keys = r.read_vec16("exchange_keys")?.to_vec();
    r.finish()?;
    Ok(ClientKeyExchange { exchange_keys })
}

// ---------------------------------------------------------------------------
// CertificateRequest
// ---------------------------------------------------------------------------

/// ClientCertificateType values (RFC 5246 §7.4.4, RFC 8422 §5.5).
pub const CERT_TYPE_RSA_SIGN: u8 = 1;
pub const CERT_TYPE_ECDSA_SIGN: u8 = 64;

/// CertificateRequest (RFC 5246 §7.4.4).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub signature_algorithms: Vec<SignatureScheme>,
    /// DER-encoded distinguished names.
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn is_valid(&self) -> bool {
        let names_len: usize = self.certificate_authorities.iter().map(|dn| 2 + dn.len()).sum();
        !self.certificate_types.is_empty()
            && self.certificate_types.len() <= MAX_VEC8_LEN
            && self.signature_algorithms.len() * 2 <= MAX_VEC16_LEN - 1
            && names_len <= MAX_VEC16_LEN
    }
}

pub fn encode_certificate_request(cr: &CertificateRequest) -> Vec<u8> {
    let mut body = Vec::new();
    put_vec8(&mut body, &cr.certificate_types);

    let mut algs = Vec::with_capacity(cr.signature_algorithms.len() * 2);
    for s in &cr.signature_algorithms {
        put_u16(&mut algs, s.0);
    }
    put_vec16(&mut body, &algs);

    let mut cas = Vec::new();
    for dn in &cr.certificate_authorities {
        put_vec16(&mut cas, dn);
    }
    put_vec16(&mut body, &cas);
    body
}

pub fn decode_certificate_request(data: &[u8]) -> Result<CertificateRequest, TlsError> {
    let mut r = Reader::new("CertificateRequest", data);
    let certificate_types = r.read_vec8("certificate_types")?.to_vec();

    let algs = r.read_vec16("signature_algorithms")?;
    if algs.len() % 2 != 0 {
        return Err(r.err("odd signature_algorithms length"));
    }
    let signature_algorithms = algs
        .chunks_exact(2)
        .map(|c| SignatureScheme(u16::from_be_bytes([c[0], c[1]])))
        .collect();

    let cas = r.read_vec16("certificate_authorities")?;
    r.finish()?;

    let mut names = Reader::new("CertificateRequest", cas);
    let mut certificate_authorities = Vec::new();
    while !names.is_empty() {
        certificate_authorities.push(names.read_vec16("distinguished_name")?.to_vec());
    }

    Ok(CertificateRequest {
        certificate_types,
        signature_algorithms,
        certificate_authorities,
    })
}

// ---------------------------------------------------------------------------
// CertificateVerify
// ---------------------------------------------------------------------------

/// CertificateVerify: algorithm(2) || signature(2-byte len).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerifyMsg {
    pub algorithm: SignatureScheme,
    pub signature: Vec<u8>,
}

impl CertificateVerifyMsg {
    pub fn is_valid(&self) -> bool {
        !self.signature.is_empty() && self.signature.len() <= MAX_VEC16_LEN
    }
}

pub fn encode_certificate_verify(cv: &CertificateVerifyMsg) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + cv.signature.len());
    put_u16(&mut body, cv.algorithm.0);
    put_vec16(&mut body, &cv.signature);
    body
}

pub fn decode_certificate_verify(data: &[u8]) -> Result<CertificateVerifyMsg, TlsError> {
    let mut r = Reader::new("CertificateVerify", data);
    let algorithm = SignatureScheme(r.read_u16("algorithm")?);
    let signature = r.read_vec16("signature")?.to_vec();
    r.finish()?;
    Ok(CertificateVerifyMsg {
        algorithm,
        signature,
    })
}

// ---------------------------------------------------------------------------
// Empty-bodied messages
// ---------------------------------------------------------------------------

/// Accept only an empty body (ServerHelloDone, HelloRequest).
pub fn decode_empty(what: &'static str, data: &[u8]) -> Result<(), TlsError> {
    Reader::new(what, data).finish()
}
