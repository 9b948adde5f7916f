//! Extension payload encoding/decoding.
//!
//! `build_*` functions return a ready [`Extension`]; `parse_*` functions take
//! the extension body. Extensions whose shape depends on the carrying message
//! have one pair per message (`_ch`, `_sh`, `_hrr`, `_nst`).

use super::codec::{put_u16, put_u32, put_vec16, put_vec8, Reader, MAX_VEC16_LEN, MAX_VEC8_LEN};
use crate::extensions::{Extension, ExtensionContext, ExtensionType};
use tlsnego_types::{NamedGroup, SignatureScheme, TlsError};

fn u16_list(r: &mut Reader<'_>, field: &str) -> Result<Vec<u16>, TlsError> {
    let list = r.read_vec16(field)?;
    if list.len() % 2 != 0 {
        return Err(r.err(&format!("odd {field} length")));
    }
    Ok(list
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

fn build_u16_list(ty: ExtensionType, values: impl Iterator<Item = u16>) -> Extension {
    let mut list = Vec::new();
    for v in values {
        put_u16(&mut list, v);
    }
    let mut data = Vec::with_capacity(2 + list.len());
    put_vec16(&mut data, &list);
    Extension::new(ty, data)
}

// ---------------------------------------------------------------------------
// key_share (RFC 8446 §4.2.8)
// ---------------------------------------------------------------------------

/// One KeyShareEntry: group plus the encoded public value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

fn put_key_share_entry(buf: &mut Vec<u8>, entry: &KeyShareEntry) {
    put_u16(buf, entry.group.0);
    put_vec16(buf, &entry.key_exchange);
}

fn read_key_share_entry(r: &mut Reader<'_>) -> Result<KeyShareEntry, TlsError> {
    let group = NamedGroup(r.read_u16("group")?);
    let key_exchange = r.read_vec16("key_exchange")?;
    if key_exchange.is_empty() {
        return Err(r.err("empty key_exchange"));
    }
    Ok(KeyShareEntry {
        group,
        key_exchange: key_exchange.to_vec(),
    })
}

/// ClientHello key_share: client_shares(2-byte len) of entries.
pub fn build_key_share_ch(entries: &[KeyShareEntry]) -> Extension {
    let mut list = Vec::new();
    for e in entries {
        put_key_share_entry(&mut list, e);
    }
    let mut data = Vec::with_capacity(2 + list.len());
    put_vec16(&mut data, &list);
    Extension::new(ExtensionType::KEY_SHARE, data)
}

pub fn parse_key_share_ch(data: &[u8]) -> Result<Vec<KeyShareEntry>, TlsError> {
    let mut outer = Reader::new("key_share", data);
    let list = outer.read_vec16("client_shares")?;
    outer.finish()?;

    let mut r = Reader::new("key_share", list);
    let mut entries: Vec<KeyShareEntry> = Vec::new();
    while !r.is_empty() {
        let entry = read_key_share_entry(&mut r)?;
        if entries.iter().any(|e| e.group == entry.group) {
            return Err(r.err(&format!("duplicate group 0x{:04x}", entry.group.0)));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// ServerHello key_share: a single entry without a list prefix.
pub fn build_key_share_sh(entry: &KeyShareEntry) -> Extension {
    let mut data = Vec::with_capacity(4 + entry.key_exchange.len());
    put_key_share_entry(&mut data, entry);
    Extension::new(ExtensionType::KEY_SHARE, data)
}

pub fn parse_key_share_sh(data: &[u8]) -> Result<KeyShareEntry, TlsError> {
    let mut r = Reader::new("key_share", data);
    let entry = read_key_share_entry(&mut r)?;
    r.finish()?;
    Ok(entry)
}

/// HelloRetryRequest key_share: the selected group only.
pub fn build_key_share_hrr(group: NamedGroup) -> Extension {
    Extension::new(ExtensionType::KEY_SHARE, group.0.to_be_bytes().to_vec())
}

pub fn parse_key_share_hrr(data: &[u8]) -> Result<NamedGroup, TlsError> {
    let mut r = Reader::new("key_share", data);
    let group = NamedGroup(r.read_u16("selected_group")?);
    r.finish()?;
    Ok(group)
}

// ---------------------------------------------------------------------------
// pre_shared_key (RFC 8446 §4.2.11)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    pub identity: Vec<u8>,
    pub obfuscated_ticket_age: u32,
}

/// OfferedPsks as sent in ClientHello.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferedPsks {
    pub identities: Vec<PskIdentity>,
    pub binders: Vec<Vec<u8>>,
}

impl OfferedPsks {
    /// Encoded size of the binders list, prefix included. The binder hash
    /// covers the ClientHello truncated by exactly this many bytes.
    pub fn binders_len(&self) -> usize {
        2 + self.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
    }

    /// Every identity and binder fits its length prefix: identity<1..2^16-1>,
    /// PskBinderEntry<32..255>, both lists under 2^16.
    pub fn is_valid(&self) -> bool {
        let ids_len: usize = self.identities.iter().map(|i| 6 + i.identity.len()).sum();
        self.identities
            .iter()
            .all(|i| !i.identity.is_empty() && i.identity.len() <= MAX_VEC16_LEN)
            && self.binders.iter().all(|b| (32..=MAX_VEC8_LEN).contains(&b.len()))
            && ids_len <= MAX_VEC16_LEN
            && self.binders_len() - 2 <= MAX_VEC16_LEN
    }
}

/// Fails if an identity or binder does not fit its length prefix.
pub fn build_pre_shared_key_ch(offered: &OfferedPsks) -> Result<Extension, TlsError> {
    if !offered.is_valid() {
        return Err(TlsError::ValidationFailure(
            "pre_shared_key: identity or binder length out of range".into(),
        ));
    }
    let mut ids = Vec::new();
    for id in &offered.identities {
        put_vec16(&mut ids, &id.identity);
        put_u32(&mut ids, id.obfuscated_ticket_age);
    }
    let mut binders = Vec::new();
    for b in &offered.binders {
        put_vec8(&mut binders, b);
    }
    let mut data = Vec::with_capacity(4 + ids.len() + binders.len());
    put_vec16(&mut data, &ids);
    put_vec16(&mut data, &binders);
    Ok(Extension::new(ExtensionType::PRE_SHARED_KEY, data))
}

pub fn parse_pre_shared_key_ch(data: &[u8]) -> Result<OfferedPsks, TlsError> {
    let mut outer = Reader::new("pre_shared_key", data);
    let ids = outer.read_vec16("identities")?;
    let binders = outer.read_vec16("binders")?;
    outer.finish()?;

    let mut r = Reader::new("pre_shared_key", ids);
    let mut identities = Vec::new();
    while !r.is_empty() {
        let identity = r.read_vec16("identity")?.to_vec();
        let obfuscated_ticket_age = r.read_u32("obfuscated_ticket_age")?;
        identities.push(PskIdentity {
            identity,
            obfuscated_ticket_age,
        });
    }

    let mut r = Reader::new("pre_shared_key", binders);
    let mut binder_list = Vec::new();
    while !r.is_empty() {
        binder_list.push(r.read_vec8("binder")?.to_vec());
    }

    if identities.is_empty() || identities.len() != binder_list.len() {
        return Err(r.err(&format!(
            "{} identities with {} binders",
            identities.len(),
            binder_list.len()
        )));
    }
    Ok(OfferedPsks {
        identities,
        binders: binder_list,
    })
}

pub fn build_pre_shared_key_sh(selected_identity: u16) -> Extension {
    Extension::new(
        ExtensionType::PRE_SHARED_KEY,
        selected_identity.to_be_bytes().to_vec(),
    )
}

pub fn parse_pre_shared_key_sh(data: &[u8]) -> Result<u16, TlsError> {
    let mut r = Reader::new("pre_shared_key", data);
    let selected = r.read_u16("selected_identity")?;
    r.finish()?;
    Ok(selected)
}

// ---------------------------------------------------------------------------
// supported_groups, signature_algorithms, supported_versions
// ---------------------------------------------------------------------------

pub fn build_supported_groups(groups: &[NamedGroup]) -> Extension {
    build_u16_list(ExtensionType::SUPPORTED_GROUPS, groups.iter().map(|g| g.0))
}

pub fn parse_supported_groups(data: &[u8]) -> Result<Vec<NamedGroup>, TlsError> {
    let mut r = Reader::new("supported_groups", data);
    let groups = u16_list(&mut r, "named_group_list")?;
    r.finish()?;
    if groups.is_empty() {
        return Err(r.err("empty named_group_list"));
    }
    Ok(groups.into_iter().map(NamedGroup).collect())
}

pub fn build_signature_algorithms(schemes: &[SignatureScheme]) -> Extension {
    build_u16_list(
        ExtensionType::SIGNATURE_ALGORITHMS,
        schemes.iter().map(|s| s.0),
    )
}

pub fn parse_signature_algorithms(data: &[u8]) -> Result<Vec<SignatureScheme>, TlsError> {
    let mut r = Reader::new("signature_algorithms", data);
    let schemes = u16_list(&mut r, "supported_signature_algorithms")?;
    r.finish()?;
    if schemes.is_empty() {
        return Err(r.err("empty supported_signature_algorithms"));
    }
    Ok(schemes.into_iter().map(SignatureScheme).collect())
}

/// ClientHello supported_versions: 1-byte list length of 2-byte versions.
pub fn build_supported_versions_ch(versions: &[u16]) -> Extension {
    let mut list = Vec::with_capacity(versions.len() * 2);
    for v in versions {
        put_u16(&mut list, *v);
    }
    let mut data = Vec::with_capacity(1 + list.len());
    put_vec8(&mut data, &list);
    Extension::new(ExtensionType::SUPPORTED_VERSIONS, data)
}

pub fn parse_supported_versions_ch(data: &[u8]) -> Result<Vec<u16>, TlsError> {
    let mut r = Reader::new("supported_versions", data);
    let list = r.read_vec8("versions")?;
    r.finish()?;
    if list.is_empty() || list.len() % 2 != 0 {
        return Err(r.err(&format!("bad versions length {}", list.len())));
    }
    Ok(list
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

/// ServerHello / HelloRetryRequest supported_versions: the selected version.
pub fn build_supported_versions_sh(version: u16) -> Extension {
    Extension::new(
        ExtensionType::SUPPORTED_VERSIONS,
        version.to_be_bytes().to_vec(),
    )
}

pub fn parse_supported_versions_sh(data: &[u8]) -> Result<u16, TlsError> {
    let mut r = Reader::new("supported_versions", data);
    let v = r.read_u16("selected_version")?;
    r.finish()?;
    Ok(v)
}

// ---------------------------------------------------------------------------
// psk_key_exchange_modes (RFC 8446 §4.2.9)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PskKeyExchangeMode {
    /// PSK only, no (EC)DHE.
    PskKe = 0,
    /// PSK with (EC)DHE.
    PskDheKe = 1,
}

impl PskKeyExchangeMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PskKeyExchangeMode::PskKe),
            1 => Some(PskKeyExchangeMode::PskDheKe),
            _ => None,
        }
    }
}

pub fn build_psk_key_exchange_modes(modes: &[PskKeyExchangeMode]) -> Extension {
    let raw: Vec<u8> = modes.iter().map(|m| *m as u8).collect();
    let mut data = Vec::with_capacity(1 + raw.len());
    put_vec8(&mut data, &raw);
    Extension::new(ExtensionType::PSK_KEY_EXCHANGE_MODES, data)
}

/// Unknown mode values are skipped.
pub fn parse_psk_key_exchange_modes(data: &[u8]) -> Result<Vec<PskKeyExchangeMode>, TlsError> {
    let mut r = Reader::new("psk_key_exchange_modes", data);
    let list = r.read_vec8("ke_modes")?;
    r.finish()?;
    if list.is_empty() {
        return Err(r.err("empty ke_modes"));
    }
    Ok(list
        .iter()
        .filter_map(|v| PskKeyExchangeMode::from_u8(*v))
        .collect())
}

// ---------------------------------------------------------------------------
// early_data, renegotiation_info, post_handshake_auth
// ---------------------------------------------------------------------------

/// early_data in ClientHello / EncryptedExtensions: empty body.
pub fn build_early_data() -> Extension {
    Extension::new(ExtensionType::EARLY_DATA, Vec::new())
}

/// early_data in NewSessionTicket: max_early_data_size(4).
pub fn build_early_data_nst(max_early_data_size: u32) -> Extension {
    Extension::new(
        ExtensionType::EARLY_DATA,
        max_early_data_size.to_be_bytes().to_vec(),
    )
}

/// Returns `Some(max_early_data_size)` in a NewSessionTicket, `None` elsewhere.
pub fn parse_early_data(data: &[u8], ctx: ExtensionContext) -> Result<Option<u32>, TlsError> {
    let mut r = Reader::new("early_data", data);
    let max = match ctx {
        ExtensionContext::NewSessionTicket => Some(r.read_u32("max_early_data_size")?),
        _ => None,
    };
    r.finish()?;
    Ok(max)
}

/// renegotiation_info (RFC 5746): renegotiated_connection(1-byte len).
pub fn build_renegotiation_info(renegotiated_connection: &[u8]) -> Extension {
    let mut data = Vec::with_capacity(1 + renegotiated_connection.len());
    put_vec8(&mut data, renegotiated_connection);
    Extension::new(ExtensionType::RENEGOTIATION_INFO, data)
}

pub fn parse_renegotiation_info(data: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut r = Reader::new("renegotiation_info", data);
    let conn = r.read_vec8("renegotiated_connection")?.to_vec();
    r.finish()?;
    Ok(conn)
}

pub fn build_post_handshake_auth() -> Extension {
    Extension::new(ExtensionType::POST_HANDSHAKE_AUTH, Vec::new())
}

pub fn parse_post_handshake_auth(data: &[u8]) -> Result<(), TlsError> {
    Reader::new("post_handshake_auth", data).finish()
}

// ---------------------------------------------------------------------------
// Typed dispatch
// ---------------------------------------------------------------------------

/// A decoded extension payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionBody {
    KeyShareClient(Vec<KeyShareEntry>),
    KeyShareServer(KeyShareEntry),
    KeyShareRetry(NamedGroup),
    PreSharedKeyClient(OfferedPsks),
    PreSharedKeyServer(u16),
    SupportedGroups(Vec<NamedGroup>),
    SignatureAlgorithms(Vec<SignatureScheme>),
    SupportedVersionsClient(Vec<u16>),
    SupportedVersionsServer(u16),
    PskKeyExchangeModes(Vec<PskKeyExchangeMode>),
    EarlyData(Option<u32>),
    RenegotiationInfo(Vec<u8>),
    PostHandshakeAuth,
    Unknown(Extension),
}

impl ExtensionBody {
    /// Decode `ext` as carried in the message described by `ctx`.
    pub fn parse(ext: &Extension, ctx: ExtensionContext) -> Result<Self, TlsError> {
        use ExtensionContext as Ctx;
        let data = ext.data.as_slice();
        let body = match ext.extension_type {
            ExtensionType::KEY_SHARE => match ctx {
                Ctx::ClientHello => Self::KeyShareClient(parse_key_share_ch(data)?),
                Ctx::HelloRetryRequest => Self::KeyShareRetry(parse_key_share_hrr(data)?),
                _ => Self::KeyShareServer(parse_key_share_sh(data)?),
            },
            ExtensionType::PRE_SHARED_KEY => match ctx {
                Ctx::ClientHello => Self::PreSharedKeyClient(parse_pre_shared_key_ch(data)?),
                _ => Self::PreSharedKeyServer(parse_pre_shared_key_sh(data)?),
            },
            ExtensionType::SUPPORTED_VERSIONS => match ctx {
                Ctx::ClientHello => {
                    Self::SupportedVersionsClient(parse_supported_versions_ch(data)?)
                }
                _ => Self::SupportedVersionsServer(parse_supported_versions_sh(data)?),
            },
            ExtensionType::SUPPORTED_GROUPS => {
                Self::SupportedGroups(parse_supported_groups(data)?)
            }
            ExtensionType::SIGNATURE_ALGORITHMS => {
                Self::SignatureAlgorithms(parse_signature_algorithms(data)?)
            }
            ExtensionType::PSK_KEY_EXCHANGE_MODES => {
                Self::PskKeyExchangeModes(parse_psk_key_exchange_modes(data)?)
            }
            ExtensionType::EARLY_DATA => Self::EarlyData(parse_early_data(data, ctx)?),
            ExtensionType::RENEGOTIATION_INFO => {
                Self::RenegotiationInfo(parse_renegotiation_info(data)?)
            }
            ExtensionType::POST_HANDSHAKE_AUTH => {
                parse_post_handshake_auth(data)?;
                Self::PostHandshakeAuth
            }
            _ => Self::Unknown(ext.clone()),
        };
        Ok(body)
    }
}
