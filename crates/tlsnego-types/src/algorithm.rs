/// Hash algorithms usable by the TLS key schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Sha256,
    Sha384,
}

impl HashAlgId {
    /// Digest output size in bytes.
    pub fn output_size(self) -> usize {
        match self {
            HashAlgId::Sha256 => 32,
            HashAlgId::Sha384 => 48,
        }
    }

    /// Internal block size in bytes (the HMAC key block width).
    pub fn block_size(self) -> usize {
        match self {
            HashAlgId::Sha256 => 64,
            HashAlgId::Sha384 => 128,
        }
    }
}

/// TLS named group identifiers (supported_groups / key_share).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedGroup(pub u16);

impl NamedGroup {
    // Elliptic curves
    pub const SECP256R1: Self = Self(0x0017);
    pub const SECP384R1: Self = Self(0x0018);
    pub const SECP521R1: Self = Self(0x0019);
    pub const X25519: Self = Self(0x001D);
    pub const X448: Self = Self(0x001E);
    // Finite field DH (RFC 7919)
    pub const FFDHE2048: Self = Self(0x0100);
    pub const FFDHE3072: Self = Self(0x0101);
    pub const FFDHE4096: Self = Self(0x0102);
    pub const FFDHE6144: Self = Self(0x0103);
    pub const FFDHE8192: Self = Self(0x0104);

    /// Default preference order offered in supported_groups.
    pub const RECOMMENDED: [NamedGroup; 6] = [
        NamedGroup::X25519,
        NamedGroup::SECP256R1,
        NamedGroup::SECP384R1,
        NamedGroup::SECP521R1,
        NamedGroup::FFDHE2048,
        NamedGroup::FFDHE3072,
    ];

    /// IANA name of the group, if known.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            NamedGroup::SECP256R1 => "secp256r1",
            NamedGroup::SECP384R1 => "secp384r1",
            NamedGroup::SECP521R1 => "secp521r1",
            NamedGroup::X25519 => "x25519",
            NamedGroup::X448 => "x448",
            NamedGroup::FFDHE2048 => "ffdhe2048",
            NamedGroup::FFDHE3072 => "ffdhe3072",
            NamedGroup::FFDHE4096 => "ffdhe4096",
            NamedGroup::FFDHE6144 => "ffdhe6144",
            NamedGroup::FFDHE8192 => "ffdhe8192",
            _ => return None,
        };
        Some(name)
    }

    pub fn is_elliptic_curve(&self) -> bool {
        matches!(
            *self,
            NamedGroup::SECP256R1
                | NamedGroup::SECP384R1
                | NamedGroup::SECP521R1
                | NamedGroup::X25519
                | NamedGroup::X448
        )
    }

    pub fn is_finite_field(&self) -> bool {
        (0x0100..=0x0104).contains(&self.0)
    }
}

/// TLS signature scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureScheme(pub u16);

impl SignatureScheme {
    pub const RSA_PKCS1_SHA256: Self = Self(0x0401);
    pub const RSA_PKCS1_SHA384: Self = Self(0x0501);
    pub const RSA_PKCS1_SHA512: Self = Self(0x0601);
    pub const ECDSA_SECP256R1_SHA256: Self = Self(0x0403);
    pub const ECDSA_SECP384R1_SHA384: Self = Self(0x0503);
    pub const ECDSA_SECP521R1_SHA512: Self = Self(0x0603);
    pub const RSA_PSS_RSAE_SHA256: Self = Self(0x0804);
    pub const RSA_PSS_RSAE_SHA384: Self = Self(0x0805);
    pub const RSA_PSS_RSAE_SHA512: Self = Self(0x0806);
    pub const ED25519: Self = Self(0x0807);
    pub const ED448: Self = Self(0x0808);

    /// RSA PKCS#1 v1.5 schemes are not allowed in TLS 1.3 CertificateVerify.
    pub fn allowed_in_tls13(&self) -> bool {
        !matches!(
            *self,
            SignatureScheme::RSA_PKCS1_SHA256
                | SignatureScheme::RSA_PKCS1_SHA384
                | SignatureScheme::RSA_PKCS1_SHA512
        )
    }
}
