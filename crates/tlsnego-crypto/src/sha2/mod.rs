//! SHA-2 digests used by the TLS key schedules.
//!
//! SHA-256 and SHA-384 cover every cipher suite the handshake core
//! negotiates. The compression functions come from the RustCrypto `sha2`
//! crate; this module adapts them to the [`Digest`] provider trait so the
//! HMAC, HKDF and PRF code can work over boxed, runtime-selected hashes.

use crate::provider::Digest;
use tlsnego_types::CryptoError;

/// SHA-256 output size in bytes.
pub const SHA256_OUTPUT_SIZE: usize = 32;

/// SHA-384 output size in bytes.
pub const SHA384_OUTPUT_SIZE: usize = 48;

macro_rules! sha2_digest {
    ($name:ident, $inner:ty, $out:expr, $block:expr, $label:literal) => {
        #[doc = concat!($label, " hash context.")]
        #[derive(Clone)]
        pub struct $name {
            inner: $inner,
        }

        impl $name {
            #[doc = concat!("Create a new ", $label, " hash context.")]
            pub fn new() -> Self {
                Self {
                    inner: <$inner as ::sha2::Digest>::new(),
                }
            }

            #[doc = concat!("One-shot: compute the ", $label, " digest of `data`.")]
            pub fn digest(data: &[u8]) -> Result<[u8; $out], CryptoError> {
                let mut ctx = Self::new();
                Digest::update(&mut ctx, data)?;
                let mut out = [0u8; $out];
                Digest::finish(&mut ctx, &mut out)?;
                Ok(out)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Digest for $name {
            fn output_size(&self) -> usize {
                $out
            }

            fn block_size(&self) -> usize {
                $block
            }

            fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
                ::sha2::Digest::update(&mut self.inner, data);
                Ok(())
            }

            fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
                if out.len() < $out {
                    return Err(CryptoError::BufferTooSmall {
                        need: $out,
                        got: out.len(),
                    });
                }
                let digest = ::sha2::Digest::finalize_reset(&mut self.inner);
                out[..$out].copy_from_slice(&digest);
                Ok(())
            }

            fn reset(&mut self) {
                ::sha2::Digest::reset(&mut self.inner);
            }
        }
    };
}

sha2_digest!(Sha256, ::sha2::Sha256, SHA256_OUTPUT_SIZE, 64, "SHA-256");
sha2_digest!(Sha384, ::sha2::Sha384, SHA384_OUTPUT_SIZE, 128, "SHA-384");
