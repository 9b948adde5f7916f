#![no_main]
use libfuzzer_sys::fuzz_target;
use tlsnego_tls::extensions::{Extension, ExtensionContext, ExtensionType};
use tlsnego_tls::handshake::extensions_codec::ExtensionBody;

const CONTEXTS: [ExtensionContext; 6] = [
    ExtensionContext::ClientHello,
    ExtensionContext::ServerHello,
    ExtensionContext::HelloRetryRequest,
    ExtensionContext::EncryptedExtensions,
    ExtensionContext::CertificateRequest,
    ExtensionContext::NewSessionTicket,
];

fuzz_target!(|data: &[u8]| {
    // First two bytes pick the extension type, the rest is its body.
    if data.len() < 2 {
        return;
    }
    let ext = Extension::new(
        ExtensionType(u16::from_be_bytes([data[0], data[1]])),
        data[2..].to_vec(),
    );
    for ctx in CONTEXTS {
        let _ = ExtensionBody::parse(&ext, ctx);
    }
});
