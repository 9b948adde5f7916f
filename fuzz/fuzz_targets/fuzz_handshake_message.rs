#![no_main]
use libfuzzer_sys::fuzz_target;
use tlsnego_tls::handshake::codec::parse_handshake_header;
use tlsnego_tls::handshake::message::HandshakeMessage;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let _ = parse_handshake_header(data);
    if let Ok(msg) = HandshakeMessage::decode_framed(data) {
        let _ = msg.validate();
        let _ = msg.encode();
    }
});
