//! Integration tests for tlsnego.
//! Complete TLS 1.2 and TLS 1.3 negotiations across the workspace crates:
//! codec, handshake flow, key schedules and session support.

use tlsnego_crypto::provider::{CryptoProvider, Digest, KeyPair};
use tlsnego_crypto::sha2::Sha256;
use tlsnego_types::{CryptoError, NamedGroup, SignatureScheme};

/// Hash-based stand-in for the asymmetric provider.
///
/// A signing key is also its own verification key, so a certificate's
/// bytes can serve as both. Key agreement is symmetric over the two public
/// values: `public = H(private)`, `shared = H(min(pub) || max(pub))`.
pub struct HashProvider;

fn sha256(parts: &[&[u8]]) -> Result<Vec<u8>, CryptoError> {
    let mut ctx = Sha256::new();
    for part in parts {
        ctx.update(part)?;
    }
    let mut out = vec![0u8; 32];
    ctx.finish(&mut out)?;
    Ok(out)
}

fn check_group(group: NamedGroup) -> Result<(), CryptoError> {
    if group.is_elliptic_curve() {
        Ok(())
    } else {
        Err(CryptoError::NotSupported)
    }
}

impl CryptoProvider for HashProvider {
    fn sign(
        &self,
        data: &[u8],
        private_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<Vec<u8>, CryptoError> {
        sha256(&[private_key, &scheme.0.to_be_bytes(), data])
    }

    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool, CryptoError> {
        Ok(sha256(&[public_key, &scheme.0.to_be_bytes(), data])? == signature)
    }

    fn ecdh(
        &self,
        group: NamedGroup,
        peer_public: &[u8],
        own_private: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        check_group(group)?;
        let own_public = sha256(&[own_private])?;
        let (lo, hi) = if own_public.as_slice() <= peer_public {
            (own_public.as_slice(), peer_public)
        } else {
            (peer_public, own_public.as_slice())
        };
        sha256(&[lo, hi])
    }

    fn generate_key_pair(&self, group: NamedGroup) -> Result<KeyPair, CryptoError> {
        check_group(group)?;
        let private_key = self.random(32)?;
        let public_key = sha256(&[&private_key])?;
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    use tlsnego_tls::alert::{AlertDescription, AlertLevel};
    use tlsnego_tls::config::{HandshakeConfig, KeyLogCallback};
    use tlsnego_tls::crypt::key_schedule::KeySchedule;
    use tlsnego_tls::crypt::key_schedule12::{
        compute_verify_data, derive_extended_master_secret, derive_key_block,
        CLIENT_FINISHED_LABEL, SERVER_FINISHED_LABEL,
    };
    use tlsnego_tls::crypt::keylog::{self, log_key, log_master_secret};
    use tlsnego_tls::crypt::traffic_keys::TrafficKeys;
    use tlsnego_tls::crypt::{verify_finished, CipherSuiteParams, Tls12CipherSuiteParams};
    use tlsnego_tls::extensions::{find_extension, Extension, ExtensionType};
    use tlsnego_tls::handshake::codec::{
        CertificateMsg, ClientHello, EncryptedExtensions, FinishedMsg, NewSessionTicketMsg,
        ServerHello,
    };
    use tlsnego_tls::handshake::codec12::{
        CertificateRequest, ClientKeyExchange, ServerKeyExchangeParams, CERT_TYPE_ECDSA_SIGN,
    };
    use tlsnego_tls::handshake::extensions_codec::{
        build_key_share_ch, build_key_share_sh, build_pre_shared_key_ch,
        build_pre_shared_key_sh, build_psk_key_exchange_modes, build_signature_algorithms,
        build_supported_groups, build_supported_versions_ch, build_supported_versions_sh,
        parse_key_share_ch, parse_key_share_sh, parse_pre_shared_key_ch,
        parse_pre_shared_key_sh, parse_psk_key_exchange_modes, parse_signature_algorithms,
        parse_supported_groups, parse_supported_versions_ch, parse_supported_versions_sh,
        KeyShareEntry, OfferedPsks, PskIdentity, PskKeyExchangeMode,
    };
    use tlsnego_tls::handshake::flow::HandshakeFlow;
    use tlsnego_tls::handshake::key_exchange::KeyExchange;
    use tlsnego_tls::handshake::message::HandshakeMessage;
    use tlsnego_tls::handshake::verify::{
        sign_certificate_verify, sign_server_key_exchange, sign_tls12_certificate_verify,
        verify_certificate_verify, verify_server_key_exchange, verify_tls12_certificate_verify,
    };
    use tlsnego_tls::handshake::HandshakeState;
    use tlsnego_tls::session::psk::{compute_binder, truncated_client_hello_hash, verify_binder};
    use tlsnego_tls::session::{
        InMemorySessionStore, PskNegotiator, SessionSecurityValidator, SessionStore,
        SessionTicketManager, TlsSession,
    };
    use tlsnego_tls::{CipherSuite, TlsRole, TlsVersion};
    use tlsnego_types::TlsError;

    const SERVER_CERT: &[u8] = b"interop-server-certificate";
    const CLIENT_CERT: &[u8] = b"interop-client-certificate";

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn capture_key_log() -> (KeyLogCallback, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let cb: KeyLogCallback = Arc::new(move |line: &str| sink.lock().push(line.to_string()));
        (cb, lines)
    }

    fn tls13_client_hello(
        config: &HandshakeConfig,
        kx: &KeyExchange,
        extra: Vec<Extension>,
    ) -> ClientHello {
        let mut extensions = vec![
            build_supported_versions_ch(&config.supported_wire_versions()),
            build_supported_groups(&config.supported_groups),
            build_signature_algorithms(&config.signature_algorithms),
            build_key_share_ch(&[KeyShareEntry {
                group: kx.group(),
                key_exchange: kx.public_key_bytes().to_vec(),
            }]),
        ];
        extensions.extend(extra);
        ClientHello {
            random: HashProvider.random(32).unwrap(),
            session_id: vec![0x77; 32],
            cipher_suites: config.cipher_suites.clone(),
            extensions,
            ..Default::default()
        }
    }

    fn extension<'a>(exts: &'a [Extension], ty: ExtensionType) -> Result<&'a [u8], TlsError> {
        find_extension(exts, ty)
            .map(|e| e.data.as_slice())
            .ok_or_else(|| TlsError::ValidationFailure(format!("missing extension {}", ty.0)))
    }

    /// Server side of TLS 1.3 hello negotiation: suite and the client's
    /// key share for the chosen group.
    fn negotiate_tls13(
        config: &HandshakeConfig,
        ch: &ClientHello,
    ) -> Result<(CipherSuite, KeyShareEntry), TlsError> {
        let versions = parse_supported_versions_ch(extension(
            &ch.extensions,
            ExtensionType::SUPPORTED_VERSIONS,
        )?)?;
        if config.negotiate_version(&versions)? != TlsVersion::Tls13 {
            return Err(TlsError::UnsupportedVersion);
        }
        let suite = config.negotiate_cipher_suite(&ch.cipher_suites, TlsVersion::Tls13)?;
        let shares = parse_key_share_ch(extension(&ch.extensions, ExtensionType::KEY_SHARE)?)?;
        let groups: Vec<NamedGroup> = shares.iter().map(|s| s.group).collect();
        let group = config.negotiate_group(&groups)?;
        let share = shares
            .into_iter()
            .find(|s| s.group == group)
            .ok_or_else(|| TlsError::ValidationFailure("no key share".into()))?;
        Ok((suite, share))
    }

    fn server_hello_13(suite: CipherSuite, share: &KeyShareEntry, extra: Vec<Extension>) -> ServerHello {
        let mut extensions = vec![
            build_supported_versions_sh(TlsVersion::Tls13.wire_version()),
            build_key_share_sh(share),
        ];
        extensions.extend(extra);
        ServerHello {
            random: HashProvider.random(32).unwrap(),
            session_id: vec![0x77; 32],
            cipher_suite: suite,
            extensions,
            ..Default::default()
        }
    }

    // -------------------------------------------------------
    // 1. TLS 1.3 full handshake, certificate authentication, ticket
    // -------------------------------------------------------
    #[test]
    fn test_tls13_full_handshake() {
        let p = HashProvider;
        let (cb, lines) = capture_key_log();
        let client_cfg = HandshakeConfig::builder()
            .role(TlsRole::Client)
            .key_log(cb)
            .build();
        let server_cfg = HandshakeConfig::builder()
            .role(TlsRole::Server)
            .certificate_chain(vec![SERVER_CERT.to_vec()])
            .private_key(SERVER_CERT.to_vec())
            .build();
        let tickets = SessionTicketManager::new().unwrap();

        // ClientHello
        let client_kx = KeyExchange::generate(&p, client_cfg.supported_groups[0]).unwrap();
        let ch = tls13_client_hello(&client_cfg, &client_kx, Vec::new());
        let client_random = ch.random.clone();
        let mut client = HandshakeFlow::from_config(&client_cfg, TlsVersion::Tls13);
        let ch_bytes = client.send(&HandshakeMessage::ClientHello(ch)).unwrap();

        // Server: negotiate, then feed the flow.
        let HandshakeMessage::ClientHello(ch) = HandshakeMessage::decode_framed(&ch_bytes).unwrap()
        else {
            panic!("expected ClientHello")
        };
        let (suite, client_share) = negotiate_tls13(&server_cfg, &ch).unwrap();
        assert_eq!(suite, CipherSuite::TLS_AES_128_GCM_SHA256);
        let params = CipherSuiteParams::from_suite(suite).unwrap();
        let mut server = HandshakeFlow::from_config(&server_cfg, TlsVersion::Tls13);
        server.receive(&ch_bytes).unwrap();
        server.set_hash_alg(params.hash_alg()).unwrap();

        let server_kx = KeyExchange::generate(&p, client_share.group).unwrap();
        let server_share = KeyShareEntry {
            group: server_kx.group(),
            key_exchange: server_kx.public_key_bytes().to_vec(),
        };
        let sh = server_hello_13(suite, &server_share, Vec::new());
        let sh_bytes = server.send(&HandshakeMessage::ServerHello(sh)).unwrap();

        // Client processes ServerHello.
        let HandshakeMessage::ServerHello(sh) = client.receive(&sh_bytes).unwrap() else {
            panic!("expected ServerHello")
        };
        let selected = parse_supported_versions_sh(extension(
            &sh.extensions,
            ExtensionType::SUPPORTED_VERSIONS,
        )
        .unwrap())
        .unwrap();
        assert_eq!(selected, 0x0304);
        client.set_hash_alg(params.hash_alg()).unwrap();
        let peer_share =
            parse_key_share_sh(extension(&sh.extensions, ExtensionType::KEY_SHARE).unwrap())
                .unwrap();

        // Handshake secrets on both sides.
        let client_shared = client_kx
            .compute_shared_secret(&p, &peer_share.key_exchange)
            .unwrap();
        let server_shared = server_kx
            .compute_shared_secret(&p, &client_share.key_exchange)
            .unwrap();
        let mut cks = KeySchedule::new(params.clone());
        cks.derive_early_secret(None).unwrap();
        cks.derive_handshake_secret(&client_shared).unwrap();
        let (c_chs, c_shs) = cks
            .derive_handshake_traffic_secrets(&client.transcript_hash().unwrap())
            .unwrap();
        let mut sks = KeySchedule::new(params.clone());
        sks.derive_early_secret(None).unwrap();
        sks.derive_handshake_secret(&server_shared).unwrap();
        let (s_chs, s_shs) = sks
            .derive_handshake_traffic_secrets(&server.transcript_hash().unwrap())
            .unwrap();
        assert_eq!(c_chs, s_chs);
        assert_eq!(c_shs, s_shs);
        log_key(&client_cfg, keylog::CLIENT_HANDSHAKE_TRAFFIC_SECRET, &client_random, &c_chs);
        log_key(&client_cfg, keylog::SERVER_HANDSHAKE_TRAFFIC_SECRET, &client_random, &c_shs);

        // Server flight: EE, Certificate, CertificateVerify, Finished.
        let ee = server
            .send(&HandshakeMessage::EncryptedExtensions(EncryptedExtensions::default()))
            .unwrap();
        client.receive(&ee).unwrap();

        let cert = server
            .send(&HandshakeMessage::Certificate(CertificateMsg {
                certificate_list: server_cfg.certificate_chain.clone(),
            }))
            .unwrap();
        let HandshakeMessage::Certificate(peer_cert) = client.receive(&cert).unwrap() else {
            panic!("expected Certificate")
        };

        let client_sigalgs = parse_signature_algorithms(
            extension(&ch.extensions, ExtensionType::SIGNATURE_ALGORITHMS).unwrap(),
        )
        .unwrap();
        let scheme = server_cfg
            .select_signature_scheme(&client_sigalgs, TlsVersion::Tls13)
            .unwrap();
        let signing_key = server_cfg.private_key.as_ref().unwrap();
        let cv = sign_certificate_verify(
            &p,
            scheme,
            signing_key,
            &server.transcript_hash().unwrap(),
            TlsRole::Server,
        )
        .unwrap();
        let cv_bytes = server.send(&HandshakeMessage::CertificateVerify(cv)).unwrap();
        let HandshakeMessage::CertificateVerify(cv) = client.receive(&cv_bytes).unwrap() else {
            panic!("expected CertificateVerify")
        };
        verify_certificate_verify(
            &p,
            &peer_cert.certificate_list[0],
            &cv,
            client.hash_before_last_message().unwrap(),
            TlsRole::Server,
        )
        .unwrap();

        let s_fin_key = sks.derive_finished_key(&s_shs).unwrap();
        let s_vd = sks
            .compute_finished_verify_data(&s_fin_key, &server.transcript_hash().unwrap())
            .unwrap();
        let fin = server
            .send(&HandshakeMessage::Finished(FinishedMsg { verify_data: s_vd }))
            .unwrap();
        let HandshakeMessage::Finished(fin) = client.receive(&fin).unwrap() else {
            panic!("expected Finished")
        };
        let c_fin_key = cks.derive_finished_key(&c_shs).unwrap();
        let expected = cks
            .compute_finished_verify_data(&c_fin_key, client.hash_before_last_message().unwrap())
            .unwrap();
        verify_finished(&expected, &fin.verify_data).unwrap();
        assert_eq!(client.state(), HandshakeState::WaitNewSessionTicket);
        assert_eq!(server.state(), HandshakeState::WaitClientFinished);

        // Application secrets over ClientHello..server Finished.
        cks.derive_master_secret().unwrap();
        sks.derive_master_secret().unwrap();
        let (c_cap, c_sap) = cks
            .derive_app_traffic_secrets(&client.transcript_hash().unwrap())
            .unwrap();
        let (s_cap, s_sap) = sks
            .derive_app_traffic_secrets(&server.transcript_hash().unwrap())
            .unwrap();
        assert_eq!(c_cap, s_cap);
        assert_eq!(c_sap, s_sap);
        log_key(&client_cfg, keylog::CLIENT_TRAFFIC_SECRET_0, &client_random, &c_cap);
        log_key(&client_cfg, keylog::SERVER_TRAFFIC_SECRET_0, &client_random, &c_sap);

        let c_keys = TrafficKeys::derive(&params, &c_cap).unwrap();
        let s_keys = TrafficKeys::derive(&params, &s_cap).unwrap();
        assert_eq!(c_keys.key, s_keys.key);
        assert_eq!(c_keys.iv, s_keys.iv);
        assert_eq!(c_keys.key.len(), 16);

        // Client Finished.
        let c_hs_fin_key = cks.derive_finished_key(&c_chs).unwrap();
        let c_vd = cks
            .compute_finished_verify_data(&c_hs_fin_key, &client.transcript_hash().unwrap())
            .unwrap();
        let fin = client
            .send_untracked(&HandshakeMessage::Finished(FinishedMsg { verify_data: c_vd }))
            .unwrap();
        let HandshakeMessage::Finished(fin) = server.receive(&fin).unwrap() else {
            panic!("expected Finished")
        };
        let s_chs_fin_key = sks.derive_finished_key(&s_chs).unwrap();
        let expected = sks
            .compute_finished_verify_data(&s_chs_fin_key, server.hash_before_last_message().unwrap())
            .unwrap();
        verify_finished(&expected, &fin.verify_data).unwrap();

        // NewSessionTicket carrying the resumption PSK.
        let nonce = vec![0x00, 0x01];
        let s_rms = sks
            .derive_resumption_master_secret(&server.transcript_hash().unwrap())
            .unwrap();
        let psk = sks.derive_resumption_psk(&s_rms, &nonce).unwrap();
        let lifetime = server_cfg.ticket_lifetime.as_secs() as u32;
        let mut session = TlsSession::new(Vec::new(), TlsVersion::Tls13, suite, psk, lifetime);
        session.ticket_nonce = nonce.clone();
        let ticket = tickets.create_ticket(&session).unwrap();
        let nst = server
            .send(&HandshakeMessage::NewSessionTicket(NewSessionTicketMsg {
                ticket_lifetime: lifetime,
                ticket_age_add: 0x0102_0304,
                ticket_nonce: nonce,
                ticket,
                extensions: Vec::new(),
            }))
            .unwrap();
        let HandshakeMessage::NewSessionTicket(nst) = client.receive(&nst).unwrap() else {
            panic!("expected NewSessionTicket")
        };
        assert!(client.is_complete());
        assert!(server.is_complete());

        let c_rms = cks
            .derive_resumption_master_secret(&client.hash_before_last_message().unwrap())
            .unwrap();
        let client_psk = cks.derive_resumption_psk(&c_rms, &nst.ticket_nonce).unwrap();
        let resumed = tickets.open_ticket(&nst.ticket).unwrap();
        assert_eq!(resumed.master_secret, client_psk);
        assert!(SessionSecurityValidator::new().validate_tls13_psk(&resumed, suite));

        let lines = lines.lock();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("CLIENT_HANDSHAKE_TRAFFIC_SECRET "));
        assert!(lines[3].starts_with("SERVER_TRAFFIC_SECRET_0 "));
        assert!(lines
            .iter()
            .all(|l| l.split(' ').nth(1) == Some(to_hex(&client_random).as_str())));
    }

    // -------------------------------------------------------
    // 2. TLS 1.3 PSK handshake with binder check
    // -------------------------------------------------------
    #[test]
    fn test_tls13_psk_handshake() {
        let p = HashProvider;
        let identity = b"resumption-ticket-1".to_vec();
        let psk = vec![0x5Au8; 32];
        let suite = CipherSuite::TLS_AES_128_GCM_SHA256;
        let params = CipherSuiteParams::from_suite(suite).unwrap();

        let store = Arc::new(InMemorySessionStore::new(16));
        store.store(&identity, &psk, Duration::from_secs(600));
        let mut negotiator = PskNegotiator::new(store.clone());

        let client_cfg = HandshakeConfig::builder()
            .role(TlsRole::Client)
            .cipher_suites(&[suite])
            .psk_mode(true)
            .build();
        let server_cfg = HandshakeConfig::builder()
            .role(TlsRole::Server)
            .psk_mode(true)
            .build();

        // ClientHello with pre_shared_key last and its binder filled in.
        let client_kx = KeyExchange::generate(&p, NamedGroup::X25519).unwrap();
        let mut offered = OfferedPsks {
            identities: vec![PskIdentity {
                identity: identity.clone(),
                obfuscated_ticket_age: 1000,
            }],
            binders: vec![vec![0u8; params.hash_len]],
        };
        let mut ch = tls13_client_hello(
            &client_cfg,
            &client_kx,
            vec![
                build_psk_key_exchange_modes(&client_cfg.psk_ke_modes),
                build_pre_shared_key_ch(&offered).unwrap(),
            ],
        );
        let partial = HandshakeMessage::ClientHello(ch.clone()).encode();
        let hash = truncated_client_hello_hash(&params, &partial, offered.binders_len()).unwrap();
        offered.binders[0] = compute_binder(&params, &psk, false, &hash).unwrap();
        if let Some(last) = ch.extensions.last_mut() {
            *last = build_pre_shared_key_ch(&offered).unwrap();
        }

        let mut client = HandshakeFlow::from_config(&client_cfg, TlsVersion::Tls13);
        let ch_bytes = client.send(&HandshakeMessage::ClientHello(ch)).unwrap();

        // Server: pick the PSK and check the binder before accepting.
        let HandshakeMessage::ClientHello(ch) = HandshakeMessage::decode_framed(&ch_bytes).unwrap()
        else {
            panic!("expected ClientHello")
        };
        let (suite, client_share) = negotiate_tls13(&server_cfg, &ch).unwrap();
        let modes = parse_psk_key_exchange_modes(
            extension(&ch.extensions, ExtensionType::PSK_KEY_EXCHANGE_MODES).unwrap(),
        )
        .unwrap();
        let received = parse_pre_shared_key_ch(
            extension(&ch.extensions, ExtensionType::PRE_SHARED_KEY).unwrap(),
        )
        .unwrap();
        assert!(negotiator.negotiate(&received.identities, &modes));
        assert_eq!(negotiator.negotiated_mode(), Some(PskKeyExchangeMode::PskDheKe));
        let index = negotiator.negotiated_index().unwrap();
        let server_psk = negotiator.negotiated_psk().unwrap();
        let hash =
            truncated_client_hello_hash(&params, &ch_bytes, received.binders_len()).unwrap();
        verify_binder(&params, &server_psk, false, &hash, &received.binders[index as usize])
            .unwrap();

        let mut forged = received.binders[index as usize].clone();
        forged[0] ^= 0xFF;
        assert!(verify_binder(&params, &server_psk, false, &hash, &forged).is_err());

        // 0-RTT anti-replay: the identity can be consumed once.
        negotiator.check_replay(&identity).unwrap();
        assert!(negotiator.check_replay(&identity).is_err());

        let mut server = HandshakeFlow::from_config(&server_cfg, TlsVersion::Tls13);
        server.receive(&ch_bytes).unwrap();
        server.set_hash_alg(params.hash_alg()).unwrap();

        let server_kx = KeyExchange::generate(&p, client_share.group).unwrap();
        let sh = server_hello_13(
            suite,
            &KeyShareEntry {
                group: server_kx.group(),
                key_exchange: server_kx.public_key_bytes().to_vec(),
            },
            vec![build_pre_shared_key_sh(index)],
        );
        let sh_bytes = server.send(&HandshakeMessage::ServerHello(sh)).unwrap();
        let HandshakeMessage::ServerHello(sh) = client.receive(&sh_bytes).unwrap() else {
            panic!("expected ServerHello")
        };
        client.set_hash_alg(params.hash_alg()).unwrap();
        let selected =
            parse_pre_shared_key_sh(extension(&sh.extensions, ExtensionType::PRE_SHARED_KEY).unwrap())
                .unwrap();
        assert_eq!(selected, 0);
        let peer_share =
            parse_key_share_sh(extension(&sh.extensions, ExtensionType::KEY_SHARE).unwrap())
                .unwrap();

        let mut cks = KeySchedule::new(params.clone());
        cks.derive_early_secret(Some(psk.as_slice())).unwrap();
        cks.derive_handshake_secret(
            &client_kx
                .compute_shared_secret(&p, &peer_share.key_exchange)
                .unwrap(),
        )
        .unwrap();
        let mut sks = KeySchedule::new(params.clone());
        sks.derive_early_secret(Some(server_psk.as_slice())).unwrap();
        sks.derive_handshake_secret(
            &server_kx
                .compute_shared_secret(&p, &client_share.key_exchange)
                .unwrap(),
        )
        .unwrap();
        let (c_chs, c_shs) = cks
            .derive_handshake_traffic_secrets(&client.transcript_hash().unwrap())
            .unwrap();
        let (s_chs, s_shs) = sks
            .derive_handshake_traffic_secrets(&server.transcript_hash().unwrap())
            .unwrap();
        assert_eq!(c_shs, s_shs);

        // No certificates in PSK mode.
        let ee = server
            .send(&HandshakeMessage::EncryptedExtensions(EncryptedExtensions::default()))
            .unwrap();
        client.receive(&ee).unwrap();
        assert_eq!(client.state(), HandshakeState::WaitFinished);

        let key = sks.derive_finished_key(&s_shs).unwrap();
        let vd = sks
            .compute_finished_verify_data(&key, &server.transcript_hash().unwrap())
            .unwrap();
        let fin = server
            .send(&HandshakeMessage::Finished(FinishedMsg { verify_data: vd }))
            .unwrap();
        let HandshakeMessage::Finished(fin) = client.receive(&fin).unwrap() else {
            panic!("expected Finished")
        };
        let key = cks.derive_finished_key(&c_shs).unwrap();
        let expected = cks
            .compute_finished_verify_data(&key, client.hash_before_last_message().unwrap())
            .unwrap();
        verify_finished(&expected, &fin.verify_data).unwrap();

        let key = cks.derive_finished_key(&c_chs).unwrap();
        let vd = cks
            .compute_finished_verify_data(&key, &client.transcript_hash().unwrap())
            .unwrap();
        let fin = client
            .send_untracked(&HandshakeMessage::Finished(FinishedMsg { verify_data: vd }))
            .unwrap();
        let HandshakeMessage::Finished(fin) = server.receive(&fin).unwrap() else {
            panic!("expected Finished")
        };
        let key = sks.derive_finished_key(&s_chs).unwrap();
        let expected = sks
            .compute_finished_verify_data(&key, server.hash_before_last_message().unwrap())
            .unwrap();
        verify_finished(&expected, &fin.verify_data).unwrap();

        let nst = server
            .send(&HandshakeMessage::NewSessionTicket(NewSessionTicketMsg {
                ticket_lifetime: 600,
                ticket_age_add: 7,
                ticket_nonce: vec![1],
                ticket: b"next-identity".to_vec(),
                extensions: Vec::new(),
            }))
            .unwrap();
        client.receive(&nst).unwrap();
        assert!(client.is_complete());
        assert!(server.is_complete());
    }

    // -------------------------------------------------------
    // 3. TLS 1.2 ECDHE with client authentication and EMS
    // -------------------------------------------------------
    #[test]
    fn test_tls12_handshake_with_client_auth() {
        let p = HashProvider;
        let (cb, lines) = capture_key_log();
        let client_cfg = HandshakeConfig::builder()
            .role(TlsRole::Client)
            .max_version(TlsVersion::Tls12)
            .client_certificate_required(true)
            .certificate_chain(vec![CLIENT_CERT.to_vec()])
            .private_key(CLIENT_CERT.to_vec())
            .enable_extension(ExtensionType::EXTENDED_MASTER_SECRET)
            .key_log(cb)
            .build();
        let server_cfg = HandshakeConfig::builder()
            .role(TlsRole::Server)
            .client_certificate_required(true)
            .certificate_chain(vec![SERVER_CERT.to_vec()])
            .private_key(SERVER_CERT.to_vec())
            .enable_extension(ExtensionType::EXTENDED_MASTER_SECRET)
            .build();

        let ch = ClientHello {
            random: p.random(32).unwrap(),
            cipher_suites: client_cfg.cipher_suites.clone(),
            extensions: vec![
                build_supported_groups(&client_cfg.supported_groups),
                build_signature_algorithms(&client_cfg.signature_algorithms),
                Extension::new(ExtensionType::EXTENDED_MASTER_SECRET, Vec::new()),
            ],
            ..Default::default()
        };
        let mut client = HandshakeFlow::from_config(&client_cfg, TlsVersion::Tls12);
        let ch_bytes = client.send(&HandshakeMessage::ClientHello(ch)).unwrap();

        // Server negotiation.
        let HandshakeMessage::ClientHello(ch) = HandshakeMessage::decode_framed(&ch_bytes).unwrap()
        else {
            panic!("expected ClientHello")
        };
        let version = server_cfg.negotiate_version(&[ch.version]).unwrap();
        assert_eq!(version, TlsVersion::Tls12);
        let suite = server_cfg
            .negotiate_cipher_suite(&ch.cipher_suites, version)
            .unwrap();
        assert_eq!(suite, CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256);
        let groups = parse_supported_groups(
            extension(&ch.extensions, ExtensionType::SUPPORTED_GROUPS).unwrap(),
        )
        .unwrap();
        let group = server_cfg.negotiate_group(&groups).unwrap();
        let sigalgs = parse_signature_algorithms(
            extension(&ch.extensions, ExtensionType::SIGNATURE_ALGORITHMS).unwrap(),
        )
        .unwrap();
        let scheme = server_cfg.select_signature_scheme(&sigalgs, version).unwrap();
        assert!(find_extension(&ch.extensions, ExtensionType::EXTENDED_MASTER_SECRET).is_some());

        let params = Tls12CipherSuiteParams::from_suite(suite).unwrap();
        let alg = params.hash_alg();
        let mut server = HandshakeFlow::from_config(&server_cfg, version);
        server.receive(&ch_bytes).unwrap();
        server.set_hash_alg(alg).unwrap();

        // Server flight.
        let sh = ServerHello {
            random: p.random(32).unwrap(),
            session_id: p.random(32).unwrap(),
            cipher_suite: suite,
            extensions: vec![Extension::new(ExtensionType::EXTENDED_MASTER_SECRET, Vec::new())],
            ..Default::default()
        };
        let server_random = sh.random.clone();
        let session_id = sh.session_id.clone();
        let bytes = server.send(&HandshakeMessage::ServerHello(sh)).unwrap();
        client.receive(&bytes).unwrap();
        client.set_hash_alg(alg).unwrap();

        let bytes = server
            .send(&HandshakeMessage::Certificate(CertificateMsg {
                certificate_list: server_cfg.certificate_chain.clone(),
            }))
            .unwrap();
        let HandshakeMessage::Certificate(server_chain) = client.receive(&bytes).unwrap() else {
            panic!("expected Certificate")
        };

        let server_kx = KeyExchange::generate(&p, group).unwrap();
        let ske = sign_server_key_exchange(
            &p,
            scheme,
            server_cfg.private_key.as_ref().unwrap(),
            &ch.random,
            &server_random,
            ServerKeyExchangeParams::Ecdhe {
                named_group: group,
                public_key: server_kx.public_key_bytes().to_vec(),
            },
        )
        .unwrap();
        let bytes = server.send(&HandshakeMessage::ServerKeyExchange(ske)).unwrap();
        let HandshakeMessage::ServerKeyExchange(ske) = client.receive(&bytes).unwrap() else {
            panic!("expected ServerKeyExchange")
        };
        verify_server_key_exchange(
            &p,
            &server_chain.certificate_list[0],
            &ske,
            &ch.random,
            &server_random,
        )
        .unwrap();

        let bytes = server
            .send(&HandshakeMessage::CertificateRequest(CertificateRequest {
                certificate_types: vec![CERT_TYPE_ECDSA_SIGN],
                signature_algorithms: server_cfg.signature_algorithms.clone(),
                certificate_authorities: Vec::new(),
            }))
            .unwrap();
        let HandshakeMessage::CertificateRequest(cr) = client.receive(&bytes).unwrap() else {
            panic!("expected CertificateRequest")
        };
        let bytes = server.send(&HandshakeMessage::ServerHelloDone).unwrap();
        client.receive(&bytes).unwrap();
        assert_eq!(client.state(), HandshakeState::WaitClientCertificate);

        // Client flight: Certificate, ClientKeyExchange, CertificateVerify.
        let bytes = client
            .send(&HandshakeMessage::Certificate(CertificateMsg {
                certificate_list: client_cfg.certificate_chain.clone(),
            }))
            .unwrap();
        let HandshakeMessage::Certificate(client_chain) = server.receive(&bytes).unwrap() else {
            panic!("expected Certificate")
        };

        let (server_group, server_public) = ske.ecdhe_public().unwrap();
        let client_kx = KeyExchange::generate(&p, server_group).unwrap();
        let bytes = client
            .send(&HandshakeMessage::ClientKeyExchange(ClientKeyExchange {
                exchange_keys: client_kx.public_key_bytes().to_vec(),
            }))
            .unwrap();
        let HandshakeMessage::ClientKeyExchange(cke) = server.receive(&bytes).unwrap() else {
            panic!("expected ClientKeyExchange")
        };

        // Session hash covers everything through ClientKeyExchange.
        let c_session_hash = client.transcript_hash().unwrap();
        let s_session_hash = server.transcript_hash().unwrap();
        assert_eq!(c_session_hash, s_session_hash);

        let client_scheme = client_cfg
            .select_signature_scheme(&cr.signature_algorithms, TlsVersion::Tls12)
            .unwrap();
        // CertificateVerify signs the raw handshake messages so far.
        assert_eq!(client.handshake_messages(), server.handshake_messages());
        let cv = sign_tls12_certificate_verify(
            &p,
            client_scheme,
            client_cfg.private_key.as_ref().unwrap(),
            client.handshake_messages(),
        )
        .unwrap();
        let bytes = client.send(&HandshakeMessage::CertificateVerify(cv)).unwrap();
        let HandshakeMessage::CertificateVerify(cv) = server.receive(&bytes).unwrap() else {
            panic!("expected CertificateVerify")
        };
        verify_tls12_certificate_verify(
            &p,
            &client_chain.certificate_list[0],
            &cv,
            server.handshake_messages_before_last(),
        )
        .unwrap();
        assert!(verify_tls12_certificate_verify(
            &p,
            &client_chain.certificate_list[0],
            &cv,
            &s_session_hash,
        )
        .is_err());
        assert_eq!(client.state(), HandshakeState::WaitChangeCipherSpec);
        assert_eq!(server.state(), HandshakeState::WaitChangeCipherSpec);

        // Extended master secret and key block.
        let c_pms = client_kx
            .compute_shared_secret(&p, server_public)
            .unwrap();
        let s_pms = server_kx
            .compute_shared_secret(&p, &cke.exchange_keys)
            .unwrap();
        let c_ms = derive_extended_master_secret(alg, &c_pms, &c_session_hash).unwrap();
        let s_ms = derive_extended_master_secret(alg, &s_pms, &s_session_hash).unwrap();
        assert_eq!(c_ms, s_ms);
        log_master_secret(&client_cfg, &ch.random, &c_ms);

        let c_block = derive_key_block(&c_ms, &server_random, &ch.random, &params).unwrap();
        let s_block = derive_key_block(&s_ms, &server_random, &ch.random, &params).unwrap();
        assert_eq!(c_block.client_write_key, s_block.client_write_key);
        assert_eq!(c_block.server_write_iv, s_block.server_write_iv);

        // Client ChangeCipherSpec + Finished.
        server.receive_change_cipher_spec().unwrap();
        let vd = compute_verify_data(
            alg,
            &c_ms,
            CLIENT_FINISHED_LABEL,
            &client.transcript_hash().unwrap(),
        )
        .unwrap();
        let bytes = client
            .send_untracked(&HandshakeMessage::Finished(FinishedMsg { verify_data: vd }))
            .unwrap();
        let HandshakeMessage::Finished(fin) = server.receive(&bytes).unwrap() else {
            panic!("expected Finished")
        };
        let expected = compute_verify_data(
            alg,
            &s_ms,
            CLIENT_FINISHED_LABEL,
            server.hash_before_last_message().unwrap(),
        )
        .unwrap();
        verify_finished(&expected, &fin.verify_data).unwrap();

        // Server ChangeCipherSpec + Finished.
        client.receive_change_cipher_spec().unwrap();
        let vd = compute_verify_data(
            alg,
            &s_ms,
            SERVER_FINISHED_LABEL,
            &server.transcript_hash().unwrap(),
        )
        .unwrap();
        let bytes = server
            .send_untracked(&HandshakeMessage::Finished(FinishedMsg { verify_data: vd }))
            .unwrap();
        server.server_finished_sent().unwrap();
        let HandshakeMessage::Finished(fin) = client.receive(&bytes).unwrap() else {
            panic!("expected Finished")
        };
        let expected = compute_verify_data(
            alg,
            &c_ms,
            SERVER_FINISHED_LABEL,
            client.hash_before_last_message().unwrap(),
        )
        .unwrap();
        verify_finished(&expected, &fin.verify_data).unwrap();
        assert!(client.is_complete());
        assert!(server.is_complete());

        // Keep the session for an abbreviated handshake later.
        let tickets = SessionTicketManager::new().unwrap();
        let mut session = TlsSession::new(session_id, TlsVersion::Tls12, suite, s_ms, 3600);
        session.extended_master_secret = true;
        let ticket = tickets.create_ticket(&session).unwrap();
        let resumed = tickets.open_ticket(&ticket).unwrap();
        assert!(resumed.extended_master_secret);
        let validator = SessionSecurityValidator::new();
        assert!(validator.validate_tls12_session(&resumed, suite, TlsVersion::Tls12, false));
        assert!(validator.validate_against_server_options(
            &resumed,
            &server_cfg.cipher_suites,
            TlsVersion::Tls12,
            false
        ));

        let lines = lines.lock();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            format!("CLIENT_RANDOM {} {}", to_hex(&ch.random), to_hex(&c_ms))
        );
    }

    // -------------------------------------------------------
    // 4. Negotiation failures
    // -------------------------------------------------------
    #[test]
    fn test_no_shared_cipher_suite_aborts() {
        let p = HashProvider;
        let client_cfg = HandshakeConfig::builder()
            .role(TlsRole::Client)
            .cipher_suites(&[CipherSuite::TLS_CHACHA20_POLY1305_SHA256])
            .build();
        let server_cfg = HandshakeConfig::builder()
            .role(TlsRole::Server)
            .cipher_suites(&[CipherSuite::TLS_AES_256_GCM_SHA384])
            .build();

        let kx = KeyExchange::generate(&p, NamedGroup::X25519).unwrap();
        let ch = tls13_client_hello(&client_cfg, &kx, Vec::new());
        let mut client = HandshakeFlow::from_config(&client_cfg, TlsVersion::Tls13);
        let ch_bytes = client.send(&HandshakeMessage::ClientHello(ch.clone())).unwrap();

        let mut server = HandshakeFlow::from_config(&server_cfg, TlsVersion::Tls13);
        server.receive(&ch_bytes).unwrap();
        let err = negotiate_tls13(&server_cfg, &ch).unwrap_err();
        assert!(matches!(err, TlsError::NoSharedCipherSuite));

        let alert = server.abort(&err);
        assert_eq!(alert.level, AlertLevel::Fatal);
        assert_eq!(alert.description, AlertDescription::HandshakeFailure);
        assert_eq!(alert.encode(), [2, 40]);
        assert!(server.is_failed());
        assert!(server.send(&HandshakeMessage::ServerHelloDone).is_err());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let p = HashProvider;
        let client_cfg = HandshakeConfig::builder()
            .role(TlsRole::Client)
            .max_version(TlsVersion::Tls12)
            .build();
        let server_cfg = HandshakeConfig::builder()
            .role(TlsRole::Server)
            .min_version(TlsVersion::Tls13)
            .build();
        let kx = KeyExchange::generate(&p, NamedGroup::SECP256R1).unwrap();
        let ch = tls13_client_hello(&client_cfg, &kx, Vec::new());
        assert!(matches!(
            negotiate_tls13(&server_cfg, &ch),
            Err(TlsError::UnsupportedVersion)
        ));
    }

    #[test]
    fn test_forged_certificate_verify_rejected() {
        let p = HashProvider;
        let hash = [0x42u8; 32];
        let cv = sign_certificate_verify(
            &p,
            SignatureScheme::ECDSA_SECP256R1_SHA256,
            b"attacker-key",
            &hash,
            TlsRole::Server,
        )
        .unwrap();
        let err = verify_certificate_verify(&p, SERVER_CERT, &cv, &hash, TlsRole::Server)
            .unwrap_err();
        let mut flow = HandshakeFlow::new(
            tlsnego_tls::handshake::ProtocolVariant::Tls13Client,
            Default::default(),
        );
        assert_eq!(flow.abort(&err).description, AlertDescription::HandshakeFailure);
    }
}
