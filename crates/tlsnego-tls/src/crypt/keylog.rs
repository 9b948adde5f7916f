//! NSS key log format (SSLKEYLOGFILE).
//!
//! Each line is `<label> <client_random_hex> <secret_hex>`. The callback
//! configured on [`HandshakeConfig`] is the only place key material leaves
//! the crate; nothing here goes through `tracing`.

use crate::config::HandshakeConfig;

pub const CLIENT_RANDOM: &str = "CLIENT_RANDOM";
pub const CLIENT_EARLY_TRAFFIC_SECRET: &str = "CLIENT_EARLY_TRAFFIC_SECRET";
pub const CLIENT_HANDSHAKE_TRAFFIC_SECRET: &str = "CLIENT_HANDSHAKE_TRAFFIC_SECRET";
pub const SERVER_HANDSHAKE_TRAFFIC_SECRET: &str = "SERVER_HANDSHAKE_TRAFFIC_SECRET";
pub const CLIENT_TRAFFIC_SECRET_0: &str = "CLIENT_TRAFFIC_SECRET_0";
pub const SERVER_TRAFFIC_SECRET_0: &str = "SERVER_TRAFFIC_SECRET_0";
pub const EXPORTER_SECRET: &str = "EXPORTER_SECRET";

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Emit one key log line through the configured callback, if any.
pub fn log_key(config: &HandshakeConfig, label: &str, client_random: &[u8], secret: &[u8]) {
    if let Some(cb) = &config.key_log_callback {
        let line = format!("{} {} {}", label, to_hex(client_random), to_hex(secret));
        cb(&line);
    }
}

/// TLS 1.2 master secret line.
pub fn log_master_secret(config: &HandshakeConfig, client_random: &[u8], master_secret: &[u8]) {
    log_key(config, CLIENT_RANDOM, client_random, master_secret);
}
