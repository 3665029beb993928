use anyhow::{Context, Result};
use quinn::ServerConfig;
use std::path::Path;

use arena_common::config::{create_quinn_server_config, load_certs, load_private_key};

// ============================================================================
// Connection Configuration
// ============================================================================

pub fn configure_server(cert: &Path, key: &Path) -> Result<ServerConfig> {
    let certs = load_certs(cert)?;
    let private_key = load_private_key(key)?;

    let crypto = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .context("failed to configure TLS")?;

    create_quinn_server_config(crypto)
}
