use anyhow::{Context, Result};
use quinn::TransportConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::{path::Path, sync::Arc, time::Duration};

// ============================================================================
// Constants
// ============================================================================

pub const ALPN_PROTOCOL: &[u8] = b"arena";

const IDLE_TIMEOUT_SECS: u64 = 10;
const KEEPALIVE_INTERVAL_SECS: u64 = 3;

// ============================================================================
// TLS Material
// ============================================================================

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let pem = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificates in {}", path.display()))?;
    anyhow::ensure!(!certs.is_empty(), "no certificates in {}", path.display());
    Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let pem = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    rustls_pemfile::private_key(&mut &pem[..])
        .with_context(|| format!("failed to parse private key in {}", path.display()))?
        .ok_or_else(|| anyhow::anyhow!("no private key in {}", path.display()))
}

// ============================================================================
// QUIC Transport
// ============================================================================

// Peers that go quiet are dropped after the idle timeout; keepalives stop that happening to idle-but-alive ones.
pub fn create_transport_config() -> Result<Arc<TransportConfig>> {
    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(Some(
        Duration::from_secs(IDLE_TIMEOUT_SECS)
            .try_into()
            .context("invalid idle timeout")?,
    ));
    transport.keep_alive_interval(Some(Duration::from_secs(KEEPALIVE_INTERVAL_SECS)));
    Ok(Arc::new(transport))
}

pub fn create_quinn_server_config(mut crypto: rustls::ServerConfig) -> Result<quinn::ServerConfig> {
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];
    let mut config = quinn::ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(crypto).context("failed to create QUIC server config")?,
    ));
    config.transport_config(create_transport_config()?);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_name_the_path() {
        let err = load_certs(Path::new("/nonexistent/arena-cert.pem")).expect_err("no such file");
        assert!(err.to_string().contains("arena-cert.pem"));
    }

    #[test]
    fn empty_pem_has_no_key() {
        let path = std::env::temp_dir().join(format!("arena-empty-{}.pem", std::process::id()));
        std::fs::write(&path, "").expect("temp dir writable");
        assert!(load_private_key(&path).is_err());
        assert!(load_certs(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn transport_has_keepalive_below_idle_timeout() {
        assert!(KEEPALIVE_INTERVAL_SECS < IDLE_TIMEOUT_SECS);
        assert!(create_transport_config().is_ok());
    }
}
