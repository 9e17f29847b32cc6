//! TLS configuration and certificate loading.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;

/// Called after each completed TLS handshake with the negotiated ALPN
/// protocol (if any) and the peer address.
pub type NextProtoHook = Arc<dyn Fn(Option<&[u8]>, SocketAddr) + Send + Sync>;

/// Load a rustls server configuration from PEM certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (path, what) in [(cert_path, "Certificate"), (key_path, "Private key")] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{what} file not found: {}", path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}
