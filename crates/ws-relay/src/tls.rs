//! Backend certificate trust policy.
//!
//! The trust mode is an explicit, auditable configuration value rather
//! than a hard-coded bypass: operators running the gateway inside a
//! cluster against self-signed apiserver certificates opt into
//! [`TlsTrustPolicy::InsecureSkipVerify`] and get a loud startup log for
//! it.

use std::sync::Arc;

use tokio_tungstenite::Connector;

/// How backend server certificates are verified, for both the WebSocket
/// dialer and the REST client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsTrustPolicy {
    /// Verify against the platform's root certificate store.
    SystemRoots,
    /// Accept any certificate the backend presents.
    InsecureSkipVerify,
}

impl TlsTrustPolicy {
    /// True when backend certificates are not verified.
    pub fn skips_verification(&self) -> bool {
        matches!(self, TlsTrustPolicy::InsecureSkipVerify)
    }

    /// TLS connector for the WebSocket dialer. `None` selects the
    /// library's default connector, which verifies against native roots.
    pub fn ws_connector(&self) -> Option<Connector> {
        match self {
            TlsTrustPolicy::SystemRoots => None,
            TlsTrustPolicy::InsecureSkipVerify => {
                Some(Connector::Rustls(Arc::new(insecure_client_config())))
            }
        }
    }
}

fn insecure_client_config() -> rustls::ClientConfig {
    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(rustls::RootCertStore::empty())
        .with_no_client_auth();
    config
        .dangerous()
        .set_certificate_verifier(Arc::new(NoVerification));
    config
}

/// Certificate verifier that accepts everything. Only reachable through
/// [`TlsTrustPolicy::InsecureSkipVerify`].
#[derive(Debug)]
struct NoVerification;

impl rustls::client::danger::ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_roots_uses_default_connector() {
        assert!(TlsTrustPolicy::SystemRoots.ws_connector().is_none());
        assert!(!TlsTrustPolicy::SystemRoots.skips_verification());
    }

    #[test]
    fn insecure_mode_builds_permissive_connector() {
        let connector = TlsTrustPolicy::InsecureSkipVerify.ws_connector();
        assert!(matches!(connector, Some(Connector::Rustls(_))));
        assert!(TlsTrustPolicy::InsecureSkipVerify.skips_verification());
    }
}
