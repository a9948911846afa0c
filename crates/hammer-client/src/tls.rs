//! TLS material loading for the fast-path client.
//!
//! `Http1Client`/`Http2Client` delegate TLS entirely to `reqwest`'s own
//! rustls backend; this module only serves `FastClient`, which dials
//! connections by hand and therefore needs its own `rustls::ClientConfig`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use hammer_engine::config::ClientCert;

use crate::error::ClientError;

#[derive(Debug)]
struct NoServerVerification;

impl ServerCertVerifier for NoServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ClientError::from)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ClientError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| ClientError::InvalidCertMaterial(format!("no private key found in {}", path.display())))
}

/// Build a `rustls::ClientConfig` honoring `insecure` and an optional
/// client certificate/key pair, both required together (checked upstream
/// by [`hammer_engine::config::Settings::validate`] semantics - the CLI
/// layer rejects a lone `--cert` or `--key` before construction).
pub fn build_client_config(insecure: bool, client_cert: Option<&ClientCert>) -> Result<ClientConfig, ClientError> {
    let verifier_stage = ClientConfig::builder();

    let cert_stage = if insecure {
        verifier_stage
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoServerVerification))
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        verifier_stage.with_root_certificates(roots)
    };

    let config = match client_cert {
        Some(pair) => {
            let certs = load_certs(&pair.cert)?;
            let key = load_key(&pair.key)?;
            cert_stage
                .with_client_auth_cert(certs, key)
                .map_err(|err| ClientError::InvalidCertMaterial(err.to_string()))?
        }
        None => cert_stage.with_no_client_auth(),
    };

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insecure_config_builds_without_roots() {
        assert!(build_client_config(true, None).is_ok());
    }

    #[test]
    fn default_config_trusts_webpki_roots() {
        assert!(build_client_config(false, None).is_ok());
    }

    #[test]
    fn missing_cert_file_is_reported() {
        let pair = ClientCert {
            cert: "/nonexistent/cert.pem".into(),
            key: "/nonexistent/key.pem".into(),
        };
        assert!(build_client_config(false, Some(&pair)).is_err());
    }

    // A throwaway self-signed cert/key pair, good only for exercising the
    // PEM-parsing and `with_client_auth_cert` path.
    const TEST_CERT: &str = include_str!("../tests/fixtures/client.crt");
    const TEST_KEY: &str = include_str!("../tests/fixtures/client.key");

    #[test]
    fn loads_a_real_client_certificate_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("client.crt");
        let key_path = dir.path().join("client.key");
        std::fs::write(&cert_path, TEST_CERT).unwrap();
        std::fs::write(&key_path, TEST_KEY).unwrap();

        let pair = ClientCert {
            cert: cert_path,
            key: key_path,
        };
        assert!(build_client_config(false, Some(&pair)).is_ok());
    }

    #[test]
    fn rejects_a_key_file_with_no_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("client.crt");
        let key_path = dir.path().join("empty.key");
        std::fs::write(&cert_path, TEST_CERT).unwrap();
        std::fs::write(&key_path, "").unwrap();

        let pair = ClientCert {
            cert: cert_path,
            key: key_path,
        };
        assert!(build_client_config(false, Some(&pair)).is_err());
    }
}
