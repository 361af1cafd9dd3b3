//! TLS support for the qrpair server
//!
//! Certificates are either loaded from PEM files or generated in memory as
//! a self-signed pair for local testing.

use axum_server::tls_rustls::RustlsConfig;
use qrpair_core::{Error, Result};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// PEM certificate and key the server listens with
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_pem: String,
    pub key_pem: String,
    /// SHA-256 fingerprint of the certificate
    pub fingerprint: String,
}

impl TlsMaterial {
    /// Load certificate and private key from PEM files
    pub fn from_files(cert_path: &Path, key_path: &Path) -> Result<Self> {
        info!("Loading TLS certificate from {:?}", cert_path);
        let cert_pem = std::fs::read_to_string(cert_path)?;
        let key_pem = std::fs::read_to_string(key_path)?;

        if !cert_pem.contains("BEGIN CERTIFICATE") {
            return Err(Error::Tls(format!("{:?} is not a PEM certificate", cert_path)));
        }

        let fingerprint = calculate_cert_fingerprint(&cert_pem);
        Ok(Self {
            cert_pem,
            key_pem,
            fingerprint,
        })
    }

    /// Generate an in-memory self-signed certificate
    pub fn self_signed(hostnames: &[String]) -> Result<Self> {
        info!("Generating self-signed certificate...");
        let (cert_pem, key_pem) = generate_self_signed_cert(hostnames)?;
        let fingerprint = calculate_cert_fingerprint(&cert_pem);
        Ok(Self {
            cert_pem,
            key_pem,
            fingerprint,
        })
    }

    /// Build the rustls server configuration
    pub async fn rustls_config(&self) -> Result<RustlsConfig> {
        RustlsConfig::from_pem(
            self.cert_pem.as_bytes().to_vec(),
            self.key_pem.as_bytes().to_vec(),
        )
        .await
        .map_err(Error::tls)
    }
}

/// Generate a self-signed certificate for the given hostnames/IPs
pub fn generate_self_signed_cert(hostnames: &[String]) -> Result<(String, String)> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "qrpair");
    dn.push(DnType::OrganizationName, "qrpair");
    params.distinguished_name = dn;

    params.subject_alt_names = subject_alt_names(hostnames)?;

    let key_pair = KeyPair::generate().map_err(Error::tls)?;
    let cert = params.self_signed(&key_pair).map_err(Error::tls)?;

    Ok((cert.pem(), key_pair.serialize_pem()))
}

/// SAN entries for the certificate; localhost is always covered once
fn subject_alt_names(hostnames: &[String]) -> Result<Vec<SanType>> {
    let localhost = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
    let mut san_list = vec![SanType::DnsName("localhost".try_into().map_err(Error::tls)?)];

    for hostname in hostnames {
        if hostname == "localhost" {
            continue;
        }
        if let Ok(ip) = hostname.parse::<std::net::IpAddr>() {
            if ip != localhost {
                san_list.push(SanType::IpAddress(ip));
            }
        } else if let Ok(dns) = hostname.as_str().try_into() {
            san_list.push(SanType::DnsName(dns));
        }
    }

    san_list.push(SanType::IpAddress(localhost));
    Ok(san_list)
}

/// Calculate SHA-256 fingerprint of a certificate in human-readable format
pub fn calculate_cert_fingerprint(cert_pem: &str) -> String {
    let digest = Sha256::digest(cert_pem.as_bytes());

    // Colon-separated hex pairs, as browsers display them
    digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
