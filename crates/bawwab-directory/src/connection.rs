//! Directory connections
//!
//! Builds per-request ldap3 connections for ldap://, ldap:// with a
//! StartTLS upgrade, and ldaps://. Connections are never pooled; the
//! caller owns the connection and releases it exactly once.

use async_trait::async_trait;
use bawwab_core::config::DirectoryConfig;
use bawwab_core::{Error, Result};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Rebuild the directory address with the configured port.
///
/// The configured port always wins; a port embedded in the URL is
/// discarded. Returns the scheme and the rebuilt address.
pub fn directory_address(raw: &str, port: u16) -> Result<(String, String)> {
    let parsed = Url::parse(raw).map_err(|e| Error::InvalidAddress {
        address: raw.to_string(),
        reason: e.to_string(),
    })?;

    let scheme = parsed.scheme().to_string();
    if scheme != "ldap" && scheme != "ldaps" {
        return Err(Error::UnsupportedScheme { scheme });
    }

    let host = parsed.host_str().ok_or_else(|| Error::InvalidAddress {
        address: raw.to_string(),
        reason: "missing host".to_string(),
    })?;

    let address = format!("{}://{}:{}", scheme, host, port);
    Ok((scheme, address))
}

/// Build a TLS configuration trusting the system roots plus the PEM
/// bundle at `ca_path`.
fn trust_config(ca_path: &str) -> Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();

    match rustls_native_certs::load_native_certs() {
        Ok(native) => {
            for cert in native {
                // Skip anchors the verifier cannot parse
                let _ = roots.add(&rustls::Certificate(cert.0));
            }
        }
        Err(e) => warn!("failed to load system trust anchors: {}", e),
    }

    let pem = std::fs::read(ca_path)?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .map_err(|e| Error::InvalidTrustAnchor(format!("{}: {}", ca_path, e)))?;
    if certs.is_empty() {
        return Err(Error::InvalidTrustAnchor(format!(
            "{}: no certificates found",
            ca_path
        )));
    }
    for der in certs {
        roots
            .add(&rustls::Certificate(der))
            .map_err(|e| Error::InvalidTrustAnchor(format!("{}: {}", ca_path, e)))?;
    }

    let tls = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(tls))
}

/// Open a connection to the configured directory server.
///
/// `insecure_skip_verify` disables certificate verification outright
/// and takes precedence over a configured trust bundle.
pub async fn connect(config: &DirectoryConfig) -> Result<DirectoryConnection> {
    let (scheme, address) = directory_address(&config.url, config.port)?;

    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(Duration::from_secs(config.timeout_seconds))
        .set_starttls(config.start_tls);

    if scheme == "ldaps" || config.start_tls {
        if config.insecure_skip_verify {
            settings = settings.set_no_tls_verify(true);
        } else if !config.certificate_authority.is_empty() {
            settings = settings.set_config(trust_config(&config.certificate_authority)?);
        }
    }

    debug!("connecting to directory server: {}", address);

    let (conn, ldap) = LdapConnAsync::with_settings(settings, &address)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.drive().await {
            warn!("directory connection error: {}", e);
        }
    });

    Ok(DirectoryConnection { ldap })
}

/// An open directory connection.
///
/// Must be released exactly once on every exit path; [`release`]
/// consumes the connection so a released handle cannot be reused.
///
/// [`release`]: DirectoryConnection::release
#[derive(Debug)]
pub struct DirectoryConnection {
    ldap: Ldap,
}

impl DirectoryConnection {
    /// Unbind and close the connection.
    pub async fn release(mut self) {
        let _ = self.ldap.unbind().await;
    }
}

/// Directory operations used by authentication and authorization.
///
/// Production code drives a live connection; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait DirectoryOps: Send {
    /// Simple bind. `Ok(())` only when the server reports result
    /// code 0.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Execute a search and collect the matching entries.
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>>;
}

#[async_trait]
impl DirectoryOps for DirectoryConnection {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .map_err(|e| Error::Connection(format!("bind: {}", e)))?;

        if result.rc != 0 {
            if result.text.is_empty() {
                return Err(Error::BindFailed(format!("result code {}", result.rc)));
            }
            return Err(Error::BindFailed(format!(
                "result code {}: {}",
                result.rc, result.text
            )));
        }

        Ok(())
    }

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>> {
        let (rs, _res) = self
            .ldap
            .search(base, scope, filter, attrs.to_vec())
            .await
            .map_err(|e| Error::SearchFailed(e.to_string()))?
            .success()
            .map_err(|e| Error::SearchFailed(e.to_string()))?;

        Ok(rs.into_iter().map(SearchEntry::construct).collect())
    }
}
