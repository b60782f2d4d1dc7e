//! # Client Configuration
//!
//! Where to connect and how: plaintext when no [`Credentials`] are given, TLS otherwise.
use crate::dispatch::DEFAULT_TIMEOUT;
use std::time::Duration;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

/// Connection settings of a [`super::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// `None` connects over plaintext HTTP/2.
    pub credentials: Option<Credentials>,
    /// Timeout of calls that do not override it.
    pub default_timeout: Duration,
    /// Timeout for establishing the connection itself.
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credentials: None,
            default_timeout: DEFAULT_TIMEOUT,
            connect_timeout: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The endpoint URI, e.g. `http://localhost:50051`.
    pub fn uri(&self) -> String {
        let scheme = match self.credentials {
            Some(_) => "https",
            None => "http",
        };
        // IPv6 literals need brackets to be told apart from the port.
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// TLS credentials of a secured channel.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// PEM-encoded CA certificate. The web PKI roots are trusted when absent.
    pub ca_certificate: Option<Vec<u8>>,
    /// PEM-encoded client certificate and key, for mutual TLS.
    pub identity: Option<(Vec<u8>, Vec<u8>)>,
    /// Overrides the name checked against the server certificate.
    pub domain: Option<String>,
}

impl Credentials {
    pub fn with_ca_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.ca_certificate = Some(pem.into());
        self
    }

    pub fn with_identity(mut self, cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        self.identity = Some((cert.into(), key.into()));
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub(crate) fn tls_config(&self) -> ClientTlsConfig {
        let mut tls = ClientTlsConfig::new();

        tls = match &self.ca_certificate {
            Some(pem) => tls.ca_certificate(Certificate::from_pem(pem)),
            None => tls.with_webpki_roots(),
        };

        if let Some((cert, key)) = &self.identity {
            tls = tls.identity(Identity::from_pem(cert, key));
        }

        if let Some(domain) = &self.domain {
            tls = tls.domain_name(domain.clone());
        }

        tls
    }
}
