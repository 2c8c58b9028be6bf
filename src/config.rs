//! Configuration management for originfinder
//!
//! Configuration is read from `./config/originfinder.toml` when that file
//! exists. Every key is optional; missing keys take the same values the
//! shipped template documents.

use serde::Deserialize;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::discovery::ct_logs::DEFAULT_CT_ENDPOINT;
use crate::discovery::host_search::DEFAULT_SEARCH_ENDPOINT;
use crate::domain_utils::{SubdomainList, DEFAULT_SUBDOMAINS};

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/originfinder.toml";

/// Shipped configuration template
pub const DEFAULT_CONFIG: &str = include_str!("../config/originfinder.toml");

/// Hard ceiling for per-stage concurrency
pub const MAX_CONCURRENCY: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Invalid address in '{field}': {address} (expected ip:port format)")]
    InvalidAddress { field: String, address: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange { field: String, min: u64, max: u64, value: u64 },

    #[error("Invalid subdomain label in 'recon.subdomains': {0}")]
    InvalidLabel(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub recon: ReconConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub certificates: CertificateConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Pipeline behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_subdomains")]
    pub subdomains: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// 0 disables the global deadline
    #[serde(default)]
    pub run_timeout_secs: u64,
}

impl ReconConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        (self.run_timeout_secs > 0).then(|| Duration::from_secs(self.run_timeout_secs))
    }

    pub fn subdomain_list(&self) -> Result<SubdomainList, ConfigError> {
        SubdomainList::new(&self.subdomains).map_err(|e| ConfigError::InvalidLabel(e.to_string()))
    }
}

fn default_subdomains() -> Vec<String> {
    DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect()
}

fn default_concurrency() -> usize {
    10
}

fn default_probe_timeout_secs() -> u64 {
    8
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            subdomains: default_subdomains(),
            concurrency: default_concurrency(),
            probe_timeout_secs: default_probe_timeout_secs(),
            run_timeout_secs: 0,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_user_agent() -> String {
    format!("originfinder/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// DNS resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    /// Upstream servers (ip:port). Empty means system configuration.
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default = "default_dns_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_dns_timeout_secs() -> u64 {
    5
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self { servers: Vec::new(), timeout_secs: default_dns_timeout_secs() }
    }
}

impl DnsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed upstream server addresses. Call after `validate`.
    pub fn server_addrs(&self) -> Vec<SocketAddr> {
        self.servers.iter().filter_map(|s| s.parse().ok()).collect()
    }
}

/// Certificate-transparency endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateConfig {
    #[serde(default = "default_ct_endpoint")]
    pub endpoint: String,
}

fn default_ct_endpoint() -> String {
    DEFAULT_CT_ENDPOINT.to_string()
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self { endpoint: default_ct_endpoint() }
    }
}

/// Host-search service endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { endpoint: default_search_endpoint() }
    }
}

impl AppConfig {
    /// Load from `explicit` if given (must exist), else from the default
    /// path if present, else built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let path = Path::new(CONFIG_PATH);
                if path.exists() {
                    Self::load_from_path(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recon.subdomains.is_empty() {
            return Err(ConfigError::EmptyRequired { field: "recon.subdomains".to_string() });
        }
        self.recon.subdomain_list()?;

        check_range("recon.concurrency", self.recon.concurrency as u64, 1, MAX_CONCURRENCY as u64)?;
        check_range("recon.probe_timeout_secs", self.recon.probe_timeout_secs, 1, 300)?;

        if self.http.user_agent.is_empty() {
            return Err(ConfigError::EmptyRequired { field: "http.user_agent".to_string() });
        }
        check_range("http.request_timeout_secs", self.http.request_timeout_secs, 1, 300)?;
        check_range("dns.timeout_secs", self.dns.timeout_secs, 1, 60)?;

        for (i, server) in self.dns.servers.iter().enumerate() {
            if server.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::InvalidAddress {
                    field: format!("dns.servers[{}]", i),
                    address: server.clone(),
                });
            }
        }

        check_url("certificates.endpoint", &self.certificates.endpoint)?;
        check_url("search.endpoint", &self.search.endpoint)?;

        Ok(())
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { field: field.to_string(), min, max, value });
    }
    Ok(())
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ConfigError::InvalidUrl { field: field.to_string(), url: url.to_string() });
    }
    Ok(())
}
