//! Certificate Transparency (CT) log client.
//!
//! Queries crt.sh for every certificate logged for a domain and keeps the
//! issuance metadata (subject common name, issuer, serial number).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::report::{CertificateRecord, UNKNOWN};

pub const DEFAULT_CT_ENDPOINT: &str = "https://crt.sh/";

#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Every certificate entry logged for `domain`, duplicates included.
    async fn fetch_certificates(&self, domain: &str) -> Result<Vec<CertificateRecord>, ProbeError>;
}

/// Response from crt.sh API
#[derive(Debug, Deserialize)]
pub struct CrtShEntry {
    /// Certificate ID
    pub id: Option<i64>,
    /// Certificate issuer name
    pub issuer_name: Option<String>,
    /// Common name from certificate
    pub common_name: Option<String>,
    /// Hex serial number
    pub serial_number: Option<String>,
    /// Not after date
    pub not_after: Option<String>,
}

impl From<CrtShEntry> for CertificateRecord {
    fn from(entry: CrtShEntry) -> Self {
        let field = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        CertificateRecord {
            common_name: field(entry.common_name),
            issuer_name: field(entry.issuer_name),
            serial_number: field(entry.serial_number),
        }
    }
}

/// Parse a crt.sh JSON body. An empty body means no certificates.
pub fn parse_crt_sh(body: &str) -> Result<Vec<CertificateRecord>, ProbeError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<CrtShEntry> =
        serde_json::from_str(body).map_err(|e| ProbeError::Fetch(format!("malformed crt.sh response: {}", e)))?;
    Ok(entries.into_iter().map(CertificateRecord::from).collect())
}

/// crt.sh-backed certificate source
pub struct CtLogClient {
    client: Client,
    endpoint: String,
}

impl CtLogClient {
    pub fn new(endpoint: &str, timeout: Duration, user_agent: &str) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        Self { client, endpoint: endpoint.to_string() }
    }

    fn query_url(&self, domain: &str) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}q={}&output=json", self.endpoint, separator, urlencoding::encode(domain))
    }
}

#[async_trait]
impl CertificateSource for CtLogClient {
    async fn fetch_certificates(&self, domain: &str) -> Result<Vec<CertificateRecord>, ProbeError> {
        info!("Querying CT logs for certificates related to {}", domain);
        let url = self.query_url(domain);
        debug!("Querying crt.sh: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProbeError::Fetch(format!("crt.sh request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("crt.sh returned status {} for {}", status, domain);
            return Err(ProbeError::Fetch(format!("crt.sh returned HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Fetch(format!("reading crt.sh response: {}", e)))?;

        let records = parse_crt_sh(&body)?;
        debug!("Found {} certificate entries for {}", records.len(), domain);
        Ok(records)
    }
}
