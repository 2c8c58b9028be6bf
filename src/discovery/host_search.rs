//! Shodan host-search client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ProbeError;
use crate::report::{SearchMatch, SearchResults};

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.shodan.io";

#[async_trait]
pub trait HostSearch: Send + Sync {
    /// Hosts the service has indexed for `domain`. `Auth` when the
    /// credential is rejected, `Service` for everything else.
    async fn search_hosts(&self, credential: &str, domain: &str) -> Result<SearchResults, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct ShodanResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    matches: Vec<ShodanMatch>,
}

#[derive(Debug, Deserialize)]
struct ShodanMatch {
    ip_str: String,
    #[serde(default)]
    port: u16,
    org: Option<String>,
    #[serde(default)]
    hostnames: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ShodanErrorBody {
    error: String,
}

impl From<ShodanMatch> for SearchMatch {
    fn from(m: ShodanMatch) -> Self {
        SearchMatch {
            ip: m.ip_str,
            port: m.port,
            organization: m.org.filter(|o| !o.trim().is_empty()),
            hostnames: m.hostnames,
        }
    }
}

/// Decode a successful search body.
pub fn parse_search_response(body: &str) -> Result<SearchResults, ProbeError> {
    if let Ok(err) = serde_json::from_str::<ShodanErrorBody>(body) {
        return Err(ProbeError::Service(err.error));
    }
    let response: ShodanResponse = serde_json::from_str(body)
        .map_err(|e| ProbeError::Service(format!("malformed Shodan response: {}", e)))?;
    Ok(SearchResults {
        total: response.total,
        matches: response.matches.into_iter().map(SearchMatch::from).collect(),
    })
}

/// Error for a non-2xx answer, carrying the service's own message if any
fn status_error(status: StatusCode, body: &str) -> ProbeError {
    let detail = serde_json::from_str::<ShodanErrorBody>(body)
        .map(|e| format!("HTTP {}: {}", status.as_u16(), e.error))
        .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProbeError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => ProbeError::Service(format!("rate limited ({})", detail)),
        _ => ProbeError::Service(detail),
    }
}

pub struct ShodanClient {
    client: Client,
    endpoint: String,
}

impl ShodanClient {
    pub fn new(endpoint: &str, timeout: Duration, user_agent: &str) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_default();

        Self { client, endpoint: endpoint.trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl HostSearch for ShodanClient {
    async fn search_hosts(&self, credential: &str, domain: &str) -> Result<SearchResults, ProbeError> {
        info!("Searching Shodan for hosts matching {}", domain);
        let url = format!(
            "{}/shodan/host/search?key={}&query={}",
            self.endpoint,
            urlencoding::encode(credential),
            urlencoding::encode(domain)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProbeError::Service(format!("Shodan request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::Service(format!("reading Shodan response: {}", e.without_url())))?;

        if !status.is_success() {
            warn!("Shodan returned status {} for {}", status, domain);
            return Err(status_error(status, &body));
        }

        let results = parse_search_response(&body)?;
        debug!("Shodan: {} total, {} matches returned", results.total, results.matches.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matches() {
        let body = r#"{"total": 2, "matches": [
            {"ip_str": "203.0.113.7", "port": 443, "org": "Hosting Inc", "hostnames": ["origin.example.com"]},
            {"ip_str": "203.0.113.8", "port": 80}
        ]}"#;
        let results = parse_search_response(body).unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.matches[0].organization_label(), "Hosting Inc");
        assert_eq!(results.matches[0].hostnames, vec!["origin.example.com".to_string()]);
        assert_eq!(results.matches[1].organization_label(), "unknown");
    }

    #[test]
    fn test_zero_matches_is_success() {
        let results = parse_search_response(r#"{"total": 0, "matches": []}"#).unwrap();
        assert_eq!(results, SearchResults::default());
    }

    #[test]
    fn test_error_field_surfaces() {
        let err = parse_search_response(r#"{"error": "Invalid query"}"#).unwrap_err();
        assert_eq!(err, ProbeError::Service("Invalid query".to_string()));
    }

    #[test]
    fn test_status_classification() {
        let body = r#"{"error": "Invalid API key"}"#;
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, body),
            ProbeError::Auth("HTTP 401: Invalid API key".to_string())
        );
        assert!(matches!(status_error(StatusCode::FORBIDDEN, ""), ProbeError::Auth(_)));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, ""), ProbeError::Service(m) if m.contains("rate limited")));
        assert!(matches!(status_error(StatusCode::BAD_GATEWAY, ""), ProbeError::Service(_)));
    }
}
