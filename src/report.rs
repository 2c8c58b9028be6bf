//! The `ReconReport` aggregate and its renderers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ProbeError, TransferFailure};

/// Marker for certificate fields the log entry did not carry
pub const UNKNOWN: &str = "unknown";

/// A hostname that resolved to at least one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHost {
    pub hostname: String,
    pub addresses: Vec<IpAddr>,
}

/// Issuance metadata from one certificate-transparency entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub common_name: String,
    pub issuer_name: String,
    pub serial_number: String,
}

impl CertificateRecord {
    pub fn has_unknown_fields(&self) -> bool {
        [&self.common_name, &self.issuer_name, &self.serial_number]
            .iter()
            .any(|f| f.as_str() == UNKNOWN)
    }
}

/// One host entry returned by the search service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub ip: String,
    pub port: u16,
    pub organization: Option<String>,
    #[serde(default)]
    pub hostnames: Vec<String>,
}

impl SearchMatch {
    pub fn organization_label(&self) -> &str {
        self.organization.as_deref().unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: u64,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TransferOutcome {
    Transferred(Vec<String>),
    Failed(TransferFailure),
}

/// Outcome of the zone-transfer attempt against one nameserver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTransferResult {
    pub nameserver: String,
    pub address: Option<IpAddr>,
    pub outcome: TransferOutcome,
}

impl ZoneTransferResult {
    pub fn record_names(&self) -> &[String] {
        match &self.outcome {
            TransferOutcome::Transferred(names) => names,
            TransferOutcome::Failed(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&TransferFailure> {
        match &self.outcome {
            TransferOutcome::Failed(reason) => Some(reason),
            TransferOutcome::Transferred(_) => None,
        }
    }
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SubdomainSweep,
    CertificateFetch,
    SearchQuery,
    ReverseLookup,
    ZoneTransfer,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::SubdomainSweep,
        Stage::CertificateFetch,
        Stage::SearchQuery,
        Stage::ReverseLookup,
        Stage::ZoneTransfer,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SubdomainSweep => "subdomain sweep",
            Stage::CertificateFetch => "certificate transparency",
            Stage::SearchQuery => "Shodan search",
            Stage::ReverseLookup => "reverse DNS",
            Stage::ZoneTransfer => "zone transfer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Skipped(String),
    Failed(ProbeError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
}

/// Everything one run learned about a target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconReport {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub resolved_hosts: BTreeMap<String, ResolvedHost>,
    pub certificates: Vec<CertificateRecord>,
    pub search_total: Option<u64>,
    pub search_matches: Vec<SearchMatch>,
    pub reverse_dns: BTreeMap<IpAddr, String>,
    pub zone_transfers: Vec<ZoneTransferResult>,
    pub stages: Vec<StageReport>,
    pub cancelled: bool,
}

impl ReconReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            started_at: Utc::now(),
            finished_at: None,
            resolved_hosts: BTreeMap::new(),
            certificates: Vec::new(),
            search_total: None,
            search_matches: Vec::new(),
            reverse_dns: BTreeMap::new(),
            zone_transfers: Vec::new(),
            stages: Vec::new(),
            cancelled: false,
        }
    }

    pub fn stage_status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| &s.status)
    }

    /// Distinct addresses seen by the subdomain sweep, in address order
    pub fn discovered_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self
            .resolved_hosts
            .values()
            .flat_map(|h| h.addresses.iter().copied())
            .collect();
        ips.sort();
        ips.dedup();
        ips
    }

    pub(crate) fn mark(&mut self, stage: Stage, status: StageStatus) {
        self.stages.push(StageReport { stage, status });
    }
}

/// Plain-text summary of a finished run.
pub fn render_summary(report: &ReconReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== ORIGIN DISCOVERY: {} ===", report.target);

    let _ = writeln!(out, "\n[Subdomains]");
    if report.resolved_hosts.is_empty() {
        let _ = writeln!(out, "  none resolved");
    }
    for host in report.resolved_hosts.values() {
        let ips: Vec<String> = host.addresses.iter().map(|ip| ip.to_string()).collect();
        let _ = writeln!(out, "  {}: {}", host.hostname, ips.join(", "));
    }

    let _ = writeln!(out, "\n[Certificates] {} entries", report.certificates.len());
    for cert in &report.certificates {
        let _ = writeln!(
            out,
            "  Issued To: {} | Issued By: {} | Serial Number: {}",
            cert.common_name, cert.issuer_name, cert.serial_number
        );
    }

    let _ = writeln!(out, "\n[Shodan]");
    match report.stage_status(Stage::SearchQuery) {
        Some(StageStatus::Skipped(reason)) => {
            let _ = writeln!(out, "  Shodan skipped: {}", reason);
        }
        Some(StageStatus::Completed) => {
            let _ = writeln!(
                out,
                "  Shodan queried: {} total, {} matches",
                report.search_total.unwrap_or(0),
                report.search_matches.len()
            );
            for m in &report.search_matches {
                let _ = writeln!(out, "  IP: {} | Port: {} | Org: {}", m.ip, m.port, m.organization_label());
            }
        }
        Some(StageStatus::Failed(err)) => {
            let _ = writeln!(out, "  Shodan failed: {}", err);
        }
        Some(StageStatus::Cancelled) | None => {
            let _ = writeln!(out, "  Shodan not run");
        }
    }

    let _ = writeln!(out, "\n[Reverse DNS]");
    for ip in report.discovered_ips() {
        match report.reverse_dns.get(&ip) {
            Some(name) => {
                let _ = writeln!(out, "  {}: {}", ip, name);
            }
            None => {
                let _ = writeln!(out, "  {}: no PTR record", ip);
            }
        }
    }

    let _ = writeln!(out, "\n[Zone transfer]");
    for zt in &report.zone_transfers {
        let addr = zt.address.map(|a| a.to_string()).unwrap_or_else(|| "?".to_string());
        match &zt.outcome {
            TransferOutcome::Transferred(names) => {
                let _ = writeln!(out, "  {} ({}): transferred {} names", zt.nameserver, addr, names.len());
                for name in names {
                    let _ = writeln!(out, "    {}", name);
                }
            }
            TransferOutcome::Failed(reason) => {
                let _ = writeln!(out, "  {} ({}): {}", zt.nameserver, addr, reason);
            }
        }
    }

    let _ = writeln!(out, "\n[Stages]");
    for s in &report.stages {
        let status = match &s.status {
            StageStatus::Completed => "completed".to_string(),
            StageStatus::Skipped(reason) => format!("skipped ({})", reason),
            StageStatus::Failed(err) => format!("failed: {}", err),
            StageStatus::Cancelled => "cancelled".to_string(),
        };
        let _ = writeln!(out, "  {}: {}", s.stage, status);
    }
    if report.cancelled {
        let _ = writeln!(out, "\nRun cancelled; results above are partial.");
    }
    out
}

pub fn export_json(report: &ReconReport, output_path: &Path) -> Result<()> {
    debug!("Exporting report for {} to JSON: {}", report.target, output_path.display());

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let json_string = serde_json::to_string_pretty(report)?;
    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create report file: {}", output_path.display()))?;
    file.write_all(json_string.as_bytes())?;

    info!("Report exported to {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_report() -> ReconReport {
        let mut report = ReconReport::new("example.com");
        let ip: IpAddr = "93.184.216.34".parse().unwrap();
        report.resolved_hosts.insert(
            "www.example.com".to_string(),
            ResolvedHost { hostname: "www.example.com".to_string(), addresses: vec![ip] },
        );
        report.mark(Stage::SubdomainSweep, StageStatus::Completed);
        report.mark(Stage::SearchQuery, StageStatus::Skipped("no API key".to_string()));
        report.zone_transfers.push(ZoneTransferResult {
            nameserver: "ns1.example.com".to_string(),
            address: Some("192.0.2.53".parse().unwrap()),
            outcome: TransferOutcome::Failed(TransferFailure::Refused),
        });
        report
    }

    #[test]
    fn test_discovered_ips_are_distinct() {
        let mut report = sample_report();
        let ip: IpAddr = "93.184.216.34".parse().unwrap();
        report.resolved_hosts.insert(
            "api.example.com".to_string(),
            ResolvedHost { hostname: "api.example.com".to_string(), addresses: vec![ip] },
        );
        assert_eq!(report.discovered_ips(), vec![ip]);
    }

    #[test]
    fn test_summary_distinguishes_skipped_search() {
        let summary = render_summary(&sample_report());
        assert!(summary.contains("Shodan skipped: no API key"));
        assert!(summary.contains("www.example.com: 93.184.216.34"));
        assert!(summary.contains("93.184.216.34: no PTR record"));
        assert!(summary.contains("ns1.example.com (192.0.2.53): refused"));
    }

    #[test]
    fn test_summary_reports_zero_matches() {
        let mut report = ReconReport::new("example.com");
        report.search_total = Some(0);
        report.mark(Stage::SearchQuery, StageStatus::Completed);
        let summary = render_summary(&report);
        assert!(summary.contains("Shodan queried: 0 total, 0 matches"));
        assert!(!summary.contains("skipped"));
    }

    #[test]
    fn test_missing_org_renders_unknown() {
        let m = SearchMatch { ip: "198.51.100.7".into(), port: 443, organization: None, hostnames: vec![] };
        assert_eq!(m.organization_label(), "unknown");
    }

    #[test]
    fn test_export_json_writes_stage_markers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports").join("example.com.json");
        export_json(&sample_report(), &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["target"], "example.com");
        assert_eq!(written["stages"][1]["stage"], "search_query");
        assert_eq!(written["stages"][1]["status"], "skipped");
        assert_eq!(written["zone_transfers"][0]["outcome"]["detail"]["reason"], "refused");
    }
}
