//! Reconnaissance orchestrator.
//!
//! Runs the stages in a fixed order against one target:
//! subdomain sweep, certificate fetch, optional host search, reverse lookups
//! of every swept address, zone transfer. A stage that fails is recorded in
//! the report and the run moves on. Once the [`CancelHandle`] trips, the
//! stage in flight keeps what it already gathered and every stage from there
//! on is marked cancelled.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cancel::{collect_until_cancelled, unless_cancelled, CancelHandle, Partial};
use crate::config::{ConfigError, ReconConfig};
use crate::discovery::{CertificateSource, HostSearch, SubdomainSweep};
use crate::dns::Resolve;
use crate::domain_utils::{SubdomainList, Target};
use crate::error::{DnsFailure, ProbeError};
use crate::logger::{ReconEvent, ReconSink, TracingSink};
use crate::report::{ReconReport, Stage, StageStatus};
use crate::zone_transfer::{ZoneTransfer, ZoneTransferProber};

pub const NO_CREDENTIAL: &str = "no API key";

/// Per-run knobs
#[derive(Debug, Clone)]
pub struct ReconSettings {
    pub subdomains: SubdomainList,
    pub concurrency: usize,
    pub probe_timeout: Duration,
}

impl ReconSettings {
    pub fn from_config(config: &ReconConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            subdomains: config.subdomain_list()?,
            concurrency: config.concurrency,
            probe_timeout: config.probe_timeout(),
        })
    }
}

pub struct ReconPipeline {
    resolver: Arc<dyn Resolve>,
    certificates: Arc<dyn CertificateSource>,
    host_search: Arc<dyn HostSearch>,
    zone_transfer: Arc<dyn ZoneTransfer>,
    sink: Arc<dyn ReconSink>,
    settings: ReconSettings,
}

impl ReconPipeline {
    pub fn new(
        resolver: Arc<dyn Resolve>,
        certificates: Arc<dyn CertificateSource>,
        host_search: Arc<dyn HostSearch>,
        zone_transfer: Arc<dyn ZoneTransfer>,
        settings: ReconSettings,
    ) -> Self {
        Self {
            resolver,
            certificates,
            host_search,
            zone_transfer,
            sink: Arc::new(TracingSink),
            settings,
        }
    }

    /// Replace the default `TracingSink`
    pub fn with_sink(mut self, sink: Arc<dyn ReconSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Investigate `target`. Never fails: every stage outcome, including
    /// cancellation, ends up in the returned report.
    pub async fn run(&self, target: &Target, credential: Option<&str>, cancel: &CancelHandle) -> ReconReport {
        let mut report = ReconReport::new(target.as_str());
        self.sink.record(ReconEvent::RunStarted { target: target.to_string() });

        for stage in Stage::ALL {
            if cancel.is_cancelled() {
                self.finish_stage(&mut report, stage, StageStatus::Cancelled);
                continue;
            }

            self.sink.record(ReconEvent::StageStarted(stage));
            let status = match stage {
                Stage::SubdomainSweep => self.sweep_subdomains(target, &mut report, cancel).await,
                Stage::CertificateFetch => self.fetch_certificates(target, &mut report, cancel).await,
                Stage::SearchQuery => self.search_hosts(target, credential, &mut report, cancel).await,
                Stage::ReverseLookup => self.reverse_lookups(&mut report, cancel).await,
                Stage::ZoneTransfer => self.transfer_zone(target, &mut report, cancel).await,
            };
            self.finish_stage(&mut report, stage, status);
        }

        report.cancelled = report.stages.iter().any(|s| s.status == StageStatus::Cancelled);
        report.finished_at = Some(Utc::now());
        self.sink.record(ReconEvent::RunFinished { cancelled: report.cancelled });
        report
    }

    fn finish_stage(&self, report: &mut ReconReport, stage: Stage, status: StageStatus) {
        self.sink.record(ReconEvent::StageFinished { stage, status: status.clone() });
        report.mark(stage, status);
    }

    async fn sweep_subdomains(&self, target: &Target, report: &mut ReconReport, cancel: &CancelHandle) -> StageStatus {
        let sweep = SubdomainSweep::new(self.resolver.clone(), self.settings.concurrency, self.settings.probe_timeout);
        let Partial { items, interrupted } =
            sweep.sweep(target, &self.settings.subdomains, self.sink.as_ref(), cancel).await;

        for host in items {
            report.resolved_hosts.insert(host.hostname.clone(), host);
        }
        debug!("{} of {} candidates resolved", report.resolved_hosts.len(), self.settings.subdomains.len());
        status_for(interrupted)
    }

    async fn fetch_certificates(&self, target: &Target, report: &mut ReconReport, cancel: &CancelHandle) -> StageStatus {
        let fetch = tokio::time::timeout(self.settings.probe_timeout, self.certificates.fetch_certificates(target.as_str()));
        let records = match unless_cancelled(fetch, cancel).await {
            None => return StageStatus::Cancelled,
            Some(Err(_)) => return StageStatus::Failed(ProbeError::Fetch(self.timed_out())),
            Some(Ok(Err(e))) => return StageStatus::Failed(e),
            Some(Ok(Ok(records))) => records,
        };

        for record in &records {
            self.sink.record(ReconEvent::Certificate(record.clone()));
        }
        report.certificates = records;
        StageStatus::Completed
    }

    async fn search_hosts(
        &self,
        target: &Target,
        credential: Option<&str>,
        report: &mut ReconReport,
        cancel: &CancelHandle,
    ) -> StageStatus {
        let Some(credential) = credential.filter(|c| !c.trim().is_empty()) else {
            return StageStatus::Skipped(NO_CREDENTIAL.to_string());
        };

        let search = tokio::time::timeout(self.settings.probe_timeout, self.host_search.search_hosts(credential, target.as_str()));
        let results = match unless_cancelled(search, cancel).await {
            None => return StageStatus::Cancelled,
            Some(Err(_)) => return StageStatus::Failed(ProbeError::Service(self.timed_out())),
            Some(Ok(Err(e))) => return StageStatus::Failed(e),
            Some(Ok(Ok(results))) => results,
        };

        self.sink.record(ReconEvent::SearchTotal(results.total));
        for m in &results.matches {
            self.sink.record(ReconEvent::SearchMatch(m.clone()));
        }
        report.search_total = Some(results.total);
        report.search_matches = results.matches;
        StageStatus::Completed
    }

    async fn reverse_lookups(&self, report: &mut ReconReport, cancel: &CancelHandle) -> StageStatus {
        let ips = report.discovered_ips();
        if ips.is_empty() {
            debug!("No addresses to reverse-resolve");
            return StageStatus::Completed;
        }

        let lookups = stream::iter(ips)
            .map(|ip| async move { (ip, self.reverse_one(ip).await) })
            .buffer_unordered(self.settings.concurrency.max(1));
        let Partial { items, interrupted } = collect_until_cancelled(lookups, cancel).await;

        for (ip, result) in items {
            match result {
                Ok(hostname) => {
                    self.sink.record(ReconEvent::ReverseResolved { ip, hostname: hostname.clone() });
                    report.reverse_dns.insert(ip, hostname);
                }
                Err(ProbeError::NotFound(_)) => self.sink.record(ReconEvent::ReverseMissing { ip }),
                Err(error) => self.sink.record(ReconEvent::ReverseFailed { ip, error }),
            }
        }
        status_for(interrupted)
    }

    async fn reverse_one(&self, ip: IpAddr) -> Result<String, ProbeError> {
        match tokio::time::timeout(self.settings.probe_timeout, self.resolver.resolve_reverse(ip)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::dns(DnsFailure::Timeout, ip.to_string())),
        }
    }

    async fn transfer_zone(&self, target: &Target, report: &mut ReconReport, cancel: &CancelHandle) -> StageStatus {
        let prober = ZoneTransferProber::new(
            self.resolver.clone(),
            self.zone_transfer.clone(),
            self.settings.concurrency,
            self.settings.probe_timeout,
        );

        match prober.probe(target.as_str(), self.sink.as_ref(), cancel).await {
            Ok(Partial { items, interrupted }) => {
                report.zone_transfers = items;
                status_for(interrupted)
            }
            Err(e) => StageStatus::Failed(e),
        }
    }

    fn timed_out(&self) -> String {
        format!("timed out after {:?}", self.settings.probe_timeout)
    }
}

fn status_for(interrupted: bool) -> StageStatus {
    if interrupted {
        StageStatus::Cancelled
    } else {
        StageStatus::Completed
    }
}
