//! Reporting sink for pipeline events.
//!
//! The orchestrator never writes to the console directly. It pushes
//! [`ReconEvent`]s into an injected [`ReconSink`]: [`TracingSink`] turns them
//! into log lines, [`MemorySink`] keeps them for inspection.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::ProbeError;
use crate::report::{CertificateRecord, SearchMatch, Stage, StageStatus, TransferOutcome, ZoneTransferResult};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 1,  // Stage progress and findings (default)
    Detailed = 2, // Per-probe misses and timings
    Debug = 3,    // Everything, including dependency internals
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "originfinder=info,warn",
            VerbosityLevel::Detailed => "originfinder=debug,warn",
            VerbosityLevel::Debug => "originfinder=trace,hickory_resolver=debug,info",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the verbosity flag.
/// Output goes to stderr so the summary on stdout stays clean.
pub fn init_tracing(level: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(level >= VerbosityLevel::Debug))
        .try_init();
}

/// Something the pipeline observed
#[derive(Debug, Clone, PartialEq)]
pub enum ReconEvent {
    RunStarted { target: String },
    StageStarted(Stage),
    HostResolved { hostname: String, addresses: Vec<IpAddr> },
    HostMissing { hostname: String },
    HostLookupFailed { hostname: String, error: ProbeError },
    Certificate(CertificateRecord),
    SearchTotal(u64),
    SearchMatch(SearchMatch),
    ReverseResolved { ip: IpAddr, hostname: String },
    ReverseMissing { ip: IpAddr },
    ReverseFailed { ip: IpAddr, error: ProbeError },
    NameserversFound(Vec<String>),
    ZoneTransferAttempt { nameserver: String, address: IpAddr },
    ZoneTransfer(ZoneTransferResult),
    StageFinished { stage: Stage, status: StageStatus },
    RunFinished { cancelled: bool },
}

pub trait ReconSink: Send + Sync {
    fn record(&self, event: ReconEvent);
}

/// Renders events as `tracing` log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReconSink for TracingSink {
    fn record(&self, event: ReconEvent) {
        match event {
            ReconEvent::RunStarted { target } => info!("Investigating {}", target),
            ReconEvent::StageStarted(stage) => info!("Starting {}", stage),
            ReconEvent::HostResolved { hostname, addresses } => {
                let ips: Vec<String> = addresses.iter().map(|ip| ip.to_string()).collect();
                info!("{}: {}", hostname, ips.join(", "));
            }
            ReconEvent::HostMissing { hostname } => debug!("{} not found", hostname),
            ReconEvent::HostLookupFailed { hostname, error } => warn!("Lookup for {} failed: {}", hostname, error),
            ReconEvent::Certificate(cert) => info!(
                "Issued To: {} | Issued By: {} | Serial Number: {}",
                cert.common_name, cert.issuer_name, cert.serial_number
            ),
            ReconEvent::SearchTotal(total) => info!("Shodan total results: {}", total),
            ReconEvent::SearchMatch(m) => {
                info!("IP: {} | Port: {} | Org: {}", m.ip, m.port, m.organization_label())
            }
            ReconEvent::ReverseResolved { ip, hostname } => info!("Reverse DNS for {}: {}", ip, hostname),
            ReconEvent::ReverseMissing { ip } => info!("No reverse DNS record for {}", ip),
            ReconEvent::ReverseFailed { ip, error } => warn!("Reverse DNS for {} failed: {}", ip, error),
            ReconEvent::NameserversFound(ns) => info!("Authoritative nameservers: {}", ns.join(", ")),
            ReconEvent::ZoneTransferAttempt { nameserver, address } => {
                info!("Attempting zone transfer on {} ({})", nameserver, address)
            }
            ReconEvent::ZoneTransfer(result) => {
                let addr = result.address.map(|a| a.to_string()).unwrap_or_else(|| "unresolved".to_string());
                match &result.outcome {
                    TransferOutcome::Transferred(names) => {
                        warn!("Zone transfer ALLOWED on {} ({}): {} names", result.nameserver, addr, names.len());
                        for name in names {
                            info!("Record found: {}", name);
                        }
                    }
                    TransferOutcome::Failed(reason) if reason.is_expected() => {
                        info!("Zone transfer refused by {} ({})", result.nameserver, addr)
                    }
                    TransferOutcome::Failed(reason) => {
                        warn!("Zone transfer failed on {} ({}): {}", result.nameserver, addr, reason)
                    }
                }
            }
            ReconEvent::StageFinished { stage, status } => match status {
                StageStatus::Completed => debug!("Finished {}", stage),
                StageStatus::Skipped(reason) => info!("{} skipped: {}", stage, reason),
                StageStatus::Failed(err) => error!("{} failed: {}", stage, err),
                StageStatus::Cancelled => warn!("{} cancelled", stage),
            },
            ReconEvent::RunFinished { cancelled: true } => warn!("Run cancelled, returning partial results"),
            ReconEvent::RunFinished { cancelled: false } => info!("Run complete"),
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ReconEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReconEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn stage_outcome(&self, stage: Stage) -> Option<StageStatus> {
        self.events().into_iter().find_map(|e| match e {
            ReconEvent::StageFinished { stage: s, status } if s == stage => Some(status),
            _ => None,
        })
    }
}

impl ReconSink for MemorySink {
    fn record(&self, event: ReconEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
