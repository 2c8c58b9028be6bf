//! In-memory stand-ins for the network adapters.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use originfinder::discovery::{CertificateSource, HostSearch};
use originfinder::dns::Resolve;
use originfinder::logger::MemorySink;
use originfinder::recon::{ReconPipeline, ReconSettings};
use originfinder::error::{DnsFailure, ProbeError, TransferFailure};
use originfinder::report::{CertificateRecord, SearchResults};
use originfinder::zone_transfer::ZoneTransfer;

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP literal")
}

/// Resolver backed by fixed tables. Unknown names and addresses are
/// `NotFound`; NS lookups fail with `NoRecords` until configured.
pub struct MockResolver {
    forward: HashMap<String, Result<Vec<IpAddr>, ProbeError>>,
    delays: HashMap<String, Duration>,
    reverse: HashMap<IpAddr, Result<String, ProbeError>>,
    nameservers: Result<Vec<String>, ProbeError>,
    ns_addresses: HashMap<String, Result<IpAddr, ProbeError>>,
    forward_calls: Mutex<Vec<String>>,
    reverse_calls: Mutex<Vec<IpAddr>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            delays: HashMap::new(),
            reverse: HashMap::new(),
            nameservers: Err(ProbeError::dns(DnsFailure::NoRecords, "no NS records")),
            ns_addresses: HashMap::new(),
            forward_calls: Mutex::new(Vec::new()),
            reverse_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_host(mut self, hostname: &str, addresses: &[&str]) -> Self {
        self.forward
            .insert(hostname.to_string(), Ok(addresses.iter().map(|a| ip(a)).collect()));
        self
    }

    pub fn with_forward_error(mut self, hostname: &str, error: ProbeError) -> Self {
        self.forward.insert(hostname.to_string(), Err(error));
        self
    }

    /// Answer for `hostname` only after `delay`
    pub fn with_delay(mut self, hostname: &str, delay: Duration) -> Self {
        self.delays.insert(hostname.to_string(), delay);
        self
    }

    pub fn with_ptr(mut self, address: &str, hostname: &str) -> Self {
        self.reverse.insert(ip(address), Ok(hostname.to_string()));
        self
    }

    pub fn with_reverse_error(mut self, address: &str, error: ProbeError) -> Self {
        self.reverse.insert(ip(address), Err(error));
        self
    }

    pub fn with_nameservers(mut self, nameservers: &[(&str, &str)]) -> Self {
        self.nameservers = Ok(nameservers.iter().map(|(ns, _)| ns.to_string()).collect());
        for (ns, addr) in nameservers {
            self.ns_addresses.insert(ns.to_string(), Ok(ip(addr)));
        }
        self
    }

    pub fn with_unresolvable_nameserver(mut self, nameserver: &str) -> Self {
        if let Ok(list) = &mut self.nameservers {
            list.push(nameserver.to_string());
        } else {
            self.nameservers = Ok(vec![nameserver.to_string()]);
        }
        self.ns_addresses
            .insert(nameserver.to_string(), Err(ProbeError::NotFound(nameserver.to_string())));
        self
    }

    pub fn forward_calls(&self) -> Vec<String> {
        self.forward_calls.lock().unwrap().clone()
    }

    pub fn reverse_calls(&self) -> Vec<IpAddr> {
        self.reverse_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolve for MockResolver {
    async fn resolve_forward(&self, hostname: &str) -> Result<Vec<IpAddr>, ProbeError> {
        self.forward_calls.lock().unwrap().push(hostname.to_string());
        if let Some(delay) = self.delays.get(hostname) {
            tokio::time::sleep(*delay).await;
        }
        self.forward
            .get(hostname)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::NotFound(hostname.to_string())))
    }

    async fn resolve_reverse(&self, address: IpAddr) -> Result<String, ProbeError> {
        self.reverse_calls.lock().unwrap().push(address);
        self.reverse
            .get(&address)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::NotFound(address.to_string())))
    }

    async fn resolve_ns(&self, _domain: &str) -> Result<Vec<String>, ProbeError> {
        self.nameservers.clone()
    }

    async fn resolve_a(&self, nameserver: &str) -> Result<IpAddr, ProbeError> {
        self.ns_addresses
            .get(nameserver)
            .cloned()
            .unwrap_or_else(|| Err(ProbeError::NotFound(nameserver.to_string())))
    }
}

/// Zone-transfer transport with a fixed answer per server; unknown servers refuse.
#[derive(Default)]
pub struct MockZoneTransfer {
    answers: HashMap<IpAddr, Result<Vec<String>, TransferFailure>>,
    calls: Mutex<Vec<IpAddr>>,
}

impl MockZoneTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allowing(mut self, server: &str, owners: &[&str]) -> Self {
        self.answers
            .insert(ip(server), Ok(owners.iter().map(|o| o.to_string()).collect()));
        self
    }

    pub fn failing(mut self, server: &str, reason: TransferFailure) -> Self {
        self.answers.insert(ip(server), Err(reason));
        self
    }

    pub fn calls(&self) -> Vec<IpAddr> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ZoneTransfer for MockZoneTransfer {
    async fn transfer(&self, server: IpAddr, _domain: &str) -> Result<Vec<String>, TransferFailure> {
        self.calls.lock().unwrap().push(server);
        self.answers
            .get(&server)
            .cloned()
            .unwrap_or(Err(TransferFailure::Refused))
    }
}

/// Certificate source returning a canned answer
pub struct StaticCertificates {
    answer: Result<Vec<CertificateRecord>, ProbeError>,
    hang: bool,
}

impl StaticCertificates {
    pub fn records(records: Vec<CertificateRecord>) -> Self {
        Self { answer: Ok(records), hang: false }
    }

    pub fn failing(error: ProbeError) -> Self {
        Self { answer: Err(error), hang: false }
    }

    /// Never answers
    pub fn hanging() -> Self {
        Self { answer: Ok(Vec::new()), hang: true }
    }
}

#[async_trait]
impl CertificateSource for StaticCertificates {
    async fn fetch_certificates(&self, _domain: &str) -> Result<Vec<CertificateRecord>, ProbeError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.answer.clone()
    }
}

/// Search service returning a canned answer and counting calls
pub struct StaticSearch {
    answer: Result<SearchResults, ProbeError>,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn results(results: SearchResults) -> Self {
        Self { answer: Ok(results), calls: AtomicUsize::new(0) }
    }

    pub fn failing(error: ProbeError) -> Self {
        Self { answer: Err(error), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostSearch for StaticSearch {
    async fn search_hosts(&self, _credential: &str, _domain: &str) -> Result<SearchResults, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

pub fn cert(common_name: &str, issuer_name: &str, serial_number: &str) -> CertificateRecord {
    CertificateRecord {
        common_name: common_name.to_string(),
        issuer_name: issuer_name.to_string(),
        serial_number: serial_number.to_string(),
    }
}

/// Shared handles to every double so tests can inspect them after a run
pub struct Harness {
    pub resolver: Arc<MockResolver>,
    pub certificates: Arc<StaticCertificates>,
    pub search: Arc<StaticSearch>,
    pub transport: Arc<MockZoneTransfer>,
}

impl Harness {
    pub fn new(resolver: MockResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            certificates: Arc::new(StaticCertificates::records(Vec::new())),
            search: Arc::new(StaticSearch::results(SearchResults::default())),
            transport: Arc::new(MockZoneTransfer::new()),
        }
    }

    pub fn certificates(mut self, certificates: StaticCertificates) -> Self {
        self.certificates = Arc::new(certificates);
        self
    }

    pub fn search(mut self, search: StaticSearch) -> Self {
        self.search = Arc::new(search);
        self
    }

    pub fn transport(mut self, transport: MockZoneTransfer) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn pipeline(&self, settings: ReconSettings, sink: Arc<MemorySink>) -> ReconPipeline {
        ReconPipeline::new(
            self.resolver.clone(),
            self.certificates.clone(),
            self.search.clone(),
            self.transport.clone(),
            settings,
        )
        .with_sink(sink)
    }
}
