//! Zone-transfer prober.
//!
//! Resolves the target's NS set, resolves each nameserver's first address and
//! asks it for a full AXFR of the target. Refusal is the expected answer from
//! a correctly configured server and is recorded as an ordinary outcome.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RecordType};
use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::cancel::{collect_until_cancelled, unless_cancelled, CancelHandle, Partial};
use crate::dns::Resolve;
use crate::domain_utils::{normalize_name, relative_label};
use crate::error::{DnsFailure, ProbeError, TransferFailure};
use crate::logger::{ReconEvent, ReconSink};
use crate::report::{TransferOutcome, ZoneTransferResult};

pub const DNS_PORT: u16 = 53;

#[async_trait]
pub trait ZoneTransfer: Send + Sync {
    /// Request a full transfer of `domain` from `server`, returning the owner
    /// name of every record received.
    async fn transfer(&self, server: IpAddr, domain: &str) -> Result<Vec<String>, TransferFailure>;
}

/// AXFR over TCP: one query, then length-prefixed response messages until
/// the closing SOA.
pub struct AxfrClient {
    timeout: Duration,
    port: u16,
}

impl AxfrClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, port: DNS_PORT }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[async_trait]
impl ZoneTransfer for AxfrClient {
    async fn transfer(&self, server: IpAddr, domain: &str) -> Result<Vec<String>, TransferFailure> {
        let addr = SocketAddr::new(server, self.port);
        debug!("AXFR {} @{}", domain, addr);

        match tokio::time::timeout(self.timeout, run_axfr(addr, domain)).await {
            Ok(result) => result,
            Err(_) => Err(TransferFailure::Timeout),
        }
    }
}

async fn run_axfr(addr: SocketAddr, domain: &str) -> Result<Vec<String>, TransferFailure> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| TransferFailure::Unreachable(e.to_string()))?;

    let request = axfr_request(domain)?;
    let bytes = request
        .to_vec()
        .map_err(|e| TransferFailure::Other(format!("encoding AXFR query: {}", e)))?;
    let length = u16::try_from(bytes.len()).map_err(|_| TransferFailure::Other("AXFR query too large".to_string()))?;
    stream.write_u16(length).await.map_err(classify_io_error)?;
    stream.write_all(&bytes).await.map_err(classify_io_error)?;
    stream.flush().await.map_err(classify_io_error)?;

    let mut owners = Vec::new();
    let mut soa_seen = 0;
    loop {
        let response = read_message(&mut stream).await?;
        if response.id() != request.id() {
            return Err(TransferFailure::Other(format!("response id {} does not match query", response.id())));
        }
        if response.response_code() != ResponseCode::NoError {
            return Err(classify_response_code(response.response_code()));
        }
        if owners.is_empty() {
            match response.answers().first() {
                None => return Err(TransferFailure::Other("empty transfer".to_string())),
                Some(first) if first.record_type() != RecordType::SOA => {
                    return Err(TransferFailure::Other("transfer did not start with SOA".to_string()))
                }
                Some(_) => {}
            }
        }

        for record in response.answers() {
            owners.push(record.name().to_utf8());
            if record.record_type() == RecordType::SOA {
                soa_seen += 1;
                if soa_seen == 2 {
                    debug!("AXFR from {} complete: {} records", addr, owners.len());
                    return Ok(owners);
                }
            }
        }
    }
}

fn axfr_request(domain: &str) -> Result<Message, TransferFailure> {
    let name = Name::from_ascii(format!("{}.", normalize_name(domain)))
        .map_err(|e| TransferFailure::Other(format!("invalid zone name: {}", e)))?;

    let mut message = Message::new();
    message
        .set_id(query_id())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false)
        .add_query(Query::query(name, RecordType::AXFR));
    Ok(message)
}

fn query_id() -> u16 {
    (chrono::Utc::now().timestamp_subsec_nanos() & 0xffff) as u16
}

async fn read_message(stream: &mut TcpStream) -> Result<Message, TransferFailure> {
    let length = stream.read_u16().await.map_err(classify_io_error)?;
    let mut buf = vec![0u8; usize::from(length)];
    stream.read_exact(&mut buf).await.map_err(classify_io_error)?;
    Message::from_vec(&buf).map_err(|e| TransferFailure::Other(format!("malformed AXFR response: {}", e)))
}

/// Failure for a non-NOERROR answer
pub fn classify_response_code(code: ResponseCode) -> TransferFailure {
    match code {
        ResponseCode::Refused => TransferFailure::Refused,
        ResponseCode::NotAuth | ResponseCode::NXDomain => TransferFailure::NotAuthoritative,
        other => TransferFailure::Other(format!("server answered {}", other)),
    }
}

fn classify_io_error(err: io::Error) -> TransferFailure {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => TransferFailure::Other("connection closed before the zone ended".to_string()),
        io::ErrorKind::TimedOut => TransferFailure::Timeout,
        _ => TransferFailure::Unreachable(err.to_string()),
    }
}

/// Qualify every owner name against the zone apex: `www` becomes
/// `www.example.com`, the apex itself stays `example.com`. Duplicates from
/// multiple records on one owner collapse; zone order is kept.
pub fn qualify_owner_names(owners: &[String], domain: &str) -> Vec<String> {
    let apex = normalize_name(domain);
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for owner in owners {
        let name = match relative_label(owner, &apex) {
            Some(label) => format!("{}.{}", label, apex),
            None => {
                let owner = normalize_name(owner);
                if owner == apex || owner.is_empty() || owner == "@" {
                    apex.clone()
                } else {
                    // Relative owner names as some servers print them
                    format!("{}.{}", owner, apex)
                }
            }
        };
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

pub struct ZoneTransferProber {
    resolver: Arc<dyn Resolve>,
    transport: Arc<dyn ZoneTransfer>,
    concurrency: usize,
    timeout: Duration,
}

impl ZoneTransferProber {
    pub fn new(resolver: Arc<dyn Resolve>, transport: Arc<dyn ZoneTransfer>, concurrency: usize, timeout: Duration) -> Self {
        Self { resolver, transport, concurrency: concurrency.max(1), timeout }
    }

    /// One result per nameserver, in NS answer order. Fails only when the
    /// NS set itself cannot be resolved. On cancellation the attempts that
    /// already finished are kept.
    pub async fn probe(
        &self,
        domain: &str,
        sink: &dyn ReconSink,
        cancel: &CancelHandle,
    ) -> Result<Partial<ZoneTransferResult>, ProbeError> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.resolve_ns(domain));
        let nameservers = match unless_cancelled(lookup, cancel).await {
            None => return Ok(Partial::interrupted()),
            Some(Ok(result)) => result?,
            Some(Err(_)) => return Err(ProbeError::dns(DnsFailure::Timeout, format!("NS lookup for {}", domain))),
        };
        sink.record(ReconEvent::NameserversFound(nameservers.clone()));

        let attempts = stream::iter(nameservers.into_iter().enumerate())
            .map(|(index, ns)| async move { (index, self.probe_nameserver(ns, domain, sink).await) })
            .buffer_unordered(self.concurrency);
        let Partial { mut items, interrupted } = collect_until_cancelled(attempts, cancel).await;

        items.sort_by_key(|(index, _)| *index);
        Ok(Partial { items: items.into_iter().map(|(_, r)| r).collect(), interrupted })
    }

    async fn probe_nameserver(&self, nameserver: String, domain: &str, sink: &dyn ReconSink) -> ZoneTransferResult {
        let address = match tokio::time::timeout(self.timeout, self.resolver.resolve_a(&nameserver)).await {
            Ok(Ok(ip)) => ip,
            Ok(Err(e)) => return unresolved(nameserver, e.to_string(), sink),
            Err(_) => return unresolved(nameserver, "timed out".to_string(), sink),
        };

        sink.record(ReconEvent::ZoneTransferAttempt { nameserver: nameserver.clone(), address });

        let outcome = match tokio::time::timeout(self.timeout, self.transport.transfer(address, domain)).await {
            Ok(Ok(owners)) => TransferOutcome::Transferred(qualify_owner_names(&owners, domain)),
            Ok(Err(reason)) => TransferOutcome::Failed(reason),
            Err(_) => TransferOutcome::Failed(TransferFailure::Timeout),
        };

        let result = ZoneTransferResult { nameserver, address: Some(address), outcome };
        sink.record(ReconEvent::ZoneTransfer(result.clone()));
        result
    }
}

fn unresolved(nameserver: String, reason: String, sink: &dyn ReconSink) -> ZoneTransferResult {
    let result = ZoneTransferResult {
        nameserver,
        address: None,
        outcome: TransferOutcome::Failed(TransferFailure::Resolution(reason)),
    };
    sink.record(ReconEvent::ZoneTransfer(result.clone()));
    result
}
