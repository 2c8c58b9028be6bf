//! Resolver adapter: forward, reverse, NS and nameserver-address lookups.
//!
//! Every hickory failure is folded into a [`ProbeError`] here so callers only
//! ever pattern-match on our own taxonomy.

use async_trait::async_trait;
use hickory_resolver::config::{LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DnsConfig;
use crate::domain_utils::normalize_name;
use crate::error::{DnsFailure, ProbeError};

#[async_trait]
pub trait Resolve: Send + Sync {
    /// Addresses for `hostname`; `NotFound` when the name does not exist.
    async fn resolve_forward(&self, hostname: &str) -> Result<Vec<IpAddr>, ProbeError>;

    /// PTR name for `ip`; `NotFound` when there is none.
    async fn resolve_reverse(&self, ip: IpAddr) -> Result<String, ProbeError>;

    /// Authoritative nameservers for `domain`; a `Dns` error when there are none.
    async fn resolve_ns(&self, domain: &str) -> Result<Vec<String>, ProbeError>;

    /// First address answered for a nameserver hostname.
    async fn resolve_a(&self, nameserver: &str) -> Result<IpAddr, ProbeError>;
}

/// hickory-backed resolver
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Use the configured upstream servers, or the host's resolver
    /// configuration when none are listed.
    pub fn from_config(config: &DnsConfig) -> Self {
        let servers = config.server_addrs();
        let resolver_config = if servers.is_empty() {
            match hickory_resolver::system_conf::read_system_conf() {
                Ok((system, _)) => system,
                Err(e) => {
                    warn!("Could not read system resolver configuration ({}), using Cloudflare", e);
                    ResolverConfig::cloudflare()
                }
            }
        } else {
            upstream_config(&servers, Protocol::Udp)
        };

        Self { resolver: TokioAsyncResolver::tokio(resolver_config, lookup_opts(config.timeout())) }
    }
}

/// Resolver configuration pointing only at `servers`
fn upstream_config(servers: &[SocketAddr], protocol: Protocol) -> ResolverConfig {
    let mut config = ResolverConfig::new();
    for addr in servers {
        config.add_name_server(NameServerConfig::new(*addr, protocol));
    }
    config
}

fn lookup_opts(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1;
    opts.edns0 = true;
    opts.use_hosts_file = false;
    opts.ip_strategy = LookupIpStrategy::Ipv4thenIpv6;
    opts
}

/// Absolute form of a name so search domains are never appended
fn fqdn(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve_forward(&self, hostname: &str) -> Result<Vec<IpAddr>, ProbeError> {
        debug!("Forward lookup for {}", hostname);
        let lookup = self
            .resolver
            .lookup_ip(fqdn(hostname))
            .await
            .map_err(|e| classify_resolve_error(&e, hostname))?;

        let addresses: Vec<IpAddr> = lookup.iter().collect();
        if addresses.is_empty() {
            return Err(ProbeError::NotFound(hostname.to_string()));
        }
        Ok(addresses)
    }

    async fn resolve_reverse(&self, ip: IpAddr) -> Result<String, ProbeError> {
        debug!("Reverse lookup for {}", ip);
        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| classify_resolve_error(&e, &ip.to_string()))?;

        lookup
            .iter()
            .next()
            .map(|ptr| normalize_name(&ptr.0.to_utf8()))
            .ok_or_else(|| ProbeError::NotFound(ip.to_string()))
    }

    async fn resolve_ns(&self, domain: &str) -> Result<Vec<String>, ProbeError> {
        debug!("NS lookup for {}", domain);
        let lookup = self.resolver.ns_lookup(fqdn(domain)).await.map_err(|e| {
            match classify_resolve_error(&e, domain) {
                ProbeError::NotFound(_) => ProbeError::dns(DnsFailure::NoRecords, format!("no NS records for {}", domain)),
                other => other,
            }
        })?;

        let nameservers: Vec<String> = lookup.iter().map(|ns| normalize_name(&ns.0.to_utf8())).collect();
        if nameservers.is_empty() {
            return Err(ProbeError::dns(DnsFailure::NoRecords, format!("no NS records for {}", domain)));
        }
        Ok(nameservers)
    }

    async fn resolve_a(&self, nameserver: &str) -> Result<IpAddr, ProbeError> {
        self.resolve_forward(nameserver)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::NotFound(nameserver.to_string()))
    }
}

/// Map a hickory error onto the probe taxonomy.
pub fn classify_resolve_error(err: &ResolveError, subject: &str) -> ProbeError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => classify_response_code(*response_code, subject),
        ResolveErrorKind::Timeout => ProbeError::dns(DnsFailure::Timeout, subject),
        ResolveErrorKind::NoConnections => {
            ProbeError::dns(DnsFailure::Unreachable, format!("{}: no connections available", subject))
        }
        ResolveErrorKind::Io(e) => ProbeError::dns(DnsFailure::Unreachable, format!("{}: {}", subject, e)),
        _ => ProbeError::dns(DnsFailure::Malformed, format!("{}: {}", subject, err)),
    }
}

/// Classification of a negative answer by its response code
pub fn classify_response_code(code: ResponseCode, subject: &str) -> ProbeError {
    match code {
        ResponseCode::NXDomain | ResponseCode::NoError => ProbeError::NotFound(subject.to_string()),
        ResponseCode::Refused => ProbeError::dns(DnsFailure::Refused, subject),
        ResponseCode::ServFail => ProbeError::dns(DnsFailure::Unreachable, format!("{}: server failure", subject)),
        other => ProbeError::dns(DnsFailure::Malformed, format!("{}: {}", subject, other)),
    }
}
