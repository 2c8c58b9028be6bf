//! Subdomain sweep: forward-resolve each candidate label under the target.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cancel::{collect_until_cancelled, CancelHandle, Partial};
use crate::dns::Resolve;
use crate::domain_utils::{SubdomainList, Target};
use crate::error::{DnsFailure, ProbeError};
use crate::logger::{ReconEvent, ReconSink};
use crate::report::ResolvedHost;

pub struct SubdomainSweep {
    resolver: Arc<dyn Resolve>,
    concurrency: usize,
    timeout: Duration,
}

impl SubdomainSweep {
    pub fn new(resolver: Arc<dyn Resolve>, concurrency: usize, timeout: Duration) -> Self {
        Self { resolver, concurrency: concurrency.max(1), timeout }
    }

    /// Resolve `label.target` for every label. Names that do not resolve, for
    /// any reason, are left out; each outcome is reported to `sink`.
    pub async fn sweep(
        &self,
        target: &Target,
        labels: &SubdomainList,
        sink: &dyn ReconSink,
        cancel: &CancelHandle,
    ) -> Partial<ResolvedHost> {
        debug!("Sweeping {} candidate labels under {}", labels.len(), target);

        let lookups = stream::iter(labels.labels().iter().map(|label| target.qualify(label)))
            .map(|hostname| self.resolve_one(hostname, sink))
            .buffer_unordered(self.concurrency)
            .filter_map(|found| async move { found });

        collect_until_cancelled(lookups, cancel).await
    }

    async fn resolve_one(&self, hostname: String, sink: &dyn ReconSink) -> Option<ResolvedHost> {
        let result = match tokio::time::timeout(self.timeout, self.resolver.resolve_forward(&hostname)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::dns(DnsFailure::Timeout, hostname.clone())),
        };

        match result {
            Ok(addresses) => {
                sink.record(ReconEvent::HostResolved { hostname: hostname.clone(), addresses: addresses.clone() });
                Some(ResolvedHost { hostname, addresses })
            }
            Err(ProbeError::NotFound(_)) => {
                sink.record(ReconEvent::HostMissing { hostname });
                None
            }
            Err(error) => {
                sink.record(ReconEvent::HostLookupFailed { hostname, error });
                None
            }
        }
    }
}
