//! Discovery sources: subdomain sweep, certificate-transparency logs and
//! indexed-host search.

pub mod ct_logs;
pub mod host_search;
pub mod subdomains;

pub use ct_logs::{CertificateSource, CtLogClient};
pub use host_search::{HostSearch, ShodanClient};
pub use subdomains::SubdomainSweep;
