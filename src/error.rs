//! Error taxonomy shared by every probe.
//!
//! Probe failures are values, not faults: each adapter returns one of these
//! and the orchestrator turns it into a stage annotation on the report.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a DNS-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsFailure {
    Timeout,
    Unreachable,
    NoRecords,
    Refused,
    Malformed,
}

impl fmt::Display for DnsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DnsFailure::Timeout => "timeout",
            DnsFailure::Unreachable => "resolver unreachable",
            DnsFailure::NoRecords => "no records",
            DnsFailure::Refused => "query refused",
            DnsFailure::Malformed => "malformed response",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    /// Expected absence: no such subdomain, no PTR record
    #[error("not found: {0}")]
    NotFound(String),

    #[error("DNS error ({kind}): {message}")]
    Dns { kind: DnsFailure, message: String },

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("service error: {0}")]
    Service(String),
}

impl ProbeError {
    pub fn dns(kind: DnsFailure, message: impl Into<String>) -> Self {
        ProbeError::Dns { kind, message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProbeError::NotFound(_))
    }
}

/// Why a single zone-transfer attempt did not yield a zone
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum TransferFailure {
    #[error("refused")]
    Refused,

    #[error("timed out")]
    Timeout,

    #[error("not authoritative")]
    NotAuthoritative,

    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The nameserver's own address could not be resolved
    #[error("nameserver address lookup failed: {0}")]
    Resolution(String),

    #[error("{0}")]
    Other(String),
}

impl TransferFailure {
    /// Refusal is the normal answer from a correctly configured server.
    pub fn is_expected(&self) -> bool {
        matches!(self, TransferFailure::Refused)
    }
}
