//! Target domain and candidate label handling.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Underscore-prefixed labels (_dmarc, _domainkey) are legal owner names.
static LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9_]([a-zA-Z0-9\-_]{0,61}[a-zA-Z0-9_])?$").unwrap()
});

const MAX_NAME_LEN: usize = 253;

/// Candidate labels used when no configuration overrides them
pub const DEFAULT_SUBDOMAINS: &[&str] = &[
    "www", "api", "mail", "ftp", "dev", "test", "staging", "admin", "cpanel", "blog",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("domain cannot be empty")]
    Empty,

    #[error("domain '{0}' exceeds 253 characters")]
    TooLong(String),

    #[error("'{name}' is not a valid DNS name (bad label '{label}')")]
    InvalidLabel { name: String, label: String },
}

/// Normalize a hostname: trim, lowercase, drop the root dot.
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_lowercase()
}

/// Check that every dot-separated label of `name` is a legal DNS label.
pub fn validate_dns_name(name: &str) -> Result<(), TargetError> {
    if name.is_empty() {
        return Err(TargetError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(TargetError::TooLong(name.to_string()));
    }
    for label in name.split('.') {
        if !LABEL_REGEX.is_match(label) {
            return Err(TargetError::InvalidLabel {
                name: name.to_string(),
                label: label.to_string(),
            });
        }
    }
    Ok(())
}

/// The domain under investigation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let name = normalize_name(input);
        validate_dns_name(&name)?;
        Ok(Target(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Qualify a relative label with this domain (`www` -> `www.example.com`).
    pub fn qualify(&self, label: &str) -> String {
        format!("{}.{}", label, self.0)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered candidate labels for the subdomain sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainList(Vec<String>);

impl SubdomainList {
    pub fn new<I, S>(labels: I) -> Result<Self, TargetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for label in labels {
            let label = normalize_name(label.as_ref());
            validate_dns_name(&label)?;
            out.push(label);
        }
        Ok(Self(out))
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SubdomainList {
    fn default() -> Self {
        Self(DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect())
    }
}

/// Express a fully-qualified owner name relative to `apex`.
/// Returns `None` for the apex itself or for names outside the zone.
pub fn relative_label(owner: &str, apex: &str) -> Option<String> {
    let owner = normalize_name(owner);
    let apex = normalize_name(apex);
    owner
        .strip_suffix(&apex)
        .and_then(|rest| rest.strip_suffix('.'))
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}
