use clap::Parser;
use std::path::PathBuf;

use crate::config::{AppConfig, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "originfinder")]
#[command(about = "Discover candidate origin IPs and DNS metadata for a domain behind a CDN")]
#[command(version)]
pub struct Args {
    /// Domain name to investigate (e.g. example.com)
    pub domain: String,

    /// Shodan API key; the search stage is skipped without one
    #[arg(long = "shodan_api_key", env = "SHODAN_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub shodan_api_key: Option<String>,

    /// Verbose logging (use -v for per-probe detail, -vv for everything)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (defaults to ./config/originfinder.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Candidate subdomain labels, comma separated (overrides config)
    #[arg(long, value_delimiter = ',', value_name = "LABELS")]
    pub subdomains: Option<Vec<String>>,

    /// Maximum concurrent lookups per stage (overrides config)
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Per-probe timeout in seconds (overrides config)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stop the whole run after this many seconds and report partial results
    #[arg(long, value_name = "SECS")]
    pub max_runtime: Option<u64>,

    /// Also write the full report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl Args {
    /// Fold command-line overrides into the loaded configuration, then
    /// re-validate the result.
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(labels) = &self.subdomains {
            config.recon.subdomains = labels
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Some(concurrency) = self.concurrency {
            config.recon.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.recon.probe_timeout_secs = timeout;
        }
        if let Some(max_runtime) = self.max_runtime {
            config.recon.run_timeout_secs = max_runtime;
        }
        config.validate()
    }

    /// The API key, ignoring blank values
    pub fn credential(&self) -> Option<&str> {
        self.shodan_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}
