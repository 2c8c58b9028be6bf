pub mod cancel;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod dns;
pub mod domain_utils;
pub mod error;
pub mod logger;
pub mod recon;
pub mod report;
pub mod zone_transfer;

pub use cancel::CancelHandle;
pub use domain_utils::Target;
pub use recon::{ReconPipeline, ReconSettings};
pub use report::ReconReport;
