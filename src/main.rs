use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};

use originfinder::cancel::CancelHandle;
use originfinder::cli::Args;
use originfinder::config::AppConfig;
use originfinder::discovery::{CtLogClient, ShodanClient};
use originfinder::dns::SystemResolver;
use originfinder::domain_utils::Target;
use originfinder::logger::{self, VerbosityLevel};
use originfinder::recon::{ReconPipeline, ReconSettings};
use originfinder::report;
use originfinder::zone_transfer::AxfrClient;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_tracing(VerbosityLevel::from_verbose_count(args.verbose));

    let target = match Target::parse(&args.domain) {
        Ok(target) => target,
        Err(e) => {
            eprintln!("❌ Invalid domain '{}': {}", args.domain, e);
            std::process::exit(1);
        }
    };

    let mut config = match AppConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = args.apply_overrides(&mut config) {
        eprintln!("❌ Invalid option: {}", e);
        std::process::exit(1);
    }
    let settings = match ReconSettings::from_config(&config.recon) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    debug!("Effective configuration: {:?}", config);

    let resolver = Arc::new(SystemResolver::from_config(&config.dns));
    let certificates = Arc::new(CtLogClient::new(
        &config.certificates.endpoint,
        config.http.request_timeout(),
        &config.http.user_agent,
    ));
    let host_search = Arc::new(ShodanClient::new(
        &config.search.endpoint,
        config.http.request_timeout(),
        &config.http.user_agent,
    ));
    let zone_transfer = Arc::new(AxfrClient::new(config.recon.probe_timeout()));
    let pipeline = ReconPipeline::new(resolver, certificates, host_search, zone_transfer, settings);

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                eprintln!("\n⚠️  Second interrupt, exiting immediately.");
                std::process::exit(130); // 128 + SIGINT
            }
            eprintln!("\n⚠️  Interrupt received. Finishing with partial results...");
            cancel.cancel();
        })
        .unwrap_or_else(|e| {
            eprintln!("⚠️  Warning: Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.", e);
        });
    }
    let deadline = config.recon.run_timeout().map(|limit| {
        info!("Run limited to {:?}", limit);
        cancel.cancel_after(limit)
    });

    let report = pipeline.run(&target, args.credential(), &cancel).await;
    if let Some(timer) = deadline {
        timer.abort();
    }

    print!("{}", report::render_summary(&report));

    if let Some(path) = &args.json {
        report::export_json(&report, path)?;
        println!("\nReport written to {}", path.display());
    }

    Ok(())
}
