//! bmcwatch agent - Redfish BMC inventory and health probe
//!
//! For every configured BMC, each cycle:
//! - negotiates a session (token, or basic-auth fallback)
//! - discovers the system's resources and identity
//! - counts the component collections
//! - prints one JSON report line on stdout and releases the session
//!
//! Runs once, or forever on `interval_secs` until Ctrl-C.

mod census;
mod config;
mod worker;

use anyhow::{Context, Result};
use bmcwatch_core::{ReqwestBackend, Target};
use config::AgentConfig;
use futures::future::join_all;
use std::io::Write;
use tokio::time::interval;
use tracing::{error, info, warn};
use worker::{scrape_target, ScrapeRecord};

/// Scrape every target concurrently and emit the records
async fn run_cycle(targets: &[Target]) -> Result<()> {
    let workers = targets
        .iter()
        .cloned()
        .map(|target| tokio::spawn(scrape_target(target, ReqwestBackend::new())));

    for outcome in join_all(workers).await {
        match outcome {
            Ok(record) => emit(&record)?,
            Err(e) => error!("Scrape worker failed: {}", e),
        }
    }
    Ok(())
}

fn emit(record: &ScrapeRecord) -> Result<()> {
    let line = serde_json::to_string(record).context("Failed to serialize scrape report")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("Failed to write scrape report")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AgentConfig::load()
        .await
        .context("Failed to load configuration")?;

    // stdout carries the reports, logs go to stderr
    tracing_subscriber::fmt()
        .with_max_level(config.max_level())
        .with_writer(std::io::stderr)
        .init();

    info!("bmcwatch agent starting...");

    let targets = config.targets().await;
    if targets.is_empty() {
        warn!(
            "No usable targets configured (config file: {})",
            AgentConfig::config_file_path()?.display()
        );
        return Ok(());
    }
    info!("{} target(s), request timeout {:?}", targets.len(), config.timeout());

    let Some(period) = config.interval() else {
        return run_cycle(&targets).await;
    };

    let mut scrape_timer = interval(period);
    loop {
        tokio::select! {
            _ = scrape_timer.tick() => {
                if let Err(e) = run_cycle(&targets).await {
                    error!("Scrape cycle failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }
    Ok(())
}
