//! One scrape of one target, from discovery to teardown

use bmcwatch_core::{Backend, ScrapeContext, ScrapeReport, Target};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::census::{take_census, Census};

/// One JSON line of agent output
#[derive(Debug, Serialize)]
pub struct ScrapeRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub report: ScrapeReport,
    pub census: Census,
}

pub async fn scrape_target<B: Backend>(target: Target, backend: B) -> ScrapeRecord {
    let mut scrape = ScrapeContext::new(target, backend);
    let status = scrape.discover().await;
    debug!("Target {}: discovery finished: {:?}", scrape.host(), status);

    let census = match scrape.view() {
        Some(mut view) => take_census(&mut view).await,
        None => Census::new(),
    };
    let record = ScrapeRecord {
        timestamp: Utc::now(),
        report: scrape.report(),
        census,
    };

    scrape.teardown().await;
    record
}
