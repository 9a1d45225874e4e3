//! Background job that keeps the alert feed fresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::models::{AlertSummary, ListAlertsQuery};
use tokio::sync::RwLock;
use tracing::info;

use super::scheduler::Job;
use crate::backend::ProximityBackend;
use crate::error::ClientError;
use crate::feed::AlertFeed;
use crate::metrics;
use crate::notice::{Notice, NoticeSink};

/// Re-fetches in-flight alerts and replaces the feed with the result.
///
/// A failed fetch leaves the feed as it was; the next tick tries again.
pub struct PollAlertsJob {
    backend: Arc<dyn ProximityBackend>,
    feed: Arc<RwLock<AlertFeed>>,
    notices: Arc<dyn NoticeSink>,
    query: ListAlertsQuery,
    interval_secs: u64,
}

impl PollAlertsJob {
    pub fn new(
        backend: Arc<dyn ProximityBackend>,
        feed: Arc<RwLock<AlertFeed>>,
        notices: Arc<dyn NoticeSink>,
        interval_secs: u64,
    ) -> Self {
        Self {
            backend,
            feed,
            notices,
            query: ListAlertsQuery::in_flight(),
            interval_secs,
        }
    }

    /// Runs one poll and returns the resulting feed summary.
    pub async fn fetch_alerts(&self) -> Result<AlertSummary, ClientError> {
        let alerts = match self.backend.list_alerts(&self.query).await {
            Ok(alerts) => alerts,
            Err(e) => {
                metrics::record_poll("error");
                self.notices
                    .notify(Notice::error(e.user_message("load alerts")));
                return Err(e);
            }
        };

        let received = alerts.len();
        let (outcome, summary) = {
            let mut feed = self.feed.write().await;
            let outcome = feed.apply_snapshot(alerts, Utc::now());
            (outcome, feed.summary())
        };

        metrics::record_poll("ok");
        metrics::record_feed_size(summary.total);
        metrics::record_stale_entries(outcome.stale_entries());

        info!(
            received,
            total = summary.total,
            active = summary.active,
            acknowledged = summary.acknowledged,
            highest_severity = ?summary.highest_severity(),
            stale = outcome.stale_entries(),
            "Alert feed refreshed"
        );
        Ok(summary)
    }
}

#[async_trait::async_trait]
impl Job for PollAlertsJob {
    fn name(&self) -> &'static str {
        "poll_alerts"
    }

    fn period(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        self.fetch_alerts().await.map(|_| ()).map_err(|e| e.to_string())
    }
}
