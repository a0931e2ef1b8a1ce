use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use extract::{ExportSummary, Exporter};
use metrics::ExportMetrics;
use refresh::{LastRefresh, RefreshGate, RefreshStatus};
use storage::Store;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs exports and publishes their outcome to metrics, status and the store.
pub struct Refresher {
    store: Store,
    exporter: Exporter,
    metrics: ExportMetrics,
    status: RefreshStatus,
    daemon_run_id: String,
}

impl Refresher {
    pub fn new(
        store: Store,
        exporter: Exporter,
        metrics: ExportMetrics,
        status: RefreshStatus,
        daemon_run_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            exporter,
            metrics,
            status,
            daemon_run_id: daemon_run_id.into(),
        }
    }

    /// One export as of `today`, recorded as its own run.
    pub async fn refresh(&self, today: NaiveDate) -> Result<ExportSummary> {
        let run_id = Uuid::new_v4().to_string();
        self.store.insert_run(&run_id, option_env!("GIT_SHA")).await?;
        info!(%run_id, %today, "refresh started");

        match self.exporter.run(&self.store, &run_id, today).await {
            Ok(summary) => {
                let now = Utc::now();
                self.metrics.record_success(
                    summary.files.iter().map(|f| (f.extract.name(), f.rows)),
                    now.timestamp(),
                );
                self.status
                    .record(LastRefresh::succeeded(&run_id, now, summary.total_rows()));
                self.store.finish_run(&run_id, "ok").await?;
                Ok(summary)
            }
            Err(err) => {
                let message = format!("{err:#}");
                self.metrics.record_failure();
                self.status
                    .record(LastRefresh::failed(&run_id, Utc::now(), &message));
                if let Err(e) = self.store.finish_run(&run_id, "failed").await {
                    warn!(error = ?e, "failed to close export run");
                }
                if let Err(e) = self
                    .store
                    .log_incident(&self.daemon_run_id, "error", "export_failed", &message)
                    .await
                {
                    warn!(error = ?e, "failed to record export incident");
                }
                Err(err)
            }
        }
    }

    /// Refreshes every `period` while the gate is active, and whenever a
    /// manual request arrives regardless of the gate.
    pub async fn run_loop(
        self,
        gate: RefreshGate,
        period: Duration,
        mut manual: mpsc::Receiver<()>,
    ) {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            let scheduled = tokio::select! {
                _ = ticker.tick() => true,
                Some(()) = manual.recv() => false,
            };
            if scheduled && !gate.is_active() {
                info!("refresh paused, skipping scheduled export");
                continue;
            }
            let today = Utc::now().date_naive();
            if let Err(err) = self.refresh(today).await {
                error!(error = ?err, manual = !scheduled, "refresh failed");
            }
        }
    }
}
