use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use idle::{idle_snapshots, IdleWindow};
use serde::Serialize;
use storage::Store;
use tracing::info;

use crate::output::{write_csv, CsvColumns};
use crate::transform::{
    forecast_records, idle_observations, imo_tracking, tracking_records, vessel_records,
    yy_ship_counts,
};

pub const DEFAULT_IDLE_MODEL: &str = "Max24-5";

/// Files produced by one export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extract {
    Ports,
    Tracking,
    YyShipCount,
    Vessels,
    Forecasts,
    ImoTracking,
}

impl Extract {
    pub const ALL: [Extract; 6] = [
        Extract::Ports,
        Extract::Tracking,
        Extract::YyShipCount,
        Extract::Vessels,
        Extract::Forecasts,
        Extract::ImoTracking,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Extract::Ports => "ports",
            Extract::Tracking => "tracking",
            Extract::YyShipCount => "yy_ship_count",
            Extract::Vessels => "vessels",
            Extract::Forecasts => "forecasts",
            Extract::ImoTracking => "imo_tracking",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Extract::Ports => "ports.csv",
            Extract::Tracking => "tracking_data2.csv",
            Extract::YyShipCount => "yy_ship_count.csv",
            Extract::Vessels => "imo_data2.csv",
            Extract::Forecasts => "LNG_Region_Flow_Historical_Forecasts.csv",
            Extract::ImoTracking => "imo_tracking.csv",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub idle_model: String,
    pub idle_window: IdleWindow,
    /// Number of daily forecast runs looked back over.
    pub forecast_days: u32,
    /// Offset of the year-over-year comparison date.
    pub yy_lookback_days: u32,
}

impl ExportConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            idle_model: DEFAULT_IDLE_MODEL.to_string(),
            idle_window: IdleWindow::default(),
            forecast_days: 7,
            yy_lookback_days: 365,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub extract: Extract,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub files: Vec<ExportedFile>,
}

impl ExportSummary {
    pub fn rows(&self, extract: Extract) -> Option<usize> {
        self.files
            .iter()
            .find(|f| f.extract == extract)
            .map(|f| f.rows)
    }

    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

fn days_before(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Pulls every source table, rebuilds all extracts as of `today` and
    /// records each written file against `run_id`.
    pub async fn run(&self, store: &Store, run_id: &str, today: NaiveDate) -> Result<ExportSummary> {
        let mut summary = ExportSummary::default();

        let ports = store.fetch_ports().await?;
        self.publish(store, run_id, &mut summary, Extract::Ports, &ports)
            .await?;

        let tracking_rows = store.fetch_tracking().await?;
        let tracking = tracking_records(&tracking_rows);
        self.publish(store, run_id, &mut summary, Extract::Tracking, &tracking)
            .await?;

        let yy_date = days_before(today, self.config.yy_lookback_days);
        let yy = yy_ship_counts(
            store
                .fetch_yy_ship_count(yy_date, &self.config.idle_model)
                .await?,
        );
        self.publish(store, run_id, &mut summary, Extract::YyShipCount, &yy)
            .await?;

        let origins = store.fetch_origins().await?;
        let idle_rows = store.fetch_idle_days(&self.config.idle_model).await?;
        let observations =
            idle_observations(&idle_rows).context("idle days contain an invalid flag")?;
        let snapshots = idle_snapshots(observations, self.config.idle_window, today)
            .context("idle run accumulation failed")?;
        let drafts = store.fetch_max_full_drafts().await?;
        let vessels = vessel_records(&tracking_rows, &origins, &snapshots, &drafts);
        self.publish(store, run_id, &mut summary, Extract::Vessels, &vessels)
            .await?;

        let mut batches = Vec::with_capacity(self.config.forecast_days as usize);
        for t in 1..=self.config.forecast_days {
            let rows = store
                .fetch_forecast_progression(days_before(today, t))
                .await?;
            batches.push((t, rows));
        }
        let forecasts = forecast_records(batches);
        self.publish(store, run_id, &mut summary, Extract::Forecasts, &forecasts)
            .await?;

        let empty_full = store.fetch_latest_empty_full().await?;
        let map_rows = imo_tracking(&tracking, &vessels, &empty_full);
        self.publish(store, run_id, &mut summary, Extract::ImoTracking, &map_rows)
            .await?;

        info!(
            run_id = %run_id,
            files = summary.files.len(),
            rows = summary.total_rows(),
            "export complete"
        );
        Ok(summary)
    }

    async fn publish<T: Serialize + CsvColumns>(
        &self,
        store: &Store,
        run_id: &str,
        summary: &mut ExportSummary,
        extract: Extract,
        rows: &[T],
    ) -> Result<()> {
        let path = self.config.output_dir.join(extract.file_name());
        let written = write_csv(&path, rows)
            .with_context(|| format!("{} extract failed", extract.name()))?;
        store
            .record_export(run_id, extract.name(), &path.to_string_lossy(), written)
            .await?;
        info!(extract = extract.name(), rows = written, path = %path.display(), "extract written");
        summary.files.push(ExportedFile {
            extract,
            path,
            rows: written,
        });
        Ok(())
    }
}
