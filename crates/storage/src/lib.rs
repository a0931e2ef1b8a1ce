use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

mod source;

pub use source::{
    EmptyFullRow, ForecastRow, IdleDayRow, MaxDraftRow, OriginRow, PortRow, TrackingRow,
    YyShipCountRow,
};

pub const INIT_SQL: &str = include_str!("../../../scripts/init_db.sql");

/// Tables the exporter reads from or writes to.
pub const REQUIRED_TABLES: &[&str] = &[
    "lng_port",
    "lng_ships",
    "lng_tracking",
    "lng_model_results",
    "lng_idle_ship_days",
    "lng_origin",
    "lng_ship_departures",
    "lng_ocean_regions",
    "lng_voyage_regions",
    "lng_forecast_progression",
    "export_runs",
    "export_files",
    "incidents",
];

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        run_init_sql(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn validate_required_tables(&self) -> Result<Vec<String>> {
        let present: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&self.pool)
                .await?;
        Ok(REQUIRED_TABLES
            .iter()
            .filter(|table| !present.iter().any(|name| name == *table))
            .map(|table| table.to_string())
            .collect())
    }

    pub async fn insert_run(&self, run_id: &str, git_sha: Option<&str>) -> Result<()> {
        let host = hostname::get()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let ts_ms = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT OR REPLACE INTO export_runs (run_id, started_at_ms, git_sha, host) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(run_id)
        .bind(ts_ms)
        .bind(git_sha)
        .bind(host)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finish_run(&self, run_id: &str, status: &str) -> Result<()> {
        let ts_ms = Utc::now().timestamp_millis();
        sqlx::query("UPDATE export_runs SET finished_at_ms = ?1, status = ?2 WHERE run_id = ?3")
            .bind(ts_ms)
            .bind(status)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_export(
        &self,
        run_id: &str,
        extract: &str,
        path: &str,
        rows: usize,
    ) -> Result<()> {
        let ts_ms = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO export_files (run_id, ts_ms, extract, path, row_count) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(run_id)
        .bind(ts_ms)
        .bind(extract)
        .bind(path)
        .bind(rows as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn log_incident(
        &self,
        run_id: &str,
        severity: &str,
        kind: &str,
        message: &str,
    ) -> Result<()> {
        let ts_ms = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO incidents (run_id, ts_ms, severity, kind, message) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(run_id)
        .bind(ts_ms)
        .bind(severity)
        .bind(kind)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub async fn init_sqlite(url: &str) -> Result<Store> {
    let store = Store::connect(url).await?;
    info!(url = url, "sqlite initialized");
    Ok(store)
}

async fn run_init_sql(pool: &SqlitePool) -> Result<()> {
    for statement in INIT_SQL.split(';') {
        let trimmed = statement.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(pool).await?;
    }
    Ok(())
}
