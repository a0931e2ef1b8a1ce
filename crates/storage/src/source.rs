//! Read-only queries against the vessel source tables.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

use crate::Store;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct PortRow {
    pub port_id: i64,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub region: Option<String>,
    pub sub_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IdleDayRow {
    pub imo: i64,
    pub date: NaiveDate,
    pub idle: i64,
}

/// Tracking point joined with ship particulars and the latest destination model.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TrackingRow {
    pub imo: i64,
    pub seen_date: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    pub stated_destination: Option<String>,
    pub stated_eta: Option<String>,
    pub scrape: Option<String>,
    pub sog: Option<f64>,
    pub name: Option<String>,
    pub dwt: Option<f64>,
    pub gas_cap: Option<f64>,
    pub draft: f64,
    pub empty_draft: Option<f64>,
    pub model_dest: Option<String>,
    pub source_region: Option<String>,
    pub source_subregion: Option<String>,
    pub source_port: Option<String>,
    pub prob: Option<f64>,
    pub sub_region: Option<String>,
    pub d2d: Option<f64>,
    pub model_eta: Option<String>,
    pub pr_port: Option<String>,
    pub pr_port_id: Option<i64>,
    pub port_prob: Option<f64>,
    pub port_d2d: Option<f64>,
    pub port_eta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OriginRow {
    pub imo: i64,
    pub origin_name: Option<String>,
    pub origin_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MaxDraftRow {
    pub imo: i64,
    pub max_draft: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct YyShipCountRow {
    pub imo: i64,
    pub empty_full: Option<i64>,
    pub idle: Option<i64>,
    pub begin_region: Option<String>,
    pub region: Option<String>,
    pub begin_subregion: Option<String>,
    pub subregion: Option<String>,
    pub begin_port_name: Option<String>,
    pub port_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ForecastRow {
    pub imo: i64,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub region2: Option<String>,
    pub subregion2: Option<String>,
    pub date: Option<NaiveDate>,
    pub kind: Option<String>,
    pub gas_volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct EmptyFullRow {
    pub imo: i64,
    pub ef: Option<i64>,
}

const TRACKING_SQL: &str = "
WITH l AS (
    SELECT DISTINCT sub_region2 AS sub_region, region2 AS region
    FROM lng_port
    WHERE sub_region IS NOT NULL
), r AS (
    SELECT mr.imo, l.region AS dest, mr.dest AS sub_region, mr.prob, mr.d2d, mr.eta,
           mr.source_region, mr.source_subregion, mr.source_port, mr.pr_port, mr.pr_port_id,
           mr.port_prob, mr.port_d2d, mr.port_eta
    FROM lng_model_results mr
    LEFT JOIN l ON mr.dest = l.sub_region
    WHERE mr.effective_dt = (SELECT MAX(effective_dt) FROM lng_model_results)
      AND mr.d2d IS NOT NULL
), m AS (
    SELECT imo, MAX(seen_date) AS max_seen_date
    FROM lng_tracking
    WHERE lat IS NOT NULL AND lon IS NOT NULL AND heading IS NOT NULL AND draft IS NOT NULL
    GROUP BY imo
)
SELECT DISTINCT t.imo, t.seen_date, t.lat, t.lon, t.heading,
       t.dest AS stated_destination, t.eta AS stated_eta, t.scrape, t.sog,
       s.name, s.dwt, s.gas_cap, t.draft, s.empty_draft,
       r.dest AS model_dest, r.source_region, r.source_subregion, r.source_port, r.prob,
       r.sub_region, r.d2d, r.eta AS model_eta, r.pr_port, r.pr_port_id, r.port_prob,
       r.port_d2d, r.port_eta
FROM lng_tracking t
JOIN lng_ships s ON s.imo = t.imo
JOIN r ON r.imo = t.imo
JOIN m ON m.imo = t.imo AND julianday(t.seen_date) >= julianday(m.max_seen_date) - 3
WHERE s.active = 1
  AND s.vessel_type = 'Tanker'
  AND t.lat IS NOT NULL AND t.lon IS NOT NULL AND t.heading IS NOT NULL AND t.draft IS NOT NULL
ORDER BY t.imo, t.seen_date";

const YY_SHIP_COUNT_SQL: &str = "
WITH ef AS (
    SELECT o.imo, o.ef
    FROM lng_ocean_regions o
    JOIN lng_ships s ON s.imo = o.imo
    WHERE s.active = 1 AND s.vessel_type = 'Tanker' AND o.date = ?1
), idle AS (
    SELECT d.imo, d.idle
    FROM lng_idle_ship_days d
    JOIN lng_ships s ON s.imo = d.imo
    WHERE s.active = 1 AND s.vessel_type = 'Tanker' AND d.model = ?2 AND d.date = ?1
)
SELECT ef.imo, ef.ef AS empty_full, idle.idle,
       sr.begin_region, sr.end_region AS region, sr.begin_subregion,
       sr.end_subregion AS subregion, sr.begin_port_name, sr.end_port_name AS port_name
FROM ef
LEFT JOIN idle ON idle.imo = ef.imo
JOIN lng_voyage_regions sr ON sr.imo = ef.imo AND sr.begin_date <= ?1 AND sr.end_date >= ?1
ORDER BY ef.imo";

impl Store {
    pub async fn fetch_ports(&self) -> Result<Vec<PortRow>> {
        sqlx::query_as::<_, PortRow>(
            "SELECT port_id, name, lat, lon, region, sub_region FROM lng_port WHERE type = 'port' ORDER BY port_id",
        )
        .fetch_all(self.pool())
        .await
        .context("ports query")
    }

    /// Daily idle flags of one idle model, ordered by imo then date.
    pub async fn fetch_idle_days(&self, model: &str) -> Result<Vec<IdleDayRow>> {
        sqlx::query_as::<_, IdleDayRow>(
            "SELECT imo, date, idle FROM lng_idle_ship_days WHERE model = ?1 ORDER BY imo, date",
        )
        .bind(model)
        .fetch_all(self.pool())
        .await
        .context("idle days query")
    }

    /// Last three days of positions per active tanker with a current model result.
    pub async fn fetch_tracking(&self) -> Result<Vec<TrackingRow>> {
        sqlx::query_as::<_, TrackingRow>(TRACKING_SQL)
            .fetch_all(self.pool())
            .await
            .context("tracking query")
    }

    pub async fn fetch_origins(&self) -> Result<Vec<OriginRow>> {
        sqlx::query_as::<_, OriginRow>(
            "SELECT o.imo, o.origin_name, o.origin_type
             FROM lng_origin o
             JOIN lng_ships s ON s.imo = o.imo
             WHERE s.active = 1 AND s.vessel_type = 'Tanker'
             ORDER BY o.imo",
        )
        .fetch_all(self.pool())
        .await
        .context("origin query")
    }

    pub async fn fetch_max_full_drafts(&self) -> Result<Vec<MaxDraftRow>> {
        sqlx::query_as::<_, MaxDraftRow>(
            "SELECT sd.imo, MAX(sd.draft) AS max_draft
             FROM lng_ship_departures sd
             JOIN lng_ships s ON s.imo = sd.imo
             WHERE sd.cargo = 'Full' AND s.active = 1 AND s.vessel_type = 'Tanker'
             GROUP BY sd.imo
             ORDER BY sd.imo",
        )
        .fetch_all(self.pool())
        .await
        .context("max draft query")
    }

    /// Empty/full and idle state on `date`, placed on the voyage covering it.
    pub async fn fetch_yy_ship_count(
        &self,
        date: NaiveDate,
        idle_model: &str,
    ) -> Result<Vec<YyShipCountRow>> {
        sqlx::query_as::<_, YyShipCountRow>(YY_SHIP_COUNT_SQL)
            .bind(date)
            .bind(idle_model)
            .fetch_all(self.pool())
            .await
            .context("yy ship count query")
    }

    /// Latest forecast progression whose effective date is on or before `cutoff`.
    pub async fn fetch_forecast_progression(&self, cutoff: NaiveDate) -> Result<Vec<ForecastRow>> {
        sqlx::query_as::<_, ForecastRow>(
            "SELECT imo, region, subregion, region2, subregion2, date, type AS kind, gas_volume
             FROM lng_forecast_progression
             WHERE max_eff = (
                 SELECT MAX(max_eff) FROM lng_forecast_progression WHERE date(max_eff) <= ?1
             )
             ORDER BY imo",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
        .context("forecast progression query")
    }

    pub async fn fetch_latest_empty_full(&self) -> Result<Vec<EmptyFullRow>> {
        sqlx::query_as::<_, EmptyFullRow>(
            "SELECT o.imo, o.ef
             FROM lng_ocean_regions o
             JOIN lng_ships s ON s.imo = o.imo
             WHERE s.active = 1 AND s.vessel_type = 'Tanker'
               AND o.date = (SELECT MAX(date) FROM lng_ocean_regions)
             ORDER BY o.imo",
        )
        .fetch_all(self.pool())
        .await
        .context("empty full query")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("source.db").display());
        let store = Store::connect(&url).await.expect("store should connect");
        for statement in [
            "INSERT INTO lng_ships (imo, name, dwt, gas_cap, empty_draft, active, vessel_type) VALUES
                (9000001, 'Arctic Dawn', 90000, 174000, 9.5, 1, 'Tanker'),
                (9000002, 'Gulf Star', 70000, 138000, 9.1, 1, 'Tanker'),
                (9000003, 'Old Hulk', 60000, 125000, 8.9, 0, 'Tanker'),
                (9000004, 'Floating Unit', 95000, 170000, 10.0, 1, 'FPSO')",
            "INSERT INTO lng_port (port_id, name, type, lat, lon, region, sub_region, region2, sub_region2) VALUES
                (1, 'Sabine Pass', 'port', 29.73, -93.87, 'Americas', 'US Gulf', 'North America', 'US Gulf'),
                (2, 'Ras Laffan', 'port', 25.9, 51.55, 'Middle East', 'Qatar', 'Middle East', 'Qatar'),
                (3, 'Offshore Zone', 'zone', 10.0, 10.0, NULL, NULL, NULL, NULL)",
            "INSERT INTO lng_model_results (imo, effective_dt, dest, prob, d2d, eta, source_region, source_subregion, source_port, pr_port, pr_port_id, port_prob, port_d2d, port_eta) VALUES
                (9000001, '2024-03-09 00:00:00', 'US Gulf', 0.8, 4.0, '2024-03-14', 'Middle East', 'Qatar', 'Ras Laffan', 'Sabine Pass', 1, 0.712345, 4.5, '2024-03-14'),
                (9000002, '2024-03-09 00:00:00', 'Qatar', 0.6, NULL, '2024-03-20', 'North America', 'US Gulf', 'Sabine Pass', NULL, NULL, NULL, NULL, NULL),
                (9000001, '2024-03-01 00:00:00', 'Qatar', 0.5, 9.0, '2024-03-10', NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL)",
            "INSERT INTO lng_tracking (imo, seen_date, lat, lon, heading, dest, eta, scrape, sog, draft) VALUES
                (9000001, '2024-03-01 06:00:00', 25.0, 52.0, 90, 'SABINE', '03-14 10:00', 'ais', 12.5, 11.2),
                (9000001, '2024-03-08 06:00:00', 26.0, 55.0, 95, 'SABINE', '03-14 10:00', 'ais', 13.0, 11.3),
                (9000001, '2024-03-10 06:00:00', 27.0, 58.0, 100, 'SABINE', '03-14 10:00', 'ais', 13.1, 11.3),
                (9000001, '2024-03-10 12:00:00', 27.5, 59.0, NULL, 'SABINE', '03-14 10:00', 'ais', 13.1, 11.3),
                (9000002, '2024-03-10 06:00:00', 29.0, -93.0, 180, 'RAS LAFFAN', NULL, 'ais', 0.1, 9.1),
                (9000003, '2024-03-10 06:00:00', 1.0, 1.0, 10, NULL, NULL, 'ais', 0.0, 9.0)",
            "INSERT INTO lng_idle_ship_days (imo, date, model, idle) VALUES
                (9000001, '2024-03-09', 'Max24-5', 1),
                (9000001, '2024-03-08', 'Max24-5', 0),
                (9000001, '2024-03-09', 'Other', 0)",
            "INSERT INTO lng_origin (imo, origin_name, origin_type) VALUES
                (9000001, 'Qatar', 'country'),
                (9000003, 'Nigeria', 'country')",
            "INSERT INTO lng_ship_departures (imo, begin_date, cargo, draft) VALUES
                (9000001, '2023-01-01', 'Full', 11.5),
                (9000001, '2023-06-01', 'Full', 11.9),
                (9000001, '2023-09-01', 'Empty', 9.6),
                (9000002, '2023-02-01', 'Empty', 9.0)",
            "INSERT INTO lng_ocean_regions (imo, date, ef) VALUES
                (9000001, '2023-03-10', 0),
                (9000002, '2023-03-10', 1),
                (9000001, '2024-03-10', 1),
                (9000002, '2024-03-10', 0),
                (9000003, '2024-03-10', 1)",
            "INSERT INTO lng_voyage_regions (imo, begin_date, end_date, begin_region, end_region, begin_subregion, end_subregion, begin_port_name, end_port_name) VALUES
                (9000001, '2023-03-01', '2023-03-20', 'Middle East', 'Europe', 'Qatar', 'NW Europe', 'Ras Laffan', 'Zeebrugge'),
                (9000002, '2023-04-01', '2023-04-20', 'Americas', 'Asia', 'US Gulf', 'Japan', 'Sabine Pass', 'Futtsu')",
            "INSERT INTO lng_idle_ship_days (imo, date, model, idle) VALUES
                (9000001, '2023-03-10', 'Max24-5', 1)",
            "INSERT INTO lng_forecast_progression (imo, region, subregion, region2, subregion2, date, type, gas_volume, max_eff) VALUES
                (9000001, 'Europe', 'NW Europe', 'Europe', 'NWE', '2024-03-20', 'arrival', 3.4, '2024-03-08 04:00:00'),
                (9000002, 'Asia', 'Japan', 'Asia', 'JKT', '2024-03-25', 'arrival', 3.1, '2024-03-08 04:00:00'),
                (9000001, 'Europe', 'NW Europe', 'Europe', 'NWE', '2024-03-21', 'arrival', 3.4, '2024-03-09 04:00:00')",
        ] {
            sqlx::query(statement)
                .execute(store.pool())
                .await
                .expect("seed statement should run");
        }
        (dir, store)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn ports_exclude_non_port_locations() {
        let (_dir, store) = seeded_store().await;
        let ports = store.fetch_ports().await.unwrap();
        let names: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Sabine Pass", "Ras Laffan"]);
    }

    #[tokio::test]
    async fn idle_days_are_filtered_by_model_and_sorted() {
        let (_dir, store) = seeded_store().await;
        let rows = store.fetch_idle_days("Max24-5").await.unwrap();
        let keys: Vec<(i64, NaiveDate, i64)> =
            rows.iter().map(|r| (r.imo, r.date, r.idle)).collect();
        assert_eq!(
            keys,
            vec![
                (9000001, date("2023-03-10"), 1),
                (9000001, date("2024-03-08"), 0),
                (9000001, date("2024-03-09"), 1),
            ]
        );
    }

    #[tokio::test]
    async fn tracking_keeps_recent_complete_points_of_modelled_tankers() {
        let (_dir, store) = seeded_store().await;
        let rows = store.fetch_tracking().await.unwrap();

        // 9000002 has no d2d in the latest model run and 9000003 is inactive.
        assert!(rows.iter().all(|r| r.imo == 9000001));
        let seen: Vec<String> = rows.iter().map(|r| r.seen_date.to_string()).collect();
        assert_eq!(
            seen,
            vec!["2024-03-08 06:00:00".to_string(), "2024-03-10 06:00:00".to_string()]
        );

        let first = &rows[0];
        assert_eq!(first.model_dest.as_deref(), Some("North America"));
        assert_eq!(first.sub_region.as_deref(), Some("US Gulf"));
        assert_eq!(first.source_port.as_deref(), Some("Ras Laffan"));
        assert_eq!(first.gas_cap, Some(174000.0));
    }

    #[tokio::test]
    async fn origins_and_drafts_cover_active_tankers_only() {
        let (_dir, store) = seeded_store().await;
        let origins = store.fetch_origins().await.unwrap();
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].origin_name.as_deref(), Some("Qatar"));

        let drafts = store.fetch_max_full_drafts().await.unwrap();
        assert_eq!(
            drafts,
            vec![MaxDraftRow {
                imo: 9000001,
                max_draft: Some(11.9)
            }]
        );
    }

    #[tokio::test]
    async fn yy_ship_count_joins_voyage_covering_the_date() {
        let (_dir, store) = seeded_store().await;
        let rows = store
            .fetch_yy_ship_count(date("2023-03-10"), "Max24-5")
            .await
            .unwrap();
        // 9000002 has an ef row but no voyage covering the date.
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.imo, 9000001);
        assert_eq!(row.empty_full, Some(0));
        assert_eq!(row.idle, Some(1));
        assert_eq!(row.region.as_deref(), Some("Europe"));
        assert_eq!(row.port_name.as_deref(), Some("Zeebrugge"));
    }

    #[tokio::test]
    async fn yy_ship_count_skips_vessels_without_ocean_region() {
        let (_dir, store) = seeded_store().await;
        for statement in [
            "INSERT INTO lng_ships (imo, name, dwt, gas_cap, empty_draft, active, vessel_type) VALUES
                (9000005, 'Idle Only', 80000, 160000, 9.3, 1, 'Tanker')",
            "INSERT INTO lng_idle_ship_days (imo, date, model, idle) VALUES
                (9000005, '2023-03-10', 'Max24-5', 4)",
            "INSERT INTO lng_voyage_regions (imo, begin_date, end_date, begin_region, end_region, begin_subregion, end_subregion, begin_port_name, end_port_name) VALUES
                (9000005, '2023-03-01', '2023-03-31', 'Americas', 'Europe', 'US Gulf', 'Iberia', 'Sabine Pass', 'Sines')",
        ] {
            sqlx::query(statement).execute(store.pool()).await.unwrap();
        }

        let rows = store
            .fetch_yy_ship_count(date("2023-03-10"), "Max24-5")
            .await
            .unwrap();
        let imos: Vec<i64> = rows.iter().map(|r| r.imo).collect();
        assert_eq!(imos, vec![9000001]);
    }

    #[tokio::test]
    async fn forecast_progression_picks_latest_run_before_cutoff() {
        let (_dir, store) = seeded_store().await;
        let day_after = store
            .fetch_forecast_progression(date("2024-03-09"))
            .await
            .unwrap();
        assert_eq!(day_after.len(), 1);
        assert_eq!(day_after[0].date, Some(date("2024-03-21")));

        let earlier = store
            .fetch_forecast_progression(date("2024-03-08"))
            .await
            .unwrap();
        assert_eq!(earlier.len(), 2);
        assert_eq!(earlier[0].kind.as_deref(), Some("arrival"));

        let none = store
            .fetch_forecast_progression(date("2024-01-01"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn empty_full_uses_most_recent_date() {
        let (_dir, store) = seeded_store().await;
        let rows = store.fetch_latest_empty_full().await.unwrap();
        assert_eq!(
            rows,
            vec![
                EmptyFullRow {
                    imo: 9000001,
                    ef: Some(1)
                },
                EmptyFullRow {
                    imo: 9000002,
                    ef: Some(0)
                },
            ]
        );
    }
}
