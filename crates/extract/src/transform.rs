//! Joins and projections that turn source rows into extract records.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use idle::{IdleError, IdleObservation, IdleSnapshots};
use storage::{
    EmptyFullRow, ForecastRow, IdleDayRow, MaxDraftRow, OriginRow, TrackingRow, YyShipCountRow,
};

use crate::records::{
    bcf_capacity, ForecastRecord, ImoTrackingRecord, ShipSize, TrackingRecord, VesselRecord,
    YyShipCount,
};

/// Draft assumed for vessels that never sailed full.
pub const DEFAULT_MAX_DRAFT: f64 = 12.0;
/// Upper bound applied to observed full drafts.
pub const MAX_DRAFT_CAP: f64 = 14.0;

pub fn idle_observations(rows: &[IdleDayRow]) -> Result<Vec<IdleObservation>, IdleError> {
    rows.iter()
        .map(|row| IdleObservation::from_flag(row.imo, row.date, row.idle))
        .collect()
}

pub fn tracking_records(rows: &[TrackingRow]) -> Vec<TrackingRecord> {
    rows.iter()
        .map(|row| TrackingRecord {
            imo: row.imo,
            seen_date: row.seen_date,
            lat: row.lat,
            lon: row.lon,
            heading: row.heading,
            stated_destination: row.stated_destination.clone(),
            stated_eta: row.stated_eta.clone(),
            scrape: row.scrape.clone(),
            sog: row.sog,
            draft: row.draft,
        })
        .collect()
}

pub fn yy_ship_counts(rows: Vec<YyShipCountRow>) -> Vec<YyShipCount> {
    rows.into_iter()
        .map(|row| YyShipCount {
            imo: row.imo,
            empty_full: row.empty_full,
            idle: row.idle,
            begin_subregion: row.begin_subregion,
            subregion: row.subregion,
            begin_region: row.begin_region,
            region: row.region,
            begin_port_name: row.begin_port_name,
            port_name: row.port_name,
        })
        .collect()
}

/// Concatenates forecast batches, tagging each row with its batch offset.
pub fn forecast_records(batches: Vec<(u32, Vec<ForecastRow>)>) -> Vec<ForecastRecord> {
    batches
        .into_iter()
        .flat_map(|(t, rows)| {
            rows.into_iter().map(move |row| ForecastRecord {
                imo: row.imo,
                region: row.region,
                subregion: row.subregion,
                region2: row.region2,
                subregion2: row.subregion2,
                date: row.date,
                kind: row.kind,
                gas_volume: row.gas_volume,
                t,
            })
        })
        .collect()
}

/// Vessel-level columns of a tracking row; distinct profiles form the vessel table.
#[derive(Debug, Clone, PartialEq)]
struct VesselProfile {
    imo: i64,
    name: Option<String>,
    dwt: Option<f64>,
    gas_cap: Option<f64>,
    empty_draft: Option<f64>,
    model_dest: Option<String>,
    prob: Option<f64>,
    sub_region: Option<String>,
    source_subregion: Option<String>,
    source_region: Option<String>,
    source_port: Option<String>,
    d2d: Option<f64>,
    model_eta: Option<String>,
    pr_port: Option<String>,
    pr_port_id: Option<i64>,
    port_prob: Option<f64>,
    port_d2d: Option<f64>,
    port_eta: Option<String>,
}

impl From<&TrackingRow> for VesselProfile {
    fn from(row: &TrackingRow) -> Self {
        Self {
            imo: row.imo,
            name: row.name.clone(),
            dwt: row.dwt,
            gas_cap: row.gas_cap,
            empty_draft: row.empty_draft,
            model_dest: row.model_dest.clone(),
            prob: row.prob,
            sub_region: row.sub_region.clone(),
            source_subregion: row.source_subregion.clone(),
            source_region: row.source_region.clone(),
            source_port: row.source_port.clone(),
            d2d: row.d2d,
            model_eta: row.model_eta.clone(),
            pr_port: row.pr_port.clone(),
            pr_port_id: row.pr_port_id,
            port_prob: row.port_prob,
            port_d2d: row.port_d2d,
            port_eta: row.port_eta.clone(),
        }
    }
}

/// Distinct profiles in first-seen order.
fn distinct_profiles(rows: &[TrackingRow]) -> Vec<VesselProfile> {
    let mut seen: HashMap<i64, Vec<usize>> = HashMap::new();
    let mut profiles: Vec<VesselProfile> = Vec::new();
    for row in rows {
        let profile = VesselProfile::from(row);
        let bucket = seen.entry(profile.imo).or_default();
        if bucket.iter().any(|&idx| profiles[idx] == profile) {
            continue;
        }
        bucket.push(profiles.len());
        profiles.push(profile);
    }
    profiles
}

fn clamp_max_draft(max_draft: Option<f64>) -> f64 {
    max_draft.unwrap_or(DEFAULT_MAX_DRAFT).min(MAX_DRAFT_CAP)
}

/// Builds the vessel table.
///
/// Every distinct vessel profile is left-joined with its origins (one output
/// row per origin), its idle snapshot (idle 0 when absent) and its maximum full
/// draft (12 m when absent, never above 14 m).
pub fn vessel_records(
    tracking: &[TrackingRow],
    origins: &[OriginRow],
    idle: &IdleSnapshots,
    max_drafts: &[MaxDraftRow],
) -> Vec<VesselRecord> {
    let mut origins_by_imo: HashMap<i64, Vec<&OriginRow>> = HashMap::new();
    for origin in origins {
        origins_by_imo.entry(origin.imo).or_default().push(origin);
    }
    let drafts: HashMap<i64, Option<f64>> =
        max_drafts.iter().map(|d| (d.imo, d.max_draft)).collect();

    let mut records = Vec::new();
    for profile in distinct_profiles(tracking) {
        let snapshot = idle.get(profile.imo);
        let max_draft = clamp_max_draft(drafts.get(&profile.imo).copied().flatten());
        let matched: Vec<(Option<String>, Option<String>)> = match origins_by_imo.get(&profile.imo)
        {
            Some(rows) => rows
                .iter()
                .map(|o| (o.origin_name.clone(), o.origin_type.clone()))
                .collect(),
            None => vec![(None, None)],
        };

        for (origin_name, origin_type) in matched {
            records.push(VesselRecord {
                imo: profile.imo,
                name: profile.name.clone(),
                dwt: profile.dwt,
                gas_cap: profile.gas_cap,
                bcf_cap: profile.gas_cap.map(bcf_capacity),
                size: profile.gas_cap.map(ShipSize::from_gas_cap),
                empty_draft: profile.empty_draft,
                model_dest: profile.model_dest.clone(),
                prob: profile.prob,
                sub_region: profile.sub_region.clone(),
                source_subregion: profile.source_subregion.clone(),
                source_region: profile.source_region.clone(),
                source_port: profile.source_port.clone(),
                d2d: profile.d2d,
                model_eta: profile.model_eta.clone(),
                pr_port: profile.pr_port.clone(),
                pr_port_id: profile.pr_port_id,
                port_prob: profile.port_prob,
                port_d2d: profile.port_d2d,
                port_eta: profile.port_eta.clone(),
                origin_name,
                origin_type,
                date: snapshot.map(|s| s.date),
                idle: idle.reported_idle(profile.imo),
                max_draft,
            });
        }
    }
    records
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Tracking points left-joined with vessels and the current empty/full flag.
///
/// Points repeated at the same position and time for the same vessel are kept
/// once, first occurrence wins.
pub fn imo_tracking(
    tracking: &[TrackingRecord],
    vessels: &[VesselRecord],
    empty_full: &[EmptyFullRow],
) -> Vec<ImoTrackingRecord> {
    let mut vessels_by_imo: HashMap<i64, Vec<&VesselRecord>> = HashMap::new();
    for vessel in vessels {
        vessels_by_imo.entry(vessel.imo).or_default().push(vessel);
    }
    let ef_by_imo: HashMap<i64, Option<i64>> = empty_full.iter().map(|r| (r.imo, r.ef)).collect();

    let mut seen: HashSet<(u64, u64, NaiveDateTime, i64)> = HashSet::new();
    let mut records = Vec::with_capacity(tracking.len());
    for point in tracking {
        let ef = ef_by_imo.get(&point.imo).copied().flatten();
        let matched: Vec<Option<&VesselRecord>> = match vessels_by_imo.get(&point.imo) {
            Some(rows) => rows.iter().map(|v| Some(*v)).collect(),
            None => vec![None],
        };

        for vessel in matched {
            let key = (
                point.lat.to_bits(),
                point.lon.to_bits(),
                point.seen_date,
                point.imo,
            );
            if !seen.insert(key) {
                continue;
            }
            records.push(ImoTrackingRecord {
                date: vessel.and_then(|v| v.date),
                lat: point.lat,
                lon: point.lon,
                imo: point.imo,
                seen_date: point.seen_date,
                name: vessel.and_then(|v| v.name.clone()),
                draft: point.draft,
                empty_draft: vessel.and_then(|v| v.empty_draft),
                sog: point.sog,
                stated_destination: point.stated_destination.clone(),
                model_dest: vessel.and_then(|v| v.model_dest.clone()),
                prob: vessel.and_then(|v| v.prob),
                source_region: vessel.and_then(|v| v.source_region.clone()),
                source_subregion: vessel.and_then(|v| v.source_subregion.clone()),
                source_port: vessel.and_then(|v| v.source_port.clone()),
                stated_eta: point.stated_eta.clone(),
                d2d: vessel.and_then(|v| v.d2d),
                model_eta: vessel.and_then(|v| v.model_eta.clone()),
                pr_port: vessel.and_then(|v| v.pr_port.clone()),
                pr_port_id: vessel.and_then(|v| v.pr_port_id),
                port_prob: vessel.and_then(|v| v.port_prob).map(round4),
                port_d2d: vessel.and_then(|v| v.port_d2d),
                port_eta: vessel.and_then(|v| v.port_eta.clone()),
                size: vessel.and_then(|v| v.size),
                bcf_cap: vessel.and_then(|v| v.bcf_cap),
                origin_name: vessel.and_then(|v| v.origin_name.clone()),
                origin_type: vessel.and_then(|v| v.origin_type.clone()),
                sub_region: vessel.and_then(|v| v.sub_region.clone()),
                idle: vessel.map(|v| v.idle),
                gas_cap: vessel.and_then(|v| v.gas_cap),
                dwt: vessel.and_then(|v| v.dwt),
                max_draft: vessel.map(|v| v.max_draft),
                ef,
            });
        }
    }
    records
}
