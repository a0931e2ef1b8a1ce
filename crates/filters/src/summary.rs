use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use extract::records::seen_date_format;
use serde::Serialize;

use crate::{latest_locations, table_origin, track_window, MapFilter, MapRow};

/// Laden/ballast tallies over the vessels' latest sightings.
///
/// `ef` is the current state, `empty_full` the state a year ago. In both,
/// 0 means full and 1 means empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EfCounts {
    pub full: usize,
    pub empty: usize,
    pub total: usize,
    pub yy_full: usize,
    pub yy_empty: usize,
    pub yy_total: usize,
}

impl EfCounts {
    pub fn from_latest(latest: &[&MapRow]) -> Self {
        let current = |flag| latest.iter().filter(|row| row.point.ef == Some(flag)).count();
        let year_ago = |flag| latest.iter().filter(|row| row.empty_full() == Some(flag)).count();
        let (full, empty) = (current(0), current(1));
        let (yy_full, yy_empty) = (year_ago(0), year_ago(1));
        Self {
            full,
            empty,
            total: full + empty,
            yy_full,
            yy_empty,
            yy_total: yy_full + yy_empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestLocation {
    pub imo: i64,
    pub name: Option<String>,
    #[serde(with = "seen_date_format")]
    pub seen_date: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub region: Option<String>,
    pub hours_since_latest: f64,
}

/// Line drawn for one vessel inside the track window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VesselTrack {
    pub imo: i64,
    pub region: Option<String>,
    pub points: Vec<[f64; 2]>,
}

/// Everything the map view renders for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSummary {
    pub rows: usize,
    pub vessels: usize,
    pub counts: EfCounts,
    pub latest: Vec<LatestLocation>,
    pub tracks: Vec<VesselTrack>,
}

impl MapSummary {
    /// `hours` is the track-window slider, measured back from the latest
    /// sighting on the table's cumulative-hour axis.
    pub fn build(rows: &[MapRow], filter: &MapFilter, hours: f64) -> Self {
        let filtered = filter.apply(rows);
        let latest = latest_locations(&filtered);
        let counts = EfCounts::from_latest(&latest);

        let newest = latest.iter().map(|row| row.point.seen_date).max();
        let locations = latest
            .iter()
            .map(|row| LatestLocation {
                imo: row.point.imo,
                name: row.point.name.clone(),
                seen_date: row.point.seen_date,
                lat: row.point.lat,
                lon: row.point.lon,
                region: row.region().map(str::to_string),
                hours_since_latest: newest
                    .map(|n| (n - row.point.seen_date).num_seconds() as f64 / 3600.0)
                    .unwrap_or_default(),
            })
            .collect();

        let mut tracks = Vec::new();
        if let Some(origin) = table_origin(rows) {
            let window = track_window(&filtered, origin, hours);
            let mut by_imo: BTreeMap<i64, VesselTrack> = BTreeMap::new();
            for row in window {
                by_imo
                    .entry(row.point.imo)
                    .or_insert_with(|| VesselTrack {
                        imo: row.point.imo,
                        region: row.region().map(str::to_string),
                        points: Vec::new(),
                    })
                    .points
                    .push([row.point.lat, row.point.lon]);
            }
            tracks = by_imo.into_values().collect();
        }

        Self {
            rows: filtered.len(),
            vessels: latest.iter().map(|row| row.point.imo).collect::<BTreeSet<_>>().len(),
            counts,
            latest: locations,
            tracks,
        }
    }
}
