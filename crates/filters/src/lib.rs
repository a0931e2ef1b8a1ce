//! Filter semantics of the vessel map dashboard.
//!
//! The dashboard reads `imo_tracking.csv` joined with `yy_ship_count.csv` and
//! re-filters that table on every widget change. Everything here is pure:
//! rows in, rows (or counts) out.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use extract::{read_csv, ImoTrackingRecord, YyShipCount};
use serde::Serialize;

mod selection;
mod summary;

pub use selection::{Selection, DESELECT_ALL, SELECT_ALL};
pub use summary::{EfCounts, LatestLocation, MapSummary, VesselTrack};

/// A tracking point with its year-ago voyage context, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRow {
    pub point: ImoTrackingRecord,
    pub yy: Option<YyShipCount>,
}

impl MapRow {
    /// Current idle streak of the vessel.
    pub fn idle_days(&self) -> Option<u32> {
        self.point.idle
    }

    /// Idle state of the vessel a year ago.
    pub fn yy_idle(&self) -> Option<i64> {
        self.yy.as_ref().and_then(|y| y.idle)
    }

    pub fn empty_full(&self) -> Option<i64> {
        self.yy.as_ref().and_then(|y| y.empty_full)
    }

    pub fn region(&self) -> Option<&str> {
        self.yy.as_ref().and_then(|y| y.region.as_deref())
    }

    pub fn subregion(&self) -> Option<&str> {
        self.yy.as_ref().and_then(|y| y.subregion.as_deref())
    }

    pub fn port_name(&self) -> Option<&str> {
        self.yy.as_ref().and_then(|y| y.port_name.as_deref())
    }

    pub fn source_region(&self) -> Option<&str> {
        self.point.source_region.as_deref()
    }

    pub fn source_subregion(&self) -> Option<&str> {
        self.point.source_subregion.as_deref()
    }

    pub fn source_port(&self) -> Option<&str> {
        self.point.source_port.as_deref()
    }
}

/// Left-joins tracking points with year-ago rows on imo.
pub fn combine(points: Vec<ImoTrackingRecord>, yy: &[YyShipCount]) -> Vec<MapRow> {
    let mut yy_by_imo: HashMap<i64, Vec<&YyShipCount>> = HashMap::new();
    for row in yy {
        yy_by_imo.entry(row.imo).or_default().push(row);
    }

    let mut rows = Vec::with_capacity(points.len());
    for point in points {
        match yy_by_imo.get(&point.imo) {
            Some(matches) => {
                for yy_row in matches {
                    rows.push(MapRow {
                        point: point.clone(),
                        yy: Some((*yy_row).clone()),
                    });
                }
            }
            None => rows.push(MapRow { point, yy: None }),
        }
    }
    rows
}

pub fn load_map_rows(imo_tracking: &Path, yy_ship_count: &Path) -> Result<Vec<MapRow>> {
    let points: Vec<ImoTrackingRecord> = read_csv(imo_tracking)?;
    let yy: Vec<YyShipCount> = read_csv(yy_ship_count)?;
    Ok(combine(points, &yy))
}

/// Every widget of the map sidebar. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapFilter {
    pub imo_search: Option<String>,
    pub source_regions: Selection,
    pub source_subregions: Selection,
    pub source_ports: Selection,
    pub dest_regions: Selection,
    pub dest_subregions: Selection,
    pub dest_ports: Selection,
    /// Year-ago idle flags to keep.
    pub idle_statuses: Vec<i64>,
    /// Year-ago empty/full flags to keep (0 full, 1 empty).
    pub empty_full_statuses: Vec<i64>,
    pub max_full_draft: Option<f64>,
    /// Longest current idle streak to keep, in days.
    pub max_idle_days: Option<u32>,
}

impl MapFilter {
    fn imo(&self) -> Option<i64> {
        let text = self.imo_search.as_deref()?.trim();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }

    pub fn matches(&self, row: &MapRow) -> bool {
        if let Some(max_idle) = self.max_idle_days {
            if !row.idle_days().is_some_and(|days| days <= max_idle) {
                return false;
            }
        }
        if let Some(max_draft) = self.max_full_draft {
            if !row.point.max_draft.is_some_and(|draft| draft <= max_draft) {
                return false;
            }
        }
        if !self.empty_full_statuses.is_empty()
            && !row
                .empty_full()
                .is_some_and(|ef| self.empty_full_statuses.contains(&ef))
        {
            return false;
        }
        if !self.idle_statuses.is_empty()
            && !row
                .yy_idle()
                .is_some_and(|idle| self.idle_statuses.contains(&idle))
        {
            return false;
        }
        if let Some(imo) = self.imo() {
            if row.point.imo != imo {
                return false;
            }
        }
        self.dest_ports.admits(row.port_name())
            && self.dest_regions.admits(row.region())
            && self.dest_subregions.admits(row.subregion())
            && self.source_regions.admits(row.source_region())
            && self.source_subregions.admits(row.source_subregion())
            && self.source_ports.admits(row.source_port())
    }

    pub fn apply<'a>(&self, rows: &'a [MapRow]) -> Vec<&'a MapRow> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }
}

fn options<F, G>(rows: &[MapRow], parent: &Selection, key: F, value: G) -> Vec<String>
where
    F: Fn(&MapRow) -> Option<&str>,
    G: Fn(&MapRow) -> Option<&str>,
{
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| parent.offers(key(row)))
        .filter_map(|row| value(row))
        .filter(|v| seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn source_subregion_options(rows: &[MapRow], regions: &Selection) -> Vec<String> {
    options(rows, regions, MapRow::source_region, MapRow::source_subregion)
}

pub fn source_port_options(rows: &[MapRow], subregions: &Selection) -> Vec<String> {
    options(rows, subregions, MapRow::source_subregion, MapRow::source_port)
}

pub fn dest_subregion_options(rows: &[MapRow], regions: &Selection) -> Vec<String> {
    options(rows, regions, MapRow::region, MapRow::subregion)
}

pub fn dest_port_options(rows: &[MapRow], subregions: &Selection) -> Vec<String> {
    options(rows, subregions, MapRow::subregion, MapRow::port_name)
}

/// Rows at each vessel's most recent sighting, ordered by imo.
pub fn latest_locations<'a>(rows: &[&'a MapRow]) -> Vec<&'a MapRow> {
    let mut latest: BTreeMap<i64, NaiveDateTime> = BTreeMap::new();
    for row in rows {
        latest
            .entry(row.point.imo)
            .and_modify(|seen| {
                if row.point.seen_date > *seen {
                    *seen = row.point.seen_date;
                }
            })
            .or_insert(row.point.seen_date);
    }

    let mut by_imo: BTreeMap<i64, Vec<&'a MapRow>> = BTreeMap::new();
    for row in rows {
        if latest.get(&row.point.imo) == Some(&row.point.seen_date) {
            by_imo.entry(row.point.imo).or_default().push(*row);
        }
    }
    by_imo.into_values().flatten().collect()
}

/// Start of the table's hour axis: the first row's sighting.
pub fn table_origin(rows: &[MapRow]) -> Option<NaiveDateTime> {
    rows.first().map(|row| row.point.seen_date)
}

pub fn cumulative_hours(row: &MapRow, origin: NaiveDateTime) -> f64 {
    (row.point.seen_date - origin).num_seconds() as f64 / 3600.0
}

/// Rows within `hours` of the latest sighting, never reaching before the origin.
pub fn track_window<'a>(
    rows: &[&'a MapRow],
    origin: NaiveDateTime,
    hours: f64,
) -> Vec<&'a MapRow> {
    let Some(latest) = rows
        .iter()
        .map(|row| cumulative_hours(row, origin))
        .reduce(f64::max)
    else {
        return Vec::new();
    };
    let start = (latest - hours).max(0.0);
    rows.iter()
        .copied()
        .filter(|row| {
            let h = cumulative_hours(row, origin);
            h >= start && h <= latest
        })
        .collect()
}
