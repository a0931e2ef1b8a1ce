use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use storage::PortRow;

use crate::output::CsvColumns;

/// Extract rows write `seen_date` as `YYYY-MM-DD HH:MM:SS`.
pub mod seen_date_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Hull class derived from cargo capacity in cubic metres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipSize {
    Conventional,
    #[serde(rename = "Q-Flex")]
    QFlex,
    #[serde(rename = "Q-Max")]
    QMax,
}

impl ShipSize {
    pub fn from_gas_cap(gas_cap: f64) -> Self {
        if gas_cap <= 145_000.0 {
            ShipSize::Conventional
        } else if gas_cap <= 220_000.0 {
            ShipSize::QFlex
        } else {
            ShipSize::QMax
        }
    }
}

/// Capacity in billion cubic feet of regasified gas.
pub fn bcf_capacity(gas_cap: f64) -> f64 {
    (gas_cap / 2.21) * 0.000_048_7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub imo: i64,
    #[serde(with = "seen_date_format")]
    pub seen_date: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
    pub stated_destination: Option<String>,
    pub stated_eta: Option<String>,
    pub scrape: Option<String>,
    pub sog: Option<f64>,
    pub draft: f64,
}

/// Vessel particulars, latest destination model and derived idle/draft state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRecord {
    pub imo: i64,
    pub name: Option<String>,
    pub dwt: Option<f64>,
    pub gas_cap: Option<f64>,
    pub bcf_cap: Option<f64>,
    pub size: Option<ShipSize>,
    pub empty_draft: Option<f64>,
    pub model_dest: Option<String>,
    pub prob: Option<f64>,
    pub sub_region: Option<String>,
    pub source_subregion: Option<String>,
    pub source_region: Option<String>,
    pub source_port: Option<String>,
    pub d2d: Option<f64>,
    pub model_eta: Option<String>,
    pub pr_port: Option<String>,
    pub pr_port_id: Option<i64>,
    pub port_prob: Option<f64>,
    pub port_d2d: Option<f64>,
    pub port_eta: Option<String>,
    pub origin_name: Option<String>,
    pub origin_type: Option<String>,
    /// Date of the idle snapshot, absent when the vessel had no idle data.
    pub date: Option<NaiveDate>,
    pub idle: u32,
    pub max_draft: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YyShipCount {
    pub imo: i64,
    pub empty_full: Option<i64>,
    pub idle: Option<i64>,
    pub begin_subregion: Option<String>,
    pub subregion: Option<String>,
    pub begin_region: Option<String>,
    pub region: Option<String>,
    pub begin_port_name: Option<String>,
    pub port_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub imo: i64,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub region2: Option<String>,
    pub subregion2: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub gas_volume: Option<f64>,
    /// Days between the forecast run and the export date.
    pub t: u32,
}

/// One tracking point with everything the map needs to draw and label it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImoTrackingRecord {
    pub date: Option<NaiveDate>,
    pub lat: f64,
    pub lon: f64,
    pub imo: i64,
    #[serde(with = "seen_date_format")]
    pub seen_date: NaiveDateTime,
    pub name: Option<String>,
    pub draft: f64,
    pub empty_draft: Option<f64>,
    pub sog: Option<f64>,
    pub stated_destination: Option<String>,
    pub model_dest: Option<String>,
    pub prob: Option<f64>,
    pub source_region: Option<String>,
    pub source_subregion: Option<String>,
    pub source_port: Option<String>,
    pub stated_eta: Option<String>,
    pub d2d: Option<f64>,
    pub model_eta: Option<String>,
    pub pr_port: Option<String>,
    pub pr_port_id: Option<i64>,
    pub port_prob: Option<f64>,
    pub port_d2d: Option<f64>,
    pub port_eta: Option<String>,
    pub size: Option<ShipSize>,
    pub bcf_cap: Option<f64>,
    pub origin_name: Option<String>,
    pub origin_type: Option<String>,
    pub sub_region: Option<String>,
    pub idle: Option<u32>,
    pub gas_cap: Option<f64>,
    pub dwt: Option<f64>,
    pub max_draft: Option<f64>,
    pub ef: Option<i64>,
}

impl CsvColumns for PortRow {
    const COLUMNS: &'static [&'static str] =
        &["port_id", "name", "lat", "lon", "region", "sub_region"];
}

impl CsvColumns for TrackingRecord {
    const COLUMNS: &'static [&'static str] = &[
        "imo",
        "seen_date",
        "lat",
        "lon",
        "heading",
        "stated_destination",
        "stated_eta",
        "scrape",
        "sog",
        "draft",
    ];
}

impl CsvColumns for VesselRecord {
    const COLUMNS: &'static [&'static str] = &[
        "imo",
        "name",
        "dwt",
        "gas_cap",
        "bcf_cap",
        "size",
        "empty_draft",
        "model_dest",
        "prob",
        "sub_region",
        "source_subregion",
        "source_region",
        "source_port",
        "d2d",
        "model_eta",
        "pr_port",
        "pr_port_id",
        "port_prob",
        "port_d2d",
        "port_eta",
        "origin_name",
        "origin_type",
        "date",
        "idle",
        "max_draft",
    ];
}

impl CsvColumns for YyShipCount {
    const COLUMNS: &'static [&'static str] = &[
        "imo",
        "empty_full",
        "idle",
        "begin_subregion",
        "subregion",
        "begin_region",
        "region",
        "begin_port_name",
        "port_name",
    ];
}

impl CsvColumns for ForecastRecord {
    const COLUMNS: &'static [&'static str] = &[
        "imo",
        "region",
        "subregion",
        "region2",
        "subregion2",
        "date",
        "type",
        "gas_volume",
        "t",
    ];
}

impl CsvColumns for ImoTrackingRecord {
    const COLUMNS: &'static [&'static str] = &[
        "date",
        "lat",
        "lon",
        "imo",
        "seen_date",
        "name",
        "draft",
        "empty_draft",
        "sog",
        "stated_destination",
        "model_dest",
        "prob",
        "source_region",
        "source_subregion",
        "source_port",
        "stated_eta",
        "d2d",
        "model_eta",
        "pr_port",
        "pr_port_id",
        "port_prob",
        "port_d2d",
        "port_eta",
        "size",
        "bcf_cap",
        "origin_name",
        "origin_type",
        "sub_region",
        "idle",
        "gas_cap",
        "dwt",
        "max_draft",
        "ef",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialized_header<T: Serialize>(row: &T) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(row).unwrap();
        let bytes = writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        text.lines().next().unwrap().to_string()
    }

    #[test]
    fn declared_columns_match_serialized_header() {
        let port = PortRow {
            port_id: 7,
            name: "Zeebrugge".into(),
            lat: 51.3,
            lon: 3.2,
            region: None,
            sub_region: None,
        };
        assert_eq!(serialized_header(&port), PortRow::COLUMNS.join(","));

        let yy = YyShipCount {
            imo: 1,
            empty_full: Some(0),
            idle: None,
            begin_subregion: None,
            subregion: None,
            begin_region: None,
            region: None,
            begin_port_name: None,
            port_name: None,
        };
        assert_eq!(serialized_header(&yy), YyShipCount::COLUMNS.join(","));

        let forecast = ForecastRecord {
            imo: 1,
            region: None,
            subregion: None,
            region2: None,
            subregion2: None,
            date: None,
            kind: Some("fcst".into()),
            gas_volume: None,
            t: 3,
        };
        assert_eq!(serialized_header(&forecast), ForecastRecord::COLUMNS.join(","));
    }

    #[test]
    fn size_boundaries_are_inclusive_on_the_lower_class() {
        assert_eq!(ShipSize::from_gas_cap(145_000.0), ShipSize::Conventional);
        assert_eq!(ShipSize::from_gas_cap(145_001.0), ShipSize::QFlex);
        assert_eq!(ShipSize::from_gas_cap(220_000.0), ShipSize::QFlex);
        assert_eq!(ShipSize::from_gas_cap(266_000.0), ShipSize::QMax);
    }

    #[test]
    fn bcf_capacity_of_standard_carrier() {
        let bcf = bcf_capacity(174_000.0);
        assert!((bcf - 3.8343).abs() < 1e-3, "got {bcf}");
    }
}
