//! Vessel extracts: source rows in, flat CSV tables out.

pub mod exporter;
pub mod output;
pub mod records;
pub mod transform;

pub use exporter::{
    ExportConfig, ExportSummary, ExportedFile, Exporter, Extract, DEFAULT_IDLE_MODEL,
};
pub use output::{read_csv, write_csv, CsvColumns};
pub use records::{
    ForecastRecord, ImoTrackingRecord, ShipSize, TrackingRecord, VesselRecord, YyShipCount,
};
