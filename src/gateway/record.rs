//! Typed telemetry records keyed by column name, and reading extraction.
//!
//! Rows are mapped to [`TelemetryRecord`] right after fetch by resolving each
//! known column once per row set, so nothing downstream depends on the
//! projection order. Both the store's column names and their known aliases
//! are recognized (`longtitude`/`longitude`, `placa`/`plate`, ...).

#![allow(missing_docs)]

use std::collections::HashMap;

use serde::Serialize;

use crate::core::config::{Config, ValidityConfig};
use crate::gateway::value::{CellValue, RowSet};
use crate::wear::fleet::{TireKey, TireReading};
use crate::wear::model::Reading;

/// One telemetry row. Absent or unparseable columns are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub id: Option<i64>,
    pub odometer: Option<f64>,
    pub moving: Option<bool>,
    pub speed: Option<f64>,
    pub imei: Option<String>,
    pub plate: Option<String>,
    pub customer: Option<String>,
    pub position: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<String>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
}

impl TelemetryRecord {
    /// Plate when present, otherwise the device IMEI.
    #[must_use]
    pub fn vehicle(&self) -> Option<&str> {
        self.plate
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.imei.as_deref().filter(|i| !i.trim().is_empty()))
    }

    #[must_use]
    pub fn tire_key(&self) -> Option<TireKey> {
        Some(TireKey::new(self.vehicle()?.trim(), self.position?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Id,
    Odometer,
    Moving,
    Speed,
    Imei,
    Plate,
    Customer,
    Position,
    Latitude,
    Longitude,
    Timestamp,
    Pressure,
    Temperature,
}

impl Field {
    fn from_column(name: &str) -> Option<Self> {
        let field = match name.trim().to_ascii_lowercase().as_str() {
            "id" => Self::Id,
            "odometro" | "odometer" => Self::Odometer,
            "movimento" | "moving" => Self::Moving,
            "speed" | "velocidade" => Self::Speed,
            "imei" => Self::Imei,
            "placa" | "plate" => Self::Plate,
            "cliente" | "customer" => Self::Customer,
            "position" | "posicao" => Self::Position,
            "latitude" => Self::Latitude,
            "longtitude" | "longitude" => Self::Longitude,
            "_timestamp_" | "timestamp" => Self::Timestamp,
            "pressure" | "pressao" => Self::Pressure,
            "temperature" | "temperatura" => Self::Temperature,
            _ => return None,
        };
        Some(field)
    }
}

/// Column positions of the known fields, resolved once per row set.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    fields: HashMap<Field, usize>,
}

impl ColumnMap {
    /// First occurrence wins when a field appears under two names.
    #[must_use]
    pub fn resolve(columns: &[String]) -> Self {
        let mut fields = HashMap::new();
        for (idx, name) in columns.iter().enumerate() {
            if let Some(field) = Field::from_column(name) {
                fields.entry(field).or_insert(idx);
            }
        }
        Self { fields }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether pressure, temperature, a vehicle id and tire position are all projected.
    #[must_use]
    pub fn supports_readings(&self) -> bool {
        self.fields.contains_key(&Field::Pressure)
            && self.fields.contains_key(&Field::Temperature)
            && self.fields.contains_key(&Field::Position)
            && (self.fields.contains_key(&Field::Plate) || self.fields.contains_key(&Field::Imei))
    }

    fn cell<'r>(&self, row: &'r [CellValue], field: Field) -> Option<&'r CellValue> {
        self.fields
            .get(&field)
            .and_then(|idx| row.get(*idx))
            .filter(|cell| !cell.is_null())
    }

    #[must_use]
    pub fn record(&self, row: &[CellValue]) -> TelemetryRecord {
        TelemetryRecord {
            id: self.cell(row, Field::Id).and_then(integer),
            odometer: self.cell(row, Field::Odometer).and_then(numeric),
            moving: self.cell(row, Field::Moving).and_then(boolean),
            speed: self.cell(row, Field::Speed).and_then(numeric),
            imei: self.cell(row, Field::Imei).map(text),
            plate: self.cell(row, Field::Plate).map(text),
            customer: self.cell(row, Field::Customer).map(text),
            position: self.cell(row, Field::Position).and_then(integer),
            latitude: self.cell(row, Field::Latitude).and_then(numeric),
            longitude: self.cell(row, Field::Longitude).and_then(numeric),
            timestamp: self.cell(row, Field::Timestamp).map(text),
            pressure: self.cell(row, Field::Pressure).and_then(numeric),
            temperature: self.cell(row, Field::Temperature).and_then(numeric),
        }
    }
}

/// Map every row of `rows` to a typed record.
#[must_use]
pub fn records(rows: &RowSet) -> Vec<TelemetryRecord> {
    let map = ColumnMap::resolve(&rows.columns);
    rows.rows.iter().map(|row| map.record(row)).collect()
}

// Drivers differ on whether NUMERIC comes back as REAL or TEXT.
fn numeric(cell: &CellValue) -> Option<f64> {
    cell.as_f64()
        .or_else(|| cell.as_text().and_then(|t| t.trim().parse().ok()))
}

fn integer(cell: &CellValue) -> Option<i64> {
    cell.as_i64()
        .or_else(|| cell.as_text().and_then(|t| t.trim().parse().ok()))
}

fn boolean(cell: &CellValue) -> Option<bool> {
    match cell {
        CellValue::Integer(v) => Some(*v != 0),
        CellValue::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Some(true),
            "false" | "f" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text(cell: &CellValue) -> String {
    cell.to_string()
}

/// Readings grouped per tire, plus what was left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Extraction {
    pub readings: Vec<TireReading>,
    /// Missing, non-finite or out-of-window pressure/temperature.
    pub excluded: usize,
    /// No vehicle identifier or tire position.
    pub unattributed: usize,
}

/// Turns records into per-tire [`Reading`]s.
///
/// Per tire, records are ordered by timestamp and `distance` is the odometer
/// delta since that tire's previous record, scaled to km. The first record of
/// a tire, a missing odometer and an odometer rollback all contribute 0.
/// Distance covered while readings were excluded carries over to the next
/// admitted reading of the same tire.
#[derive(Debug, Clone)]
pub struct ReadingExtractor {
    validity: ValidityConfig,
    odometer_km_per_unit: f64,
}

impl ReadingExtractor {
    #[must_use]
    pub const fn new(validity: ValidityConfig, odometer_km_per_unit: f64) -> Self {
        Self {
            validity,
            odometer_km_per_unit,
        }
    }

    #[must_use]
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.validity.clone(), cfg.store.odometer_km_per_unit)
    }

    #[must_use]
    pub fn extract(&self, records: &[TelemetryRecord]) -> Extraction {
        let mut extraction = Extraction::default();

        let mut keyed: Vec<(TireKey, &TelemetryRecord)> = Vec::with_capacity(records.len());
        for record in records {
            match record.tire_key() {
                Some(key) => keyed.push((key, record)),
                None => extraction.unattributed += 1,
            }
        }
        // Stable sort keeps fetch order among equal timestamps.
        keyed.sort_by(|(ka, ra), (kb, rb)| ka.cmp(kb).then_with(|| ra.timestamp.cmp(&rb.timestamp)));

        let mut last_odometer: HashMap<&TireKey, f64> = HashMap::new();
        let mut pending_km: HashMap<&TireKey, f64> = HashMap::new();
        for (key, record) in &keyed {
            let mut delta_km = 0.0;
            if let Some(odometer) = record.odometer.filter(|o| o.is_finite())
                && let Some(previous) = last_odometer.insert(key, odometer)
                && odometer > previous
            {
                delta_km = (odometer - previous) * self.odometer_km_per_unit;
            }
            let carried = pending_km.entry(key).or_insert(0.0);
            *carried += delta_km;

            match (record.pressure, record.temperature) {
                (Some(p), Some(t)) if self.validity.admits(p, t) => {
                    extraction.readings.push(TireReading {
                        key: key.clone(),
                        reading: Reading::new(p, t, *carried),
                    });
                    *carried = 0.0;
                }
                _ => extraction.excluded += 1,
            }
        }

        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn rec(plate: &str, position: i64, ts: &str, odo: f64, p: f64, t: f64) -> TelemetryRecord {
        TelemetryRecord {
            plate: Some(plate.to_string()),
            position: Some(position),
            timestamp: Some(ts.to_string()),
            odometer: Some(odo),
            pressure: Some(p),
            temperature: Some(t),
            ..TelemetryRecord::default()
        }
    }

    fn extractor() -> ReadingExtractor {
        ReadingExtractor::new(ValidityConfig::default(), 0.001)
    }

    #[test]
    fn records_resolve_by_name_not_position() {
        let rows = RowSet::new(
            columns(&["temperature", "PLACA", "position", "pressure", "longtitude", "movimento"]),
            vec![vec![
                CellValue::Real(70.5),
                CellValue::Text("ABC1D23".into()),
                CellValue::Integer(3),
                CellValue::Text("101.5".into()),
                CellValue::Real(-46.6),
                CellValue::Integer(1),
            ]],
        );
        let recs = records(&rows);
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.plate.as_deref(), Some("ABC1D23"));
        assert_eq!(r.position, Some(3));
        assert_eq!(r.pressure, Some(101.5));
        assert_eq!(r.temperature, Some(70.5));
        assert_eq!(r.longitude, Some(-46.6));
        assert_eq!(r.moving, Some(true));
        assert_eq!(r.odometer, None);
    }

    #[test]
    fn column_map_reading_support() {
        let full = ColumnMap::resolve(&columns(&["imei", "position", "pressure", "temperature"]));
        assert!(full.supports_readings());
        let partial = ColumnMap::resolve(&columns(&["placa", "pressure"]));
        assert!(!partial.supports_readings());
        assert!(ColumnMap::resolve(&columns(&["avg_speed"])).is_empty());
    }

    #[test]
    fn vehicle_falls_back_to_imei() {
        let r = TelemetryRecord {
            plate: Some("  ".into()),
            imei: Some("358000000000001".into()),
            position: Some(1),
            ..TelemetryRecord::default()
        };
        assert_eq!(r.tire_key(), Some(TireKey::new("358000000000001", 1)));
    }

    #[test]
    fn distance_is_scaled_odometer_delta_per_tire() {
        let recs = vec![
            rec("AAA1111", 1, "2025-01-01T10:00:00", 1_000_000.0, 110.0, 60.0),
            rec("AAA1111", 2, "2025-01-01T10:00:00", 1_000_000.0, 110.0, 60.0),
            rec("AAA1111", 1, "2025-01-01T11:00:00", 1_050_000.0, 110.0, 60.0),
            rec("AAA1111", 2, "2025-01-01T11:00:00", 1_050_000.0, 110.0, 60.0),
        ];
        let out = extractor().extract(&recs);
        let expected = [(1, 0.0), (1, 50.0), (2, 0.0), (2, 50.0)];
        assert_eq!(out.readings.len(), expected.len());
        for (got, (position, km)) in out.readings.iter().zip(expected) {
            assert_eq!(got.key.position, position);
            assert!((got.reading.distance - km).abs() < 1e-9);
        }
    }

    #[test]
    fn readings_sorted_by_timestamp_within_tire() {
        let recs = vec![
            rec("BBB2222", 1, "2025-01-01T12:00:00", 3_000.0, 110.0, 60.0),
            rec("BBB2222", 1, "2025-01-01T10:00:00", 1_000.0, 110.0, 60.0),
        ];
        let out = extractor().extract(&recs);
        assert_eq!(out.readings[0].reading.distance, 0.0);
        assert!((out.readings[1].reading.distance - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rollback_and_missing_odometer_contribute_zero() {
        let mut missing = rec("CCC3333", 1, "2025-01-01T11:00:00", 0.0, 110.0, 60.0);
        missing.odometer = None;
        let recs = vec![
            rec("CCC3333", 1, "2025-01-01T10:00:00", 5_000.0, 110.0, 60.0),
            missing,
            rec("CCC3333", 1, "2025-01-01T12:00:00", 4_000.0, 110.0, 60.0),
            rec("CCC3333", 1, "2025-01-01T13:00:00", 6_000.0, 110.0, 60.0),
        ];
        let out = extractor().extract(&recs);
        let distances: Vec<f64> = out.readings.iter().map(|r| r.reading.distance).collect();
        assert_eq!(&distances[..3], &[0.0, 0.0, 0.0]);
        assert!((distances[3] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_readings_excluded_and_distance_carried() {
        let recs = vec![
            rec("DDD4444", 1, "2025-01-01T10:00:00", 0.0, 110.0, 60.0),
            rec("DDD4444", 1, "2025-01-01T11:00:00", 10_000.0, 250.0, 60.0),
            rec("DDD4444", 1, "2025-01-01T12:00:00", 15_000.0, 110.0, 500.0),
            rec("DDD4444", 1, "2025-01-01T13:00:00", 20_000.0, 110.0, 60.0),
        ];
        let out = extractor().extract(&recs);
        assert_eq!(out.excluded, 2);
        assert_eq!(out.readings.len(), 2);
        assert!((out.readings[1].reading.distance - 20.0).abs() < 1e-9);
    }

    #[test]
    fn unattributed_rows_counted() {
        let mut no_position = rec("EEE5555", 1, "t", 0.0, 110.0, 60.0);
        no_position.position = None;
        let out = extractor().extract(&[no_position, TelemetryRecord::default()]);
        assert_eq!(out.unattributed, 2);
        assert!(out.readings.is_empty());
    }
}
