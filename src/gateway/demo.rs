//! Deterministic synthetic telemetry for a local SQLite store.
//!
//! Same seed, same rows. Tires drift between healthy, slow-leaking and hot
//! profiles, and roughly one reading in a hundred is a sensor glitch outside
//! the plausibility window so downstream filtering has something to drop.

#![allow(missing_docs)]

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::core::config::validate_identifier;
use crate::core::errors::{Result, TpmsError};

/// 2025-01-01T00:00:00Z
const EPOCH_START: i64 = 1_735_689_600;
const SAMPLE_INTERVAL_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoFleet {
    pub vehicles: usize,
    pub tires_per_vehicle: i64,
    pub samples_per_tire: usize,
    pub seed: u64,
    /// Drop and recreate the table first.
    pub replace: bool,
}

impl Default for DemoFleet {
    fn default() -> Self {
        Self {
            vehicles: 5,
            tires_per_vehicle: 6,
            samples_per_tire: 48,
            seed: 42,
            replace: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub database: String,
    pub table: String,
    pub vehicles: usize,
    pub tires: usize,
    pub rows: usize,
    pub glitches: usize,
}

#[derive(Debug, Clone, Copy)]
enum TireProfile {
    Healthy,
    SlowLeak,
    Hot,
}

struct Vehicle {
    plate: String,
    imei: String,
    customer: String,
    odometer_m: f64,
    latitude: f64,
    longitude: f64,
}

/// `CREATE TABLE` for the telemetry table.
#[must_use]
pub fn schema_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY,
            odometro REAL,
            movimento INTEGER,
            speed REAL,
            imei TEXT,
            position INTEGER,
            latitude REAL,
            longtitude REAL,
            _timestamp_ TEXT,
            pressure REAL,
            temperature REAL,
            placa TEXT,
            cliente TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table} (_timestamp_);"
    )
}

/// Create `table` in `database` (creating the file if needed) and fill it.
pub fn seed_database(database: &Path, table: &str, fleet: &DemoFleet) -> Result<SeedSummary> {
    validate_identifier("store.table", table)?;
    if fleet.vehicles == 0 || fleet.tires_per_vehicle <= 0 || fleet.samples_per_tire == 0 {
        return Err(TpmsError::InvalidConfig {
            details: "demo fleet needs at least one vehicle, tire and sample".to_string(),
        });
    }
    if let Some(parent) = database.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| TpmsError::io(parent, source))?;
    }

    let mut conn = Connection::open(database)?;
    if fleet.replace {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
    }
    conn.execute_batch(&schema_sql(table))?;

    let mut rng = StdRng::seed_from_u64(fleet.seed);
    let mut vehicles: Vec<Vehicle> = (0..fleet.vehicles).map(|i| vehicle(&mut rng, i)).collect();
    let profiles: Vec<Vec<TireProfile>> = vehicles
        .iter()
        .map(|_| {
            (0..fleet.tires_per_vehicle)
                .map(|_| match rng.random_range(0..10) {
                    0..=5 => TireProfile::Healthy,
                    6..=7 => TireProfile::SlowLeak,
                    _ => TireProfile::Hot,
                })
                .collect()
        })
        .collect();

    let mut rows = 0;
    let mut glitches = 0;
    let tx = conn.transaction()?;
    {
        let mut insert = tx.prepare_cached(&format!(
            "INSERT INTO {table} (odometro, movimento, speed, imei, position, latitude,
                longtitude, _timestamp_, pressure, temperature, placa, cliente)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ))?;

        for sample in 0..fleet.samples_per_tire {
            let ts = timestamp(sample);
            for (vehicle, tire_profiles) in vehicles.iter_mut().zip(&profiles) {
                let moving = rng.random_bool(0.8);
                let speed: f64 = if moving { rng.random_range(20.0..90.0) } else { 0.0 };
                // km/h over the interval, stored in metres.
                #[allow(clippy::cast_precision_loss)]
                let step_m = speed * (SAMPLE_INTERVAL_MINUTES as f64 / 60.0) * 1000.0;
                vehicle.odometer_m += step_m;
                vehicle.latitude += rng.random_range(-0.01..0.01);
                vehicle.longitude += rng.random_range(-0.01..0.01);

                for (position, profile) in (1..).zip(tire_profiles) {
                    let (mut pressure, mut temperature) = reading(&mut rng, *profile, sample, moving);
                    if rng.random_range(0..100) == 0 {
                        pressure = 255.0;
                        temperature = 215.0;
                        glitches += 1;
                    }
                    insert.execute(params![
                        round1(vehicle.odometer_m),
                        i64::from(moving),
                        round1(speed),
                        vehicle.imei,
                        position,
                        vehicle.latitude,
                        vehicle.longitude,
                        ts,
                        round1(pressure),
                        round1(temperature),
                        vehicle.plate,
                        vehicle.customer,
                    ])?;
                    rows += 1;
                }
            }
        }
    }
    tx.commit()?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let tires = fleet.vehicles * fleet.tires_per_vehicle as usize;
    Ok(SeedSummary {
        database: database.display().to_string(),
        table: table.to_string(),
        vehicles: fleet.vehicles,
        tires,
        rows,
        glitches,
    })
}

fn letter(rng: &mut StdRng) -> char {
    char::from(b'A' + rng.random_range(0..26u8))
}

fn digit(rng: &mut StdRng) -> char {
    char::from(b'0' + rng.random_range(0..10u8))
}

fn vehicle(rng: &mut StdRng, index: usize) -> Vehicle {
    // Mercosul plate layout: LLLNLNN.
    let plate: String = [
        letter(rng),
        letter(rng),
        letter(rng),
        digit(rng),
        letter(rng),
        digit(rng),
        digit(rng),
    ]
    .into_iter()
    .collect();
    let imei: String = std::iter::once('3')
        .chain((0..14).map(|_| digit(rng)))
        .collect();
    Vehicle {
        plate,
        imei,
        customer: format!("cliente_{}", index % 3 + 1),
        odometer_m: rng.random_range(10_000_000.0..90_000_000.0),
        latitude: -23.55 + rng.random_range(-0.5..0.5),
        longitude: -46.63 + rng.random_range(-0.5..0.5),
    }
}

fn reading(rng: &mut StdRng, profile: TireProfile, sample: usize, moving: bool) -> (f64, f64) {
    let warmup = if moving { rng.random_range(8.0..18.0) } else { 0.0 };
    #[allow(clippy::cast_precision_loss)]
    let progress = sample as f64;
    match profile {
        TireProfile::Healthy => (
            rng.random_range(114.0..124.0),
            rng.random_range(35.0..55.0) + warmup,
        ),
        TireProfile::SlowLeak => (
            (118.0 - progress * 1.2).max(40.0) + rng.random_range(-3.0..3.0),
            rng.random_range(45.0..65.0) + warmup,
        ),
        TireProfile::Hot => (
            rng.random_range(100.0..116.0),
            rng.random_range(70.0..90.0) + warmup,
        ),
    }
}

fn timestamp(sample: usize) -> String {
    let offset = Duration::minutes(SAMPLE_INTERVAL_MINUTES * i64::try_from(sample).unwrap_or(i64::MAX / 600));
    let start = DateTime::<Utc>::from_timestamp(EPOCH_START, 0).unwrap_or_default();
    (start + offset).format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
