// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Field sensor reading types and ingestion-time validation

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TelemetryError, TelemetryResult};

/// Crop health index used when a reading omits it
pub const DEFAULT_CROP_HEALTH: f64 = 85.0;

/// Battery level used when a reading omits it
pub const DEFAULT_BATTERY_LEVEL: f64 = 100.0;

/// Demo field coordinate (Bengaluru)
pub const DEFAULT_LOCATION: Location = Location {
    lat: 12.9716,
    lng: 77.5946,
};

/// Geographic position of a field sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Default for Location {
    fn default() -> Self {
        DEFAULT_LOCATION
    }
}

/// A reading as it arrives from a sensor or the generator.
///
/// Every field is optional here. [`RawReading::with_defaults`] fills the
/// optional ones once, at ingestion; [`NewReading::try_from`] then requires
/// every measurement to be present and finite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    pub soil_moisture: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub crop_health: Option<f64>,
    pub battery_level: Option<f64>,
    pub rain_level: Option<f64>,
    pub obstacle_distance: Option<f64>,
    pub location: Option<Location>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawReading {
    /// Reading with just the three required measurements
    pub fn new(soil_moisture: f64, temperature: f64, humidity: f64) -> Self {
        Self {
            soil_moisture: Some(soil_moisture),
            temperature: Some(temperature),
            humidity: Some(humidity),
            ..Default::default()
        }
    }

    /// Decode a JSON request body. Non-numeric measurements are rejected.
    pub fn from_json(body: &[u8]) -> TelemetryResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| TelemetryError::validation(format!("malformed reading: {}", e)))
    }

    /// Fill absent optional fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        self.crop_health.get_or_insert(DEFAULT_CROP_HEALTH);
        self.battery_level.get_or_insert(DEFAULT_BATTERY_LEVEL);
        self.rain_level.get_or_insert(0.0);
        self.obstacle_distance.get_or_insert(0.0);
        self.location.get_or_insert(DEFAULT_LOCATION);
        self
    }
}

/// A validated reading that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub soil_moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub crop_health: f64,
    pub battery_level: f64,
    pub rain_level: f64,
    pub obstacle_distance: f64,
    pub location: Location,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<&RawReading> for NewReading {
    type Error = TelemetryError;

    fn try_from(raw: &RawReading) -> TelemetryResult<Self> {
        Ok(Self {
            soil_moisture: required("soilMoisture", raw.soil_moisture)?,
            temperature: required("temperature", raw.temperature)?,
            humidity: required("humidity", raw.humidity)?,
            crop_health: required("cropHealth", raw.crop_health)?,
            battery_level: required("batteryLevel", raw.battery_level)?,
            rain_level: required("rainLevel", raw.rain_level)?,
            obstacle_distance: required("obstacleDistance", raw.obstacle_distance)?,
            location: match raw.location {
                Some(location) => Location {
                    lat: finite("location.lat", location.lat)?,
                    lng: finite("location.lng", location.lng)?,
                },
                None => return Err(TelemetryError::validation("location is required")),
            },
            timestamp: raw.timestamp,
        })
    }
}

fn required(field: &str, value: Option<f64>) -> TelemetryResult<f64> {
    match value {
        Some(v) => finite(field, v),
        None => Err(TelemetryError::validation(format!("{} is required", field))),
    }
}

fn finite(field: &str, value: f64) -> TelemetryResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TelemetryError::validation(format!("{} must be a finite number", field)))
    }
}

/// A persisted reading. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub soil_moisture: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub crop_health: f64,
    pub battery_level: f64,
    pub rain_level: f64,
    pub obstacle_distance: f64,
    pub location: Location,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Stamp a validated reading with its identity. Timestamps are kept at
    /// millisecond precision so a stored record reads back unchanged.
    pub fn stamp(new: &NewReading, now: DateTime<Utc>) -> Self {
        let timestamp = new.timestamp.unwrap_or(now).trunc_subsecs(3);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            soil_moisture: new.soil_moisture,
            temperature: new.temperature,
            humidity: new.humidity,
            crop_health: new.crop_health,
            battery_level: new.battery_level,
            rain_level: new.rain_level,
            obstacle_distance: new.obstacle_distance,
            location: new.location,
            timestamp,
        }
    }
}

/// Parse an ISO-8601 query bound.
///
/// Accepts `2026-01-05T10:00:00Z` (any offset), an offset-less
/// `2026-01-05T10:00:00` and a bare date `2026-01-05`. The last two are read
/// as UTC, a bare date at midnight.
pub fn parse_timestamp(value: &str) -> TelemetryResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(t.and_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| TelemetryError::validation(format!("invalid timestamp '{}'", value)))
}
