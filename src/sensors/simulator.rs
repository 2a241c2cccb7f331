// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Field simulator for demo/testing without hardware

use anyhow::Result;
use async_trait::async_trait;
use rand::prelude::*;
use rand::rngs::StdRng;

use super::{IngestSource, RawReading, SensorSource, DEFAULT_LOCATION};

const TEMP_RANGE: (f64, f64) = (10.0, 40.0);
const MOISTURE_RANGE: (f64, f64) = (0.0, 100.0);
const HUMIDITY_RANGE: (f64, f64) = (20.0, 90.0);
const BATTERY_DRAIN_PROBABILITY: f64 = 0.05;

/// Running values of the simulated field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorState {
    pub temperature: f64,
    pub soil_moisture: f64,
    pub humidity: f64,
    pub battery: f64,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            soil_moisture: 60.0,
            humidity: 50.0,
            battery: 100.0,
        }
    }
}

/// Simulates a single drifting field sensor
pub struct FieldSimulator {
    id: String,
    state: GeneratorState,
    rng: StdRng,
}

impl FieldSimulator {
    pub fn new(id: &str) -> Self {
        Self::with_rng(id, StdRng::from_entropy())
    }

    /// Reproducible simulator for a fixed seed
    pub fn seeded(id: &str, seed: u64) -> Self {
        Self::with_rng(id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(id: &str, rng: StdRng) -> Self {
        Self {
            id: id.to_string(),
            state: GeneratorState::default(),
            rng,
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Advance the random walk by one tick and build the reading
    pub fn step(&mut self) -> RawReading {
        let s = &mut self.state;

        s.temperature = walk(&mut self.rng, s.temperature, -1, 1, TEMP_RANGE);
        // Soil tends to dry out
        s.soil_moisture = walk(&mut self.rng, s.soil_moisture, -2, 1, MOISTURE_RANGE);
        s.humidity = walk(&mut self.rng, s.humidity, -1, 1, HUMIDITY_RANGE);

        if self.rng.gen_bool(BATTERY_DRAIN_PROBABILITY) {
            s.battery = (s.battery - 1.0).max(0.0);
        }

        RawReading {
            soil_moisture: Some(s.soil_moisture),
            temperature: Some(s.temperature),
            humidity: Some(s.humidity),
            crop_health: Some(self.rng.gen_range(70..=95) as f64),
            battery_level: Some(s.battery),
            rain_level: None,
            obstacle_distance: None,
            location: Some(DEFAULT_LOCATION),
            timestamp: None,
        }
    }
}

fn walk(rng: &mut StdRng, value: f64, down: i32, up: i32, (lo, hi): (f64, f64)) -> f64 {
    (value + rng.gen_range(down..=up) as f64).clamp(lo, hi)
}

#[async_trait]
impl SensorSource for FieldSimulator {
    fn id(&self) -> &str {
        &self.id
    }

    fn source(&self) -> IngestSource {
        IngestSource::Generator
    }

    async fn read(&mut self) -> Result<RawReading> {
        Ok(self.step())
    }
}
