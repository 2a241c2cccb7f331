// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Synthetic generator - feeds a sensor source into the pipeline on each tick

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Reading, SensorSource};
use crate::core::{PeriodicTask, TelemetryPipeline};

/// Scheduler task name; only one generator may run per process
pub const GENERATOR_TASK: &str = "generator";

/// Drives one sensor source. Errors never leave a tick.
pub struct Generator {
    source: Box<dyn SensorSource>,
    pipeline: Arc<TelemetryPipeline>,
    ticks: u64,
    failures: u64,
}

impl Generator {
    pub fn new(source: Box<dyn SensorSource>, pipeline: Arc<TelemetryPipeline>) -> Self {
        Self {
            source,
            pipeline,
            ticks: 0,
            failures: 0,
        }
    }

    /// Produce and ingest one reading; `None` when this tick failed
    pub async fn run_once(&mut self) -> Option<Reading> {
        self.ticks += 1;

        let raw = match self.source.read().await {
            Ok(raw) => raw,
            Err(e) => {
                self.failures += 1;
                warn!("Read error for {}: {}", self.source.id(), e);
                return None;
            }
        };

        // SQLite writes block; keep them off the async workers
        let pipeline = self.pipeline.clone();
        let source = self.source.source();
        let ingested = tokio::task::spawn_blocking(move || pipeline.ingest(raw, source)).await;

        match ingested {
            Ok(Ok(reading)) => {
                debug!(
                    "{} simulated: moisture {:.0}% temp {:.0}°C humidity {:.0}% battery {:.0}%",
                    self.source.id(),
                    reading.soil_moisture,
                    reading.temperature,
                    reading.humidity,
                    reading.battery_level
                );
                Some(reading)
            }
            Ok(Err(e)) => {
                self.failures += 1;
                warn!("Simulation tick {} failed: {}", self.ticks, e);
                None
            }
            Err(e) => {
                self.failures += 1;
                warn!("Simulation tick {} aborted: {}", self.ticks, e);
                None
            }
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

#[async_trait]
impl PeriodicTask for Generator {
    async fn tick(&mut self) {
        self.run_once().await;
    }
}
