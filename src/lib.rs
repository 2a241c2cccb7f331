// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! AgroTrack - Field Telemetry Core
//!
//! Ingestion, alerting, persistence and live broadcast for agricultural
//! field sensors:
//! - One pipeline for real sensors (MQTT) and the synthetic field generator
//! - Ordered alert rule table (low soil moisture, high temperature)
//! - Append-only SQLite stores for readings and alerts
//! - Bounded per-subscriber event queues served over WebSocket
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     AgroTrack Engine                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐  ┌───────────┐                                 │
//! │  │  MQTT   │  │ Generator │ ← Scheduler                     │
//! │  │ Ingest  │  │ (sim)     │                                 │
//! │  └─────────┘  └───────────┘                                 │
//! │       ↓            ↓                                        │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │              Telemetry Pipeline                     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │       ↓              ↓                  ↓                   │
//! │  ┌─────────┐  ┌────────────┐  ┌──────────────────────┐      │
//! │  │ Reading │  │ Rule Table │→ │ Alert Store          │      │
//! │  │ Store   │  └────────────┘  └──────────────────────┘      │
//! │  └─────────┘         ↓                                      │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │          Event Bus → WebSocket subscribers          │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod error;
pub mod sensors;
pub mod streaming;

// Re-exports for convenience
pub use config::Config;
pub use core::{Engine, EventBus, SystemStats, TelemetryPipeline};
pub use db::Database;
pub use detection::{Alert, AlertType, Severity};
pub use error::{TelemetryError, TelemetryResult};
pub use sensors::{IngestSource, RawReading, Reading};
pub use streaming::StreamingManager;

/// AgroTrack version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// AgroTrack name
pub const NAME: &str = "AgroTrack";
