//! Core engine module - pipeline, event bus and scheduling

mod engine;
mod event_bus;
pub(crate) mod pipeline;
mod scheduler;

pub use engine::Engine;
pub use event_bus::{
    derive_status, Event, EventBus, EventPayload, PublishReport, SubscriberId, Subscription, SystemStatus,
    ONLINE_WINDOW_SECS,
};
pub use pipeline::TelemetryPipeline;
pub use scheduler::{PeriodicTask, Scheduler};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate system statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_readings: u64,
    pub total_alerts: u64,
    pub system_status: SystemStatus,
    /// When these stats were computed
    pub last_updated: DateTime<Utc>,
}
