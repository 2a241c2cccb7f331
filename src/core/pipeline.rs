// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Telemetry pipeline: persist, evaluate, alert, broadcast

use std::sync::Arc;
use tracing::{debug, error, warn};

use super::EventBus;
use crate::db::{AlertStore, ReadingStore};
use crate::detection::RuleEvaluator;
use crate::error::TelemetryResult;
use crate::sensors::{IngestSource, RawReading, Reading};

/// Single ingestion entry point shared by real sensors and the generator
pub struct TelemetryPipeline {
    readings: Arc<dyn ReadingStore>,
    alerts: Arc<dyn AlertStore>,
    evaluator: RuleEvaluator,
    bus: Arc<EventBus>,
}

impl TelemetryPipeline {
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        alerts: Arc<dyn AlertStore>,
        evaluator: RuleEvaluator,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            readings,
            alerts,
            evaluator,
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Ingest one reading.
    ///
    /// A failed reading write is returned to the caller and nothing else
    /// happens. A failed alert write is logged and the reading still goes
    /// out on the bus.
    pub fn ingest(&self, raw: RawReading, source: IngestSource) -> TelemetryResult<Reading> {
        let raw = raw.with_defaults();

        let reading = self.readings.append_reading(&raw).map_err(|e| {
            if e.is_persistence() {
                error!("Failed to store {} reading: {}", source, e);
            }
            e
        })?;

        debug!(
            "Stored {} reading {} (moisture {:.1}%, temp {:.1}°C)",
            source, reading.id, reading.soil_moisture, reading.temperature
        );

        if let Some(new_alert) = self.evaluator.evaluate(&reading) {
            match self.alerts.append_alert(&new_alert) {
                Ok(alert) => {
                    warn!(
                        "{} alert ({}): {}",
                        alert.alert_type.as_str(),
                        alert.severity.as_str(),
                        alert.message
                    );
                    self.bus.publish_alert(alert);
                }
                Err(e) => {
                    warn!("Failed to store alert for reading {}: {}", reading.id, e);
                }
            }
        }

        self.bus.publish_reading(reading.clone());

        Ok(reading)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::EventPayload;
    use crate::db::Database;
    use crate::detection::{Alert, AlertType, NewAlert, Severity};
    use crate::error::TelemetryError;
    use crate::sensors::DEFAULT_LOCATION;
    use chrono::{DateTime, Utc};

    /// Store that refuses every operation
    pub(crate) struct BrokenStore;

    impl ReadingStore for BrokenStore {
        fn append_reading(&self, _raw: &RawReading) -> TelemetryResult<Reading> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn recent_readings(&self, _limit: Option<i64>) -> TelemetryResult<Vec<Reading>> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn readings_in_range(
            &self,
            _start: Option<DateTime<Utc>>,
            _end: Option<DateTime<Utc>>,
        ) -> TelemetryResult<Vec<Reading>> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn reading_count(&self) -> TelemetryResult<u64> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn clear_readings(&self) -> TelemetryResult<u64> {
            Err(TelemetryError::persistence("store unavailable"))
        }
    }

    impl AlertStore for BrokenStore {
        fn append_alert(&self, _alert: &NewAlert) -> TelemetryResult<Alert> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn recent_alerts(&self, _limit: Option<i64>) -> TelemetryResult<Vec<Alert>> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn alert_count(&self) -> TelemetryResult<u64> {
            Err(TelemetryError::persistence("store unavailable"))
        }
        fn clear_alerts(&self) -> TelemetryResult<u64> {
            Err(TelemetryError::persistence("store unavailable"))
        }
    }

    fn pipeline() -> (TelemetryPipeline, Database) {
        let db = Database::open_in_memory().unwrap();
        let store = Arc::new(db.clone());
        let pipeline = TelemetryPipeline::new(
            store.clone(),
            store,
            RuleEvaluator::default(),
            EventBus::new(64),
        );
        (pipeline, db)
    }

    #[test]
    fn test_low_moisture_scenario() {
        let (pipeline, db) = pipeline();
        let mut sub = pipeline.bus().subscribe();

        let stored = pipeline
            .ingest(RawReading::new(25.0, 22.0, 50.0), IngestSource::External)
            .unwrap();

        assert_eq!(stored.crop_health, 85.0);
        assert_eq!(stored.battery_level, 100.0);
        assert_eq!(stored.location, DEFAULT_LOCATION);

        let alerts = db.recent_alerts(None).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Moisture);
        assert_eq!(alerts[0].severity, Severity::Critical);

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert!(matches!(first.payload, EventPayload::Alert(ref a) if *a == alerts[0]));
        assert!(matches!(second.payload, EventPayload::ReadingUpdate(ref r) if *r == stored));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_high_temperature_scenario() {
        let (pipeline, db) = pipeline();

        pipeline
            .ingest(RawReading::new(60.0, 36.0, 50.0), IngestSource::External)
            .unwrap();

        let alerts = db.recent_alerts(None).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Temperature);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn test_moisture_priority_single_alert() {
        let (pipeline, db) = pipeline();

        pipeline
            .ingest(RawReading::new(12.0, 38.0, 50.0), IngestSource::Generator)
            .unwrap();

        let alerts = db.recent_alerts(None).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Moisture);
    }

    #[test]
    fn test_normal_reading_no_alert() {
        let (pipeline, db) = pipeline();
        let mut sub = pipeline.bus().subscribe();

        let before = db.reading_count().unwrap();
        let stored = pipeline
            .ingest(
                RawReading {
                    battery_level: Some(64.0),
                    rain_level: Some(10.0),
                    obstacle_distance: Some(30.0),
                    ..RawReading::new(30.0, 35.0, 70.0)
                },
                IngestSource::External,
            )
            .unwrap();

        assert_eq!(db.reading_count().unwrap(), before + 1);
        assert_eq!(db.alert_count().unwrap(), 0);
        assert_eq!(stored.soil_moisture, 30.0);
        assert_eq!(stored.temperature, 35.0);
        assert_eq!(stored.humidity, 70.0);
        assert_eq!(stored.battery_level, 64.0);
        assert_eq!(stored.rain_level, 10.0);
        assert_eq!(stored.obstacle_distance, 30.0);

        let event = sub.try_recv().unwrap();
        assert_eq!(event.payload.kind(), "reading-update");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_recent_after_sequential_ingests() {
        let (pipeline, db) = pipeline();

        let stored: Vec<Reading> = (0..25)
            .map(|i| {
                pipeline
                    .ingest(RawReading::new(40.0 + i as f64, 20.0, 50.0), IngestSource::External)
                    .unwrap()
            })
            .collect();

        let recent = db.recent_readings(Some(20)).unwrap();
        let expected: Vec<Reading> = stored.iter().rev().take(20).cloned().collect();
        assert_eq!(recent, expected);
    }

    #[test]
    fn test_invalid_reading_rejected_without_events() {
        let (pipeline, db) = pipeline();
        let mut sub = pipeline.bus().subscribe();

        let raw = RawReading {
            soil_moisture: None,
            ..RawReading::new(0.0, 40.0, 50.0)
        };
        let err = pipeline.ingest(raw, IngestSource::External).unwrap_err();

        assert!(matches!(err, TelemetryError::Validation(_)));
        assert_eq!(db.reading_count().unwrap(), 0);
        assert_eq!(db.alert_count().unwrap(), 0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_reading_store_failure_propagates() {
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        let pipeline = TelemetryPipeline::new(
            Arc::new(BrokenStore),
            Arc::new(BrokenStore),
            RuleEvaluator::default(),
            bus,
        );

        let err = pipeline
            .ingest(RawReading::new(10.0, 20.0, 50.0), IngestSource::External)
            .unwrap_err();

        assert!(err.is_persistence());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_alert_store_failure_keeps_reading() {
        let db = Database::open_in_memory().unwrap();
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        let pipeline = TelemetryPipeline::new(
            Arc::new(db.clone()),
            Arc::new(BrokenStore),
            RuleEvaluator::default(),
            bus,
        );

        let stored = pipeline
            .ingest(RawReading::new(10.0, 20.0, 50.0), IngestSource::External)
            .unwrap();

        assert_eq!(db.reading_count().unwrap(), 1);
        let event = sub.try_recv().unwrap();
        assert!(matches!(event.payload, EventPayload::ReadingUpdate(ref r) if *r == stored));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_disconnect_mid_stream() {
        let (pipeline, _db) = pipeline();
        let mut stays = pipeline.bus().subscribe();
        let leaves = pipeline.bus().subscribe();
        let leaves_id = leaves.id();

        pipeline
            .ingest(RawReading::new(50.0, 20.0, 50.0), IngestSource::External)
            .unwrap();
        drop(leaves);

        pipeline
            .ingest(RawReading::new(51.0, 20.0, 50.0), IngestSource::External)
            .unwrap();

        assert!(!pipeline.bus().unsubscribe(leaves_id));
        assert_eq!(pipeline.bus().subscriber_count(), 1);
        assert!(stays.try_recv().is_some());
        assert!(stays.try_recv().is_some());
    }

    #[test]
    fn test_concurrent_ingest() {
        let (pipeline, db) = pipeline();
        let pipeline = Arc::new(pipeline);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let pipeline = pipeline.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        pipeline
                            .ingest(
                                RawReading::new(40.0 + (t * 10 + i) as f64, 20.0, 50.0),
                                IngestSource::External,
                            )
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(db.reading_count().unwrap(), 80);
        let all = db.readings_in_range(None, None).unwrap();
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
