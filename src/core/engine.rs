// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Main telemetry engine

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::info;

use super::{derive_status, EventBus, Scheduler, SubscriberId, Subscription, SystemStats, TelemetryPipeline};
use crate::config::Config;
use crate::db::{AlertStore, Database, ReadingStore};
use crate::detection::{Alert, RuleEvaluator};
use crate::error::TelemetryResult;
use crate::sensors::{parse_timestamp, FieldSimulator, Generator, IngestSource, RawReading, Reading, GENERATOR_TASK};
use crate::streaming::StreamingManager;

/// Owns the store, bus, pipeline and background tasks
pub struct Engine {
    pub config: Arc<Config>,
    db: Database,
    pipeline: Arc<TelemetryPipeline>,
    scheduler: Scheduler,
    streaming: Option<StreamingManager>,
    shutdown: broadcast::Sender<()>,
    start_time: Option<Instant>,
}

impl Engine {
    /// Open the configured database and build the engine over it
    pub fn new(config: Config) -> Result<Self> {
        let db = Database::open(&config.database)?;
        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: Config, db: Database) -> Self {
        let bus = EventBus::new(config.streaming.subscriber_queue_capacity);
        let store = Arc::new(db.clone());
        let pipeline = Arc::new(TelemetryPipeline::new(
            store.clone(),
            store,
            RuleEvaluator::default(),
            bus,
        ));
        let (shutdown, _) = broadcast::channel(1);

        Self {
            config: Arc::new(config),
            db,
            pipeline,
            scheduler: Scheduler::new(),
            streaming: None,
            shutdown,
            start_time: None,
        }
    }

    /// Start the configured transports, then the generator (if enabled).
    /// Nothing is left running when this returns an error.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting AgroTrack engine...");
        self.start_time = Some(Instant::now());

        let mut streaming = StreamingManager::new(&self.config.streaming, self.pipeline.clone());
        if let Err(e) = streaming.start(&self.shutdown).await {
            let _ = self.shutdown.send(());
            return Err(e);
        }
        self.streaming = Some(streaming);

        if self.config.generator.enabled {
            if let Err(e) = self.start_generator().await {
                self.stop().await?;
                return Err(e);
            }
        }

        info!("AgroTrack engine started");
        Ok(())
    }

    /// Register the synthetic generator. Fails if one is already running.
    pub async fn start_generator(&self) -> Result<()> {
        let gen_config = &self.config.generator;
        let simulator = match gen_config.seed {
            Some(seed) => FieldSimulator::seeded(&gen_config.sensor_id, seed),
            None => FieldSimulator::new(&gen_config.sensor_id),
        };
        let generator = Generator::new(Box::new(simulator), self.pipeline.clone());

        self.scheduler
            .add_task(GENERATOR_TASK, gen_config.interval(), generator)
            .await?;

        info!("Field simulation running every {:?}", gen_config.interval());
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping AgroTrack engine...");

        let _ = self.shutdown.send(());
        self.scheduler.shutdown().await;
        if let Some(mut streaming) = self.streaming.take() {
            streaming.stop().await;
        }

        info!("AgroTrack engine stopped");
        Ok(())
    }

    /// Ingest an external reading
    pub fn ingest(&self, raw: RawReading) -> TelemetryResult<Reading> {
        self.pipeline.ingest(raw, IngestSource::External)
    }

    pub fn recent_readings(&self, limit: Option<i64>) -> TelemetryResult<Vec<Reading>> {
        self.db.recent_readings(limit)
    }

    /// Inclusive range over ISO-8601 bounds, oldest first
    pub fn range_query(&self, start: Option<&str>, end: Option<&str>) -> TelemetryResult<Vec<Reading>> {
        let start = start.map(parse_timestamp).transpose()?;
        let end = end.map(parse_timestamp).transpose()?;
        self.db.readings_in_range(start, end)
    }

    pub fn recent_alerts(&self, limit: Option<i64>) -> TelemetryResult<Vec<Alert>> {
        self.db.recent_alerts(limit)
    }

    pub fn stats(&self) -> TelemetryResult<SystemStats> {
        let now = Utc::now();
        let last = self.db.latest_reading()?.map(|r| r.timestamp);

        Ok(SystemStats {
            total_readings: self.db.reading_count()?,
            total_alerts: self.db.alert_count()?,
            system_status: derive_status(last, now),
            last_updated: now,
        })
    }

    pub fn subscribe(&self) -> Subscription {
        self.pipeline.bus().subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.pipeline.bus().unsubscribe(id)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn generator_running(&self) -> bool {
        self.scheduler.is_scheduled(GENERATOR_TASK).await
    }

    pub fn streaming(&self) -> Option<&StreamingManager> {
        self.streaming.as_ref()
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventPayload, SystemStatus};
    use crate::error::TelemetryError;

    fn engine() -> Engine {
        let mut config = Config::default();
        config.streaming.websocket_enabled = false;
        Engine::with_database(config, Database::open_in_memory().unwrap())
    }

    fn at(ts: &str, moisture: f64) -> RawReading {
        RawReading {
            timestamp: Some(parse_timestamp(ts).unwrap()),
            ..RawReading::new(moisture, 24.0, 50.0)
        }
    }

    #[test]
    fn test_stats_offline_when_empty() {
        let engine = engine();
        let stats = engine.stats().unwrap();

        assert_eq!(stats.total_readings, 0);
        assert_eq!(stats.total_alerts, 0);
        assert_eq!(stats.system_status, SystemStatus::Offline);
    }

    #[test]
    fn test_stats_online_after_ingest() {
        let engine = engine();
        engine.ingest(RawReading::new(25.0, 22.0, 50.0)).unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_readings, 1);
        assert_eq!(stats.total_alerts, 1);
        assert_eq!(stats.system_status, SystemStatus::Online);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalReadings"], 1);
        assert_eq!(json["systemStatus"], "Online");
        assert!(json.get("lastUpdated").is_some());
    }

    #[test]
    fn test_stale_reading_is_offline() {
        let engine = engine();
        engine.ingest(at("2024-01-01T00:00:00Z", 50.0)).unwrap();

        assert_eq!(engine.stats().unwrap().system_status, SystemStatus::Offline);
    }

    #[test]
    fn test_range_query_parses_bounds() {
        let engine = engine();
        engine.ingest(at("2024-05-01T10:00:00Z", 40.0)).unwrap();
        engine.ingest(at("2024-05-01T11:00:00Z", 41.0)).unwrap();
        engine.ingest(at("2024-05-01T12:00:00Z", 42.0)).unwrap();

        let hits = engine
            .range_query(Some("2024-05-01T10:00:00Z"), Some("2024-05-01T11:00:00Z"))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].soil_moisture, 40.0);

        assert_eq!(engine.range_query(None, None).unwrap().len(), 3);

        let err = engine.range_query(Some("yesterday"), None).unwrap_err();
        assert!(matches!(err, TelemetryError::Validation(_)));
    }

    #[test]
    fn test_range_query_accepts_dates() {
        let engine = engine();
        engine.ingest(at("2024-04-30T23:59:59Z", 39.0)).unwrap();
        engine.ingest(at("2024-05-01T10:00:00Z", 40.0)).unwrap();
        engine.ingest(at("2024-05-01T18:30:00Z", 41.0)).unwrap();
        engine.ingest(at("2024-05-02T00:00:01Z", 42.0)).unwrap();

        let day = engine.range_query(Some("2024-05-01"), Some("2024-05-02")).unwrap();
        let moisture: Vec<f64> = day.iter().map(|r| r.soil_moisture).collect();
        assert_eq!(moisture, vec![40.0, 41.0]);

        let evening = engine
            .range_query(Some("2024-05-01T12:00:00"), Some("2024-05-02"))
            .unwrap();
        assert_eq!(evening.len(), 1);
        assert_eq!(evening[0].soil_moisture, 41.0);
    }

    #[test]
    fn test_queries_fail_when_store_is_broken() {
        let engine = engine();
        engine.ingest(RawReading::new(25.0, 22.0, 50.0)).unwrap();

        engine.database().break_schema();

        assert!(engine.recent_readings(None).is_err());
        assert!(engine.range_query(None, None).is_err());
        assert!(engine
            .range_query(Some("2024-05-01"), Some("2024-05-02"))
            .is_err());
        assert!(engine.recent_alerts(None).is_err());
        assert!(engine.stats().is_err());

        let err = engine.ingest(RawReading::new(60.0, 20.0, 50.0)).unwrap_err();
        assert!(err.is_persistence());
    }

    #[tokio::test]
    async fn test_failed_start_leaves_no_generator() {
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut config = Config::default();
        config.streaming.websocket_port = port;
        config.generator.enabled = true;
        let mut engine = Engine::with_database(config, Database::open_in_memory().unwrap());

        assert!(engine.start().await.is_err());
        assert!(!engine.generator_running().await);
        assert!(engine.streaming().is_none());
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let engine = engine();
        let mut sub = engine.subscribe();

        engine.ingest(RawReading::new(60.0, 36.0, 50.0)).unwrap();

        let first = sub.try_recv().unwrap();
        assert!(matches!(first.payload, EventPayload::Alert(_)));
        let second = sub.try_recv().unwrap();
        assert!(matches!(second.payload, EventPayload::ReadingUpdate(_)));

        assert!(engine.unsubscribe(sub.id()));
        engine.ingest(RawReading::new(60.0, 20.0, 50.0)).unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_single_generator_per_engine() {
        let engine = engine();

        engine.start_generator().await.unwrap();
        assert!(engine.start_generator().await.is_err());

        engine.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_runs_generator() {
        let mut config = Config::default();
        config.streaming.websocket_enabled = false;
        config.generator.enabled = true;
        config.generator.seed = Some(7);
        let mut engine = Engine::with_database(config, Database::open_in_memory().unwrap());

        engine.start().await.unwrap();
        assert!(engine.generator_running().await);
        for _ in 0..50 {
            if engine.stats().unwrap().total_readings > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        engine.stop().await.unwrap();

        assert!(!engine.generator_running().await);
        assert!(engine.stats().unwrap().total_readings >= 1);
        assert!(engine.start_generator().await.is_err());
    }
}
