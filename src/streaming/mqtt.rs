// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! MQTT ingestion for field hardware
//!
//! Field nodes publish JSON readings to the configured topic filter; each
//! payload goes through the pipeline as an external reading.

use anyhow::{anyhow, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, Publish, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::StreamingConfig;
use crate::core::TelemetryPipeline;
use crate::error::TelemetryResult;
use crate::sensors::{IngestSource, RawReading, Reading};

/// MQTT connection settings
#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_interval_ms: u64,
}

impl From<&StreamingConfig> for MqttConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            broker: config.mqtt_broker.clone(),
            port: config.mqtt_port,
            client_id: config.mqtt_client_id.clone(),
            topic: config.mqtt_topic.clone(),
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            keep_alive_secs: 30,
            reconnect_interval_ms: 5000,
        }
    }
}

/// Subscribes to sensor topics and feeds the pipeline
pub struct MqttIngest {
    config: MqttConfig,
    pipeline: Arc<TelemetryPipeline>,
}

impl MqttIngest {
    pub fn new(config: MqttConfig, pipeline: Arc<TelemetryPipeline>) -> Self {
        Self { config, pipeline }
    }

    /// Connect, subscribe and spawn the event loop
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<AsyncClient> {
        let mut options = MqttOptions::new(&self.config.client_id, &self.config.broker, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);

        client
            .subscribe(&self.config.topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| anyhow!("MQTT subscribe failed: {}", e))?;

        info!(
            "MQTT ingestion from {}:{} on '{}'",
            self.config.broker, self.config.port, self.config.topic
        );

        let pipeline = self.pipeline.clone();
        let retry = Duration::from_millis(self.config.reconnect_interval_ms);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    polled = eventloop.poll() => match polled {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("MQTT connected");
                        }
                        Ok(Event::Incoming(Packet::Publish(msg))) => {
                            handle_publish(&pipeline, msg).await;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("MQTT error: {:?}", e);
                            tokio::time::sleep(retry).await;
                        }
                    },
                    _ = shutdown.recv() => {
                        info!("MQTT ingestion shutting down");
                        break;
                    }
                }
            }
        });

        Ok(client)
    }
}

/// Ingest a publish on the blocking pool
async fn handle_publish(pipeline: &Arc<TelemetryPipeline>, msg: Publish) -> Option<Reading> {
    let pipeline = pipeline.clone();
    let ingested =
        tokio::task::spawn_blocking(move || ingest_payload(&pipeline, &msg.topic, &msg.payload)).await;

    match ingested {
        Ok(result) => result.ok(),
        Err(e) => {
            warn!("MQTT ingest task failed: {}", e);
            None
        }
    }
}

/// Decode one publish payload and ingest it. Failures are logged with the topic.
pub fn ingest_payload(
    pipeline: &TelemetryPipeline,
    topic: &str,
    payload: &[u8],
) -> TelemetryResult<Reading> {
    let result = RawReading::from_json(payload).and_then(|raw| pipeline.ingest(raw, IngestSource::External));

    match &result {
        Ok(reading) => debug!("Ingested reading {} from {}", reading.id, topic),
        Err(e) => warn!("Rejected payload on {}: {}", topic, e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventBus;
    use crate::db::{AlertStore, Database, ReadingStore};
    use crate::detection::RuleEvaluator;
    use crate::error::TelemetryError;

    fn pipeline(db: &Database) -> TelemetryPipeline {
        let store = Arc::new(db.clone());
        TelemetryPipeline::new(store.clone(), store, RuleEvaluator::default(), EventBus::new(8))
    }

    #[test]
    fn test_payload_ingested_as_external() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline(&db);

        let reading = ingest_payload(
            &pipeline,
            "agrotrack/sensors/esp32-01/readings",
            br#"{"temperature": 25.5, "humidity": 65.0, "soilMoisture": 22.0, "obstacleDistance": 30}"#,
        )
        .unwrap();

        assert_eq!(reading.obstacle_distance, 30.0);
        assert_eq!(db.reading_count().unwrap(), 1);
        assert_eq!(db.alert_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_publish_ingested_off_thread() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = Arc::new(pipeline(&db));

        let msg = Publish::new(
            "agrotrack/sensors/esp32-02/readings",
            QoS::AtLeastOnce,
            br#"{"temperature": 37.0, "humidity": 40.0, "soilMoisture": 55.0}"#.to_vec(),
        );
        let reading = handle_publish(&pipeline, msg).await.unwrap();
        assert_eq!(reading.temperature, 37.0);
        assert_eq!(db.alert_count().unwrap(), 1);

        let bad = Publish::new("agrotrack/sensors/esp32-02/readings", QoS::AtLeastOnce, b"{}".to_vec());
        assert!(handle_publish(&pipeline, bad).await.is_none());
        assert_eq!(db.reading_count().unwrap(), 1);
    }

    #[test]
    fn test_bad_payload_rejected() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline(&db);

        let err = ingest_payload(&pipeline, "t", b"not json").unwrap_err();
        assert!(matches!(err, TelemetryError::Validation(_)));
        assert_eq!(db.reading_count().unwrap(), 0);
    }

    #[test]
    fn test_config_from_streaming() {
        let streaming = StreamingConfig {
            mqtt_broker: "broker.local".to_string(),
            ..Default::default()
        };
        let config = MqttConfig::from(&streaming);
        assert_eq!(config.broker, "broker.local");
        assert_eq!(config.topic, "agrotrack/sensors/+/readings");
    }
}
