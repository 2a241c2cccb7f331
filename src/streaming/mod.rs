//! Streaming module - WebSocket subscribers and MQTT ingestion

mod mqtt;
mod websocket;

pub use mqtt::{ingest_payload, MqttConfig, MqttIngest};
pub use websocket::WebSocketServer;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::StreamingConfig;
use crate::core::TelemetryPipeline;

/// Starts the transports enabled in config
pub struct StreamingManager {
    websocket_server: Option<WebSocketServer>,
    mqtt_ingest: Option<MqttIngest>,
    websocket_port: u16,
    websocket_addr: Option<SocketAddr>,
    mqtt_client: Option<rumqttc::AsyncClient>,
}

impl StreamingManager {
    pub fn new(config: &StreamingConfig, pipeline: Arc<TelemetryPipeline>) -> Self {
        let websocket_server = config
            .websocket_enabled
            .then(|| WebSocketServer::new(pipeline.bus().clone(), config.websocket_max_clients));

        let mqtt_ingest = config
            .mqtt_enabled
            .then(|| MqttIngest::new(MqttConfig::from(config), pipeline.clone()));

        Self {
            websocket_server,
            mqtt_ingest,
            websocket_port: config.websocket_port,
            websocket_addr: None,
            mqtt_client: None,
        }
    }

    pub async fn start(&mut self, shutdown: &broadcast::Sender<()>) -> Result<()> {
        if let Some(ref ws) = self.websocket_server {
            let addr = format!("0.0.0.0:{}", self.websocket_port);
            self.websocket_addr = Some(ws.start(&addr, shutdown.subscribe()).await?);
        }

        if let Some(ref mqtt) = self.mqtt_ingest {
            self.mqtt_client = Some(mqtt.start(shutdown.subscribe()).await?);
        }

        info!(
            "Streaming started (websocket: {}, mqtt: {})",
            self.websocket_server.is_some(),
            self.mqtt_ingest.is_some()
        );
        Ok(())
    }

    /// Bound WebSocket address once started
    pub fn websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket_addr
    }

    pub async fn stop(&mut self) {
        if let Some(client) = self.mqtt_client.take() {
            let _ = client.disconnect().await;
        }
    }
}
