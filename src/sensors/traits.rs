// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Sensor source traits and common types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RawReading;

/// Where a reading entered the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSource {
    /// Real hardware or an external caller
    External,
    /// The synthetic field generator
    Generator,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Generator => "generator",
        }
    }
}

impl std::fmt::Display for IngestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can be polled for field readings
#[async_trait]
pub trait SensorSource: Send {
    /// Source identifier used in logs
    fn id(&self) -> &str;

    /// Which ingestion path this source feeds
    fn source(&self) -> IngestSource;

    /// Produce the next raw reading
    async fn read(&mut self) -> Result<RawReading>;
}
