// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Error taxonomy for the telemetry core
//!
//! Broadcast failures have no variant here: they are isolated per subscriber
//! inside the event bus and never reach a caller.

use thiserror::Error;

/// Errors surfaced by ingestion and queries
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Malformed or missing reading fields. Nothing was written.
    #[error("validation error: {0}")]
    Validation(String),

    /// The store could not complete the operation.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// SQLite reported a failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl TelemetryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// True for errors raised at the store boundary
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Database(_))
    }
}

/// Result alias for the telemetry core
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
