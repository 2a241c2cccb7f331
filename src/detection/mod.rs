// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Detection module - alert types and the rule evaluator

mod rules;

pub use rules::{AlertRule, RuleEvaluator};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Moisture,
    Temperature,
    Health,
    System,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moisture => "moisture",
            Self::Temperature => "temperature",
            Self::Health => "health",
            Self::System => "system",
        }
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "moisture" => Ok(Self::Moisture),
            "temperature" => Ok(Self::Temperature),
            "health" => Ok(Self::Health),
            "system" => Ok(Self::System),
            other => Err(format!("unknown alert type '{}'", other)),
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Alert produced by the evaluator, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub message: String,
    pub severity: Severity,
}

/// A persisted alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub severity: Severity,
    /// Acknowledgement flag, not changed by the core
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn stamp(new: &NewAlert, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alert_type: new.alert_type,
            message: new.message.clone(),
            severity: new.severity,
            read: false,
            timestamp: now.trunc_subsecs(3),
        }
    }
}
