// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Ordered alert rule table

use super::{AlertType, NewAlert, Severity};
use crate::sensors::Reading;

/// One row of the rule table
#[derive(Clone)]
pub struct AlertRule {
    pub name: &'static str,
    pub condition: fn(&Reading) -> bool,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: &'static str,
}

impl std::fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertRule")
            .field("name", &self.name)
            .field("alert_type", &self.alert_type)
            .field("severity", &self.severity)
            .finish()
    }
}

impl AlertRule {
    fn matches(&self, reading: &Reading) -> bool {
        (self.condition)(reading)
    }

    fn to_alert(&self) -> NewAlert {
        NewAlert {
            alert_type: self.alert_type,
            message: self.message.to_string(),
            severity: self.severity,
        }
    }
}

/// Built-in thresholds, highest priority first
pub const DEFAULT_RULES: &[AlertRule] = &[
    AlertRule {
        name: "low-soil-moisture",
        condition: |r| r.soil_moisture < 30.0,
        alert_type: AlertType::Moisture,
        severity: Severity::Critical,
        message: "Critical: Low Soil Moisture Detected",
    },
    AlertRule {
        name: "high-temperature",
        condition: |r| r.temperature > 35.0,
        alert_type: AlertType::Temperature,
        severity: Severity::Critical,
        message: "High Temperature Alert",
    },
];

/// Stateless evaluator. At most one alert per reading; first match wins.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    rules: Vec<AlertRule>,
}

impl RuleEvaluator {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    pub fn evaluate(&self, reading: &Reading) -> Option<NewAlert> {
        self.rules
            .iter()
            .find(|rule| rule.matches(reading))
            .map(AlertRule::to_alert)
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}
