//! User-facing alerts raised by the orchestrator.

use std::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub title: String,
    pub text: String,
}

impl Alert {
    pub fn warning(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Warning,
            title: title.into(),
            text: text.into(),
        }
    }

    pub fn error(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            level: AlertLevel::Error,
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Where blocking messages for the user go.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// Writes alerts to the log.
#[derive(Debug, Default)]
pub struct TracingAlerts;

impl AlertSink for TracingAlerts {
    fn raise(&self, alert: Alert) {
        match alert.level {
            AlertLevel::Warning => warn!(title = %alert.title, "{}", alert.text),
            AlertLevel::Error => error!(title = %alert.title, "{}", alert.text),
        }
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct CollectedAlerts {
    alerts: Mutex<Vec<Alert>>,
}

impl CollectedAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(mut alerts) => std::mem::take(&mut *alerts),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl AlertSink for CollectedAlerts {
    fn raise(&self, alert: Alert) {
        match self.alerts.lock() {
            Ok(mut alerts) => alerts.push(alert),
            Err(poisoned) => poisoned.into_inner().push(alert),
        }
    }
}
