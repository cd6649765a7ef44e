use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Message recorded when a target URL cannot be parsed
pub const INVALID_URL_MESSAGE: &str = "invalid URL";

/// Message recorded when a probe produced neither a response nor an error
pub const UNKNOWN_RESPONSE_MESSAGE: &str = "unknown response type";

/// What caused a probe to be dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeTrigger {
    /// Initial dispatch from arming, or a timer tick
    Scheduled,
    /// Explicit user request, bypasses pause
    Manual,
}

impl fmt::Display for ProbeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTrigger::Scheduled => write!(f, "scheduled"),
            ProbeTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Outcome of one finished probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub success: bool,

    /// Response status, 0 when no HTTP response was received
    pub status_code: u16,

    /// Wall-clock time from dispatch to completion or failure
    pub response_time_seconds: f64,

    /// Absent on success
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// URL did not parse; nothing was sent
    pub fn invalid_url() -> Self {
        Self {
            success: false,
            status_code: 0,
            response_time_seconds: 0.0,
            error_message: Some(INVALID_URL_MESSAGE.to_string()),
        }
    }

    /// DNS, connect, TLS or timeout failure
    pub fn transport_failure(elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: 0,
            response_time_seconds: elapsed.as_secs_f64(),
            error_message: Some(error.into()),
        }
    }

    /// A response was received; only 2xx counts as success
    pub fn from_status(elapsed: Duration, status_code: u16) -> Self {
        let success = (200..=299).contains(&status_code);
        Self {
            success,
            status_code,
            response_time_seconds: elapsed.as_secs_f64(),
            error_message: (!success).then(|| format!("HTTP {status_code}")),
        }
    }

    /// The probe ended without producing a response or an error
    pub fn unknown_response(elapsed: Duration) -> Self {
        Self {
            success: false,
            status_code: 0,
            response_time_seconds: elapsed.as_secs_f64(),
            error_message: Some(UNKNOWN_RESPONSE_MESSAGE.to_string()),
        }
    }
}

/// Latest known probe state of one target.
///
/// Created when the first probe is dispatched, so every field but
/// `last_called_at` is unknown until that probe completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: Option<bool>,
    pub status_code: Option<u16>,
    pub response_time_seconds: Option<f64>,
    pub error_message: Option<String>,

    /// Stamped when a probe is dispatched, before it completes
    pub last_called_at: Option<DateTime<Utc>>,

    /// Provenance of the most recent dispatch
    pub trigger: Option<ProbeTrigger>,
}

impl ProbeResult {
    /// True until a probe for this target has completed
    pub fn is_pending(&self) -> bool {
        self.success.is_none()
    }

    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time_seconds.map(|secs| (secs * 1000.0).round() as u64)
    }

    /// Overwrite the outcome fields, leaving the dispatch stamp alone
    pub(crate) fn apply(&mut self, outcome: ProbeOutcome) {
        self.success = Some(outcome.success);
        self.status_code = Some(outcome.status_code);
        self.response_time_seconds = Some(outcome.response_time_seconds);
        self.error_message = outcome.error_message;
    }
}

/// Aggregate state across every stored result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    /// No probe has completed yet
    Unknown,
    Healthy,
    /// At least one completed probe failed
    Failing,
}

impl fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallHealth::Unknown => write!(f, "unknown"),
            OverallHealth::Healthy => write!(f, "healthy"),
            OverallHealth::Failing => write!(f, "failing"),
        }
    }
}
