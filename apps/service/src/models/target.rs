use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Stable identifier of a monitored target, kept across edits
pub type TargetId = Uuid;

/// HTTP method used to probe a target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// Longest accepted probe interval (24 hours)
pub const MAX_INTERVAL_SECONDS: f64 = 86_400.0;

/// Shortest timer period ever armed, whatever the stored value
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// One monitored endpoint and its schedule.
///
/// A definition is never edited in place: an edit produces a new value with
/// the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDefinition {
    /// Generated once at creation. Entries persisted without one get a
    /// fresh id when loaded.
    #[serde(default = "Uuid::new_v4")]
    pub id: TargetId,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Only sent for POST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Fractions allowed, e.g. `0.5`
    pub interval_seconds: f64,
}

impl TargetDefinition {
    /// Create a GET target with a fresh id
    pub fn new(name: impl Into<String>, url: impl Into<String>, interval_seconds: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            interval_seconds,
        }
    }

    /// Switch to POST with the given form-encoded body
    pub fn with_post_body(mut self, body: impl Into<String>) -> Self {
        self.method = HttpMethod::Post;
        self.body = Some(body.into());
        self
    }

    /// Tick period.
    ///
    /// Persisted values skip validation, so the stored number is clamped:
    /// zero, negative or NaN arms at 1s, anything above
    /// [`MAX_INTERVAL_SECONDS`] arms at the maximum.
    pub fn interval(&self) -> Duration {
        let seconds = if self.interval_seconds > 0.0 {
            self.interval_seconds.min(MAX_INTERVAL_SECONDS)
        } else {
            1.0
        };
        Duration::from_secs_f64(seconds).max(MIN_PERIOD)
    }

    /// Body to attach to the request, if any: POST with a non-empty body.
    pub fn form_body(&self) -> Option<&str> {
        match (self.method, self.body.as_deref()) {
            (HttpMethod::Post, Some(body)) if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// Field values for an add or edit, before an id is attached
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTarget {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<String>,
    pub interval_seconds: f64,
}

impl NewTarget {
    pub fn get(name: impl Into<String>, url: impl Into<String>, interval_seconds: f64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            interval_seconds,
        }
    }

    pub fn post(
        name: impl Into<String>,
        url: impl Into<String>,
        body: impl Into<String>,
        interval_seconds: f64,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method: HttpMethod::Post,
            body: Some(body.into()),
            interval_seconds,
        }
    }

    /// Attach `id`. Name, URL and body are stored trimmed; a blank body,
    /// or any body on a GET, is dropped.
    pub fn into_definition(self, id: TargetId) -> TargetDefinition {
        let body = match self.method {
            HttpMethod::Post => self
                .body
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty()),
            HttpMethod::Get => None,
        };

        TargetDefinition {
            id,
            name: self.name.trim().to_string(),
            url: self.url.trim().to_string(),
            method: self.method,
            body,
            interval_seconds: self.interval_seconds,
        }
    }
}
