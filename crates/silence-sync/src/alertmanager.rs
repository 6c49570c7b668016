//! Alert-silencing port: silences, matchers, alerts and the backend trait.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Labels copied from a refiring alert into a recreated silence.
pub const RECREATED_SILENCE_LABELS: [&str; 4] = ["alertname", "job", "instance", "severity"];

/// A time-bounded suppression of alert notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Silence {
    /// Backend identifier; empty until the silence is created.
    pub id: String,
    pub created_by: String,
    /// Free-text comment, without the coupling marker.
    pub comment: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub matchers: Vec<Matcher>,
    /// Ticket this silence is coupled to, recovered from the comment marker.
    pub ticket_ref: Option<String>,
}

impl Silence {
    /// Whether the silence is still in effect at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.ends_at
    }
}

/// A label condition selecting which alerts a silence applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub is_regex: bool,
    /// `true` for `=`/`=~`, `false` for `!=`/`!~`.
    pub is_equal: bool,
}

impl Matcher {
    /// Literal `name="value"` matcher.
    #[must_use]
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: false,
            is_equal: true,
        }
    }

    /// Operator in Alertmanager notation.
    #[must_use]
    pub fn operator(&self) -> &'static str {
        match (self.is_equal, self.is_regex) {
            (true, false) => "=",
            (false, false) => "!=",
            (true, true) => "=~",
            (false, true) => "!~",
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\"{}\"", self.name, self.operator(), self.value)
    }
}

/// A snapshot of a currently firing alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Backend state, e.g. `active` or `suppressed`.
    pub state: String,
}

impl Alert {
    /// Value of a label, if present.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Equality matchers for the allow-listed labels present on this alert.
    ///
    /// Absent labels are omitted rather than replaced with wildcards.
    #[must_use]
    pub fn recreation_matchers(&self) -> Vec<Matcher> {
        RECREATED_SILENCE_LABELS
            .iter()
            .filter_map(|name| self.label(name).map(|value| Matcher::equal(*name, value)))
            .collect()
    }

    /// Labels rendered as `name=value` pairs, sorted by name.
    #[must_use]
    pub fn labels_summary(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Capabilities the engine needs from an alert-silencing backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertManager: Send + Sync {
    /// Retrieve a silence by ID.
    async fn get_silence(&self, id: &str) -> Result<Silence, BackendError>;

    /// List all active or pending silences.
    async fn list_silences(&self) -> Result<Vec<Silence>, BackendError>;

    /// Create a silence and return its ID.
    async fn create_silence(&self, silence: &Silence) -> Result<String, BackendError>;

    /// Replace an existing silence (matched by `silence.id`).
    async fn update_silence(&self, silence: &Silence) -> Result<(), BackendError>;

    /// Delete (expire) a silence.
    async fn delete_silence(&self, id: &str) -> Result<(), BackendError>;

    /// Move the end time of a silence.
    async fn extend_silence(&self, id: &str, ends_at: DateTime<Utc>)
        -> Result<(), BackendError>;

    /// Currently firing alerts matching all `matchers` (all alerts when empty).
    async fn get_alerts(&self, matchers: &[crate::alertmanager::Matcher]) -> Result<Vec<Alert>, BackendError>;
}
