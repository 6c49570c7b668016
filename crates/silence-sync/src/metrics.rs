//! Metrics port.
//!
//! Publishers buffer observations in memory and deliver them on [`push`].
//! [`NoopPublisher`] is the default when no backend is configured.
//!
//! [`push`]: MetricsPublisher::push

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::error::MetricsError;

/// Sink for reconciliation observability events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    /// Record version and build information.
    fn record_build_info(&self, version: &str, commit: &str, build_date: &str);

    /// Record when a silence was checked.
    fn record_silence_check(&self, silence_id: &str, ticket: &str, checked_at: DateTime<Utc>);

    /// Record when a silence will expire.
    fn record_silence_expiry(&self, silence_id: &str, ticket: &str, expires_at: DateTime<Utc>);

    /// Deliver everything recorded so far to the backend.
    async fn push(&self) -> Result<(), MetricsError>;

    /// Release backend resources.
    async fn close(&self) -> Result<(), MetricsError>;
}

/// Seconds from `now` until `expires_at`, clamped at zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn seconds_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (expires_at - now).num_milliseconds();
    if millis <= 0 {
        0.0
    } else {
        millis as f64 / 1000.0
    }
}

/// Publisher that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl MetricsPublisher for NoopPublisher {
    fn record_build_info(&self, _version: &str, _commit: &str, _build_date: &str) {}

    fn record_silence_check(&self, _silence_id: &str, _ticket: &str, _checked_at: DateTime<Utc>) {}

    fn record_silence_expiry(&self, _silence_id: &str, _ticket: &str, _expires_at: DateTime<Utc>) {
    }

    async fn push(&self) -> Result<(), MetricsError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), MetricsError> {
        Ok(())
    }
}
