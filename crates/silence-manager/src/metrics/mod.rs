//! Metrics backends.
//!
//! Both backends publish the same three gauges:
//!
//! - `silence_manager_build_info{version,commit,build_date}` = 1
//! - `silence_manager_silence_last_checked{silence_id,ticket}` = unix seconds
//! - `silence_manager_silence_expiring_in{silence_id,ticket}` = seconds left, floored at 0

pub mod otel;
pub mod pushgateway;

use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use silence_sync::{MetricsError, MetricsPublisher};

use crate::discovery::ServiceKind;

pub use otel::{OtelConfig, OtelPublisher};
pub use pushgateway::{PushgatewayConfig, PushgatewayPublisher, DEFAULT_JOB_NAME};

pub(crate) const SERVICE_NAME: &str = "silence-manager";

pub(crate) const BUILD_INFO: &str = "silence_manager_build_info";
pub(crate) const BUILD_INFO_HELP: &str =
    "Build information for silence-manager including version, commit, and build date";
pub(crate) const SILENCE_LAST_CHECKED: &str = "silence_manager_silence_last_checked";
pub(crate) const SILENCE_LAST_CHECKED_HELP: &str =
    "Unix timestamp of when a silence was last checked";
pub(crate) const SILENCE_EXPIRING_IN: &str = "silence_manager_silence_expiring_in";
pub(crate) const SILENCE_EXPIRING_IN_HELP: &str = "Seconds until a silence expires";

/// Supported metrics backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricsBackend {
    Pushgateway,
    Otel,
}

impl MetricsBackend {
    /// Service looked up when the backend URL is discovered.
    pub const fn service_kind(self) -> ServiceKind {
        match self {
            Self::Pushgateway => ServiceKind::Pushgateway,
            Self::Otel => ServiceKind::OtelCollector,
        }
    }
}

impl fmt::Display for MetricsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pushgateway => write!(f, "pushgateway"),
            Self::Otel => write!(f, "otel"),
        }
    }
}

/// Everything needed to build a publisher once the URL is known.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub backend: MetricsBackend,
    pub url: String,
    pub pushgateway_job_name: String,
    pub otel_insecure: bool,
}

/// Build the publisher for the configured backend.
///
/// # Errors
/// Returns [`MetricsError::Config`] when the backend rejects its settings.
pub fn build_publisher(
    settings: &PublisherSettings,
) -> Result<Arc<dyn MetricsPublisher>, MetricsError> {
    match settings.backend {
        MetricsBackend::Pushgateway => Ok(Arc::new(PushgatewayPublisher::new(
            PushgatewayConfig {
                url: settings.url.clone(),
                job_name: settings.pushgateway_job_name.clone(),
            },
        )?)),
        MetricsBackend::Otel => Ok(Arc::new(OtelPublisher::new(&OtelConfig {
            url: settings.url.clone(),
            insecure: settings.otel_insecure,
        })?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(MetricsBackend::Pushgateway.to_string(), "pushgateway");
        assert_eq!(
            MetricsBackend::from_str("otel", true).unwrap(),
            MetricsBackend::Otel
        );
        assert!(MetricsBackend::from_str("statsd", true).is_err());
        assert_eq!(
            MetricsBackend::Otel.service_kind(),
            ServiceKind::OtelCollector
        );
    }

    #[test]
    fn test_build_publisher_rejects_empty_url() {
        let settings = PublisherSettings {
            backend: MetricsBackend::Pushgateway,
            url: String::new(),
            pushgateway_job_name: String::new(),
            otel_insecure: true,
        };
        assert!(matches!(
            build_publisher(&settings),
            Err(MetricsError::Config(_))
        ));
    }
}
