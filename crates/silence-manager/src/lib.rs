//! Adapters and runtime wiring for silence-manager.
//!
//! This crate plugs concrete backends into the [`silence_sync`] engine:
//!
//! - [`alertmanager::PrometheusAlertManager`] for the Alertmanager v2 API
//! - [`jira::JiraTicketSystem`] for Jira Cloud REST v3
//! - [`metrics`] publishers for Prometheus Pushgateway and OpenTelemetry
//! - [`discovery::ServiceDiscovery`] to locate in-cluster services
//! - [`config::Config`] for flags and environment

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alertmanager;
pub mod config;
pub mod discovery;
mod http;
pub mod jira;
pub mod metrics;

pub use alertmanager::{AlertManagerConfig, Auth, PrometheusAlertManager};
pub use config::{Config, ConfigError};
pub use discovery::{
    DiscoveredService, DiscoveryConfig, DiscoveryError, ServiceDiscovery, ServiceKind,
};
pub use jira::{JiraConfig, JiraTicketSystem};
pub use metrics::{build_publisher, MetricsBackend, PublisherSettings};

/// Version, commit and build date of this binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: &'static str,
    pub date: &'static str,
}

impl BuildInfo {
    /// Values baked in at compile time. `GIT_COMMIT` and `BUILD_DATE` are
    /// optional build environment variables.
    #[must_use]
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: match option_env!("GIT_COMMIT") {
                Some(commit) => commit,
                None => "none",
            },
            date: match option_env!("BUILD_DATE") {
                Some(date) => date,
                None => "unknown",
            },
        }
    }
}
