//! Command-line and environment configuration.
//!
//! Every flag falls back to an environment variable of the same name in
//! upper snake case, so the binary runs unchanged as a Kubernetes `CronJob`
//! configured entirely through env.

use chrono::Duration;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use silence_sync::SyncConfig;
use thiserror::Error;

use crate::alertmanager::{AlertManagerConfig, Auth};
use crate::discovery::DiscoveryConfig;
use crate::jira::JiraConfig;
use crate::metrics::{MetricsBackend, PublisherSettings};

/// Configuration validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("ALERTMANAGER_USERNAME and ALERTMANAGER_PASSWORD are required when ALERTMANAGER_AUTH_TYPE is 'basic'")]
    MissingBasicAuth,

    #[error("ALERTMANAGER_BEARER_TOKEN is required when ALERTMANAGER_AUTH_TYPE is 'bearer'")]
    MissingBearerToken,

    #[error("METRICS_BACKEND is required when METRICS_ENABLED is true (must be 'pushgateway' or 'otel')")]
    MissingMetricsBackend,

    #[error("METRICS_URL is required when metrics are enabled and auto-discovery is disabled")]
    MissingMetricsUrl,

    #[error("{name} must be a positive number of hours, got {value}")]
    NonPositiveDuration { name: &'static str, value: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AuthType {
    #[default]
    None,
    Basic,
    Bearer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// silence-manager configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "silence-manager",
    version,
    about = "Keep Alertmanager silences in sync with Jira tickets"
)]
pub struct Config {
    /// Alertmanager base URL. Discovered in-cluster when unset.
    #[arg(long, env = "ALERTMANAGER_URL")]
    pub alertmanager_url: Option<String>,

    /// Discover Alertmanager even when a URL is configured.
    #[arg(long, env = "ALERTMANAGER_AUTO_DISCOVER", default_value_t = false, value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub alertmanager_auto_discover: bool,

    #[arg(long, env = "ALERTMANAGER_AUTH_TYPE", value_enum, default_value_t = AuthType::None)]
    pub alertmanager_auth_type: AuthType,

    #[arg(long, env = "ALERTMANAGER_USERNAME")]
    pub alertmanager_username: Option<String>,

    #[arg(long, env = "ALERTMANAGER_PASSWORD", hide_env_values = true)]
    pub alertmanager_password: Option<String>,

    #[arg(long, env = "ALERTMANAGER_BEARER_TOKEN", hide_env_values = true)]
    pub alertmanager_bearer_token: Option<String>,

    #[arg(long, env = "ALERTMANAGER_DISCOVERY_SERVICE_NAME", default_value = "alertmanager")]
    pub alertmanager_discovery_service_name: String,

    #[arg(long, env = "ALERTMANAGER_DISCOVERY_SERVICE_LABEL", default_value = "app=alertmanager")]
    pub alertmanager_discovery_service_label: String,

    #[arg(long, env = "ALERTMANAGER_DISCOVERY_PORT", default_value_t = 9093)]
    pub alertmanager_discovery_port: u16,

    /// Namespaces searched first, comma separated.
    #[arg(long, env = "ALERTMANAGER_DISCOVERY_NAMESPACES", value_delimiter = ',', default_value = "monitoring,default")]
    pub alertmanager_discovery_namespaces: Vec<String>,

    #[arg(long, env = "JIRA_URL")]
    pub jira_url: Option<String>,

    #[arg(long, env = "JIRA_USERNAME")]
    pub jira_username: Option<String>,

    #[arg(long, env = "JIRA_API_TOKEN", hide_env_values = true)]
    pub jira_api_token: Option<String>,

    #[arg(long, env = "JIRA_PROJECT_KEY")]
    pub jira_project_key: Option<String>,

    /// Extend silences expiring within this many hours.
    #[arg(long, env = "SYNC_EXPIRY_THRESHOLD_HOURS", default_value_t = 24)]
    pub sync_expiry_threshold_hours: i64,

    /// Hours an extended silence lasts from now.
    #[arg(long, env = "SYNC_EXTENSION_DURATION_HOURS", default_value_t = 168)]
    pub sync_extension_duration_hours: i64,

    /// Hours a silence recreated for a refired alert lasts.
    #[arg(long, env = "SYNC_DEFAULT_SILENCE_DURATION_HOURS", default_value_t = 168)]
    pub sync_default_silence_duration_hours: i64,

    #[arg(long, env = "SYNC_CHECK_ALERTS", default_value_t = true, value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub sync_check_alerts: bool,

    /// Prefix of the marker coupling silences and tickets.
    #[arg(long, env = "SYNC_ANNOTATION_PREFIX", default_value = silence_sync::DEFAULT_PREFIX)]
    pub sync_annotation_prefix: String,

    #[arg(long, env = "METRICS_ENABLED", default_value_t = false, value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub metrics_enabled: bool,

    #[arg(long, env = "METRICS_BACKEND", value_enum)]
    pub metrics_backend: Option<MetricsBackend>,

    /// Metrics backend URL. Discovered in-cluster when unset.
    #[arg(long, env = "METRICS_URL")]
    pub metrics_url: Option<String>,

    #[arg(long, env = "METRICS_PUSHGATEWAY_JOB_NAME", default_value = crate::metrics::DEFAULT_JOB_NAME)]
    pub metrics_pushgateway_job_name: String,

    #[arg(long, env = "METRICS_OTEL_INSECURE", default_value_t = true, value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub metrics_otel_insecure: bool,

    /// Defaults to the backend's service name.
    #[arg(long, env = "METRICS_DISCOVERY_SERVICE_NAME")]
    pub metrics_discovery_service_name: Option<String>,

    /// Defaults to the backend's label selector.
    #[arg(long, env = "METRICS_DISCOVERY_SERVICE_LABEL")]
    pub metrics_discovery_service_label: Option<String>,

    /// 0 means the backend's default port.
    #[arg(long, env = "METRICS_DISCOVERY_PORT", default_value_t = 0)]
    pub metrics_discovery_port: u16,

    #[arg(long, env = "METRICS_DISCOVERY_NAMESPACES", value_delimiter = ',', default_value = "monitoring,default")]
    pub metrics_discovery_namespaces: Vec<String>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Format of the run summary printed on stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn namespaces(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|ns| ns.trim())
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Check required values and cross-field rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("JIRA_URL", &self.jira_url),
            ("JIRA_USERNAME", &self.jira_username),
            ("JIRA_API_TOKEN", &self.jira_api_token),
            ("JIRA_PROJECT_KEY", &self.jira_project_key),
        ];
        for (name, value) in required {
            if non_empty(value.as_ref()).is_none() {
                return Err(ConfigError::Missing(name));
            }
        }

        match self.alertmanager_auth_type {
            AuthType::Basic
                if non_empty(self.alertmanager_username.as_ref()).is_none()
                    || non_empty(self.alertmanager_password.as_ref()).is_none() =>
            {
                return Err(ConfigError::MissingBasicAuth);
            }
            AuthType::Bearer if non_empty(self.alertmanager_bearer_token.as_ref()).is_none() => {
                return Err(ConfigError::MissingBearerToken);
            }
            _ => {}
        }

        if self.metrics_enabled {
            if self.metrics_backend.is_none() {
                return Err(ConfigError::MissingMetricsBackend);
            }
            if !self.discover_metrics() && non_empty(self.metrics_url.as_ref()).is_none() {
                return Err(ConfigError::MissingMetricsUrl);
            }
        }

        let durations = [
            ("SYNC_EXPIRY_THRESHOLD_HOURS", self.sync_expiry_threshold_hours),
            ("SYNC_EXTENSION_DURATION_HOURS", self.sync_extension_duration_hours),
            (
                "SYNC_DEFAULT_SILENCE_DURATION_HOURS",
                self.sync_default_silence_duration_hours,
            ),
        ];
        for (name, value) in durations {
            if value <= 0 {
                return Err(ConfigError::NonPositiveDuration { name, value });
            }
        }

        Ok(())
    }

    /// Alertmanager is discovered when no URL is set or discovery is forced.
    pub fn discover_alertmanager(&self) -> bool {
        non_empty(self.alertmanager_url.as_ref()).is_none() || self.alertmanager_auto_discover
    }

    /// The metrics backend is discovered when metrics are on, a backend is
    /// chosen and no URL is set.
    pub fn discover_metrics(&self) -> bool {
        self.metrics_enabled
            && self.metrics_backend.is_some()
            && non_empty(self.metrics_url.as_ref()).is_none()
    }

    pub fn alertmanager_discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            service_name: self.alertmanager_discovery_service_name.clone(),
            service_label: self.alertmanager_discovery_service_label.clone(),
            port: self.alertmanager_discovery_port,
            prefer_namespaces: namespaces(&self.alertmanager_discovery_namespaces),
        }
    }

    /// Empty fields are filled from the backend's defaults at discovery time.
    pub fn metrics_discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            service_name: self
                .metrics_discovery_service_name
                .clone()
                .unwrap_or_default(),
            service_label: self
                .metrics_discovery_service_label
                .clone()
                .unwrap_or_default(),
            port: self.metrics_discovery_port,
            prefer_namespaces: namespaces(&self.metrics_discovery_namespaces),
        }
    }

    pub fn alertmanager_auth(&self) -> Auth {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        match self.alertmanager_auth_type {
            AuthType::None => Auth::None,
            AuthType::Basic => Auth::Basic {
                username: value(&self.alertmanager_username),
                password: value(&self.alertmanager_password),
            },
            AuthType::Bearer => Auth::Bearer(value(&self.alertmanager_bearer_token)),
        }
    }

    /// Alertmanager client settings for a resolved base URL.
    pub fn alertmanager_config(&self, base_url: impl Into<String>) -> AlertManagerConfig {
        AlertManagerConfig {
            base_url: base_url.into(),
            auth: self.alertmanager_auth(),
            annotation_prefix: self.sync_annotation_prefix.clone(),
        }
    }

    pub fn jira_config(&self) -> JiraConfig {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        JiraConfig {
            base_url: value(&self.jira_url),
            username: value(&self.jira_username),
            api_token: value(&self.jira_api_token),
            project_key: value(&self.jira_project_key),
            annotation_prefix: self.sync_annotation_prefix.clone(),
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            expiry_threshold: Duration::hours(self.sync_expiry_threshold_hours),
            extension_duration: Duration::hours(self.sync_extension_duration_hours),
            default_silence_duration: Duration::hours(self.sync_default_silence_duration_hours),
            check_alerts: self.sync_check_alerts,
        }
    }

    /// Publisher settings for a resolved URL, when metrics are enabled.
    pub fn publisher_settings(&self, url: impl Into<String>) -> Option<PublisherSettings> {
        if !self.metrics_enabled {
            return None;
        }
        self.metrics_backend.map(|backend| PublisherSettings {
            backend,
            url: url.into(),
            pushgateway_job_name: self.metrics_pushgateway_job_name.clone(),
            otel_insecure: self.metrics_otel_insecure,
        })
    }
}
