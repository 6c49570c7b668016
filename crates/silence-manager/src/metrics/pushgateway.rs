//! Prometheus Pushgateway publisher.
//!
//! Gauges live in a private registry and are pushed as one text-format payload
//! with `PUT`, replacing everything previously pushed under the same job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use reqwest::Client;
use silence_sync::{seconds_until, MetricsError, MetricsPublisher};
use tracing::{debug, info};

use super::{
    BUILD_INFO, BUILD_INFO_HELP, SILENCE_EXPIRING_IN, SILENCE_EXPIRING_IN_HELP,
    SILENCE_LAST_CHECKED, SILENCE_LAST_CHECKED_HELP,
};
use crate::http;

/// Job name used when none is configured.
pub const DEFAULT_JOB_NAME: &str = "silence_manager";

/// Settings for [`PushgatewayPublisher`].
#[derive(Debug, Clone)]
pub struct PushgatewayConfig {
    pub url: String,
    /// Empty means [`DEFAULT_JOB_NAME`].
    pub job_name: String,
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, MetricsError> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)
        .map_err(|e| MetricsError::Config(format!("invalid metric {name}: {e}")))?;
    registry
        .register(Box::new(gauge.clone()))
        .map_err(|e| MetricsError::Config(format!("failed to register {name}: {e}")))?;
    Ok(gauge)
}

/// Metrics publisher pushing to a Prometheus Pushgateway.
pub struct PushgatewayPublisher {
    client: Client,
    url: String,
    job_name: String,
    registry: Registry,
    build_info: GaugeVec,
    last_checked: GaugeVec,
    expiring_in: GaugeVec,
}

impl PushgatewayPublisher {
    /// Create a publisher.
    ///
    /// # Errors
    /// Returns [`MetricsError::Config`] when the URL is empty, the HTTP client
    /// cannot be built or a gauge cannot be registered.
    pub fn new(config: PushgatewayConfig) -> Result<Self, MetricsError> {
        if config.url.is_empty() {
            return Err(MetricsError::Config("pushgateway URL is required".to_string()));
        }
        let job_name = if config.job_name.is_empty() {
            DEFAULT_JOB_NAME.to_string()
        } else {
            config.job_name
        };
        let client = http::client().map_err(|e| MetricsError::Config(e.to_string()))?;
        let url = http::base_url(&config.url);

        let registry = Registry::new();
        let build_info = gauge_vec(
            &registry,
            BUILD_INFO,
            BUILD_INFO_HELP,
            &["version", "commit", "build_date"],
        )?;
        let last_checked = gauge_vec(
            &registry,
            SILENCE_LAST_CHECKED,
            SILENCE_LAST_CHECKED_HELP,
            &["silence_id", "ticket"],
        )?;
        let expiring_in = gauge_vec(
            &registry,
            SILENCE_EXPIRING_IN,
            SILENCE_EXPIRING_IN_HELP,
            &["silence_id", "ticket"],
        )?;

        info!(url = %url, job = %job_name, "Initialized Pushgateway metrics publisher");

        Ok(Self {
            client,
            url,
            job_name,
            registry,
            build_info,
            last_checked,
            expiring_in,
        })
    }

    /// Current payload in text exposition format. Gauges without samples are
    /// left out.
    ///
    /// # Errors
    /// Returns [`MetricsError::Push`] when encoding fails.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Push(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buffer)
            .map_err(|e| MetricsError::Push(format!("failed to encode metrics: {e}")))
    }

    fn push_url(&self) -> String {
        format!("{}/metrics/job/{}", self.url, self.job_name)
    }
}

#[async_trait]
impl MetricsPublisher for PushgatewayPublisher {
    fn record_build_info(&self, version: &str, commit: &str, build_date: &str) {
        self.build_info
            .with_label_values(&[version, commit, build_date])
            .set(1.0);
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_silence_check(&self, silence_id: &str, ticket: &str, checked_at: DateTime<Utc>) {
        self.last_checked
            .with_label_values(&[silence_id, ticket])
            .set(checked_at.timestamp() as f64);
    }

    fn record_silence_expiry(&self, silence_id: &str, ticket: &str, expires_at: DateTime<Utc>) {
        self.expiring_in
            .with_label_values(&[silence_id, ticket])
            .set(seconds_until(expires_at, Utc::now()));
    }

    async fn push(&self) -> Result<(), MetricsError> {
        let url = self.push_url();
        let body = self.render()?;
        debug!(url = %url, "Pushing metrics to Pushgateway");

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await
            .map_err(|e| MetricsError::Push(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetricsError::Push(format!(
                "unexpected status code {}: {body}",
                status.as_u16()
            )));
        }

        info!("Pushed metrics to Pushgateway");
        Ok(())
    }

    async fn close(&self) -> Result<(), MetricsError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(url: &str) -> PushgatewayPublisher {
        PushgatewayPublisher::new(PushgatewayConfig {
            url: url.to_string(),
            job_name: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_requires_url() {
        let err = PushgatewayPublisher::new(PushgatewayConfig {
            url: String::new(),
            job_name: "x".to_string(),
        })
        .err()
        .unwrap();
        assert!(matches!(err, MetricsError::Config(_)));
    }

    #[test]
    fn test_render_text_format() {
        let p = publisher("http://pushgateway:9091");
        p.record_build_info("0.2.85", "abc123", "2026-01-01");
        let checked_at: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        p.record_silence_check("s1", "OPS-1", checked_at);
        p.record_silence_expiry("s1", "OPS-1", Utc::now() - Duration::hours(1));

        let text = p.render().unwrap();
        assert!(text.contains("# TYPE silence_manager_build_info gauge\n"));
        assert!(text.contains(
            "silence_manager_build_info{build_date=\"2026-01-01\",commit=\"abc123\",version=\"0.2.85\"} 1\n"
        ));
        assert!(text.contains(
            "silence_manager_silence_last_checked{silence_id=\"s1\",ticket=\"OPS-1\"} 1767225600\n"
        ));
        assert!(text
            .contains("silence_manager_silence_expiring_in{silence_id=\"s1\",ticket=\"OPS-1\"} 0\n"));
    }

    #[test]
    fn test_render_skips_empty_families_and_escapes() {
        let p = publisher("http://pushgateway:9091");
        assert!(p.render().unwrap().is_empty());

        p.record_build_info("1.0", "a\"b", "x\\y");
        let text = p.render().unwrap();
        assert!(text.contains("build_date=\"x\\\\y\",commit=\"a\\\"b\""));
        assert!(!text.contains(SILENCE_LAST_CHECKED));
    }

    #[test]
    fn test_record_overwrites_same_labels() {
        let p = publisher("http://pushgateway:9091");
        let first: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        p.record_silence_check("s1", "OPS-1", first);
        p.record_silence_check("s1", "OPS-1", first + Duration::seconds(60));

        let text = p.render().unwrap();
        assert_eq!(text.matches("silence_manager_silence_last_checked{").count(), 1);
        assert!(text.contains("} 1767225660\n"));
    }

    #[tokio::test]
    async fn test_push_puts_to_job_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/metrics/job/silence_manager"))
            .and(header("content-type", "text/plain; version=0.0.4"))
            .and(body_string_contains("silence_manager_build_info"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let p = publisher(&format!("{}/", server.uri()));
        p.record_build_info("1.0", "none", "unknown");
        p.push().await.unwrap();
        p.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_push_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let err = publisher(&server.uri()).push().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to push metrics: unexpected status code 503: down"
        );
    }
}
