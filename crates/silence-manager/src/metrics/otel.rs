//! OpenTelemetry OTLP/HTTP publisher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentelemetry::metrics::{Gauge, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::Resource;
use silence_sync::{seconds_until, MetricsError, MetricsPublisher};
use tracing::{debug, info};

use super::{
    BUILD_INFO, BUILD_INFO_HELP, SERVICE_NAME, SILENCE_EXPIRING_IN, SILENCE_EXPIRING_IN_HELP,
    SILENCE_LAST_CHECKED, SILENCE_LAST_CHECKED_HELP,
};

const METRICS_PATH: &str = "/v1/metrics";

/// Settings for [`OtelPublisher`].
#[derive(Debug, Clone)]
pub struct OtelConfig {
    /// Collector address, with or without a scheme.
    pub url: String,
    /// Use plain HTTP when the address has no scheme.
    pub insecure: bool,
}

/// Full OTLP/HTTP metrics endpoint for a collector address.
pub fn metrics_endpoint(url: &str, insecure: bool) -> String {
    let url = url.trim_end_matches('/');
    let base = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if insecure {
        format!("http://{url}")
    } else {
        format!("https://{url}")
    };
    if base.ends_with(METRICS_PATH) {
        base
    } else {
        format!("{base}{METRICS_PATH}")
    }
}

/// Metrics publisher exporting to an OpenTelemetry collector.
pub struct OtelPublisher {
    provider: SdkMeterProvider,
    build_info: Gauge<f64>,
    last_checked: Gauge<f64>,
    expiring_in: Gauge<f64>,
}

impl OtelPublisher {
    /// Create a publisher with its own meter provider.
    ///
    /// # Errors
    /// Returns [`MetricsError::Config`] when the URL is empty or the exporter
    /// cannot be built.
    pub fn new(config: &OtelConfig) -> Result<Self, MetricsError> {
        if config.url.is_empty() {
            return Err(MetricsError::Config(
                "otel collector URL is required".to_string(),
            ));
        }
        let endpoint = metrics_endpoint(&config.url, config.insecure);

        let exporter = MetricExporter::builder()
            .with_http()
            .with_endpoint(endpoint.clone())
            .build()
            .map_err(|e| MetricsError::Config(format!("failed to create OTLP exporter: {e}")))?;

        let provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(exporter).build())
            .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
            .build();

        let meter = provider.meter(SERVICE_NAME);
        let build_info = meter
            .f64_gauge(BUILD_INFO)
            .with_description(BUILD_INFO_HELP)
            .build();
        let last_checked = meter
            .f64_gauge(SILENCE_LAST_CHECKED)
            .with_description(SILENCE_LAST_CHECKED_HELP)
            .build();
        let expiring_in = meter
            .f64_gauge(SILENCE_EXPIRING_IN)
            .with_description(SILENCE_EXPIRING_IN_HELP)
            .build();

        info!(endpoint = %endpoint, insecure = config.insecure, "Initialized OpenTelemetry metrics publisher");

        Ok(Self {
            provider,
            build_info,
            last_checked,
            expiring_in,
        })
    }
}

fn silence_attributes(silence_id: &str, ticket: &str) -> [KeyValue; 2] {
    [
        KeyValue::new("silence_id", silence_id.to_string()),
        KeyValue::new("ticket", ticket.to_string()),
    ]
}

#[async_trait]
impl MetricsPublisher for OtelPublisher {
    fn record_build_info(&self, version: &str, commit: &str, build_date: &str) {
        self.build_info.record(
            1.0,
            &[
                KeyValue::new("version", version.to_string()),
                KeyValue::new("commit", commit.to_string()),
                KeyValue::new("build_date", build_date.to_string()),
            ],
        );
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_silence_check(&self, silence_id: &str, ticket: &str, checked_at: DateTime<Utc>) {
        self.last_checked.record(
            checked_at.timestamp() as f64,
            &silence_attributes(silence_id, ticket),
        );
    }

    fn record_silence_expiry(&self, silence_id: &str, ticket: &str, expires_at: DateTime<Utc>) {
        self.expiring_in.record(
            seconds_until(expires_at, Utc::now()),
            &silence_attributes(silence_id, ticket),
        );
    }

    async fn push(&self) -> Result<(), MetricsError> {
        debug!("Flushing metrics to OpenTelemetry collector");
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || provider.force_flush())
            .await
            .map_err(|e| MetricsError::Push(e.to_string()))?
            .map_err(|e| MetricsError::Push(e.to_string()))?;
        info!("Pushed metrics to OpenTelemetry collector");
        Ok(())
    }

    async fn close(&self) -> Result<(), MetricsError> {
        let provider = self.provider.clone();
        tokio::task::spawn_blocking(move || provider.shutdown())
            .await
            .map_err(|e| MetricsError::Close(e.to_string()))?
            .map_err(|e| MetricsError::Close(e.to_string()))
    }
}
