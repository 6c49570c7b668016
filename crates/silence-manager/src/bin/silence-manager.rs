//! silence-manager - one reconciliation pass between Alertmanager and Jira.
//!
//! Meant to run as a Kubernetes `CronJob`. Exits non-zero when the pass
//! recorded any error.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use silence_manager::config::{LogFormat, OutputFormat};
use silence_manager::{
    build_publisher, BuildInfo, Config, JiraTicketSystem, PrometheusAlertManager,
    ServiceDiscovery, ServiceKind,
};
use silence_sync::{MetricsPublisher, Reconciler, RunResult};

const DEFAULT_LOG_FILTER: &str = "silence_manager=info,silence_sync=info";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn discovery_client(config: &Config) -> Result<Option<ServiceDiscovery>> {
    if !config.discover_alertmanager() && !config.discover_metrics() {
        return Ok(None);
    }
    let discovery = ServiceDiscovery::new()
        .await
        .context("auto-discovery needs Kubernetes access")?;
    Ok(Some(discovery))
}

async fn resolve_alertmanager_url(
    config: &Config,
    discovery: Option<&ServiceDiscovery>,
) -> Result<String> {
    if !config.discover_alertmanager() {
        let url = config.alertmanager_url.clone().unwrap_or_default();
        info!(url = %url, "Using configured Alertmanager URL");
        return Ok(url);
    }

    info!("Discovering Alertmanager in cluster");
    let discovery = discovery.context("Kubernetes client not initialized")?;
    let found = discovery
        .discover(ServiceKind::Alertmanager, config.alertmanager_discovery())
        .await
        .context("failed to discover Alertmanager")?;
    Ok(found.url)
}

async fn metrics_publisher(
    config: &Config,
    discovery: Option<&ServiceDiscovery>,
    build: BuildInfo,
) -> Result<Option<Arc<dyn MetricsPublisher>>> {
    let Some(backend) = config.metrics_backend.filter(|_| config.metrics_enabled) else {
        info!("Metrics publishing disabled");
        return Ok(None);
    };

    let url = if config.discover_metrics() {
        info!(backend = %backend, "Discovering metrics backend in cluster");
        let discovery = discovery.context("Kubernetes client not initialized")?;
        discovery
            .discover(backend.service_kind(), config.metrics_discovery())
            .await
            .with_context(|| format!("failed to discover {backend} metrics backend"))?
            .url
    } else {
        config.metrics_url.clone().unwrap_or_default()
    };

    let settings = config
        .publisher_settings(url)
        .context("metrics backend not configured")?;
    let publisher = build_publisher(&settings)
        .with_context(|| format!("failed to initialize {backend} metrics publisher"))?;
    publisher.record_build_info(build.version, build.commit, build.date);
    info!(backend = %backend, url = %settings.url, "Metrics publishing enabled");

    Ok(Some(publisher))
}

fn report(result: &RunResult, output: OutputFormat) -> Result<()> {
    info!(
        extended = result.silences_extended,
        deleted = result.silences_deleted,
        created = result.silences_created,
        reopened = result.tickets_reopened,
        errors = result.errors.len(),
        "Synchronization finished"
    );
    for err in &result.errors {
        error!(error = %err, "Synchronization error");
    }

    let summary = result.summary();
    match output {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("Silences extended: {}", summary.silences_extended);
            println!("Silences deleted:  {}", summary.silences_deleted);
            println!("Silences created:  {}", summary.silences_created);
            println!("Tickets reopened:  {}", summary.tickets_reopened);
            println!("Errors:            {}", summary.errors.len());
            for err in &summary.errors {
                println!("  - {err}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);

    let build = BuildInfo::current();
    info!(
        version = build.version,
        commit = build.commit,
        build_date = build.date,
        "Starting silence-manager"
    );

    config.validate().context("invalid configuration")?;

    let discovery = discovery_client(&config).await?;
    let alertmanager_url = resolve_alertmanager_url(&config, discovery.as_ref()).await?;

    let alert_manager = PrometheusAlertManager::new(config.alertmanager_config(alertmanager_url))
        .context("failed to create Alertmanager client")?;
    let tickets =
        JiraTicketSystem::new(config.jira_config()).context("failed to create Jira client")?;

    let sync_config = config.sync_config();
    info!(
        project = config.jira_project_key.as_deref().unwrap_or_default(),
        annotation_prefix = %config.sync_annotation_prefix,
        expiry_threshold_hours = sync_config.expiry_threshold.num_hours(),
        extension_duration_hours = sync_config.extension_duration.num_hours(),
        check_alerts = sync_config.check_alerts,
        "Configuration loaded"
    );

    let publisher = metrics_publisher(&config, discovery.as_ref(), build).await?;

    let mut reconciler = Reconciler::new(Arc::new(alert_manager), Arc::new(tickets), sync_config);
    if let Some(publisher) = &publisher {
        reconciler = reconciler.with_metrics(Arc::clone(publisher));
    }

    let result = match reconciler.run().await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Synchronization aborted");
            RunResult {
                errors: vec![e],
                ..RunResult::default()
            }
        }
    };

    report(&result, config.output)?;

    if let Some(publisher) = publisher {
        if let Err(e) = publisher.close().await {
            warn!(error = %e, "Failed to close metrics publisher");
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
