//! Kubernetes service discovery for Alertmanager and metrics backends.
//!
//! Preferred namespaces are searched in order and the first one that yields a
//! match wins. Otherwise every other namespace is searched. Inside a namespace
//! the label selector is tried before a case-insensitive name match.

use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{Api, ListParams};
use kube::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Discovery failures.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to create Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    #[error("failed to list namespaces: {0}")]
    ListNamespaces(#[source] kube::Error),

    #[error("no {0} services found in cluster")]
    NotFound(ServiceKind),
}

/// What is being discovered; decides the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Alertmanager,
    Pushgateway,
    OtelCollector,
}

impl ServiceKind {
    pub const fn default_service_name(self) -> &'static str {
        match self {
            Self::Alertmanager => "alertmanager",
            Self::Pushgateway => "pushgateway",
            Self::OtelCollector => "otel-collector",
        }
    }

    pub const fn default_service_label(self) -> &'static str {
        match self {
            Self::Alertmanager => "app=alertmanager",
            Self::Pushgateway => "app=prometheus-pushgateway",
            Self::OtelCollector => "app.kubernetes.io/name=opentelemetry-collector",
        }
    }

    pub const fn default_port(self) -> u16 {
        match self {
            Self::Alertmanager => 9093,
            Self::Pushgateway => 9091,
            Self::OtelCollector => 4318,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Alertmanager => "Alertmanager",
            Self::Pushgateway => "Pushgateway",
            Self::OtelCollector => "OpenTelemetry collector",
        };
        f.write_str(name)
    }
}

/// Search parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Substring of the service name.
    pub service_name: String,
    /// Label selector, e.g. `app=alertmanager`.
    pub service_label: String,
    /// Preferred port; 0 means the kind's default.
    pub port: u16,
    pub prefer_namespaces: Vec<String>,
}

impl DiscoveryConfig {
    /// Fill empty fields from the kind's defaults.
    #[must_use]
    pub fn with_defaults(mut self, kind: ServiceKind) -> Self {
        if self.service_name.is_empty() {
            self.service_name = kind.default_service_name().to_string();
        }
        if self.service_label.is_empty() {
            self.service_label = kind.default_service_label().to_string();
        }
        if self.port == 0 {
            self.port = kind.default_port();
        }
        self
    }
}

/// A service chosen by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub name: String,
    pub namespace: String,
    pub url: String,
}

/// Turn a service into a cluster-local URL.
///
/// Takes the first port equal to `preferred_port` or named `web`/`http`,
/// then the first port, then `preferred_port` itself.
pub fn service_to_discovered(
    service: &Service,
    namespace: &str,
    preferred_port: u16,
) -> DiscoveredService {
    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default();

    let port = ports
        .iter()
        .find(|p| {
            p.port == i32::from(preferred_port)
                || matches!(p.name.as_deref(), Some("web" | "http"))
        })
        .or_else(|| ports.first())
        .map_or(i32::from(preferred_port), |p| p.port);

    let name = service.metadata.name.clone().unwrap_or_default();
    let namespace = service
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| namespace.to_string());
    let url = format!("http://{name}.{namespace}.svc.cluster.local:{port}");

    DiscoveredService {
        name,
        namespace,
        url,
    }
}

/// Services whose name contains `pattern`, case-insensitively.
pub fn match_by_name<'a>(services: &'a [Service], pattern: &str) -> Vec<&'a Service> {
    let pattern = pattern.to_lowercase();
    services
        .iter()
        .filter(|s| {
            s.metadata
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&pattern))
        })
        .collect()
}

/// Discovers services through the Kubernetes API.
pub struct ServiceDiscovery {
    client: Client,
}

impl ServiceDiscovery {
    /// Connect using the in-cluster or local kubeconfig.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::Client`] when no configuration is usable.
    pub async fn new() -> Result<Self, DiscoveryError> {
        let client = Client::try_default().await.map_err(DiscoveryError::Client)?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Find one service of `kind`.
    ///
    /// # Errors
    /// Returns [`DiscoveryError::NotFound`] when nothing matches, or
    /// [`DiscoveryError::ListNamespaces`] when the cluster-wide fallback
    /// cannot enumerate namespaces.
    pub async fn discover(
        &self,
        kind: ServiceKind,
        config: DiscoveryConfig,
    ) -> Result<DiscoveredService, DiscoveryError> {
        let config = config.with_defaults(kind);
        let mut found = Vec::new();

        for namespace in &config.prefer_namespaces {
            found.extend(self.search_namespace(namespace, &config).await);
            if !found.is_empty() {
                info!(%kind, namespace = %namespace, "Found service in preferred namespace");
                break;
            }
        }

        if found.is_empty() {
            info!(%kind, "Searching all namespaces");
            let namespaces = Api::<Namespace>::all(self.client.clone())
                .list(&ListParams::default())
                .await
                .map_err(DiscoveryError::ListNamespaces)?;

            for ns in namespaces.items {
                let Some(name) = ns.metadata.name else {
                    continue;
                };
                if config.prefer_namespaces.contains(&name) {
                    continue;
                }
                found.extend(self.search_namespace(&name, &config).await);
            }
        }

        for (i, svc) in found.iter().enumerate() {
            debug!(%kind, index = i + 1, namespace = %svc.namespace, name = %svc.name, url = %svc.url, "Discovered service");
        }

        let selected = found
            .into_iter()
            .next()
            .ok_or(DiscoveryError::NotFound(kind))?;
        info!(%kind, namespace = %selected.namespace, name = %selected.name, url = %selected.url, "Selected service");
        Ok(selected)
    }

    /// Matching services in one namespace. API errors are logged and yield nothing.
    async fn search_namespace(
        &self,
        namespace: &str,
        config: &DiscoveryConfig,
    ) -> Vec<DiscoveredService> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        if !config.service_label.is_empty() {
            match api
                .list(&ListParams::default().labels(&config.service_label))
                .await
            {
                Ok(list) if !list.items.is_empty() => {
                    return list
                        .items
                        .iter()
                        .map(|s| service_to_discovered(s, namespace, config.port))
                        .collect();
                }
                Ok(_) => {}
                Err(e) => debug!(namespace = %namespace, error = %e, "Label search failed"),
            }
        }

        if config.service_name.is_empty() {
            return Vec::new();
        }

        match api.list(&ListParams::default()).await {
            Ok(list) => match_by_name(&list.items, &config.service_name)
                .into_iter()
                .map(|s| service_to_discovered(s, namespace, config.port))
                .collect(),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Failed to search namespace");
                Vec::new()
            }
        }
    }
}
