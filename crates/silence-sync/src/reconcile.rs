//! Silence/ticket reconciliation.
//!
//! One [`Reconciler::run`] is a full stateless pass: list active silences,
//! apply the decision rule to every silence coupled to a ticket, optionally
//! look for alerts that refired after their ticket was closed, then flush
//! metrics. Per-item failures are collected in [`RunResult::errors`] and never
//! stop the pass; only a failure to list silences aborts it.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alertmanager::{AlertManager, Silence};
use crate::error::{SilenceError, SyncError};
use crate::metrics::{MetricsPublisher, NoopPublisher};
use crate::ticket::{Ticket, TicketSystem};

/// Tuning knobs for a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Extend a silence once it expires within this window.
    pub expiry_threshold: Duration,
    /// New lifetime given to an extended silence, counted from now.
    pub extension_duration: Duration,
    /// Lifetime of silences recreated for refired alerts.
    pub default_silence_duration: Duration,
    /// Run refired-alert detection after processing silences.
    pub check_alerts: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            expiry_threshold: Duration::hours(24),
            extension_duration: Duration::days(7),
            default_silence_duration: Duration::days(7),
            check_alerts: true,
        }
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct RunResult {
    pub silences_extended: usize,
    pub silences_deleted: usize,
    pub silences_created: usize,
    pub tickets_reopened: usize,
    /// Non-fatal errors, in the order they happened.
    pub errors: Vec<SyncError>,
}

impl RunResult {
    /// True when the pass finished without any recorded error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Serializable view of the result.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            silences_extended: self.silences_extended,
            silences_deleted: self.silences_deleted,
            silences_created: self.silences_created,
            tickets_reopened: self.tickets_reopened,
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Report form of [`RunResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub silences_extended: usize,
    pub silences_deleted: usize,
    pub silences_created: usize,
    pub tickets_reopened: usize,
    pub errors: Vec<String>,
}

/// What to do with one coupled silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceAction {
    /// Ticket resolved: delete the silence.
    Delete,
    /// Ticket open and the silence expires within the threshold.
    Extend,
    /// Ticket open and the silence has already lapsed.
    ExtendExpired,
    /// Nothing to do.
    Keep,
}

/// Decision table for a coupled silence. First match wins.
#[must_use]
pub fn decide(
    resolved: bool,
    open: bool,
    time_until_expiry: Duration,
    expiry_threshold: Duration,
) -> SilenceAction {
    if resolved {
        SilenceAction::Delete
    } else if open && time_until_expiry > Duration::zero() && time_until_expiry < expiry_threshold
    {
        SilenceAction::Extend
    } else if open && time_until_expiry <= Duration::zero() {
        SilenceAction::ExtendExpired
    } else {
        SilenceAction::Keep
    }
}

/// Keeps silences and tickets consistent.
pub struct Reconciler {
    pub(crate) alert_manager: Arc<dyn AlertManager>,
    pub(crate) tickets: Arc<dyn TicketSystem>,
    pub(crate) metrics: Arc<dyn MetricsPublisher>,
    pub(crate) config: SyncConfig,
}

impl Reconciler {
    /// Create a reconciler that publishes no metrics.
    #[must_use]
    pub fn new(
        alert_manager: Arc<dyn AlertManager>,
        tickets: Arc<dyn TicketSystem>,
        config: SyncConfig,
    ) -> Self {
        Self {
            alert_manager,
            tickets,
            metrics: Arc::new(NoopPublisher),
            config,
        }
    }

    /// Use `metrics` instead of the no-op publisher.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPublisher>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one full reconciliation pass.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ListSilences`] when silences cannot be listed.
    /// Every other failure is recorded in the returned [`RunResult`].
    pub async fn run(&self) -> Result<RunResult, SyncError> {
        let mut result = RunResult::default();

        info!("Starting synchronization");

        let silences = self
            .alert_manager
            .list_silences()
            .await
            .map_err(SyncError::ListSilences)?;

        info!(count = silences.len(), "Found active silences");

        for silence in &silences {
            let Some(ticket_ref) = silence.ticket_ref.as_deref().filter(|r| !r.is_empty()) else {
                debug!(silence_id = %silence.id, "Silence has no ticket reference, skipping");
                continue;
            };

            self.metrics
                .record_silence_check(&silence.id, ticket_ref, Utc::now());
            self.metrics
                .record_silence_expiry(&silence.id, ticket_ref, silence.ends_at);

            if let Err(source) = self.process_silence(silence, ticket_ref, &mut result).await {
                error!(silence_id = %silence.id, error = %source, "Failed to process silence");
                result.errors.push(SyncError::Silence {
                    silence_id: silence.id.clone(),
                    source,
                });
            }
        }

        if self.config.check_alerts {
            if let Err(e) = self.check_refired_alerts(&mut result).await {
                error!(error = %e, "Failed to check refired alerts");
                result.errors.push(e);
            }
        }

        info!(
            extended = result.silences_extended,
            deleted = result.silences_deleted,
            created = result.silences_created,
            reopened = result.tickets_reopened,
            errors = result.errors.len(),
            "Synchronization complete"
        );

        if let Err(e) = self.metrics.push().await {
            warn!(error = %e, "Failed to push metrics");
            result.errors.push(SyncError::PushMetrics(e));
        }

        Ok(result)
    }

    /// Apply the decision rule to one coupled silence.
    async fn process_silence(
        &self,
        silence: &Silence,
        ticket_ref: &str,
        result: &mut RunResult,
    ) -> Result<(), SilenceError> {
        let ticket = self.tickets.get_ticket(ticket_ref).await.map_err(|source| {
            SilenceError::FetchTicket {
                ticket: ticket_ref.to_string(),
                source,
            }
        })?;

        debug!(
            silence_id = %silence.id,
            ticket = %ticket.key,
            status = %ticket.status,
            "Processing silence"
        );

        let now = Utc::now();
        let time_until_expiry = silence.ends_at - now;
        let action = decide(
            self.tickets.is_resolved(&ticket),
            self.tickets.is_open(&ticket),
            time_until_expiry,
            self.config.expiry_threshold,
        );

        match action {
            SilenceAction::Delete => {
                info!(silence_id = %silence.id, ticket = %ticket.key, "Ticket resolved, deleting silence");
                self.alert_manager
                    .delete_silence(&silence.id)
                    .await
                    .map_err(SilenceError::Delete)?;
                self.comment(
                    &ticket,
                    &format!(
                        "Silence {} has been automatically deleted because the ticket is resolved.",
                        silence.id
                    ),
                )
                .await;
                result.silences_deleted += 1;
            }
            SilenceAction::Extend => {
                let ends_at = now + self.config.extension_duration;
                info!(
                    silence_id = %silence.id,
                    ticket = %ticket.key,
                    expires_in_secs = time_until_expiry.num_seconds(),
                    until = %ends_at,
                    "Ticket open and silence expiring soon, extending"
                );
                self.alert_manager
                    .extend_silence(&silence.id, ends_at)
                    .await
                    .map_err(SilenceError::Extend)?;
                self.comment(
                    &ticket,
                    &format!(
                        "Silence {} has been automatically extended until {}.",
                        silence.id,
                        rfc3339(ends_at)
                    ),
                )
                .await;
                result.silences_extended += 1;
            }
            SilenceAction::ExtendExpired => {
                let ends_at = now + self.config.extension_duration;
                info!(
                    silence_id = %silence.id,
                    ticket = %ticket.key,
                    until = %ends_at,
                    "Ticket open and silence expired, extending"
                );
                self.alert_manager
                    .extend_silence(&silence.id, ends_at)
                    .await
                    .map_err(SilenceError::ExtendExpired)?;
                self.comment(
                    &ticket,
                    &format!(
                        "Silence {} was expired and has been automatically extended until {}.",
                        silence.id,
                        rfc3339(ends_at)
                    ),
                )
                .await;
                result.silences_extended += 1;
            }
            SilenceAction::Keep => {
                debug!(silence_id = %silence.id, ticket = %ticket.key, "No action needed");
            }
        }

        Ok(())
    }

    /// Best-effort comment; failures are logged only.
    pub(crate) async fn comment(&self, ticket: &Ticket, text: &str) {
        if let Err(e) = self.tickets.add_comment(&ticket.key, text).await {
            warn!(ticket = %ticket.key, error = %e, "Failed to add comment to ticket");
        }
    }
}

pub(crate) fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
