//! Refired-alert detection.
//!
//! An alert that fires again after its ticket was closed means the fix did not
//! hold. Such a ticket is reopened and the alert silenced again.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::alertmanager::{Alert, Silence};
use crate::error::SyncError;
use crate::reconcile::{Reconciler, RunResult};

/// Alert label naming the ticket an alert belongs to.
pub const TICKET_LABEL: &str = "ticket";
/// Alert label naming the silence that covered it.
pub const SILENCE_ID_LABEL: &str = "silence_id";
/// Author of recreated silences.
pub const RECREATED_BY: &str = "silence-manager";
/// Comment of recreated silences.
pub const RECREATED_COMMENT: &str = "Automatically recreated for refired alert";

fn label<'a>(alert: &'a Alert, name: &str) -> Option<&'a str> {
    alert.label(name).filter(|v| !v.is_empty())
}

impl Reconciler {
    /// Reopen closed tickets whose alerts are firing again.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::QueryAlerts`] when alerts cannot be listed. Failures
    /// for individual alerts are pushed to `result` instead.
    pub(crate) async fn check_refired_alerts(&self, result: &mut RunResult) -> Result<(), SyncError> {
        let alerts = self
            .alert_manager
            .get_alerts(&[])
            .await
            .map_err(SyncError::QueryAlerts)?;

        debug!(count = alerts.len(), "Checking alerts for refires");

        for alert in &alerts {
            self.handle_alert(alert, result).await;
        }

        Ok(())
    }

    async fn handle_alert(&self, alert: &Alert, result: &mut RunResult) {
        let Some(ticket_ref) = label(alert, TICKET_LABEL) else {
            return;
        };

        let ticket = match self.tickets.get_ticket(ticket_ref).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(ticket = %ticket_ref, error = %e, "Failed to get ticket for alert");
                return;
            }
        };

        if !self.tickets.is_closed(&ticket) {
            return;
        }

        if self.covered_by_active_silence(alert).await {
            debug!(ticket = %ticket.key, "Alert still covered by an active silence");
            return;
        }

        info!(
            ticket = %ticket.key,
            alertname = alert.label("alertname").unwrap_or_default(),
            "Alert refired for closed ticket, reopening"
        );

        let comment = format!(
            "Alert has refired. Automatically reopening ticket and creating new silence.\n\nAlert: {}",
            alert.labels_summary()
        );
        if let Err(source) = self.tickets.reopen_ticket(&ticket.key, &comment).await {
            warn!(ticket = %ticket.key, error = %source, "Failed to reopen ticket");
            result.errors.push(SyncError::ReopenTicket {
                ticket: ticket.key.clone(),
                source,
            });
            return;
        }
        result.tickets_reopened += 1;

        let now = Utc::now();
        let silence = Silence {
            id: String::new(),
            created_by: RECREATED_BY.to_string(),
            comment: RECREATED_COMMENT.to_string(),
            starts_at: now,
            ends_at: now + self.config.default_silence_duration,
            matchers: alert.recreation_matchers(),
            ticket_ref: Some(ticket.key.clone()),
        };

        let silence_id = match self.alert_manager.create_silence(&silence).await {
            Ok(id) => id,
            Err(source) => {
                warn!(ticket = %ticket.key, error = %source, "Failed to create silence");
                result.errors.push(SyncError::CreateSilence {
                    ticket: ticket.key.clone(),
                    source,
                });
                return;
            }
        };
        result.silences_created += 1;

        info!(ticket = %ticket.key, silence_id = %silence_id, "Created new silence");

        self.comment(&ticket, &format!("New silence created: {silence_id}"))
            .await;
    }

    /// True when the alert names a silence that still exists and has not ended.
    async fn covered_by_active_silence(&self, alert: &Alert) -> bool {
        let Some(silence_id) = label(alert, SILENCE_ID_LABEL) else {
            return false;
        };

        match self.alert_manager.get_silence(silence_id).await {
            Ok(silence) => silence.is_active_at(Utc::now()),
            Err(e) => {
                debug!(silence_id, error = %e, "Referenced silence unavailable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::alertmanager::{Matcher, MockAlertManager};
    use crate::error::BackendError;
    use crate::reconcile::tests::{classify_by_status, silence, ticket};
    use crate::reconcile::SyncConfig;
    use crate::ticket::{MockTicketSystem, TicketStatus};

    fn alert(labels: &[(&str, &str)]) -> Alert {
        Alert {
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            state: "active".to_string(),
            ..Alert::default()
        }
    }

    fn no_silences(am: &mut MockAlertManager) {
        am.expect_list_silences().returning(|| Ok(vec![]));
    }

    async fn run(am: MockAlertManager, ts: MockTicketSystem) -> RunResult {
        Reconciler::new(Arc::new(am), Arc::new(ts), SyncConfig::default())
            .run()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_refired_alert_reopens_ticket_and_recreates_silence() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts()
            .withf(|matchers| matchers.is_empty())
            .returning(|_| {
                Ok(vec![alert(&[
                    ("alertname", "DiskFull"),
                    ("instance", "db-1"),
                    ("ticket", "OPS-7"),
                    ("team", "storage"),
                ])])
            });
        am.expect_create_silence()
            .withf(|s| {
                s.created_by == RECREATED_BY
                    && s.comment == RECREATED_COMMENT
                    && s.ticket_ref.as_deref() == Some("OPS-7")
                    && s.matchers
                        == vec![
                            Matcher::equal("alertname", "DiskFull"),
                            Matcher::equal("instance", "db-1"),
                        ]
                    && s.ends_at - s.starts_at == Duration::days(7)
            })
            .times(1)
            .returning(|_| Ok("new-silence".to_string()));

        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .withf(|key| key == "OPS-7")
            .returning(|key| Ok(ticket(key, TicketStatus::Closed)));
        classify_by_status(&mut ts);
        ts.expect_reopen_ticket()
            .withf(|key, comment| {
                key == "OPS-7"
                    && comment.starts_with("Alert has refired.")
                    && comment.ends_with(
                        "Alert: alertname=DiskFull, instance=db-1, team=storage, ticket=OPS-7",
                    )
            })
            .times(1)
            .returning(|_, _| Ok(()));
        ts.expect_add_comment()
            .withf(|key, text| key == "OPS-7" && text == "New silence created: new-silence")
            .times(1)
            .returning(|_, _| Ok(()));

        let result = run(am, ts).await;

        assert_eq!(result.tickets_reopened, 1);
        assert_eq!(result.silences_created, 1);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_alert_without_ticket_label_is_ignored() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts()
            .returning(|_| Ok(vec![alert(&[("alertname", "Noise")])]));
        am.expect_create_silence().never();
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket().never();

        let result = run(am, ts).await;
        assert_eq!(result.tickets_reopened, 0);
    }

    #[tokio::test]
    async fn test_open_ticket_is_not_reopened() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts()
            .returning(|_| Ok(vec![alert(&[("alertname", "X"), ("ticket", "OPS-1")])]));
        am.expect_create_silence().never();
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .returning(|key| Ok(ticket(key, TicketStatus::InProgress)));
        classify_by_status(&mut ts);
        ts.expect_reopen_ticket().never();

        let result = run(am, ts).await;
        assert_eq!(result.tickets_reopened, 0);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_active_silence_suppresses_reopen() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts().returning(|_| {
            Ok(vec![alert(&[
                ("alertname", "X"),
                ("ticket", "OPS-1"),
                ("silence_id", "s9"),
            ])])
        });
        am.expect_get_silence()
            .withf(|id| id == "s9")
            .returning(|id| Ok(silence(id, Some("OPS-1"), Duration::hours(3))));
        am.expect_create_silence().never();
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .returning(|key| Ok(ticket(key, TicketStatus::Resolved)));
        classify_by_status(&mut ts);
        ts.expect_reopen_ticket().never();

        let result = run(am, ts).await;
        assert_eq!(result.tickets_reopened, 0);
    }

    #[tokio::test]
    async fn test_ended_or_missing_silence_does_not_suppress_reopen() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts().returning(|_| {
            Ok(vec![
                alert(&[("ticket", "OPS-1"), ("silence_id", "ended")]),
                alert(&[("ticket", "OPS-2"), ("silence_id", "gone")]),
            ])
        });
        am.expect_get_silence().returning(|id| {
            if id == "ended" {
                Ok(silence(id, Some("OPS-1"), -Duration::minutes(5)))
            } else {
                Err(BackendError::NotFound(id.to_string()))
            }
        });
        am.expect_create_silence()
            .times(2)
            .returning(|s| Ok(format!("new-{}", s.ticket_ref.clone().unwrap_or_default())));
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .returning(|key| Ok(ticket(key, TicketStatus::Closed)));
        classify_by_status(&mut ts);
        ts.expect_reopen_ticket().times(2).returning(|_, _| Ok(()));
        ts.expect_add_comment().times(2).returning(|_, _| Ok(()));

        let result = run(am, ts).await;
        assert_eq!(result.tickets_reopened, 2);
        assert_eq!(result.silences_created, 2);
    }

    #[tokio::test]
    async fn test_reopen_failure_skips_silence_creation() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts()
            .returning(|_| Ok(vec![alert(&[("ticket", "OPS-1")])]));
        am.expect_create_silence().never();
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .returning(|key| Ok(ticket(key, TicketStatus::Closed)));
        classify_by_status(&mut ts);
        ts.expect_reopen_ticket().returning(|_, _| {
            Err(BackendError::Invalid("no reopen transition available".to_string()))
        });

        let result = run(am, ts).await;
        assert_eq!(result.tickets_reopened, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].to_string(),
            "reopen ticket OPS-1: no reopen transition available"
        );
    }

    #[tokio::test]
    async fn test_create_failure_keeps_reopen_count() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts()
            .returning(|_| Ok(vec![alert(&[("ticket", "OPS-1")])]));
        am.expect_create_silence().returning(|_| {
            Err(BackendError::Status {
                status: 400,
                body: "bad matchers".to_string(),
            })
        });
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .returning(|key| Ok(ticket(key, TicketStatus::Closed)));
        classify_by_status(&mut ts);
        ts.expect_reopen_ticket().returning(|_, _| Ok(()));
        ts.expect_add_comment().never();

        let result = run(am, ts).await;
        assert_eq!(result.tickets_reopened, 1);
        assert_eq!(result.silences_created, 0);
        assert!(matches!(
            &result.errors[0],
            SyncError::CreateSilence { ticket, .. } if ticket == "OPS-1"
        ));
    }

    #[tokio::test]
    async fn test_ticket_lookup_failure_skips_alert() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts()
            .returning(|_| Ok(vec![alert(&[("ticket", "OPS-404")])]));
        let mut ts = MockTicketSystem::new();
        ts.expect_get_ticket()
            .returning(|key| Err(BackendError::NotFound(key.to_string())));
        ts.expect_reopen_ticket().never();

        let result = run(am, ts).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_alert_query_failure_is_recorded() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts().returning(|_| {
            Err(BackendError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            })
        });
        let ts = MockTicketSystem::new();

        let result = run(am, ts).await;
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(result.errors[0], SyncError::QueryAlerts(_)));
    }

    #[tokio::test]
    async fn test_check_alerts_disabled_skips_query() {
        let mut am = MockAlertManager::new();
        no_silences(&mut am);
        am.expect_get_alerts().never();
        let ts = MockTicketSystem::new();

        let config = SyncConfig {
            check_alerts: false,
            ..SyncConfig::default()
        };
        let result = Reconciler::new(Arc::new(am), Arc::new(ts), config)
            .run()
            .await
            .unwrap();
        assert!(result.is_success());
    }
}
