//! Ticketing port: tickets, their status, and the backend trait.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
    Reopened,
    /// The backend reported no status.
    Unknown,
}

impl TicketStatus {
    /// Status name as used in logs and comments.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
            Self::Unknown => "unknown",
        }
    }

    /// Exactly `resolved`.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// `closed` or `resolved`.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed | Self::Resolved)
    }

    /// `open` or `in_progress`. `reopened` is not open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit of remediation work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Backend-internal identifier.
    pub id: String,
    /// Human-readable key, e.g. `OPS-123`.
    pub key: String,
    pub summary: String,
    /// Description text without the coupling marker.
    pub description: String,
    pub status: TicketStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Silence this ticket claims to be coupled to. Advisory only.
    pub silence_ref: Option<String>,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

/// Capabilities the engine needs from a ticketing backend.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TicketSystem: Send + Sync {
    /// Retrieve a ticket by key.
    async fn get_ticket(&self, key: &str) -> Result<Ticket, BackendError>;

    /// Create a ticket and return its key.
    async fn create_ticket(&self, ticket: &Ticket) -> Result<String, BackendError>;

    /// Update summary, description and labels of an existing ticket.
    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), BackendError>;

    /// Move a closed or resolved ticket back to an open state, commenting first.
    async fn reopen_ticket(&self, key: &str, comment: &str) -> Result<(), BackendError>;

    /// Move a ticket to a closed state, commenting first.
    async fn close_ticket(&self, key: &str, comment: &str) -> Result<(), BackendError>;

    /// Append a comment to a ticket.
    async fn add_comment(&self, key: &str, comment: &str) -> Result<(), BackendError>;

    fn is_resolved(&self, ticket: &Ticket) -> bool {
        ticket.status.is_resolved()
    }

    fn is_closed(&self, ticket: &Ticket) -> bool {
        ticket.status.is_closed()
    }

    fn is_open(&self, ticket: &Ticket) -> bool {
        ticket.status.is_open()
    }
}
