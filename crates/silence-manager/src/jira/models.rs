//! Jira Cloud REST v3 wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use silence_sync::{CouplingMarker, Ticket, TicketStatus};

/// Issue type used for created tickets.
pub const ISSUE_TYPE: &str = "Task";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<AdfDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Named>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(default, rename = "issuetype", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<Named>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRef {
    pub key: String,
}

/// Atlassian Document Format root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdfDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub content: Vec<AdfBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdfBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<AdfInline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdfInline {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl AdfDocument {
    /// Single-paragraph document holding `text` verbatim.
    pub fn paragraph(text: &str) -> Self {
        Self {
            kind: "doc".to_string(),
            version: 1,
            content: vec![AdfBlock {
                kind: "paragraph".to_string(),
                content: vec![AdfInline {
                    kind: "text".to_string(),
                    text: text.to_string(),
                }],
            }],
        }
    }

    /// Non-empty text nodes joined with `\n`.
    pub fn plain_text(&self) -> String {
        self.content
            .iter()
            .flat_map(|block| block.content.iter())
            .filter(|inline| !inline.text.is_empty())
            .map(|inline| inline.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Body of `POST /issue/{key}/comment`.
#[derive(Debug, Serialize)]
pub struct CommentRequest {
    pub body: AdfDocument,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub to: Named,
}

impl Transition {
    /// Named `reopen`, or leading to `open`/`reopened`/`to do`.
    pub fn reopens(&self) -> bool {
        self.name.eq_ignore_ascii_case("reopen")
            || ["open", "reopened", "to do"]
                .iter()
                .any(|target| self.to.name.eq_ignore_ascii_case(target))
    }

    /// Named `close`/`done`, or leading to `closed`/`done`.
    pub fn closes(&self) -> bool {
        ["close", "done"]
            .iter()
            .any(|name| self.name.eq_ignore_ascii_case(name))
            || ["closed", "done"]
                .iter()
                .any(|target| self.to.name.eq_ignore_ascii_case(target))
    }
}

#[derive(Debug, Deserialize)]
pub struct TransitionsResponse {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Serialize)]
pub struct TransitionRequest {
    pub transition: TransitionId,
}

#[derive(Debug, Serialize)]
pub struct TransitionId {
    pub id: String,
}

/// Map a Jira status name onto the ticket lifecycle.
///
/// Case-insensitive substring checks in a fixed order; the first hit wins, so
/// "Reopened" lands on [`TicketStatus::Open`]. Unknown names map to open.
pub fn map_status(name: &str) -> TicketStatus {
    let name = name.to_lowercase();
    let has = |needle: &str| name.contains(needle);

    if has("open") || has("to do") {
        TicketStatus::Open
    } else if has("in progress") || has("in review") {
        TicketStatus::InProgress
    } else if has("resolved") || has("done") {
        TicketStatus::Resolved
    } else if has("closed") {
        TicketStatus::Closed
    } else if has("reopen") {
        TicketStatus::Reopened
    } else {
        TicketStatus::Open
    }
}

/// Jira timestamps look like `2026-01-02T03:04:05.000+0000`.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

impl Issue {
    /// Convert to the domain model, splitting the coupling marker off the description.
    pub fn into_ticket(self, marker: &CouplingMarker) -> Ticket {
        let fields = self.fields;
        let text = fields
            .description
            .as_ref()
            .map(AdfDocument::plain_text)
            .unwrap_or_default();
        let (silence_ref, description) = marker.split(&text);

        Ticket {
            id: self.id,
            key: self.key,
            summary: fields.summary,
            silence_ref: silence_ref.map(str::to_string),
            description: description.to_string(),
            status: fields
                .status
                .as_ref()
                .map_or(TicketStatus::Unknown, |s| map_status(&s.name)),
            created_at: parse_timestamp(fields.created.as_deref()),
            updated_at: parse_timestamp(fields.updated.as_deref()),
            labels: fields.labels,
            assignee: fields.assignee.and_then(|u| {
                u.name
                    .filter(|n| !n.is_empty())
                    .or(u.account_id)
                    .filter(|a| !a.is_empty())
            }),
        }
    }

    /// Wire form carrying summary, description (with marker) and labels.
    pub fn from_ticket(ticket: &Ticket, marker: &CouplingMarker) -> Self {
        let description = match ticket.silence_ref.as_deref() {
            Some(reference) => marker.embed(&ticket.description, reference),
            None => ticket.description.clone(),
        };
        Self {
            fields: IssueFields {
                summary: ticket.summary.clone(),
                description: Some(AdfDocument::paragraph(&description)),
                labels: ticket.labels.clone(),
                ..IssueFields::default()
            },
            ..Self::default()
        }
    }
}
