//! Alertmanager v2 API wire types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use silence_sync::{Alert, CouplingMarker, Matcher, Silence};

/// Silence as sent to and returned by `/api/v2/silences`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSilence {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SilenceStatus>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_by: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub matchers: Vec<ApiMatcher>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceStatus {
    /// `active`, `pending` or `expired`.
    pub state: String,
}

impl ApiSilence {
    /// Active and pending silences count as live.
    pub fn is_live(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.state == "active" || s.state == "pending")
    }

    /// Convert to the domain model, splitting the coupling marker off the comment.
    pub fn into_silence(self, marker: &CouplingMarker) -> Silence {
        let (ticket_ref, comment) = marker.split(&self.comment);
        Silence {
            ticket_ref: ticket_ref.map(str::to_string),
            comment: comment.to_string(),
            id: self.id,
            created_by: self.created_by,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            matchers: self.matchers.into_iter().map(Matcher::from).collect(),
        }
    }

    /// Wire form of a domain silence with the ticket reference embedded.
    pub fn from_silence(silence: &Silence, marker: &CouplingMarker) -> Self {
        let comment = match silence.ticket_ref.as_deref() {
            Some(reference) => marker.embed(&silence.comment, reference),
            None => silence.comment.clone(),
        };
        Self {
            id: silence.id.clone(),
            status: None,
            comment,
            created_by: silence.created_by.clone(),
            starts_at: silence.starts_at,
            ends_at: silence.ends_at,
            matchers: silence.matchers.iter().map(ApiMatcher::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMatcher {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default = "default_is_equal")]
    pub is_equal: bool,
}

fn default_is_equal() -> bool {
    true
}

impl From<ApiMatcher> for Matcher {
    fn from(m: ApiMatcher) -> Self {
        Self {
            name: m.name,
            value: m.value,
            is_regex: m.is_regex,
            is_equal: m.is_equal,
        }
    }
}

impl From<&Matcher> for ApiMatcher {
    fn from(m: &Matcher) -> Self {
        Self {
            name: m.name.clone(),
            value: m.value.clone(),
            is_regex: m.is_regex,
            is_equal: m.is_equal,
        }
    }
}

/// Response of `POST /api/v2/silences`.
#[derive(Debug, Deserialize)]
pub struct CreateSilenceResponse {
    #[serde(rename = "silenceID")]
    pub silence_id: String,
}

/// Alert as returned by `/api/v2/alerts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAlert {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AlertStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertStatus {
    #[serde(default)]
    pub state: String,
}

impl From<ApiAlert> for Alert {
    fn from(a: ApiAlert) -> Self {
        Self {
            labels: a.labels,
            annotations: a.annotations,
            starts_at: a.starts_at,
            ends_at: a.ends_at,
            state: a.status.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_silence_deserializes_and_splits_marker() {
        let raw = json!({
            "id": "abc",
            "status": {"state": "active"},
            "comment": "# silence-manager: OPS-1\nDisk full on db-1",
            "createdBy": "oncall",
            "startsAt": "2026-01-01T00:00:00Z",
            "endsAt": "2026-01-08T00:00:00Z",
            "matchers": [{"name": "alertname", "value": "DiskFull", "isRegex": false}]
        });

        let api: ApiSilence = serde_json::from_value(raw).unwrap();
        assert!(api.is_live());

        let silence = api.into_silence(&CouplingMarker::silence_comment("silence-manager"));
        assert_eq!(silence.ticket_ref.as_deref(), Some("OPS-1"));
        assert_eq!(silence.comment, "Disk full on db-1");
        assert_eq!(silence.matchers, vec![Matcher::equal("alertname", "DiskFull")]);
    }

    #[test]
    fn test_expired_or_statusless_silence_is_not_live() {
        let mut api: ApiSilence = serde_json::from_value(json!({
            "id": "abc",
            "startsAt": "2026-01-01T00:00:00Z",
            "endsAt": "2026-01-08T00:00:00Z"
        }))
        .unwrap();
        assert!(!api.is_live());

        api.status = Some(SilenceStatus {
            state: "expired".to_string(),
        });
        assert!(!api.is_live());
    }

    #[test]
    fn test_from_silence_embeds_marker_and_omits_empty_id() {
        let marker = CouplingMarker::silence_comment("silence-manager");
        let silence = Silence {
            id: String::new(),
            created_by: "silence-manager".to_string(),
            comment: "Recreated".to_string(),
            starts_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            ends_at: "2026-01-08T00:00:00Z".parse().unwrap(),
            matchers: vec![Matcher::equal("job", "node")],
            ticket_ref: Some("OPS-2".to_string()),
        };

        let value = serde_json::to_value(ApiSilence::from_silence(&silence, &marker)).unwrap();
        assert_eq!(value["comment"], "# silence-manager: OPS-2\nRecreated");
        assert_eq!(value["createdBy"], "silence-manager");
        assert_eq!(value["matchers"][0]["isEqual"], true);
        assert!(value.get("id").is_none());
        assert!(value.get("status").is_none());
    }
}
