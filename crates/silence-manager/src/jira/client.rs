//! Jira Cloud REST v3 client.
//!
//! API Documentation: <https://developer.atlassian.com/cloud/jira/platform/rest/v3/>

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use silence_sync::{BackendError, CouplingMarker, Ticket, TicketSystem};
use tracing::{debug, info};

use super::models::{
    AdfDocument, CommentRequest, Issue, Named, ProjectRef, Transition, TransitionId,
    TransitionRequest, TransitionsResponse, ISSUE_TYPE,
};
use crate::http;

/// Settings for [`JiraTicketSystem`].
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    /// Project new tickets are created in.
    pub project_key: String,
    /// Coupling marker prefix. Empty means the default.
    pub annotation_prefix: String,
}

/// Ticketing backend backed by Jira Cloud.
#[derive(Clone)]
pub struct JiraTicketSystem {
    client: Client,
    base_url: String,
    username: String,
    api_token: String,
    project_key: String,
    marker: CouplingMarker,
}

impl JiraTicketSystem {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: JiraConfig) -> Result<Self, BackendError> {
        Ok(Self {
            client: http::client()?,
            base_url: http::base_url(&config.base_url),
            username: config.username,
            api_token: config.api_token,
            project_key: config.project_key,
            marker: CouplingMarker::ticket_description(config.annotation_prefix),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/rest/api/3{path}", self.base_url);
        debug!(method = %method, url = %url, "Jira request");

        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response, BackendError> {
        let response = builder.send().await.map_err(BackendError::transport)?;
        http::expect_status(response, expected).await
    }

    async fn transitions(&self, key: &str) -> Result<Vec<Transition>, BackendError> {
        let response = self
            .send(
                self.request(Method::GET, &format!("/issue/{key}/transitions")),
                StatusCode::OK,
            )
            .await?;
        let body: TransitionsResponse = http::decode(response).await?;
        Ok(body.transitions)
    }

    async fn apply_transition(&self, key: &str, transition: &Transition) -> Result<(), BackendError> {
        let body = TransitionRequest {
            transition: TransitionId {
                id: transition.id.clone(),
            },
        };
        self.send(
            self.request(Method::POST, &format!("/issue/{key}/transitions"))
                .json(&body),
            StatusCode::NO_CONTENT,
        )
        .await?;
        info!(ticket = %key, transition = %transition.name, "Transitioned ticket");
        Ok(())
    }

    /// Comment (when non-empty), then apply the first transition `select` accepts.
    async fn comment_and_transition(
        &self,
        key: &str,
        comment: &str,
        select: fn(&Transition) -> bool,
        kind: &str,
    ) -> Result<(), BackendError> {
        if !comment.is_empty() {
            self.add_comment(key, comment)
                .await
                .map_err(|e| e.context("failed to add comment"))?;
        }

        let transitions = self
            .transitions(key)
            .await
            .map_err(|e| e.context("failed to get transitions"))?;
        let Some(transition) = transitions.iter().find(|t| select(t)) else {
            return Err(BackendError::Invalid(format!(
                "no {kind} transition found for ticket {key}"
            )));
        };

        self.apply_transition(key, transition).await
    }
}

#[async_trait]
impl TicketSystem for JiraTicketSystem {
    async fn get_ticket(&self, key: &str) -> Result<Ticket, BackendError> {
        let response = self
            .request(Method::GET, &format!("/issue/{key}"))
            .send()
            .await
            .map_err(BackendError::transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(format!("ticket {key}")));
        }

        let response = http::expect_status(response, StatusCode::OK).await?;
        let issue: Issue = http::decode(response).await?;
        Ok(issue.into_ticket(&self.marker))
    }

    async fn create_ticket(&self, ticket: &Ticket) -> Result<String, BackendError> {
        let mut issue = Issue::from_ticket(ticket, &self.marker);
        issue.fields.project = Some(ProjectRef {
            key: self.project_key.clone(),
        });
        issue.fields.issue_type = Some(Named {
            name: ISSUE_TYPE.to_string(),
        });

        let response = self
            .send(
                self.request(Method::POST, "/issue").json(&issue),
                StatusCode::CREATED,
            )
            .await?;
        let created: Issue = http::decode(response).await?;

        info!(ticket = %created.key, "Created ticket");
        Ok(created.key)
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), BackendError> {
        if ticket.key.is_empty() {
            return Err(BackendError::Invalid(
                "cannot update a ticket without a key".to_string(),
            ));
        }
        let issue = Issue::from_ticket(ticket, &self.marker);
        self.send(
            self.request(Method::PUT, &format!("/issue/{}", ticket.key))
                .json(&issue),
            StatusCode::NO_CONTENT,
        )
        .await?;
        Ok(())
    }

    async fn reopen_ticket(&self, key: &str, comment: &str) -> Result<(), BackendError> {
        self.comment_and_transition(key, comment, Transition::reopens, "reopen")
            .await
    }

    async fn close_ticket(&self, key: &str, comment: &str) -> Result<(), BackendError> {
        self.comment_and_transition(key, comment, Transition::closes, "close")
            .await
    }

    async fn add_comment(&self, key: &str, comment: &str) -> Result<(), BackendError> {
        let body = CommentRequest {
            body: AdfDocument::paragraph(comment),
        };
        self.send(
            self.request(Method::POST, &format!("/issue/{key}/comment"))
                .json(&body),
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }
}
