//! Jira Cloud adapter.

mod client;
pub mod models;

pub use client::{JiraConfig, JiraTicketSystem};
