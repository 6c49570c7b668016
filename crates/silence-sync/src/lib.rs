//! Reconciliation engine keeping alert silences and remediation tickets consistent.
//!
//! A silence is coupled to a ticket through a marker embedded in its free-text
//! comment. Each [`Reconciler::run`] walks the active silences and:
//!
//! - deletes silences whose ticket is resolved,
//! - extends silences of open tickets that are about to expire or already lapsed,
//! - reopens closed tickets whose alerts fire again and silences them anew.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use silence_sync::{AlertManager, Reconciler, SyncConfig, TicketSystem};
//!
//! async fn sync(am: Arc<dyn AlertManager>, tickets: Arc<dyn TicketSystem>) {
//!     let reconciler = Reconciler::new(am, tickets, SyncConfig::default());
//!     match reconciler.run().await {
//!         Ok(result) => println!("extended {}", result.silences_extended),
//!         Err(e) => eprintln!("sync failed: {e}"),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The engine only talks to its ports:
//!
//! - [`AlertManager`] for silences and alerts
//! - [`TicketSystem`] for tickets
//! - [`MetricsPublisher`] for observability, defaulting to [`NoopPublisher`]
//!
//! HTTP adapters live in the `silence-manager` crate.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alertmanager;
pub mod coupling;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod refire;
pub mod ticket;

pub use alertmanager::{Alert, AlertManager, Matcher, Silence, RECREATED_SILENCE_LABELS};
pub use coupling::{CouplingMarker, DEFAULT_PREFIX};
pub use error::{BackendError, MetricsError, SilenceError, SyncError};
pub use metrics::{seconds_until, MetricsPublisher, NoopPublisher};
pub use reconcile::{decide, Reconciler, RunResult, RunSummary, SilenceAction, SyncConfig};
pub use ticket::{Ticket, TicketStatus, TicketSystem};
