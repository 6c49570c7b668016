//! Prometheus Alertmanager adapter.

mod client;
pub mod models;

pub use client::{AlertManagerConfig, Auth, PrometheusAlertManager};
