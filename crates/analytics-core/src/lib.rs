//! # IVR Analytics Core
//!
//! Event ingestion and analytics for a call-control IVR.
//!
//! This crate provides:
//! - A durable event store (calls, raw call events, IVR selections,
//!   transfer attempts) backed by SQLite
//! - Idempotent ingestion of webhook-derived call facts
//! - Rolling-window KPI, daily trend, and recent-call queries with
//!   department filtering
//!
//! ## Architecture
//!
//! Writes flow one direction: webhook facts -> [`IngestionRecorder`] ->
//! [`EventStore`]. Reads flow the other: [`AnalyticsEngine`] ->
//! [`EventStore`]. Ingestion write failures propagate to the caller for
//! its retry policy; analytics reads degrade to zero-valued or empty
//! reports when the store is unreachable, with the degradation logged
//! and counted.

pub mod config;
pub mod engine;
pub mod error;
pub mod recorder;
pub mod store;
pub mod types;

pub use config::AnalyticsConfig;
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, Result};
pub use recorder::{CallFact, IngestionRecorder};
pub use store::EventStore;
pub use types::{
    DashboardSnapshot, Department, DigitMap, KpiReport, RecentCall, RecentCallsReport,
    TransferOutcome, TrendPoint, TrendReport,
};
