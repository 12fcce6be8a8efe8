//! Configuration for the analytics stack

use serde::Deserialize;

/// Runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// sqlx database URL for the event store.
    pub database_url: String,
}

impl AnalyticsConfig {
    /// Load configuration from the environment. `ANALYTICS_DB` overrides
    /// the default on-disk database.
    pub fn from_env() -> Self {
        match std::env::var("ANALYTICS_DB") {
            Ok(url) if !url.is_empty() => Self { database_url: url },
            _ => Self::default(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://analytics.sqlite?mode=rwc".to_string(),
        }
    }
}
