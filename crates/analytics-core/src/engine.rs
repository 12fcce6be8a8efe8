//! # Aggregation Engine
//!
//! Read-only analytical queries over the event store: 24-hour KPIs, daily
//! trend series, recent-call listings, and the dashboard fan-out.
//!
//! Reads fail soft: when the store cannot be reached the engine serves a
//! zero-valued or empty report instead of propagating the error, so the
//! query interface always has a well-formed body to return. Each such
//! degradation is logged and counted so the masking stays observable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::error;

use crate::error::{AnalyticsError, Result};
use crate::store::EventStore;
use crate::types::{
    department_label, to_store_ts, DashboardSnapshot, Department, KpiReport, RecentCall,
    RecentCallsReport, TrendPoint, TrendReport, WINDOW_24H,
};

pub const DEFAULT_TREND_DAYS: u32 = 7;
pub const MAX_TREND_DAYS: u32 = 365;
pub const DEFAULT_RECENT_LIMIT: u32 = 20;
pub const MAX_RECENT_LIMIT: u32 = 1000;

#[derive(Clone)]
pub struct AnalyticsEngine {
    store: EventStore,
    degraded_reads: Arc<AtomicU64>,
}

impl AnalyticsEngine {
    pub fn new(store: EventStore) -> Self {
        Self {
            store,
            degraded_reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of reads served degraded because the store was unreachable.
    pub fn degraded_reads(&self) -> u64 {
        self.degraded_reads.load(Ordering::Relaxed)
    }

    fn degrade(&self, query: &str, err: &AnalyticsError) {
        self.degraded_reads.fetch_add(1, Ordering::Relaxed);
        error!("{} read failed, serving degraded result: {}", query, err);
    }

    /// KPIs over the fixed trailing 24-hour window, optionally restricted
    /// to one department.
    pub async fn kpis(&self, department: Option<Department>) -> KpiReport {
        match self.kpis_inner(department).await {
            Ok(report) => report,
            Err(err) => {
                self.degrade("kpis", &err);
                KpiReport::zeroed(department)
            }
        }
    }

    async fn kpis_inner(&self, department: Option<Department>) -> Result<KpiReport> {
        let cutoff = to_store_ts(Utc::now() - Duration::hours(24));

        let inbound_volume = self.store.inbound_volume(&cutoff, department).await?;
        let (with_selection, considered) = self.store.selection_counts(&cutoff, department).await?;
        let (successful, attempted) = self.store.transfer_counts(&cutoff, department).await?;

        Ok(KpiReport {
            window: WINDOW_24H.to_string(),
            department: department_label(department).to_string(),
            inbound_volume,
            selection_rate: round3(rate(with_selection, considered)),
            transfer_success: round3(rate(successful, attempted)),
        })
    }

    /// Daily call volume over a trailing window of `days` days (clamped to
    /// [1, 365]), newest day first. Days with zero calls are absent.
    pub async fn trend(&self, days: u32, department: Option<Department>) -> TrendReport {
        let days = days.clamp(1, MAX_TREND_DAYS);
        let trend = match self.trend_inner(days, department).await {
            Ok(points) => points,
            Err(err) => {
                self.degrade("trend", &err);
                Vec::new()
            }
        };
        TrendReport {
            days,
            department: department_label(department).to_string(),
            trend,
        }
    }

    async fn trend_inner(&self, days: u32, department: Option<Department>) -> Result<Vec<TrendPoint>> {
        let cutoff = to_store_ts(Utc::now() - Duration::days(i64::from(days)));
        let rows = self.store.daily_volume(&cutoff, department).await?;
        Ok(rows
            .into_iter()
            .map(|(day, calls)| TrendPoint { day, calls })
            .collect())
    }

    /// Most recent calls by creation time descending (limit clamped to
    /// [1, 1000]). Unfiltered listings include calls without a selection;
    /// department-filtered listings exclude them.
    pub async fn recent_calls(
        &self,
        limit: u32,
        department: Option<Department>,
    ) -> RecentCallsReport {
        let limit = limit.clamp(1, MAX_RECENT_LIMIT);
        let calls = match self.recent_calls_inner(limit, department).await {
            Ok(calls) => calls,
            Err(err) => {
                self.degrade("recent_calls", &err);
                Vec::new()
            }
        };
        RecentCallsReport {
            limit,
            department: department_label(department).to_string(),
            calls,
        }
    }

    async fn recent_calls_inner(
        &self,
        limit: u32,
        department: Option<Department>,
    ) -> Result<Vec<RecentCall>> {
        let rows = self.store.recent_calls(i64::from(limit), department).await?;
        Ok(rows
            .into_iter()
            .map(|row| RecentCall {
                call_control_id: row.call_control_id,
                department: row.department.as_deref().and_then(|d| d.parse().ok()),
                digit: row.digit,
                ts: row.ts,
            })
            .collect())
    }

    /// Dashboard snapshot: unfiltered KPIs plus one record per department.
    /// Pure fan-out over [`AnalyticsEngine::kpis`].
    pub async fn dashboard(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            all: self.kpis(None).await,
            sales: self.kpis(Some(Department::Sales)).await,
            support: self.kpis(Some(Department::Support)).await,
            porting: self.kpis(Some(Department::Porting)).await,
        }
    }
}

/// Guarded division: exactly 0.0 on an empty denominator, never NaN.
fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Three decimal places, half away from zero.
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
