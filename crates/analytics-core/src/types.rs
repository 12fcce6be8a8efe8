//! Core types for the analytics stack

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Label of the fixed 24-hour KPI window.
pub const WINDOW_24H: &str = "24h";

/// Department a caller can be routed to.
///
/// Closed set: anything outside it is rejected at the boundary and never
/// reaches the store. A call with no recognized selection is represented
/// as `Option::<Department>::None`, not as a sentinel string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Sales,
    Support,
    Porting,
}

impl Department {
    pub const ALL: [Department; 3] = [Department::Sales, Department::Support, Department::Porting];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Sales => "sales",
            Department::Support => "support",
            Department::Porting => "porting",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales" => Ok(Department::Sales),
            "support" => Ok(Department::Support),
            "porting" => Ok(Department::Porting),
            other => Err(AnalyticsError::Validation {
                field: "department",
                message: format!("must be one of sales, support, porting (got '{other}')"),
            }),
        }
    }
}

/// Outcome of a transfer attempt, fixed at write time. A retried transfer
/// is a new row, never an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    Success,
    Error,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Success => "success",
            TransferOutcome::Error => "error",
        }
    }
}

impl FromStr for TransferOutcome {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(TransferOutcome::Success),
            "error" => Ok(TransferOutcome::Error),
            other => Err(AnalyticsError::Validation {
                field: "outcome",
                message: format!("must be success or error (got '{other}')"),
            }),
        }
    }
}

/// Digit-to-department routing policy, supplied by the IVR boundary.
#[derive(Debug, Clone)]
pub struct DigitMap(HashMap<String, Department>);

impl DigitMap {
    pub fn new(map: HashMap<String, Department>) -> Self {
        Self(map)
    }

    pub fn resolve(&self, digit: &str) -> Option<Department> {
        self.0.get(digit).copied()
    }
}

impl Default for DigitMap {
    /// The menu the voice prompt announces: 1 Sales, 2 Support, 3 Porting.
    fn default() -> Self {
        Self(HashMap::from([
            ("1".to_string(), Department::Sales),
            ("2".to_string(), Department::Support),
            ("3".to_string(), Department::Porting),
        ]))
    }
}

/// Report label for an optional department filter.
pub fn department_label(filter: Option<Department>) -> &'static str {
    filter.map(|d| d.as_str()).unwrap_or("all")
}

/// Storage timestamp format: fixed-width RFC 3339 UTC with millisecond
/// precision, so lexicographic order is chronological and SQLite's date
/// functions parse it directly.
pub fn to_store_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 24-hour KPI record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    pub window: String,
    pub department: String,
    pub inbound_volume: i64,
    pub selection_rate: f64,
    pub transfer_success: f64,
}

impl KpiReport {
    /// Zero-valued report: an empty window, or a degraded read.
    pub fn zeroed(department: Option<Department>) -> Self {
        Self {
            window: WINDOW_24H.to_string(),
            department: department_label(department).to_string(),
            inbound_volume: 0,
            selection_rate: 0.0,
            transfer_success: 0.0,
        }
    }
}

/// One day of call volume. Days with zero calls are absent from trends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day: String,
    pub calls: i64,
}

/// Daily call volume over a trailing window, newest day first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub days: u32,
    pub department: String,
    pub trend: Vec<TrendPoint>,
}

/// One row of the recent-call listing. `department`/`digit` are `None`
/// when the call had no recognized IVR selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentCall {
    pub call_control_id: String,
    pub department: Option<Department>,
    pub digit: Option<String>,
    pub ts: String,
}

/// Recent calls by creation time descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentCallsReport {
    pub limit: u32,
    pub department: String,
    pub calls: Vec<RecentCall>,
}

/// Unfiltered KPIs plus one record per department.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub all: KpiReport,
    pub sales: KpiReport,
    pub support: KpiReport,
    pub porting: KpiReport,
}
