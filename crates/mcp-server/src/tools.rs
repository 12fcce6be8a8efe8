//! Tool registry and dispatch for the analytics query interface.
//!
//! Exactly four operations are exposed: `get_kpis`, `get_trend`,
//! `list_calls`, and `get_dashboard`. Parameters are validated and
//! defaulted here before the engine is invoked; out-of-range numerics are
//! clamped to the nearest bound, and an unrecognized department string is
//! a caller error. An unknown tool name is a hard error, distinct from the
//! engine's degraded (zero-valued) results.
//!
//! Responses are built from serde structs and `serde_json` maps, which are
//! ordered, so every response serializes with stable key order.

use ivr_analytics_core::engine::{
    AnalyticsEngine, DEFAULT_RECENT_LIMIT, DEFAULT_TREND_DAYS, MAX_RECENT_LIMIT, MAX_TREND_DAYS,
};
use ivr_analytics_core::Department;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Errors surfaced to the tool caller.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested operation does not exist.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Malformed or out-of-enumeration parameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A well-formed result could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidParams(_) => "invalid_params",
            ToolError::Serialization(_) => "serialization",
        }
    }
}

/// Advertised shape of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Default, Deserialize)]
struct KpiParams {
    department: Option<Department>,
}

#[derive(Debug, Deserialize)]
struct TrendParams {
    #[serde(default = "default_days")]
    days: i64,
    department: Option<Department>,
}

#[derive(Debug, Deserialize)]
struct ListCallsParams {
    #[serde(default = "default_limit")]
    limit: i64,
    department: Option<Department>,
}

fn default_days() -> i64 {
    DEFAULT_TREND_DAYS as i64
}

fn default_limit() -> i64 {
    DEFAULT_RECENT_LIMIT as i64
}

/// Out-of-range numerics are clamped to the nearest bound rather than
/// rejected, so a sloppy caller still gets a meaningful result.
fn clamp_to_u32(value: i64, max: u32) -> u32 {
    value.clamp(1, i64::from(max)) as u32
}

fn parse_params<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Dispatches named tool calls to the analytics engine.
pub struct ToolRouter {
    engine: AnalyticsEngine,
}

impl ToolRouter {
    pub fn new(engine: AnalyticsEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &AnalyticsEngine {
        &self.engine
    }

    /// Descriptors for every exposed tool, for transport-level discovery.
    pub fn tools() -> Vec<ToolDescriptor> {
        let department_schema = json!({
            "type": "string",
            "enum": ["sales", "support", "porting"],
        });

        vec![
            ToolDescriptor {
                name: "get_kpis",
                description: "24-hour call KPIs: inbound volume, IVR selection rate, transfer success rate",
                input_schema: json!({
                    "type": "object",
                    "properties": { "department": department_schema },
                }),
            },
            ToolDescriptor {
                name: "get_trend",
                description: "Daily call volume over a trailing window of days",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "days": { "type": "integer", "minimum": 1, "maximum": MAX_TREND_DAYS, "default": DEFAULT_TREND_DAYS },
                        "department": department_schema,
                    },
                }),
            },
            ToolDescriptor {
                name: "list_calls",
                description: "Most recent calls with their IVR selection and department",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "limit": { "type": "integer", "minimum": 1, "maximum": MAX_RECENT_LIMIT, "default": DEFAULT_RECENT_LIMIT },
                        "department": department_schema,
                    },
                }),
            },
            ToolDescriptor {
                name: "get_dashboard",
                description: "KPI snapshot for all departments plus the unfiltered total",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    /// Invoke a tool by name. Engine-side store trouble never surfaces
    /// here; the engine degrades to zero-valued reports on its own.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        match name {
            "get_kpis" => {
                let params: KpiParams = parse_params(args)?;
                let report = self.engine.kpis(params.department).await;
                Ok(serde_json::to_value(report)?)
            }
            "get_trend" => {
                let params: TrendParams = parse_params(args)?;
                let days = clamp_to_u32(params.days, MAX_TREND_DAYS);
                let report = self.engine.trend(days, params.department).await;
                Ok(serde_json::to_value(report)?)
            }
            "list_calls" => {
                let params: ListCallsParams = parse_params(args)?;
                let limit = clamp_to_u32(params.limit, MAX_RECENT_LIMIT);
                let report = self.engine.recent_calls(limit, params.department).await;
                Ok(serde_json::to_value(report)?)
            }
            "get_dashboard" => {
                let snapshot = self.engine.dashboard().await;
                Ok(serde_json::to_value(snapshot)?)
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
