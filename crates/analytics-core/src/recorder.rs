//! # Ingestion Recorder
//!
//! Turns webhook-derived call facts into idempotent writes against the
//! event store. "Call initiated" facts are de-duplicated by identifier;
//! every other fact is appended unconditionally — the store is the system
//! of record, and duplicate deliveries land as duplicate rows (KPI queries
//! count distinct call identifiers, not rows). Write failures propagate to
//! the webhook boundary for its retry policy.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::EventStore;
use crate::types::{Department, DigitMap, TransferOutcome};

/// A parsed call-control fact as delivered by the webhook boundary.
#[derive(Debug, Clone)]
pub enum CallFact {
    Initiated {
        call_control_id: String,
        from_number: String,
        to_number: String,
        payload: Value,
    },
    GatherEnded {
        call_control_id: String,
        digit: String,
        payload: Value,
    },
    Hangup {
        call_control_id: String,
        payload: Value,
    },
    Other {
        call_control_id: String,
        event_type: String,
        payload: Value,
    },
}

impl CallFact {
    /// Parse a provider webhook envelope (`data.event_type` plus
    /// `data.payload`). Returns `None` when the envelope carries no event
    /// type or no call identifier; such deliveries are acknowledged and
    /// dropped upstream.
    pub fn from_webhook(body: &Value) -> Option<CallFact> {
        let data = body.get("data")?;
        let event_type = data.get("event_type")?.as_str()?;
        let payload = data.get("payload").cloned().unwrap_or(Value::Null);
        let call_control_id = payload.get("call_control_id")?.as_str()?.to_string();

        let fact = match event_type {
            "call.initiated" => CallFact::Initiated {
                from_number: str_field(&payload, "from").unwrap_or_else(|| "unknown".to_string()),
                to_number: str_field(&payload, "to").unwrap_or_else(|| "unknown".to_string()),
                call_control_id,
                payload,
            },
            "call.gather.ended" => CallFact::GatherEnded {
                digit: extract_digits(&payload),
                call_control_id,
                payload,
            },
            "call.hangup" => CallFact::Hangup {
                call_control_id,
                payload,
            },
            other => CallFact::Other {
                event_type: other.to_string(),
                call_control_id,
                payload,
            },
        };
        Some(fact)
    }

    pub fn call_control_id(&self) -> &str {
        match self {
            CallFact::Initiated { call_control_id, .. }
            | CallFact::GatherEnded { call_control_id, .. }
            | CallFact::Hangup { call_control_id, .. }
            | CallFact::Other { call_control_id, .. } => call_control_id,
        }
    }
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Gather results land in different fields depending on the gather command
/// used: `digit`, `digits`, or nested under `result`/`dtmf`.
fn extract_digits(payload: &Value) -> String {
    for key in ["digit", "digits"] {
        if let Some(d) = payload.get(key).and_then(|v| v.as_str()) {
            let d = d.trim();
            if !d.is_empty() {
                return d.to_string();
            }
        }
    }
    for key in ["result", "dtmf"] {
        if let Some(nested) = payload.get(key) {
            for inner in ["digits", "digit"] {
                if let Some(d) = nested.get(inner).and_then(|v| v.as_str()) {
                    let d = d.trim();
                    if !d.is_empty() {
                        return d.to_string();
                    }
                }
            }
        }
    }
    String::new()
}

/// Records webhook facts against the store.
pub struct IngestionRecorder {
    store: EventStore,
    digit_map: DigitMap,
    // First-delivery tracking for call.initiated; the store-level upsert
    // guard still applies after a restart empties this set.
    seen_calls: DashSet<String>,
}

impl IngestionRecorder {
    pub fn new(store: EventStore) -> Self {
        Self::with_digit_map(store, DigitMap::default())
    }

    pub fn with_digit_map(store: EventStore, digit_map: DigitMap) -> Self {
        Self {
            store,
            digit_map,
            seen_calls: DashSet::new(),
        }
    }

    /// Record a first-seen call. Duplicate deliveries are a no-op; returns
    /// whether a new call row was created.
    pub async fn call_initiated(
        &self,
        call_control_id: &str,
        from_number: &str,
        to_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        if !self.seen_calls.insert(call_control_id.to_string()) {
            debug!("duplicate call.initiated for {}, skipping", call_control_id);
            return Ok(false);
        }

        let inserted = match self
            .store
            .upsert_call(call_control_id, from_number, to_number, at)
            .await
        {
            Ok(inserted) => inserted,
            Err(err) => {
                // Let a redelivery retry the write.
                self.seen_calls.remove(call_control_id);
                return Err(err);
            }
        };

        if inserted {
            info!("recorded new call {}", call_control_id);
        }
        Ok(inserted)
    }

    /// Resolve a digit against the routing policy and record the selection.
    /// Unrecognized digits record nothing and return `None`; the call then
    /// reads as "no selection" to the aggregation engine.
    pub async fn ivr_selection(
        &self,
        call_control_id: &str,
        digit: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Department>> {
        let Some(department) = self.digit_map.resolve(digit) else {
            warn!("unrecognized IVR digit '{}' for call {}", digit, call_control_id);
            return Ok(None);
        };

        self.store
            .append_ivr_selection(call_control_id, digit, department, at)
            .await?;
        Ok(Some(department))
    }

    /// Record a transfer attempt with its outcome.
    pub async fn transfer_result(
        &self,
        call_control_id: &str,
        to_sip_uri: &str,
        outcome: TransferOutcome,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .append_transfer(call_control_id, to_sip_uri, outcome, at)
            .await
    }

    /// Record an arbitrary call event with its raw payload.
    pub async fn raw_event(
        &self,
        call_control_id: &str,
        event_type: &str,
        payload: Option<&Value>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .append_event(call_control_id, event_type, at, payload)
            .await
    }

    /// Ingest one parsed webhook fact.
    pub async fn ingest(&self, fact: &CallFact, at: DateTime<Utc>) -> Result<()> {
        match fact {
            CallFact::Initiated {
                call_control_id,
                from_number,
                to_number,
                payload,
            } => {
                self.call_initiated(call_control_id, from_number, to_number, at)
                    .await?;
                self.raw_event(call_control_id, "call.initiated", Some(payload), at)
                    .await?;
            }
            CallFact::GatherEnded {
                call_control_id,
                digit,
                payload,
            } => {
                self.raw_event(call_control_id, "call.gather.ended", Some(payload), at)
                    .await?;
                if !digit.is_empty() {
                    self.ivr_selection(call_control_id, digit, at).await?;
                }
            }
            CallFact::Hangup {
                call_control_id,
                payload,
            } => {
                self.raw_event(call_control_id, "call.hangup", Some(payload), at)
                    .await?;
            }
            CallFact::Other {
                call_control_id,
                event_type,
                payload,
            } => {
                self.raw_event(call_control_id, event_type, Some(payload), at)
                    .await?;
            }
        }
        Ok(())
    }
}
