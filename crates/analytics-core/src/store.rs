//! # Event Store
//!
//! Durable record of calls, raw call events, IVR selections, and transfer
//! attempts, backed by SQLite through sqlx.
//!
//! The write API keeps the two persistence shapes distinct: a call is an
//! idempotent entity (`upsert_call` inserts at most once per identifier),
//! everything else is an append-only log (`append_*` always adds a row and
//! requires the parent call to exist). The read methods exist solely for
//! the aggregation engine; there are no other mutations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{AnalyticsError, Result};
use crate::types::{to_store_ts, Department, TransferOutcome};

/// Schema is applied statement by statement on connect; every statement is
/// idempotent so reconnecting against an existing database is safe.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS calls (
        call_control_id TEXT PRIMARY KEY,
        from_number     TEXT NOT NULL,
        to_number       TEXT NOT NULL,
        created_at      TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_calls_created_at ON calls(created_at)",
    "CREATE TABLE IF NOT EXISTS call_events (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        call_control_id TEXT NOT NULL REFERENCES calls(call_control_id),
        event_type      TEXT NOT NULL,
        ts              TEXT NOT NULL,
        payload_json    TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_call_events_call ON call_events(call_control_id)",
    "CREATE TABLE IF NOT EXISTS ivr_interactions (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        call_control_id TEXT NOT NULL REFERENCES calls(call_control_id),
        digit           TEXT NOT NULL,
        department      TEXT NOT NULL CHECK (department IN ('sales', 'support', 'porting')),
        ts              TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_ivr_call ON ivr_interactions(call_control_id)",
    "CREATE INDEX IF NOT EXISTS idx_ivr_department ON ivr_interactions(department)",
    "CREATE TABLE IF NOT EXISTS transfers (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        call_control_id TEXT NOT NULL REFERENCES calls(call_control_id),
        to_sip_uri      TEXT NOT NULL,
        status          TEXT NOT NULL CHECK (status IN ('success', 'error')),
        ts              TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_transfers_call ON transfers(call_control_id)",
];

/// Row shape of the recent-call listing, joined to the call's latest IVR
/// selection (NULL columns when the call never made one).
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecentCallRow {
    pub call_control_id: String,
    pub department: Option<String>,
    pub digit: Option<String>,
    pub ts: String,
}

/// SQLite-backed event store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Connect and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!("event store ready at {}", database_url);
        Ok(store)
    }

    /// Private in-memory store. Pinned to a single connection so every
    /// handle sees the same memory database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---- writes ----------------------------------------------------------

    /// Insert a call if its identifier has not been seen before. Returns
    /// whether a new row was inserted; re-delivery of the same call is a
    /// no-op, not an error.
    pub async fn upsert_call(
        &self,
        call_control_id: &str,
        from_number: &str,
        to_number: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO calls (call_control_id, from_number, to_number, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(call_control_id) DO NOTHING",
        )
        .bind(call_control_id)
        .bind(from_number)
        .bind(to_number)
        .bind(to_store_ts(created_at))
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!("saved new call {}", call_control_id);
        }
        Ok(inserted)
    }

    /// Append a raw call event. Fails with [`AnalyticsError::UnknownCall`]
    /// when the call has never been recorded.
    pub async fn append_event(
        &self,
        call_control_id: &str,
        event_type: &str,
        ts: DateTime<Utc>,
        payload: Option<&serde_json::Value>,
    ) -> Result<()> {
        self.require_call(call_control_id).await?;

        sqlx::query(
            "INSERT INTO call_events (call_control_id, event_type, ts, payload_json)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(call_control_id)
        .bind(event_type)
        .bind(to_store_ts(ts))
        .bind(payload.map(|p| p.to_string()))
        .execute(&self.pool)
        .await?;

        debug!("logged event {} for call {}", event_type, call_control_id);
        Ok(())
    }

    /// Append a recognized IVR selection.
    pub async fn append_ivr_selection(
        &self,
        call_control_id: &str,
        digit: &str,
        department: Department,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        self.require_call(call_control_id).await?;

        sqlx::query(
            "INSERT INTO ivr_interactions (call_control_id, digit, department, ts)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(call_control_id)
        .bind(digit)
        .bind(department.as_str())
        .bind(to_store_ts(ts))
        .execute(&self.pool)
        .await?;

        debug!(
            "logged IVR selection {} -> {} for call {}",
            digit, department, call_control_id
        );
        Ok(())
    }

    /// Append a transfer attempt. The outcome is fixed at write time; a
    /// retried transfer lands as a new row.
    pub async fn append_transfer(
        &self,
        call_control_id: &str,
        to_sip_uri: &str,
        outcome: TransferOutcome,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        self.require_call(call_control_id).await?;

        sqlx::query(
            "INSERT INTO transfers (call_control_id, to_sip_uri, status, ts)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(call_control_id)
        .bind(to_sip_uri)
        .bind(outcome.as_str())
        .bind(to_store_ts(ts))
        .execute(&self.pool)
        .await?;

        debug!(
            "logged transfer {} to {} for call {}",
            outcome.as_str(),
            to_sip_uri,
            call_control_id
        );
        Ok(())
    }

    async fn require_call(&self, call_control_id: &str) -> Result<()> {
        let known: Option<i64> = sqlx::query_scalar("SELECT 1 FROM calls WHERE call_control_id = ?1")
            .bind(call_control_id)
            .fetch_optional(&self.pool)
            .await?;
        match known {
            Some(_) => Ok(()),
            None => Err(AnalyticsError::UnknownCall(call_control_id.to_string())),
        }
    }

    // ---- reads (aggregation engine only) ---------------------------------

    /// Distinct calls created at or after `cutoff`. With a department
    /// filter, only calls with at least one matching IVR selection count.
    pub async fn inbound_volume(&self, cutoff: &str, department: Option<Department>) -> Result<i64> {
        let volume: i64 = match department {
            Some(dept) => {
                sqlx::query_scalar(
                    "SELECT COUNT(DISTINCT c.call_control_id)
                     FROM calls c
                     LEFT JOIN ivr_interactions ivr ON c.call_control_id = ivr.call_control_id
                     WHERE c.created_at >= ?1 AND ivr.department = ?2",
                )
                .bind(cutoff)
                .bind(dept.as_str())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM calls WHERE created_at >= ?1")
                    .bind(cutoff)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(volume)
    }

    /// `(calls with a matching selection, calls considered)` in the window.
    /// The considered set is the same population `inbound_volume` counts.
    pub async fn selection_counts(
        &self,
        cutoff: &str,
        department: Option<Department>,
    ) -> Result<(i64, i64)> {
        match department {
            Some(dept) => {
                let with_selection: i64 = sqlx::query_scalar(
                    "SELECT COUNT(DISTINCT ivr.call_control_id)
                     FROM ivr_interactions ivr
                     JOIN calls c ON ivr.call_control_id = c.call_control_id
                     WHERE c.created_at >= ?1 AND ivr.department = ?2",
                )
                .bind(cutoff)
                .bind(dept.as_str())
                .fetch_one(&self.pool)
                .await?;
                let considered = self.inbound_volume(cutoff, Some(dept)).await?;
                Ok((with_selection, considered))
            }
            None => {
                let counts: (i64, i64) = sqlx::query_as(
                    "SELECT COUNT(DISTINCT ivr.call_control_id), COUNT(DISTINCT c.call_control_id)
                     FROM calls c
                     LEFT JOIN ivr_interactions ivr ON c.call_control_id = ivr.call_control_id
                     WHERE c.created_at >= ?1",
                )
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?;
                Ok(counts)
            }
        }
    }

    /// `(successful transfers, total transfers)` joined to calls in the
    /// window, optionally restricted to calls with a matching selection.
    pub async fn transfer_counts(
        &self,
        cutoff: &str,
        department: Option<Department>,
    ) -> Result<(i64, i64)> {
        let counts: (i64, i64) = match department {
            Some(dept) => {
                sqlx::query_as(
                    "SELECT COUNT(CASE WHEN t.status = 'success' THEN 1 END), COUNT(*)
                     FROM transfers t
                     JOIN calls c ON t.call_control_id = c.call_control_id
                     JOIN ivr_interactions ivr ON c.call_control_id = ivr.call_control_id
                     WHERE c.created_at >= ?1 AND ivr.department = ?2",
                )
                .bind(cutoff)
                .bind(dept.as_str())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT COUNT(CASE WHEN t.status = 'success' THEN 1 END), COUNT(*)
                     FROM transfers t
                     JOIN calls c ON t.call_control_id = c.call_control_id
                     WHERE c.created_at >= ?1",
                )
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(counts)
    }

    /// Distinct calls per UTC calendar day, newest day first. Days with no
    /// calls produce no row. With a department filter, calls matching the
    /// department or lacking any selection are included.
    pub async fn daily_volume(
        &self,
        cutoff: &str,
        department: Option<Department>,
    ) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = match department {
            Some(dept) => {
                sqlx::query_as(
                    "SELECT DATE(c.created_at) AS day, COUNT(DISTINCT c.call_control_id) AS calls
                     FROM calls c
                     LEFT JOIN ivr_interactions ivr ON c.call_control_id = ivr.call_control_id
                     WHERE c.created_at >= ?1 AND (ivr.department = ?2 OR ivr.department IS NULL)
                     GROUP BY DATE(c.created_at)
                     ORDER BY day DESC",
                )
                .bind(cutoff)
                .bind(dept.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT DATE(created_at) AS day, COUNT(*) AS calls
                     FROM calls
                     WHERE created_at >= ?1
                     GROUP BY DATE(created_at)
                     ORDER BY day DESC",
                )
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Most recent calls by creation time descending, ties in insertion
    /// order. Each call is joined to its latest IVR selection only; with a
    /// department filter, calls without a matching selection are excluded.
    pub async fn recent_calls(
        &self,
        limit: i64,
        department: Option<Department>,
    ) -> Result<Vec<RecentCallRow>> {
        let rows: Vec<RecentCallRow> = match department {
            Some(dept) => {
                sqlx::query_as(
                    "SELECT c.call_control_id, ivr.department AS department,
                            ivr.digit AS digit, c.created_at AS ts
                     FROM calls c
                     JOIN ivr_interactions ivr ON ivr.id = (
                         SELECT id FROM ivr_interactions latest
                         WHERE latest.call_control_id = c.call_control_id
                         ORDER BY latest.id DESC LIMIT 1
                     )
                     WHERE ivr.department = ?1
                     ORDER BY c.created_at DESC, c.rowid ASC
                     LIMIT ?2",
                )
                .bind(dept.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT c.call_control_id, ivr.department AS department,
                            ivr.digit AS digit, c.created_at AS ts
                     FROM calls c
                     LEFT JOIN ivr_interactions ivr ON ivr.id = (
                         SELECT id FROM ivr_interactions latest
                         WHERE latest.call_control_id = c.call_control_id
                         ORDER BY latest.id DESC LIMIT 1
                     )
                     ORDER BY c.created_at DESC, c.rowid ASC
                     LIMIT ?1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }
}
