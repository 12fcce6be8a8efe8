//! Tests for the aggregation engine: KPI windows, rate edge cases, trend
//! grouping, recent-call ordering, and the soft-fail read path.

use chrono::{DateTime, Duration, Utc};
use ivr_analytics_core::types::to_store_ts;
use ivr_analytics_core::{AnalyticsEngine, Department, EventStore, TransferOutcome};
use tempfile::TempDir;

async fn create_test_engine() -> (AnalyticsEngine, EventStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let store = EventStore::connect(&db_url)
        .await
        .expect("Failed to create test database");
    let engine = AnalyticsEngine::new(store.clone());

    (engine, store, temp_dir)
}

async fn seed_call(
    store: &EventStore,
    id: &str,
    created_at: DateTime<Utc>,
    selection: Option<(&str, Department)>,
    transfer: Option<TransferOutcome>,
) {
    store.upsert_call(id, "+15550100", "+15550199", created_at).await.unwrap();
    if let Some((digit, dept)) = selection {
        store
            .append_ivr_selection(id, digit, dept, created_at)
            .await
            .unwrap();
    }
    if let Some(outcome) = transfer {
        store
            .append_transfer(id, "sip:agent@example.com", outcome, created_at)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_empty_window_yields_exact_zero_rates() {
    let (engine, _store, _temp_dir) = create_test_engine().await;

    let report = engine.kpis(None).await;

    assert_eq!(report.window, "24h");
    assert_eq!(report.department, "all");
    assert_eq!(report.inbound_volume, 0);
    assert_eq!(report.selection_rate, 0.0);
    assert_eq!(report.transfer_success, 0.0);
    assert_eq!(engine.degraded_reads(), 0);
}

#[tokio::test]
async fn test_sales_round_trip() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    seed_call(
        &store,
        "cc-1",
        Utc::now(),
        Some(("1", Department::Sales)),
        Some(TransferOutcome::Success),
    )
    .await;

    let report = engine.kpis(Some(Department::Sales)).await;

    assert_eq!(report.department, "sales");
    assert_eq!(report.inbound_volume, 1);
    assert_eq!(report.selection_rate, 1.0);
    assert_eq!(report.transfer_success, 1.0);
}

#[tokio::test]
async fn test_dashboard_three_call_scenario() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    let now = Utc::now();

    seed_call(&store, "A", now, Some(("1", Department::Sales)), Some(TransferOutcome::Success)).await;
    seed_call(&store, "B", now, Some(("2", Department::Support)), Some(TransferOutcome::Error)).await;
    seed_call(&store, "C", now, None, None).await;

    let snapshot = engine.dashboard().await;

    assert_eq!(snapshot.all.inbound_volume, 3);
    assert_eq!(snapshot.sales.inbound_volume, 1);
    assert_eq!(snapshot.support.inbound_volume, 1);
    assert_eq!(snapshot.porting.inbound_volume, 0);

    // 2 of 3 calls selected a department; 1 of 2 transfers succeeded.
    assert_eq!(snapshot.all.selection_rate, 0.667);
    assert_eq!(snapshot.all.transfer_success, 0.5);
    assert_eq!(snapshot.sales.transfer_success, 1.0);
    assert_eq!(snapshot.support.transfer_success, 0.0);
    assert_eq!(snapshot.porting.selection_rate, 0.0);
}

#[tokio::test]
async fn test_rates_round_to_three_decimals() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    let now = Utc::now();
    seed_call(&store, "cc-1", now, Some(("1", Department::Sales)), None).await;

    // One success out of three attempts: 1/3 rounds to 0.333.
    for outcome in [TransferOutcome::Success, TransferOutcome::Error, TransferOutcome::Error] {
        store
            .append_transfer("cc-1", "sip:agent@example.com", outcome, now)
            .await
            .unwrap();
    }

    let report = engine.kpis(None).await;
    assert_eq!(report.transfer_success, 0.333);
}

#[tokio::test]
async fn test_kpi_window_excludes_old_calls() {
    let (engine, store, _temp_dir) = create_test_engine().await;

    seed_call(&store, "old", Utc::now() - Duration::hours(30), None, None).await;
    seed_call(&store, "new", Utc::now(), None, None).await;

    let report = engine.kpis(None).await;
    assert_eq!(report.inbound_volume, 1);
}

#[tokio::test]
async fn test_trend_groups_by_day_and_respects_window() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    let now = Utc::now();

    seed_call(&store, "today-1", now, None, None).await;
    seed_call(&store, "today-2", now, None, None).await;
    let two_days_ago = now - Duration::days(2);
    seed_call(&store, "earlier", two_days_ago, None, None).await;
    seed_call(&store, "ancient", now - Duration::days(10), None, None).await;

    let report = engine.trend(7, None).await;

    assert_eq!(report.days, 7);
    assert_eq!(report.department, "all");
    // Two days carry calls; days with zero calls are simply absent, and
    // the 10-day-old call is outside the window.
    assert_eq!(report.trend.len(), 2);
    assert_eq!(report.trend[0].day, to_store_ts(now)[..10].to_string());
    assert_eq!(report.trend[0].calls, 2);
    assert_eq!(report.trend[1].day, to_store_ts(two_days_ago)[..10].to_string());
    assert_eq!(report.trend[1].calls, 1);
}

#[tokio::test]
async fn test_trend_department_filter_keeps_unresolved_calls() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    let now = Utc::now();

    seed_call(&store, "support-call", now, Some(("2", Department::Support)), None).await;
    seed_call(&store, "no-selection", now, None, None).await;

    let report = engine.trend(7, Some(Department::Sales)).await;

    // Calls routed elsewhere are excluded; calls with no selection stay in.
    assert_eq!(report.trend.len(), 1);
    assert_eq!(report.trend[0].calls, 1);
}

#[tokio::test]
async fn test_trend_days_are_clamped() {
    let (engine, _store, _temp_dir) = create_test_engine().await;

    assert_eq!(engine.trend(0, None).await.days, 1);
    assert_eq!(engine.trend(9999, None).await.days, 365);
}

#[tokio::test]
async fn test_recent_calls_order_and_tie_break() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    let now = Utc::now();

    seed_call(&store, "oldest", now - Duration::minutes(10), None, None).await;
    // Two calls share a creation timestamp; insertion order breaks the tie.
    seed_call(&store, "tie-first", now, None, None).await;
    seed_call(&store, "tie-second", now, None, None).await;

    let report = engine.recent_calls(20, None).await;

    let ids: Vec<_> = report.calls.iter().map(|c| c.call_control_id.as_str()).collect();
    assert_eq!(ids, vec!["tie-first", "tie-second", "oldest"]);
}

#[tokio::test]
async fn test_recent_calls_department_filter_excludes_unresolved() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    let now = Utc::now();

    seed_call(&store, "sales-call", now, Some(("1", Department::Sales)), None).await;
    seed_call(&store, "no-selection", now, None, None).await;

    let unfiltered = engine.recent_calls(20, None).await;
    assert_eq!(unfiltered.calls.len(), 2);
    let unresolved = unfiltered
        .calls
        .iter()
        .find(|c| c.call_control_id == "no-selection")
        .unwrap();
    assert_eq!(unresolved.department, None);
    assert_eq!(unresolved.digit, None);

    let filtered = engine.recent_calls(20, Some(Department::Sales)).await;
    assert_eq!(filtered.calls.len(), 1);
    assert_eq!(filtered.calls[0].call_control_id, "sales-call");
    assert_eq!(filtered.calls[0].department, Some(Department::Sales));
}

#[tokio::test]
async fn test_recent_calls_limit_is_clamped() {
    let (engine, _store, _temp_dir) = create_test_engine().await;

    let report = engine.recent_calls(5000, None).await;
    assert_eq!(report.limit, 1000);

    let report = engine.recent_calls(0, None).await;
    assert_eq!(report.limit, 1);
}

#[tokio::test]
async fn test_reads_degrade_when_store_is_unreachable() {
    let (engine, store, _temp_dir) = create_test_engine().await;
    store.pool().close().await;

    let kpis = engine.kpis(Some(Department::Sales)).await;
    assert_eq!(kpis.window, "24h");
    assert_eq!(kpis.department, "sales");
    assert_eq!(kpis.inbound_volume, 0);
    assert_eq!(kpis.selection_rate, 0.0);
    assert_eq!(engine.degraded_reads(), 1);

    let trend = engine.trend(7, None).await;
    assert!(trend.trend.is_empty());

    let recent = engine.recent_calls(20, None).await;
    assert!(recent.calls.is_empty());

    assert_eq!(engine.degraded_reads(), 3);
}
