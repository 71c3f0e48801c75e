//! Recovery-driver scenarios: widening catch-ups, single-page replays,
//! and the inert middle band.

mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cinedex_core::RecoveryDriver;
use cinedex_model::{CollectType, FailureRecord};
use support::*;

fn failure(hour: i64, page: i64, age_hours: i64) -> FailureRecord {
    FailureRecord {
        id: 0,
        origin_id: "s1".into(),
        origin_name: "s1 upstream".into(),
        uri: "https://s1.upstream.test/api.php/provide/vod/".into(),
        collect_type: CollectType::Video,
        page_number: page,
        hour,
        cause: "decode failed".into(),
        status: 1,
        // A 30 second guard keeps the elapsed-hours ceiling stable even
        // on a slow test runner.
        created_at: Utc::now() - chrono::Duration::hours(age_hours)
            + chrono::Duration::seconds(30),
    }
}

fn driver(h: &Harness) -> RecoveryDriver {
    RecoveryDriver::new(
        h.supervisor.clone(),
        h.failures.clone(),
        h.sources.clone(),
    )
}

#[tokio::test]
async fn aged_failure_widens_into_a_fleet_catch_up() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(standard_responder(1, 1)),
    );
    h.failures.preload(failure(200, 5, 50));

    driver(&h).full_recover().await.expect("recover");

    assert_eq!(h.failures.statuses(), vec![(1, 0)], "record marked retried");
    // The catch-up fleet launch is fire-and-forget; wait for its probe.
    assert!(
        wait_until(
            || h.fetcher.calls_with("h", "250") >= 1,
            Duration::from_secs(2)
        )
        .await,
        "auto collect launched with the widened window"
    );
    // The specific failed page is not replayed directly.
    assert_eq!(h.fetcher.calls_with("h", "200"), 0);
}

#[tokio::test]
async fn widening_subsumes_later_failures_of_the_same_class() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(standard_responder(1, 1)),
    );
    h.failures.preload(failure(200, 5, 50));
    h.failures.preload(failure(210, 7, 20));
    h.failures.preload(failure(-1, 3, 10));

    driver(&h).full_recover().await.expect("recover");

    // One class-wide update retired all three; the full-dump record was
    // not replayed page-by-page.
    assert!(
        h.failures
            .records
            .lock()
            .iter()
            .all(|r| r.status == 0)
    );
    assert!(
        wait_until(
            || h.fetcher.calls_with("h", "250") >= 1,
            Duration::from_secs(2)
        )
        .await
    );
    assert_eq!(h.fetcher.calls_with("pg", "3"), 0);
}

#[tokio::test]
async fn full_dump_failure_replays_only_its_page() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(standard_responder(1, 1)),
    );
    h.failures.preload(failure(-1, 7, 2));

    driver(&h).full_recover().await.expect("recover");

    assert_eq!(h.failures.statuses(), vec![(1, 0)]);
    assert_eq!(h.fetcher.calls_with("pg", "7"), 1, "exactly one page replay");
    assert_eq!(h.fetcher.calls_with("ac", "list"), 0, "no probe, no fleet");
    // The replayed page materialized its film.
    assert_eq!(h.cache.state.lock().details.len(), 1);
}

#[tokio::test]
async fn window_between_the_bands_is_left_pending() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(standard_responder(1, 1)),
    );
    h.failures.preload(failure(1000, 2, 30));

    driver(&h).full_recover().await.expect("recover");

    assert_eq!(h.failures.statuses(), vec![(1, 1)], "record stays pending");
    assert_eq!(h.fetcher.call_count(), 0);
}

#[tokio::test]
async fn recovery_on_an_empty_log_is_a_no_op() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(standard_responder(1, 1)),
    );

    driver(&h).full_recover().await.expect("recover");
    driver(&h).full_recover().await.expect("replay is idempotent");

    assert_eq!(h.fetcher.call_count(), 0);
    assert!(h.failures.records.lock().is_empty());
}

#[tokio::test]
async fn single_recover_applies_the_same_policy() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(|_uri, params: &HashMap<String, String>| {
            match params.get("ac").map(String::as_str) {
                Some("list") => json_probe(1),
                _ => json_page(1, 1),
            }
        }),
    );
    let record = {
        h.failures.preload(failure(5000, 9, 1));
        h.failures.records.lock()[0].clone()
    };

    driver(&h).single_recover(&record).await.expect("recover");

    assert_eq!(h.failures.statuses(), vec![(1, 0)]);
    assert_eq!(h.fetcher.calls_with("pg", "9"), 1);
}

#[tokio::test]
async fn replay_for_a_deleted_source_is_dropped_quietly() {
    let h = harness(vec![], ScriptedFetcher::new(standard_responder(1, 1)));
    h.failures.preload(failure(-1, 4, 1));

    driver(&h).full_recover().await.expect("recover");

    assert_eq!(h.failures.statuses(), vec![(1, 0)], "still marked retried");
    assert_eq!(h.fetcher.call_count(), 0);
}

#[tokio::test]
async fn drivers_share_the_supervisor_registry() {
    let h = harness(
        vec![master_source("s1")],
        ScriptedFetcher::new(standard_responder(1, 1)).with_delay(Duration::from_millis(40)),
    );
    let driver = Arc::new(driver(&h));

    h.failures.preload(failure(200, 5, 50));
    driver.full_recover().await.expect("recover");

    // The widened catch-up runs through the same single-flight registry
    // as any other collection.
    assert!(
        wait_until(|| h.supervisor.is_task_running("s1"), Duration::from_secs(2)).await,
        "catch-up task registered under its site id"
    );
    assert!(
        wait_until(
            || !h.supervisor.is_task_running("s1"),
            Duration::from_secs(2)
        )
        .await,
        "catch-up task unregistered when done"
    );
}
