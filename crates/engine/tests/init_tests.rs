//! Initialization sequence tests: state loading, error reporting and
//! the refresh arming that follows.

mod common;

use common::{fixture, NOW};
use std::sync::atomic::Ordering;
use tally_types::TallyError;

#[tokio::test]
async fn first_run_reports_ok_and_arms_an_immediate_refresh() {
    let fx = fixture();
    fx.ledger.initialize().await;

    assert_eq!(fx.host.init_reports(), vec![Ok(())]);
    assert!(fx.ledger.is_initialized());

    // Never refreshed before: the refresh timer fires immediately.
    let timers = fx.host.armed_timers();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].0, 0);
    assert!(fx.ledger.refresh().is_armed());
}

#[tokio::test]
async fn persisted_settings_are_applied_on_startup() {
    let fx = fixture();
    *fx.host.publisher_state.lock().unwrap() = Some(
        r#"{
            "min_publisher_duration": 5000,
            "min_visits": 2,
            "allow_non_verified": false,
            "allow_videos": true,
            "pubs_load_timestamp": 1529990000
        }"#
        .to_string(),
    );
    fx.ledger.initialize().await;

    assert_eq!(fx.host.init_reports(), vec![Ok(())]);
    assert_eq!(fx.ledger.publisher_min_visit_duration(), 5_000);
    assert_eq!(fx.ledger.publisher_min_visits(), 2);
    assert!(!fx.ledger.publisher_allow_non_verified());

    // Refreshed 10000s ago: the timer waits out the rest of the interval.
    let (delay, _) = fx.host.last_timer();
    assert_eq!(delay, 86_400 - (NOW - 1_529_990_000));
}

#[tokio::test]
async fn malformed_publisher_state_is_surfaced_once() {
    let fx = fixture();
    *fx.host.publisher_state.lock().unwrap() = Some("{ not json".to_string());
    fx.ledger.initialize().await;

    let reports = fx.host.init_reports();
    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0], Err(TallyError::InvalidPublisherState(_))));
    assert!(!fx.ledger.is_initialized());
    // The refresh is still armed so the registry stays fresh.
    assert!(fx.ledger.refresh().is_armed());
}

#[tokio::test]
async fn rejected_wallet_blob_reports_invalid_ledger_state() {
    let fx = fixture();
    *fx.host.ledger_state.lock().unwrap() = Some("opaque wallet blob".to_string());
    fx.wallet.reject_state.store(true, Ordering::SeqCst);
    fx.ledger.initialize().await;

    let reports = fx.host.init_reports();
    assert!(matches!(reports[0], Err(TallyError::InvalidLedgerState(_))));
    assert!(!fx.ledger.is_initialized());
}

#[tokio::test]
async fn valid_wallet_blob_is_handed_to_the_wallet() {
    let fx = fixture();
    *fx.host.ledger_state.lock().unwrap() = Some("opaque wallet blob".to_string());
    fx.ledger.initialize().await;

    assert_eq!(fx.host.init_reports(), vec![Ok(())]);
    assert_eq!(
        *fx.wallet.loaded_state.lock().unwrap(),
        vec!["opaque wallet blob".to_string()]
    );
}

#[tokio::test]
async fn create_wallet_is_refused_after_initialization() {
    let fx = fixture();
    fx.ledger.initialize().await;
    fx.ledger.create_wallet().await;

    let reports = fx.host.init_reports();
    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[1], Err(TallyError::Unexpected(_))));
}

#[tokio::test]
async fn create_wallet_initializes_a_fresh_ledger() {
    let fx = fixture();
    fx.ledger.create_wallet().await;

    assert_eq!(fx.host.init_reports(), vec![Ok(())]);
    assert!(fx.ledger.is_initialized());
}
