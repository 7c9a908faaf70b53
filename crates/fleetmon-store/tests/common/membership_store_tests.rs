//! MembershipStore trait test suite
//!
//! Tests for label evaluation recording and membership queries. Label
//! ids here are in a high range to stay clear of the pack suite.

use chrono::Utc;
use fleetmon_store::{Datastore, HostId, LabelId, LabelMatch};

/// Run all MembershipStore tests
pub async fn run_all<S: Datastore>(store: &S) {
    test_matching_hosts_filters_non_matches(store).await;
    test_reevaluation_replaces_prior_row(store).await;
    test_unknown_label_is_empty(store).await;
}

async fn record<S: Datastore>(store: &S, label: u64, host: u64, matches: bool) {
    store
        .record_label_match(LabelMatch {
            label_id: LabelId(label),
            host_id: HostId(host),
            matches,
            evaluated_at: Utc::now(),
        })
        .await
        .expect("record_label_match should succeed");
}

/// Test that only matching rows denote membership
pub async fn test_matching_hosts_filters_non_matches<S: Datastore>(store: &S) {
    record(store, 9001, 1, true).await;
    record(store, 9001, 2, false).await;
    record(store, 9001, 3, true).await;

    let hosts = store
        .matching_hosts(LabelId(9001))
        .await
        .expect("matching_hosts should succeed");
    assert_eq!(hosts, vec![HostId(1), HostId(3)]);
}

/// Test that re-evaluating a pair replaces the earlier outcome
pub async fn test_reevaluation_replaces_prior_row<S: Datastore>(store: &S) {
    record(store, 9002, 7, true).await;
    assert_eq!(
        store.matching_hosts(LabelId(9002)).await.unwrap(),
        vec![HostId(7)]
    );

    record(store, 9002, 7, false).await;
    assert!(
        store.matching_hosts(LabelId(9002)).await.unwrap().is_empty(),
        "a later non-matching evaluation must exclude the host"
    );
}

/// Test that a label with no evaluations has no members
pub async fn test_unknown_label_is_empty<S: Datastore>(store: &S) {
    let hosts = store
        .matching_hosts(LabelId(9003))
        .await
        .expect("matching_hosts should succeed");
    assert!(hosts.is_empty());
}
