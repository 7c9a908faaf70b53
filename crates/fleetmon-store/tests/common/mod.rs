//! Shared test harness for datastore backends
//!
//! Generic test functions that verify correct implementation of the
//! datastore traits. Any backend must pass these to guarantee the
//! behavior target resolution and push sessions depend on.

pub mod membership_store_tests;
pub mod pack_store_tests;

use fleetmon_store::Datastore;

/// Run all datastore trait tests
pub async fn run_all_tests<S: Datastore>(store: &S) {
    println!("Running PackStore tests...");
    pack_store_tests::run_all(store).await;

    println!("Running MembershipStore tests...");
    membership_store_tests::run_all(store).await;

    println!("All datastore tests passed!");
}
