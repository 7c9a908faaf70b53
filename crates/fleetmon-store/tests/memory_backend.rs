//! Memory backend test runner
//!
//! Runs the shared datastore test suite against the in-memory backend.
//! Persistent backends should reuse the same `common` suite.

mod common;

use fleetmon_store::backends::memory::MemoryStore;
use fleetmon_store::{Datastore, PrincipalId, TokenStore};

/// Run the complete datastore test suite against the memory backend
#[tokio::test]
async fn memory_passes_all_datastore_tests() {
    let store = MemoryStore::new();
    common::run_all_tests(&store).await;
}

/// Run only PackStore tests against the memory backend
#[tokio::test]
async fn memory_passes_pack_store_tests() {
    let store = MemoryStore::new();
    common::pack_store_tests::run_all(&store).await;
}

/// Run only MembershipStore tests against the memory backend
#[tokio::test]
async fn memory_passes_membership_store_tests() {
    let store = MemoryStore::new();
    common::membership_store_tests::run_all(&store).await;
}

// ============================================================================
// Memory-Specific Tests
// ============================================================================

/// Token registration is backend-specific; exercise it here
#[tokio::test]
async fn memory_token_round_trip() {
    let store = MemoryStore::new();
    store.register_token("abc", PrincipalId(3));
    assert_eq!(store.validate_token("abc").await.unwrap(), PrincipalId(3));
}

/// Health check always succeeds for the in-process backend
#[tokio::test]
async fn memory_health_check() {
    let store = MemoryStore::new();
    store.health_check().await.unwrap();
}
