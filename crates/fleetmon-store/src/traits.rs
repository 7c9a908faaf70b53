//! Datastore trait definitions
//!
//! Trait interfaces for the storage abstraction layer, split by
//! concern:
//! - PackStore: packs and their attached targets
//! - MembershipStore: label evaluation results
//! - TokenStore: bearer token validation for push sessions
//! - Datastore: combined interface with lifecycle management
//!
//! Every method may fail with a [`StoreError`] that callers wrap and
//! propagate; a storage failure is never reported as an empty result.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{
    HostId, LabelId, LabelMatch, ListOptions, NewPack, Pack, PackId, PrincipalId, Target,
};

/// Packs and their attached target references
///
/// Attach/detach on one pack is serialized by the backend so that
/// concurrent callers cannot violate the idempotent-attach and
/// reported-detach contracts.
#[async_trait]
pub trait PackStore: Send + Sync {
    /// Create a pack, or revive a soft-deleted pack of the same name.
    ///
    /// Name is unique among non-deleted packs. When a soft-deleted pack
    /// holds the name, the old identifier is reused: the row is revived
    /// in place with the new fields and an empty target list.
    ///
    /// # Errors
    /// * `StoreError::AlreadyExists` - a live pack holds the name
    async fn new_pack(&self, pack: NewPack) -> Result<Pack, StoreError>;

    /// Store changes to a pack's metadata
    ///
    /// # Errors
    /// * `StoreError::NotFound` - pack absent or soft-deleted
    /// * `StoreError::AlreadyExists` - rename collides with a live pack
    async fn save_pack(&self, pack: &Pack) -> Result<(), StoreError>;

    /// Soft-delete a pack so it is excluded from all reads
    ///
    /// # Errors
    /// * `StoreError::NotFound` - pack absent or already deleted
    async fn delete_pack(&self, id: PackId) -> Result<(), StoreError>;

    /// Fetch a pack by identifier
    ///
    /// # Errors
    /// * `StoreError::NotFound` - pack absent or soft-deleted
    async fn pack(&self, id: PackId) -> Result<Pack, StoreError>;

    /// Fetch a live pack by name, or `None` if no live pack holds it
    async fn pack_by_name(&self, name: &str) -> Result<Option<Pack>, StoreError>;

    /// List live packs ordered by identifier
    async fn list_packs(&self, opts: &ListOptions) -> Result<Vec<Pack>, StoreError>;

    /// Attach a target to a pack (idempotent)
    ///
    /// Attaching an already-attached (kind, id) pair succeeds without
    /// creating a duplicate association.
    ///
    /// # Errors
    /// * `StoreError::NotFound` - pack absent or soft-deleted
    async fn add_pack_target(&self, id: PackId, target: Target) -> Result<(), StoreError>;

    /// Detach a target from a pack
    ///
    /// # Errors
    /// * `StoreError::NotFound` - pack absent or soft-deleted
    /// * `StoreError::TargetNotFound` - association does not exist;
    ///   carries both identifiers for diagnostics
    async fn remove_pack_target(&self, id: PackId, target: Target) -> Result<(), StoreError>;

    /// List the targets attached to a pack, in attachment order
    ///
    /// # Errors
    /// * `StoreError::NotFound` - pack absent or soft-deleted
    async fn list_pack_targets(&self, id: PackId) -> Result<Vec<Target>, StoreError>;
}

/// Label evaluation results
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Record the outcome of evaluating one label against one host.
    ///
    /// The most recent row per (label, host) wins; recording replaces
    /// any earlier evaluation of the same pair.
    async fn record_label_match(&self, label_match: LabelMatch) -> Result<(), StoreError>;

    /// Hosts whose latest evaluation of the label matched, ascending
    /// by host identifier.
    ///
    /// Absence of a row, or a latest row with `matches = false`,
    /// excludes the host.
    async fn matching_hosts(&self, label_id: LabelId) -> Result<Vec<HostId>, StoreError>;
}

/// Bearer token validation for push sessions
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Resolve a bearer token to the principal it was issued to
    ///
    /// # Errors
    /// * `StoreError::InvalidToken` - token unknown or revoked
    async fn validate_token(&self, token: &str) -> Result<PrincipalId, StoreError>;
}

/// Combined datastore interface with lifecycle management
#[async_trait]
pub trait Datastore: PackStore + MembershipStore + TokenStore {
    /// Check backend health and connectivity
    async fn health_check(&self) -> Result<(), StoreError>;
}
