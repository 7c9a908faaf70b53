//! In-memory datastore backend
//!
//! Reference backend used by tests and single-process deployments. One
//! coarse lock over the whole state is the serialization point for
//! per-pack target mutations: attach and detach on the same pack can
//! never interleave.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{Datastore, MembershipStore, PackStore, TokenStore};
use crate::types::{
    HostId, LabelId, LabelMatch, ListOptions, NewPack, Pack, PackId, PrincipalId, SortOrder,
    Target,
};

#[derive(Default)]
struct State {
    packs: BTreeMap<PackId, Pack>,
    /// Attachment-ordered target lists, keyed by pack
    targets: BTreeMap<PackId, Vec<Target>>,
    /// Latest evaluation per (label, host) pair
    matches: BTreeMap<(LabelId, HostId), LabelMatch>,
    tokens: HashMap<String, PrincipalId>,
    next_pack_id: u64,
}

/// In-memory [`Datastore`] implementation
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_pack_id: 1,
                ..State::default()
            }),
        }
    }

    /// Register a bearer token for a principal.
    ///
    /// Token issuance is owned by an external identity system; this
    /// inherent method exists so tests and single-process deployments
    /// can seed credentials.
    pub fn register_token(&self, token: impl Into<String>, principal: PrincipalId) {
        let mut state = self.state.lock().unwrap();
        state.tokens.insert(token.into(), principal);
    }

    /// Remove a bearer token, if present
    pub fn revoke_token(&self, token: &str) {
        let mut state = self.state.lock().unwrap();
        state.tokens.remove(token);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn live_pack<'a>(state: &'a State, id: PackId) -> Result<&'a Pack, StoreError> {
    state
        .packs
        .get(&id)
        .filter(|p| !p.deleted)
        .ok_or_else(|| StoreError::not_found("pack", id))
}

#[async_trait]
impl PackStore for MemoryStore {
    async fn new_pack(&self, pack: NewPack) -> Result<Pack, StoreError> {
        let mut state = self.state.lock().unwrap();

        let existing = state
            .packs
            .values()
            .find(|p| p.name == pack.name)
            .map(|p| (p.id, p.deleted));

        let now = Utc::now();
        match existing {
            Some((_, false)) => Err(StoreError::AlreadyExists {
                entity: "pack",
                name: pack.name,
            }),
            Some((id, true)) => {
                // Revive the soft-deleted row in place: same identifier,
                // fresh fields, fresh (empty) target list.
                debug!(pack_id = %id, name = %pack.name, "reviving soft-deleted pack");
                let revived = Pack {
                    id,
                    name: pack.name,
                    description: pack.description,
                    platform: pack.platform,
                    disabled: pack.disabled,
                    created_by: pack.created_by,
                    deleted: false,
                    created_at: now,
                    updated_at: now,
                };
                state.packs.insert(id, revived.clone());
                state.targets.insert(id, Vec::new());
                Ok(revived)
            }
            None => {
                let id = PackId(state.next_pack_id);
                state.next_pack_id += 1;
                let created = Pack {
                    id,
                    name: pack.name,
                    description: pack.description,
                    platform: pack.platform,
                    disabled: pack.disabled,
                    created_by: pack.created_by,
                    deleted: false,
                    created_at: now,
                    updated_at: now,
                };
                state.packs.insert(id, created.clone());
                state.targets.insert(id, Vec::new());
                Ok(created)
            }
        }
    }

    async fn save_pack(&self, pack: &Pack) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();

        live_pack(&state, pack.id)?;
        let collision = state
            .packs
            .values()
            .any(|p| p.id != pack.id && !p.deleted && p.name == pack.name);
        if collision {
            return Err(StoreError::AlreadyExists {
                entity: "pack",
                name: pack.name.clone(),
            });
        }

        let stored = state.packs.get_mut(&pack.id).unwrap();
        stored.name = pack.name.clone();
        stored.description = pack.description.clone();
        stored.platform = pack.platform.clone();
        stored.disabled = pack.disabled;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_pack(&self, id: PackId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        live_pack(&state, id)?;
        let pack = state.packs.get_mut(&id).unwrap();
        pack.deleted = true;
        pack.updated_at = Utc::now();
        Ok(())
    }

    async fn pack(&self, id: PackId) -> Result<Pack, StoreError> {
        let state = self.state.lock().unwrap();
        live_pack(&state, id).cloned()
    }

    async fn pack_by_name(&self, name: &str) -> Result<Option<Pack>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .packs
            .values()
            .find(|p| !p.deleted && p.name == name)
            .cloned())
    }

    async fn list_packs(&self, opts: &ListOptions) -> Result<Vec<Pack>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut packs: Vec<Pack> = state.packs.values().filter(|p| !p.deleted).cloned().collect();
        if opts.order == SortOrder::Descending {
            packs.reverse();
        }
        Ok(opts.window(packs))
    }

    async fn add_pack_target(&self, id: PackId, target: Target) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        live_pack(&state, id)?;
        let targets = state.targets.entry(id).or_default();
        // Idempotent: attaching an attached (kind, id) pair is a no-op
        if !targets.contains(&target) {
            targets.push(target);
        }
        Ok(())
    }

    async fn remove_pack_target(&self, id: PackId, target: Target) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        live_pack(&state, id)?;
        let targets = state.targets.entry(id).or_default();
        match targets.iter().position(|t| *t == target) {
            Some(pos) => {
                targets.remove(pos);
                Ok(())
            }
            None => Err(StoreError::TargetNotFound {
                pack_id: id,
                target,
            }),
        }
    }

    async fn list_pack_targets(&self, id: PackId) -> Result<Vec<Target>, StoreError> {
        let state = self.state.lock().unwrap();
        live_pack(&state, id)?;
        Ok(state.targets.get(&id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn record_label_match(&self, label_match: LabelMatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .matches
            .insert((label_match.label_id, label_match.host_id), label_match);
        Ok(())
    }

    async fn matching_hosts(&self, label_id: LabelId) -> Result<Vec<HostId>, StoreError> {
        let state = self.state.lock().unwrap();
        let range = (label_id, HostId(u64::MIN))..=(label_id, HostId(u64::MAX));
        Ok(state
            .matches
            .range(range)
            .filter(|(_, m)| m.matches)
            .map(|((_, host_id), _)| *host_id)
            .collect())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn validate_token(&self, token: &str) -> Result<PrincipalId, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(token)
            .copied()
            .ok_or(StoreError::InvalidToken)
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
