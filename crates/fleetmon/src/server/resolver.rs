//! Target resolution engine
//!
//! Turns a pack's (or an arbitrary) target list into the concrete set
//! of hosts it currently denotes. Two modes: full resolution unions
//! explicit hosts with current label membership; explicit resolution
//! returns only directly referenced hosts, for audit views where
//! dynamic membership would be misleading.
//!
//! Resolution is stateless and read-only: every call re-reads the
//! store, so concurrent resolutions need no coordination and always
//! reflect live membership.

use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use fleetmon_store::{Datastore, HostId, ListOptions, PackId, SortOrder, StoreError, Target};

/// Target resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Named pack absent or soft-deleted
    #[error("pack {0} not found")]
    PackNotFound(PackId),

    /// Underlying store failure, never masked as an empty set
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stateless resolver over a shared datastore
#[derive(Clone)]
pub struct TargetResolver {
    store: Arc<dyn Datastore>,
}

impl TargetResolver {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Resolve a pack's effective membership: every directly referenced
    /// host plus every host currently matching any referenced label.
    pub async fn resolve_pack(
        &self,
        pack_id: PackId,
        opts: &ListOptions,
    ) -> Result<Vec<HostId>, ResolveError> {
        let targets = self.pack_targets(pack_id).await?;
        self.resolve(&targets, opts).await
    }

    /// Resolve only a pack's directly referenced hosts
    pub async fn resolve_pack_explicit(
        &self,
        pack_id: PackId,
        opts: &ListOptions,
    ) -> Result<Vec<HostId>, ResolveError> {
        let targets = self.pack_targets(pack_id).await?;
        self.resolve_explicit(&targets, opts).await
    }

    /// Full resolution of an arbitrary target list.
    ///
    /// Deduplication is mandatory: a host contributed by several
    /// targets appears once. The pagination window applies to the
    /// final deduplicated, ordered set.
    pub async fn resolve(
        &self,
        targets: &[Target],
        opts: &ListOptions,
    ) -> Result<Vec<HostId>, ResolveError> {
        let mut hosts = BTreeSet::new();
        for target in targets {
            match target {
                Target::Host(host_id) => {
                    hosts.insert(*host_id);
                }
                Target::Label(label_id) => {
                    for host_id in self.store.matching_hosts(*label_id).await? {
                        hosts.insert(host_id);
                    }
                }
            }
        }
        debug!(targets = targets.len(), hosts = hosts.len(), "resolved target list");
        Ok(window(hosts, opts))
    }

    /// Explicit-only resolution of an arbitrary target list
    pub async fn resolve_explicit(
        &self,
        targets: &[Target],
        opts: &ListOptions,
    ) -> Result<Vec<HostId>, ResolveError> {
        let hosts: BTreeSet<HostId> = targets
            .iter()
            .filter_map(|target| match target {
                Target::Host(host_id) => Some(*host_id),
                Target::Label(_) => None,
            })
            .collect();
        Ok(window(hosts, opts))
    }

    async fn pack_targets(&self, pack_id: PackId) -> Result<Vec<Target>, ResolveError> {
        self.store
            .list_pack_targets(pack_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound { .. } => ResolveError::PackNotFound(pack_id),
                other => ResolveError::Store(other),
            })
    }
}

/// Order the deduplicated set, then apply the pagination window
fn window(hosts: BTreeSet<HostId>, opts: &ListOptions) -> Vec<HostId> {
    let mut ordered: Vec<HostId> = hosts.into_iter().collect();
    if opts.order == SortOrder::Descending {
        ordered.reverse();
    }
    opts.window(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetmon_store::backends::memory::MemoryStore;
    use fleetmon_store::{LabelId, LabelMatch, MembershipStore, NewPack, PackStore};

    async fn fixture() -> (Arc<MemoryStore>, TargetResolver) {
        let store = Arc::new(MemoryStore::new());
        let resolver = TargetResolver::new(Arc::clone(&store) as Arc<dyn Datastore>);
        (store, resolver)
    }

    async fn record(store: &MemoryStore, label: u64, host: u64, matches: bool) {
        store
            .record_label_match(LabelMatch {
                label_id: LabelId(label),
                host_id: HostId(host),
                matches,
                evaluated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn pack_with(store: &MemoryStore, targets: &[Target]) -> PackId {
        let pack = store
            .new_pack(NewPack {
                name: "resolver-test".to_string(),
                ..NewPack::default()
            })
            .await
            .unwrap();
        for target in targets {
            store.add_pack_target(pack.id, *target).await.unwrap();
        }
        pack.id
    }

    #[tokio::test]
    async fn test_union_deduplicates_overlap() {
        let (store, resolver) = fixture().await;
        // Label 1 matches hosts {5, 6}; host 5 is also explicit
        record(&store, 1, 5, true).await;
        record(&store, 1, 6, true).await;
        let pack_id = pack_with(
            &store,
            &[Target::Label(LabelId(1)), Target::Host(HostId(5))],
        )
        .await;

        let hosts = resolver
            .resolve_pack(pack_id, &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(hosts, vec![HostId(5), HostId(6)]);
    }

    #[tokio::test]
    async fn test_explicit_excludes_label_membership() {
        let (store, resolver) = fixture().await;
        record(&store, 1, 5, true).await;
        record(&store, 1, 6, true).await;
        let pack_id = pack_with(
            &store,
            &[Target::Label(LabelId(1)), Target::Host(HostId(5))],
        )
        .await;

        let hosts = resolver
            .resolve_pack_explicit(pack_id, &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(hosts, vec![HostId(5)]);
    }

    #[tokio::test]
    async fn test_stale_match_excluded() {
        let (store, resolver) = fixture().await;
        record(&store, 1, 5, true).await;
        record(&store, 1, 6, false).await;
        let pack_id = pack_with(&store, &[Target::Label(LabelId(1))]).await;

        let hosts = resolver
            .resolve_pack(pack_id, &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(hosts, vec![HostId(5)]);
    }

    #[tokio::test]
    async fn test_pagination_after_dedup() {
        let (store, resolver) = fixture().await;
        // Union resolves to {3, 7, 9, 11}: 7 arrives via both a label
        // and an explicit reference, so windowing before dedup would
        // undercount.
        record(&store, 1, 7, true).await;
        record(&store, 1, 9, true).await;
        let pack_id = pack_with(
            &store,
            &[
                Target::Label(LabelId(1)),
                Target::Host(HostId(7)),
                Target::Host(HostId(3)),
                Target::Host(HostId(11)),
            ],
        )
        .await;

        let opts = ListOptions {
            offset: 1,
            limit: Some(2),
            order: SortOrder::Ascending,
        };
        let hosts = resolver.resolve_pack(pack_id, &opts).await.unwrap();
        assert_eq!(hosts, vec![HostId(7), HostId(9)]);
    }

    #[tokio::test]
    async fn test_descending_order() {
        let (store, resolver) = fixture().await;
        let pack_id = pack_with(
            &store,
            &[
                Target::Host(HostId(3)),
                Target::Host(HostId(7)),
                Target::Host(HostId(9)),
            ],
        )
        .await;

        let opts = ListOptions {
            order: SortOrder::Descending,
            ..ListOptions::default()
        };
        let hosts = resolver.resolve_pack(pack_id, &opts).await.unwrap();
        assert_eq!(hosts, vec![HostId(9), HostId(7), HostId(3)]);
    }

    #[tokio::test]
    async fn test_unknown_pack_is_not_found() {
        let (_store, resolver) = fixture().await;
        let err = resolver
            .resolve_pack(PackId(404), &ListOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::PackNotFound(PackId(404))));
    }

    #[tokio::test]
    async fn test_empty_target_list_is_empty_set() {
        let (store, resolver) = fixture().await;
        let pack_id = pack_with(&store, &[]).await;
        let hosts = resolver
            .resolve_pack(pack_id, &ListOptions::default())
            .await
            .unwrap();
        assert!(hosts.is_empty());
    }
}
