//! Campaign coordination
//!
//! One live distribution unit of work: resolve a pack's effective
//! membership, then relay progress and result messages to every
//! attached observer session as the execution subsystem produces them.
//! Observers hold the sender half of an authenticated session, so an
//! unauthenticated channel can never be attached. A closed observer is
//! a detach, not a coordinator failure.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

use fleetmon_store::{HostId, ListOptions, PackId};

use crate::server::resolver::{ResolveError, TargetResolver};
use crate::server::session::SessionSender;

/// Message type for target totals pushed at campaign start
pub const TOTALS_TYPE: &str = "totals";
/// Message type for per-host results
pub const RESULT_TYPE: &str = "result";
/// Message type for campaign status changes
pub const STATUS_TYPE: &str = "status";

/// Campaign errors
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// A resolved, running campaign
#[derive(Debug, Clone)]
pub struct Campaign {
    pub id: Ulid,
    pub pack_id: PackId,
    /// Effective membership at start time (full resolution)
    pub hosts: Vec<HostId>,
    pub created_at: DateTime<Utc>,
}

/// Relays push updates for one campaign to attached observers
pub struct CampaignCoordinator {
    campaign: Campaign,
    observers: Mutex<Vec<SessionSender>>,
}

impl CampaignCoordinator {
    /// Resolve the pack's effective membership and start a campaign
    pub async fn start(
        resolver: &TargetResolver,
        pack_id: PackId,
    ) -> Result<Self, CampaignError> {
        let hosts = resolver.resolve_pack(pack_id, &ListOptions::default()).await?;
        let campaign = Campaign {
            id: Ulid::new(),
            pack_id,
            hosts,
            created_at: Utc::now(),
        };
        info!(
            campaign_id = %campaign.id,
            pack_id = %pack_id,
            hosts = campaign.hosts.len(),
            "campaign started"
        );
        Ok(Self {
            campaign,
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn campaign(&self) -> &Campaign {
        &self.campaign
    }

    /// Attach an observer and push the campaign totals to it.
    ///
    /// Only the sender half of an authenticated session exists, so the
    /// handshake guarantee is structural.
    pub async fn attach(&self, mut sender: SessionSender) {
        let totals = json!({ "count": self.campaign.hosts.len() });
        if let Err(err) = sender.send(TOTALS_TYPE, totals).await {
            debug!(campaign_id = %self.campaign.id, error = %err, "observer dropped at attach");
            return;
        }
        self.observers.lock().await.push(sender);
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }

    /// Fan one message out to every attached observer.
    ///
    /// A failed send detaches that observer; the rest keep receiving.
    /// Returns how many observers received the message.
    pub async fn push(&self, kind: &str, data: Value) -> usize {
        let mut observers = self.observers.lock().await;
        let mut kept = Vec::with_capacity(observers.len());
        let mut delivered = 0;

        for mut observer in observers.drain(..) {
            match observer.send(kind, data.clone()).await {
                Ok(()) => {
                    delivered += 1;
                    kept.push(observer);
                }
                Err(err) => {
                    debug!(
                        campaign_id = %self.campaign.id,
                        error = %err,
                        "observer detached"
                    );
                }
            }
        }

        *observers = kept;
        delivered
    }

    /// Push one host's result
    pub async fn push_result(&self, host_id: HostId, rows: Value) -> usize {
        self.push(RESULT_TYPE, json!({ "host_id": host_id, "rows": rows }))
            .await
    }

    /// Push a status change (e.g. "finished")
    pub async fn push_status(&self, status: &str) -> usize {
        self.push(STATUS_TYPE, json!({ "status": status })).await
    }

    /// Mark the campaign finished and close every observer session
    pub async fn finish(&self) {
        self.push_status("finished").await;
        let mut observers = self.observers.lock().await;
        for observer in observers.iter_mut() {
            observer.close().await;
        }
        observers.clear();
        info!(campaign_id = %self.campaign.id, "campaign finished");
    }
}
