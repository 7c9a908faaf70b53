//! Datastore abstraction layer for fleetmon
//!
//! Provides backend-agnostic traits for the records target resolution
//! and push sessions read: packs with their attached targets, label
//! membership results, and bearer tokens.
//!
//! # Architecture
//!
//! All backends implement the same traits:
//! - [`PackStore`] - packs and their attached target references
//! - [`MembershipStore`] - latest label evaluation results
//! - [`TokenStore`] - bearer token validation
//! - [`Datastore`] - combined interface with lifecycle management
//!
//! # Examples
//!
//! ```
//! use fleetmon_store::{create_store, NewPack, PackStore};
//!
//! # async fn example() -> Result<(), fleetmon_store::StoreError> {
//! let store = create_store();
//! let _pack = store.new_pack(NewPack {
//!     name: "nightly-audit".to_string(),
//!     ..NewPack::default()
//! }).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod traits;
mod types;

pub mod backends;

// Re-exports
pub use error::{BoxedError, StoreError};
pub use traits::{Datastore, MembershipStore, PackStore, TokenStore};
pub use types::{
    HostId, LabelId, LabelMatch, ListOptions, NewPack, Pack, PackId, PrincipalId, SortOrder,
    Target,
};

use backends::memory::MemoryStore;
use std::sync::Arc;

/// Create the in-memory datastore backend
///
/// This is the primary entry point for consumers that do not construct
/// a backend directly. Persistent backends live behind the same traits
/// in external crates.
pub fn create_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}
