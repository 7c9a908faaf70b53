//! Domain types for the datastore layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl $name {
            /// Get the raw numeric identifier
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype! {
    /// Identifier for a monitored host
    ///
    /// This newtype prevents accidentally passing a label or pack
    /// identifier where a host identifier is expected.
    HostId
}

id_newtype! {
    /// Identifier for a label (dynamic host grouping)
    LabelId
}

id_newtype! {
    /// Identifier for a pack
    PackId
}

id_newtype! {
    /// Identifier for an authenticated principal (operator)
    PrincipalId
}

/// A reference attached to a pack, naming either a dynamic label group
/// or one explicit host.
///
/// Every consumer matches exhaustively on this; there is no untyped
/// "target with a discriminator field" anywhere in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Target {
    /// Dynamic membership: all hosts whose latest evaluation of this
    /// label matched.
    Label(LabelId),
    /// One explicitly named host.
    Host(HostId),
}

impl Target {
    /// Kind discriminant, for logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Label(_) => "label",
            Target::Host(_) => "host",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(id) => write!(f, "label {}", id),
            Target::Host(id) => write!(f, "host {}", id),
        }
    }
}

/// A named collection of targets plus scheduling metadata.
///
/// Packs are soft-deletable: a deleted pack is excluded from every read
/// but its identifier persists. Name is unique among non-deleted packs;
/// creating over a soft-deleted pack of the same name revives the old
/// row in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub id: PackId,
    pub name: String,
    pub description: String,
    /// Platform filter (e.g. "linux"); empty means all platforms
    pub platform: String,
    pub disabled: bool,
    pub created_by: Option<PrincipalId>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating (or reviving) a pack
#[derive(Debug, Clone, Default)]
pub struct NewPack {
    pub name: String,
    pub description: String,
    pub platform: String,
    pub disabled: bool,
    pub created_by: Option<PrincipalId>,
}

/// Most recent evaluation of one label against one host.
///
/// Only `matches = true` denotes current membership; non-matching rows
/// are retained for history but never contribute to resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelMatch {
    pub label_id: LabelId,
    pub host_id: HostId,
    pub matches: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Sort direction for listing operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Pagination window for listing and resolution calls.
///
/// Resolution applies the window to the final deduplicated set, never
/// to intermediate per-source lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    /// Number of leading entries to skip
    pub offset: usize,
    /// Maximum number of entries to return; `None` means unbounded
    pub limit: Option<usize>,
    pub order: SortOrder,
}

impl ListOptions {
    /// Apply the offset/limit window to an already-ordered sequence
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
