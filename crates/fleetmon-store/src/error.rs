//! Datastore error types

use crate::types::{PackId, Target};
use std::error::Error as StdError;
use thiserror::Error;

/// Boxed error for wrapping backend-specific errors
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Datastore layer errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found (or soft-deleted)
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Name collision with a live entity
    #[error("already exists: {entity} named {name:?}")]
    AlreadyExists { entity: &'static str, name: String },

    /// Detach of an association that is not currently attached
    #[error("{target} is not attached to pack {pack_id}")]
    TargetNotFound { pack_id: PackId, target: Target },

    /// Bearer token did not resolve to a principal
    #[error("invalid auth token")]
    InvalidToken,

    /// Query execution failure, wrapped with the operation name
    #[error("query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxedError>,
    },
}

impl StoreError {
    /// Create a not-found error for an entity identifier
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a query error with source
    pub fn query(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
