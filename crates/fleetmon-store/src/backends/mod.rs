//! Datastore backend implementations

pub mod memory;
