//! Server-side engine modules
//!
//! - target resolution over the datastore traits
//! - the authenticated push-session protocol and its transports
//! - campaign fan-out to attached observers

pub mod campaign;
pub mod config;
pub mod resolver;
pub mod session;
pub mod transport;

pub use campaign::CampaignCoordinator;
pub use resolver::TargetResolver;
pub use session::{SessionChannel, SessionConfig};
