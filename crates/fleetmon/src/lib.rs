//! Fleetmon engine crate
//!
//! Core pieces of the fleet query server: resolving a pack's targets
//! to the concrete set of hosts it currently denotes, and streaming
//! live campaign updates to operator clients over authenticated push
//! sessions. Storage is consumed through the trait interfaces in
//! `fleetmon-store`.

pub mod server;
