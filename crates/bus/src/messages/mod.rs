//! Payload types and topic names carried on the bus.
//!
//! Check-domain payloads (`CheckEvent`) live in `uptime-core`; this module
//! only holds what the bus itself publishes.

pub mod health;
pub mod topics;
