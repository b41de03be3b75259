//! Topic constants for PUB/SUB routing.
//!
//! Topics follow `uptime.<domain>.<event>`. Subscriptions match by prefix,
//! so `uptime.check_event.` receives every check-event topic.

/// Fired by the host after a check event has been durably recorded.
pub const CHECK_EVENT_CREATED: &str = "uptime.check_event.created";

/// Periodic worker health heartbeat.
pub const WORKER_HEALTH: &str = "uptime.worker.health";
