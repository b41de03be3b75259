//! Notification relay for uptime check events.
//!
//! This crate provides:
//! - `Dispatcher`, which decides whether and what to send for each check event
//! - `Notifier` trait with SNS and webhook implementations
//! - Minijinja template rendering with one built-in template per event kind
//! - `HttpCheckLookup` for resolving checks against the host API
//! - `CheckEventListener`, which feeds events from the bus to the dispatcher

pub mod api_lookup;
pub mod dispatcher;
pub mod listener;
pub mod sns;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use api_lookup::HttpCheckLookup;
pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason};
pub use listener::CheckEventListener;
pub use sns::SnsNotifier;
pub use templating::{RenderNotification, TemplateContext, TemplateRenderer};
pub use traits::{Notification, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
