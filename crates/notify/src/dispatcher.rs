//! Turns recorded check events into delivered notifications.
//!
//! For each event the dispatcher filters by kind, resolves the check,
//! renders the kind's template and publishes the result once. Every
//! failure is logged and ends processing of that event only; nothing is
//! retried and nothing propagates to the caller.

use std::sync::Arc;

use uptime_core::config::EnabledEvents;
use uptime_core::{CheckEvent, CheckLookup, NotifyConfig};

use crate::templating::{RenderNotification, TemplateContext};
use crate::traits::{Notification, Notifier};

/// What happened to one event. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The kind is switched off (or absent) in the config.
    Disabled,
    Delivered,
    Dropped(DropReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    CheckLookupFailed,
    /// Template missing or rendering failed.
    Render,
    Delivery,
}

/// Stateless per-event filter, renderer and sender.
///
/// Shared across tasks behind an `Arc`; holds nothing mutable.
pub struct Dispatcher {
    events: EnabledEvents,
    destination: String,
    base_url: String,
    checks: Arc<dyn CheckLookup>,
    renderer: Arc<dyn RenderNotification>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        events: EnabledEvents,
        destination: impl Into<String>,
        base_url: impl Into<String>,
        checks: Arc<dyn CheckLookup>,
        renderer: Arc<dyn RenderNotification>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            events,
            destination: destination.into(),
            base_url: base_url.into(),
            checks,
            renderer,
            notifier,
        }
    }

    /// Build from validated config; the destination comes from the delivery section.
    pub fn from_config(
        config: &NotifyConfig,
        checks: Arc<dyn CheckLookup>,
        renderer: Arc<dyn RenderNotification>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(
            config.events.clone(),
            config.delivery.destination(),
            config.url.clone(),
            checks,
            renderer,
            notifier,
        )
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Handle one event after the host has recorded it.
    pub async fn on_check_event_created(&self, event: &CheckEvent) -> DispatchOutcome {
        if !self.events.is_enabled(&event.kind) {
            tracing::trace!(kind = %event.kind, check_id = %event.check_id, "event kind disabled");
            return DispatchOutcome::Disabled;
        }

        let check = match self.checks.lookup_check(&event.check_id).await {
            Ok(check) => check,
            Err(e) => {
                tracing::error!(
                    kind = %event.kind,
                    check_id = %event.check_id,
                    error = %e,
                    "check lookup failed, notification dropped"
                );
                return DispatchOutcome::Dropped(DropReason::CheckLookupFailed);
            }
        };

        let ctx = TemplateContext::new(&check, event, &self.base_url);
        let notification = match self.renderer.render(&event.kind, &ctx) {
            Ok(text) => Notification::from_rendered(&text),
            Err(e) => {
                tracing::error!(
                    kind = %event.kind,
                    check_id = %event.check_id,
                    error = %e,
                    "notification rendering failed, notification dropped"
                );
                return DispatchOutcome::Dropped(DropReason::Render);
            }
        };

        match self.notifier.publish(&self.destination, &notification).await {
            Ok(()) => {
                tracing::info!(
                    channel = self.notifier.channel_name(),
                    check = %check.name,
                    kind = %event.kind,
                    "notified event: check {} {}",
                    check.name,
                    event.kind
                );
                DispatchOutcome::Delivered
            }
            Err(e) => {
                tracing::error!(
                    channel = self.notifier.channel_name(),
                    check_id = %event.check_id,
                    kind = %event.kind,
                    error = %e,
                    "notification delivery failed"
                );
                DispatchOutcome::Dropped(DropReason::Delivery)
            }
        }
    }
}
