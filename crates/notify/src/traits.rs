//! Delivery interface and shared error types.

/// Errors that can occur while rendering or delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SNS publish failed: {0}")]
    Sns(String),

    #[error("webhook returned {status}: {body}")]
    WebhookStatus { status: u16, body: String },

    #[error("no template for event kind '{0}'")]
    TemplateMissing(String),

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Split rendered template output into subject and body.
    ///
    /// The subject is the first line; the body is everything after the
    /// first line separator, untouched. A `\r\n` separator does not leave
    /// a `\r` in the subject.
    pub fn from_rendered(text: &str) -> Self {
        match text.split_once('\n') {
            Some((first, rest)) => Self::new(first.strip_suffix('\r').unwrap_or(first), rest),
            None => Self::new(text, ""),
        }
    }
}

/// Outbound delivery channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notification` to `destination` (a topic ARN, a URL, ...).
    async fn publish(&self, destination: &str, notification: &Notification) -> Result<(), NotifyError>;

    /// Check connectivity with a sample notification.
    async fn test(&self, destination: &str) -> Result<(), NotifyError> {
        let notification = Notification::new(
            "[Test] Uptime notification channel",
            "This is a test notification sent from Uptime. Please don't reply to it.",
        );
        self.publish(destination, &notification).await
    }

    /// Human-readable name for this channel (e.g. "sns", "webhook").
    fn channel_name(&self) -> &str;
}
