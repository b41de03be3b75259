//! AWS SNS notifier.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sns::config::{BehaviorVersion, Region};
use aws_sdk_sns::Client;
use tracing::{debug, info};

use uptime_core::config::SnsConfig;

use crate::traits::{Notification, Notifier, NotifyError};

/// SNS rejects subjects longer than this.
const MAX_SUBJECT_CHARS: usize = 100;
const FALLBACK_SUBJECT: &str = "Uptime notification";

/// Publishes notifications to an SNS topic. The destination is the topic ARN.
pub struct SnsNotifier {
    client: Client,
}

impl SnsNotifier {
    /// Build a client from explicit region, static credentials and an
    /// optional endpoint override. Nothing is read from the ambient AWS
    /// environment here; overrides are applied to the config beforehand.
    pub fn new(sns: &SnsConfig) -> Result<Self, NotifyError> {
        let (Some(key_id), Some(secret)) = (&sns.access_key_id, &sns.secret_access_key) else {
            return Err(NotifyError::Config(
                "SNS delivery requires access_key_id and secret_access_key".into(),
            ));
        };

        let creds = Credentials::new(
            key_id,
            secret,
            sns.session_token.clone(),
            None,
            "uptime-notify-static",
        );

        let mut sns_config = aws_sdk_sns::Config::builder()
            .region(Region::new(sns.region.clone()))
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(creds);

        if let Some(ref endpoint) = sns.endpoint_url {
            if !endpoint.is_empty() {
                let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                    endpoint.clone()
                } else {
                    format!("https://{endpoint}")
                };
                sns_config = sns_config.endpoint_url(&url);
            }
        }

        let client = Client::from_conf(sns_config.build());
        info!(region = %sns.region, topic_arn = %sns.topic_arn, "SNS notifier initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, destination: &str, notification: &Notification) -> Result<(), NotifyError> {
        let subject = sns_subject(&notification.subject);
        // SNS refuses an empty message
        let message = if notification.body.trim().is_empty() {
            notification.subject.as_str()
        } else {
            notification.body.as_str()
        };

        let output = self
            .client
            .publish()
            .topic_arn(destination)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| NotifyError::Sns(format!("{e:?}")))?;

        debug!(
            topic_arn = %destination,
            message_id = output.message_id().unwrap_or("-"),
            "SNS notification published"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "sns"
    }
}

/// Make a subject SNS will accept: printable ASCII only, no line breaks,
/// at most 100 characters. Anything else becomes a space, runs of
/// whitespace collapse, and an empty result falls back to a fixed subject.
pub fn sns_subject(subject: &str) -> String {
    let mut out = String::with_capacity(subject.len().min(MAX_SUBJECT_CHARS));
    let mut pending_space = false;

    for ch in subject.chars() {
        if ch.is_ascii_graphic() {
            if pending_space && !out.is_empty() {
                // the separator only goes in if a character can follow it
                if out.len() + 2 > MAX_SUBJECT_CHARS {
                    break;
                }
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
        if out.len() >= MAX_SUBJECT_CHARS {
            break;
        }
    }

    out.truncate(MAX_SUBJECT_CHARS);
    if out.is_empty() {
        FALLBACK_SUBJECT.to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_subject_untouched() {
        assert_eq!(
            sns_subject("[Down] Check \"FooBar\" just went down"),
            "[Down] Check \"FooBar\" just went down"
        );
    }

    #[test]
    fn control_and_non_ascii_become_spaces() {
        assert_eq!(sns_subject("a\tb\r\nc"), "a b c");
        assert_eq!(sns_subject("Café  down"), "Caf down");
        assert_eq!(sns_subject("  leading and trailing  "), "leading and trailing");
    }

    #[test]
    fn truncated_to_limit() {
        let long = "x".repeat(250);
        assert_eq!(sns_subject(&long).len(), MAX_SUBJECT_CHARS);

        let spaced = "word ".repeat(40);
        let subject = sns_subject(&spaced);
        assert!(subject.len() <= MAX_SUBJECT_CHARS);
        assert!(subject.starts_with("word word"));
        assert!(!subject.ends_with(' '));
        assert_eq!(subject.len(), 99);

        // a separator landing exactly on the limit is dropped, not kept
        let edge = format!("{} {}", "a".repeat(99), "b".repeat(10));
        assert_eq!(sns_subject(&edge), "a".repeat(99));
    }

    #[test]
    fn empty_falls_back() {
        assert_eq!(sns_subject(""), FALLBACK_SUBJECT);
        assert_eq!(sns_subject("\n\t"), FALLBACK_SUBJECT);
    }

    #[test]
    fn requires_credentials() {
        let config = SnsConfig {
            topic_arn: "arn:aws:sns:us-east-1:0123457816:Notify".into(),
            ..SnsConfig::default()
        };
        assert!(matches!(SnsNotifier::new(&config), Err(NotifyError::Config(_))));
    }

    #[tokio::test]
    async fn builds_with_static_credentials() {
        let config = SnsConfig {
            topic_arn: "arn:aws:sns:us-east-1:0123457816:Notify".into(),
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("secret".into()),
            endpoint_url: Some("localhost:4566".into()),
            ..SnsConfig::default()
        };
        let notifier = SnsNotifier::new(&config).unwrap();
        assert_eq!(notifier.channel_name(), "sns");
    }
}
