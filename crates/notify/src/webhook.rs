//! Generic HTTP webhook notifier.
//!
//! Posts each notification as a JSON document to a configured URL,
//! with optional custom headers.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use uptime_core::config::WebhookConfig;

use crate::traits::{Notification, Notifier, NotifyError};

/// Delivers notifications as JSON over HTTP.
///
/// The destination passed to [`Notifier::publish`] is the target URL.
/// Environment variable references (`${VAR_NAME}`) in header values are
/// resolved at construction time.
#[derive(Debug)]
pub struct WebhookNotifier {
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    destination: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl WebhookNotifier {
    /// Missing env vars referenced in header values produce a
    /// [`NotifyError::Config`] error.
    pub fn new(headers: HashMap<String, String>) -> Result<Self, NotifyError> {
        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            headers: resolved_headers,
            client,
        })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self, NotifyError> {
        Self::new(config.headers.clone())
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, destination: &str, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            destination,
            subject: &notification.subject,
            body: &notification.body,
        };

        let mut request = self.client.post(destination).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %destination,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::WebhookStatus {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::debug!(url = %destination, %status, "webhook notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
///
/// Returns an error if a referenced variable is not set.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn resolve_env_vars_substitutes() {
        std::env::set_var("UPTIME_WT_TOKEN", "s3cret");
        let result = resolve_env_vars("Bearer ${UPTIME_WT_TOKEN}").unwrap();
        assert_eq!(result, "Bearer s3cret");
        std::env::remove_var("UPTIME_WT_TOKEN");
    }

    #[test]
    fn resolve_env_vars_missing() {
        match resolve_env_vars("${ABSOLUTELY_NOT_SET_12345}") {
            Err(NotifyError::Config(msg)) => assert!(msg.contains("ABSOLUTELY_NOT_SET_12345")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_unclosed() {
        match resolve_env_vars("${UNCLOSED") {
            Err(NotifyError::Config(msg)) => assert!(msg.contains("unclosed")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_plain_text() {
        assert_eq!(resolve_env_vars("fixed-value").unwrap(), "fixed-value");
    }

    #[test]
    fn from_config_resolves_headers() {
        std::env::set_var("UPTIME_WT_API_KEY", "secret-key-123");
        let config = WebhookConfig {
            url: "https://example.com/hook".into(),
            headers: HashMap::from([
                ("X-Api-Key".to_string(), "${UPTIME_WT_API_KEY}".to_string()),
                ("X-Static".to_string(), "fixed-value".to_string()),
            ]),
        };
        let notifier = WebhookNotifier::from_config(&config).unwrap();
        assert_eq!(notifier.headers["X-Api-Key"], "secret-key-123");
        assert_eq!(notifier.headers["X-Static"], "fixed-value");
        assert_eq!(notifier.channel_name(), "webhook");
        std::env::remove_var("UPTIME_WT_API_KEY");
    }

    /// Accept one connection, capture the raw request and reply with `status_line`.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + length || n == 0 {
                        break;
                    }
                }
            }
            let reply = format!("{status_line}\r\ncontent-length: 4\r\nconnection: close\r\n\r\nnope");
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}/hook"), handle)
    }

    #[tokio::test]
    async fn posts_json_payload() {
        let (url, server) = one_shot_server("HTTP/1.1 200 OK").await;
        let notifier = WebhookNotifier::new(HashMap::from([(
            "X-Uptime".to_string(),
            "yes".to_string(),
        )]))
        .unwrap();

        notifier
            .publish(&url, &Notification::new("[Up] Check \"A\" went back up", "body"))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.to_ascii_lowercase().contains("x-uptime: yes"));
        let json = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["destination"], url.as_str());
        assert_eq!(value["subject"], "[Up] Check \"A\" went back up");
        assert_eq!(value["body"], "body");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, server) = one_shot_server("HTTP/1.1 503 Service Unavailable").await;
        let notifier = WebhookNotifier::new(HashMap::new()).unwrap();

        let err = notifier
            .publish(&url, &Notification::new("s", "b"))
            .await
            .unwrap_err();
        server.await.unwrap();
        match err {
            NotifyError::WebhookStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "nope");
            }
            other => panic!("expected WebhookStatus, got: {other:?}"),
        }
    }
}
