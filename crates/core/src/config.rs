//! Relay configuration.
//!
//! Loaded once at startup from a TOML file, then overridden from the
//! environment (`.env` is honoured via [`load_dotenv`]) and validated.
//! Validation failures abort startup; nothing is checked per event.
//!
//! ```toml
//! url = "http://uptime.example.com"
//!
//! [events]
//! up = true
//! down = true
//! paused = false
//! restarted = false
//!
//! [delivery]
//! channel = "sns"
//! region = "us-east-1"
//! topic_arn = "arn:aws:sns:us-east-1:0123457816:Notify"
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! ```

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::check::EventKind;
use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Public base URL of the monitoring dashboard, used to build links.
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub events: EnabledEvents,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub checks: CheckApiConfig,

    #[serde(default)]
    pub templates: TemplateConfig,
}

fn default_url() -> String {
    "http://localhost:8082".into()
}

impl NotifyConfig {
    /// Parse, apply environment overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse(toml_str)?;
        config.apply_overrides(env_opt);
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Build config from the environment alone.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_toml("")
    }

    /// Parse without touching the environment or validating.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Apply overrides read through `lookup`.
    ///
    /// - `UPTIME_URL` -> `url`
    /// - `UPTIME_SNS_TOPIC_ARN` -> `delivery.topic_arn`
    /// - `AWS_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    ///   `AWS_SESSION_TOKEN`, `AWS_ENDPOINT_URL` -> SNS delivery settings
    /// - `UPTIME_BROKER_FRONTEND`, `UPTIME_BROKER_BACKEND` -> `broker.*`
    /// - `UPTIME_CHECKS_API_URL` -> `checks.api_url`
    ///
    /// AWS keys only apply to SNS delivery.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("UPTIME_URL") {
            self.url = v;
        }
        if let DeliveryConfig::Sns(sns) = &mut self.delivery {
            if let Some(v) = lookup("UPTIME_SNS_TOPIC_ARN") {
                sns.topic_arn = v;
            }
            if let Some(v) = lookup("AWS_REGION") {
                sns.region = v;
            }
            if let Some(v) = lookup("AWS_ACCESS_KEY_ID") {
                sns.access_key_id = Some(v);
            }
            if let Some(v) = lookup("AWS_SECRET_ACCESS_KEY") {
                sns.secret_access_key = Some(v);
            }
            if let Some(v) = lookup("AWS_SESSION_TOKEN") {
                sns.session_token = Some(v);
            }
            if let Some(v) = lookup("AWS_ENDPOINT_URL") {
                sns.endpoint_url = Some(v);
            }
        }
        if let Some(v) = lookup("UPTIME_BROKER_FRONTEND") {
            self.broker.frontend = v;
        }
        if let Some(v) = lookup("UPTIME_BROKER_BACKEND") {
            self.broker.backend = v;
        }
        if let Some(v) = lookup("UPTIME_CHECKS_API_URL") {
            self.checks.api_url = Some(v);
        }
    }

    /// Reject configurations that could never deliver a notification.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_http_url("url", &self.url)?;

        match &self.delivery {
            DeliveryConfig::Sns(sns) => sns.validate()?,
            DeliveryConfig::Webhook(hook) => require_http_url("delivery.url", &hook.url)?,
        }

        if self.broker.frontend.trim().is_empty() {
            return Err(ConfigError::Missing("broker.frontend"));
        }
        if self.broker.backend.trim().is_empty() {
            return Err(ConfigError::Missing("broker.backend"));
        }
        if let Some(api_url) = &self.checks.api_url {
            require_http_url("checks.api_url", api_url)?;
        }
        Ok(())
    }

    /// Base URL of the host's check API.
    pub fn checks_api_url(&self) -> String {
        match &self.checks.api_url {
            Some(url) => url.clone(),
            None => format!("{}/api", self.url.trim_end_matches('/')),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  url:       {}", self.url);
        tracing::info!("  events:    enabled={:?}", self.events.enabled_kinds());
        match &self.delivery {
            DeliveryConfig::Sns(sns) => tracing::info!(
                "  delivery:  sns region={}, topic={}, credentials={}",
                sns.region,
                sns.topic_arn,
                if sns.has_credentials() { "static" } else { "(none)" }
            ),
            DeliveryConfig::Webhook(hook) => tracing::info!(
                "  delivery:  webhook url={}, headers={}",
                hook.url,
                hook.headers.len()
            ),
        }
        tracing::info!("  broker:    backend={}", self.broker.backend);
        tracing::info!("  checks:    api={}", self.checks_api_url());
        if let Some(dir) = &self.templates.dir {
            tracing::info!("  templates: dir={}", dir.display());
        }
    }
}

fn require_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("expected an http(s) URL, got '{value}'"),
        });
    }
    Ok(())
}

// ── Event filter ──────────────────────────────────────────────

/// Per-kind enable switches. Kinds missing from the map are disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnabledEvents(HashMap<String, bool>);

impl EnabledEvents {
    pub fn new(switches: impl IntoIterator<Item = (EventKind, bool)>) -> Self {
        Self(
            switches
                .into_iter()
                .map(|(kind, on)| (String::from(kind), on))
                .collect(),
        )
    }

    pub fn is_enabled(&self, kind: &EventKind) -> bool {
        self.0.get(kind.as_str()).copied().unwrap_or(false)
    }

    /// Enabled kind names, sorted.
    pub fn enabled_kinds(&self) -> Vec<&str> {
        let sorted: BTreeMap<&str, bool> = self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        sorted
            .into_iter()
            .filter_map(|(k, on)| on.then_some(k))
            .collect()
    }
}

// ── Delivery ──────────────────────────────────────────────────

/// Where notifications are published.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum DeliveryConfig {
    Sns(SnsConfig),
    Webhook(WebhookConfig),
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        DeliveryConfig::Sns(SnsConfig::default())
    }
}

impl DeliveryConfig {
    /// The opaque address notifications are published to.
    pub fn destination(&self) -> &str {
        match self {
            DeliveryConfig::Sns(sns) => &sns.topic_arn,
            DeliveryConfig::Webhook(hook) => &hook.url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub topic_arn: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Alternate endpoint (e.g. localstack).
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".into()
}

impl Default for SnsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            topic_arn: String::new(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: None,
        }
    }
}

impl SnsConfig {
    pub fn has_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.topic_arn.trim().is_empty() {
            return Err(ConfigError::Missing("delivery.topic_arn"));
        }
        if !self.topic_arn.starts_with("arn:") {
            return Err(ConfigError::Invalid {
                key: "delivery.topic_arn",
                reason: format!("'{}' is not an ARN", self.topic_arn),
            });
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Missing("delivery.region"));
        }
        if self.access_key_id.is_none() {
            return Err(ConfigError::Missing("delivery.access_key_id"));
        }
        if self.secret_access_key.is_none() {
            return Err(ConfigError::Missing("delivery.secret_access_key"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Extra request headers. Values may reference `${ENV_VAR}`.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

// ── Broker ────────────────────────────────────────────────────

/// Endpoints of the host's event broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Where health pings are published.
    #[serde(default = "default_broker_frontend")]
    pub frontend: String,
    /// Where check events are received from.
    #[serde(default = "default_broker_backend")]
    pub backend: String,
}

fn default_broker_frontend() -> String {
    "ipc:///tmp/uptime/broker-frontend.sock".into()
}

fn default_broker_backend() -> String {
    "ipc:///tmp/uptime/broker-backend.sock".into()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            frontend: default_broker_frontend(),
            backend: default_broker_backend(),
        }
    }
}

// ── Check API ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckApiConfig {
    /// Defaults to `{url}/api`.
    pub api_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for CheckApiConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ── Templates ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory of `<kind>.txt` files overriding the built-in templates.
    pub dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNS_TOML: &str = r#"
        url = "http://uptime.example.com/"

        [events]
        up = true
        down = true
        paused = false

        [delivery]
        channel = "sns"
        region = "eu-west-1"
        topic_arn = "arn:aws:sns:eu-west-1:0123457816:Notify"
        access_key_id = "AKIATEST"
        secret_access_key = "secret"
    "#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse_validated(toml: &str) -> Result<NotifyConfig, ConfigError> {
        let mut config = NotifyConfig::parse(toml)?;
        config.apply_overrides(no_env);
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn parses_sns_config() {
        let config = parse_validated(SNS_TOML).unwrap();
        assert_eq!(config.url, "http://uptime.example.com/");
        assert_eq!(config.delivery.destination(), "arn:aws:sns:eu-west-1:0123457816:Notify");
        match &config.delivery {
            DeliveryConfig::Sns(sns) => {
                assert_eq!(sns.region, "eu-west-1");
                assert!(sns.has_credentials());
                assert!(sns.session_token.is_none());
            }
            other => panic!("expected sns delivery, got {other:?}"),
        }
    }

    #[test]
    fn event_switches() {
        let config = parse_validated(SNS_TOML).unwrap();
        assert!(config.events.is_enabled(&EventKind::Up));
        assert!(config.events.is_enabled(&EventKind::Down));
        assert!(!config.events.is_enabled(&EventKind::Paused));
        // absent from the map
        assert!(!config.events.is_enabled(&EventKind::Restarted));
        assert!(!config.events.is_enabled(&EventKind::Other("flapping".into())));
        assert_eq!(config.events.enabled_kinds(), ["down", "up"]);
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let config = parse_validated(SNS_TOML).unwrap();
        assert_eq!(config.broker.backend, "ipc:///tmp/uptime/broker-backend.sock");
        assert_eq!(config.checks.timeout_secs, 10);
        assert!(config.templates.dir.is_none());
        assert_eq!(config.checks_api_url(), "http://uptime.example.com/api");
    }

    #[test]
    fn missing_topic_fails_fast() {
        let toml = r#"
            [delivery]
            channel = "sns"
            access_key_id = "a"
            secret_access_key = "b"
        "#;
        let err = parse_validated(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("delivery.topic_arn")), "{err}");
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let toml = r#"
            [delivery]
            channel = "sns"
            topic_arn = "arn:aws:sns:us-east-1:1:T"
            access_key_id = "a"
        "#;
        let err = parse_validated(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("delivery.secret_access_key")), "{err}");
    }

    #[test]
    fn empty_config_is_rejected() {
        assert!(parse_validated("").is_err());
    }

    #[test]
    fn non_arn_topic_is_invalid() {
        let toml = r#"
            [delivery]
            channel = "sns"
            topic_arn = "Notify"
            access_key_id = "a"
            secret_access_key = "b"
        "#;
        let err = parse_validated(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "delivery.topic_arn", .. }));
    }

    #[test]
    fn webhook_delivery() {
        let toml = r#"
            [delivery]
            channel = "webhook"
            url = "https://hooks.example.com/uptime"
            headers = { "X-Token" = "${HOOK_TOKEN}" }
        "#;
        let config = parse_validated(toml).unwrap();
        assert_eq!(config.delivery.destination(), "https://hooks.example.com/uptime");
        match config.delivery {
            DeliveryConfig::Webhook(hook) => assert_eq!(hook.headers["X-Token"], "${HOOK_TOKEN}"),
            other => panic!("expected webhook delivery, got {other:?}"),
        }
    }

    #[test]
    fn webhook_url_must_be_http() {
        let toml = r#"
            [delivery]
            channel = "webhook"
            url = "ftp://example.com"
        "#;
        assert!(matches!(
            parse_validated(toml).unwrap_err(),
            ConfigError::Invalid { key: "delivery.url", .. }
        ));
    }

    #[test]
    fn overrides_fill_sns_settings() {
        let vars = HashMap::from([
            ("UPTIME_SNS_TOPIC_ARN", "arn:aws:sns:us-east-1:1:FromEnv"),
            ("AWS_ACCESS_KEY_ID", "AKIAENV"),
            ("AWS_SECRET_ACCESS_KEY", "envsecret"),
            ("AWS_REGION", "ap-southeast-1"),
            ("UPTIME_URL", "https://status.example.com"),
        ]);
        let mut config = NotifyConfig::parse("").unwrap();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));
        config.validate().unwrap();

        assert_eq!(config.url, "https://status.example.com");
        assert_eq!(config.delivery.destination(), "arn:aws:sns:us-east-1:1:FromEnv");
        match config.delivery {
            DeliveryConfig::Sns(sns) => assert_eq!(sns.region, "ap-southeast-1"),
            other => panic!("expected sns delivery, got {other:?}"),
        }
    }

    #[test]
    fn aws_overrides_ignored_for_webhook() {
        let toml = r#"
            [delivery]
            channel = "webhook"
            url = "https://hooks.example.com/uptime"
        "#;
        let mut config = NotifyConfig::parse(toml).unwrap();
        config.apply_overrides(|key| (key == "UPTIME_SNS_TOPIC_ARN").then(|| "arn:x".to_string()));
        assert_eq!(config.delivery.destination(), "https://hooks.example.com/uptime");
    }

    #[test]
    fn explicit_checks_api_url_wins() {
        let toml = format!("{SNS_TOML}\n[checks]\napi_url = \"http://internal:8082/api\"\n");
        let config = parse_validated(&toml).unwrap();
        assert_eq!(config.checks_api_url(), "http://internal:8082/api");
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, SNS_TOML.as_bytes()).unwrap();
        // env overrides may apply here; the event switches are file-only
        let config = NotifyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.events.enabled_kinds(), ["down", "up"]);
    }

    #[test]
    fn from_env_builds_sns_config_without_a_file() {
        let arn = "arn:aws:sns:us-east-1:0123457816:FromEnv";
        env::set_var("UPTIME_SNS_TOPIC_ARN", arn);
        env::set_var("AWS_ACCESS_KEY_ID", "AKIDFROMENV");
        env::set_var("AWS_SECRET_ACCESS_KEY", "secret-from-env");

        let config = NotifyConfig::from_env();

        env::remove_var("UPTIME_SNS_TOPIC_ARN");
        env::remove_var("AWS_ACCESS_KEY_ID");
        env::remove_var("AWS_SECRET_ACCESS_KEY");

        let config = config.unwrap();
        assert_eq!(config.delivery.destination(), arn);
        // no file means no [events] table: every kind is off
        assert!(config.events.enabled_kinds().is_empty());
    }

    #[test]
    fn from_file_missing_path_is_io_error() {
        let err = NotifyConfig::from_file("/definitely/not/here/notify.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn sample_config_parses() {
        let mut config = NotifyConfig::parse(include_str!("../../../config/notify.toml")).unwrap();
        assert_eq!(config.events.enabled_kinds(), ["down", "up"]);
        assert!(matches!(config.validate(), Err(ConfigError::Missing("delivery.access_key_id"))));

        config.apply_overrides(|key| match key {
            "AWS_ACCESS_KEY_ID" => Some("AKIDEXAMPLE".into()),
            "AWS_SECRET_ACCESS_KEY" => Some("secret".into()),
            _ => None,
        });
        config.validate().unwrap();
    }
}
