//! Minijinja rendering of notification messages.
//!
//! One template per event kind, named after the kind. The five built-in
//! templates are compiled into the binary; a template directory can
//! override them or add templates for custom kinds (`<kind>.txt`).
//!
//! By convention the first rendered line is the subject and the rest is
//! the body (see [`Notification::from_rendered`](crate::traits::Notification::from_rendered)).

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use minijinja::{Environment, ErrorKind};
use uptime_core::config::TemplateConfig;
use uptime_core::{Check, CheckEvent, EventKind};

use crate::traits::NotifyError;

/// Default `datetime` format, close to moment's `LLLL`.
pub const DEFAULT_DATETIME_FORMAT: &str = "%A, %B %-d, %Y %-I:%M %p UTC";

const BUILTIN_TEMPLATES: [(&str, &str); 5] = [
    ("created", include_str!("../templates/created.txt")),
    ("up", include_str!("../templates/up.txt")),
    ("down", include_str!("../templates/down.txt")),
    ("paused", include_str!("../templates/paused.txt")),
    ("restarted", include_str!("../templates/restarted.txt")),
];

/// Values exposed to every template.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext<'a> {
    pub check: &'a Check,
    pub check_event: &'a CheckEvent,
    /// Dashboard base URL, without trailing slash.
    pub url: &'a str,
    pub now: DateTime<Utc>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(check: &'a Check, check_event: &'a CheckEvent, url: &'a str) -> Self {
        Self {
            check,
            check_event,
            url: url.trim_end_matches('/'),
            now: Utc::now(),
        }
    }
}

/// Turns an event into rendered notification text.
pub trait RenderNotification: Send + Sync {
    fn render(&self, kind: &EventKind, ctx: &TemplateContext<'_>) -> Result<String, NotifyError>;
}

/// Per-kind templates held in a single minijinja environment.
#[derive(Debug)]
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Renderer with the built-in templates only.
    pub fn new() -> Result<Self, NotifyError> {
        let mut env = Self::build_env();
        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| NotifyError::Template(format!("built-in template '{name}': {e}")))?;
        }
        Ok(Self { env })
    }

    pub fn from_config(config: &TemplateConfig) -> Result<Self, NotifyError> {
        let mut renderer = Self::new()?;
        if let Some(dir) = &config.dir {
            renderer.load_dir(dir)?;
        }
        Ok(renderer)
    }

    /// Load every `<kind>.txt` in `dir`, replacing built-ins of the same name.
    ///
    /// Syntax errors are reported here, at startup, rather than per event.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, NotifyError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            NotifyError::Config(format!("cannot read template dir {}: {e}", dir.display()))
        })?;

        let mut loaded = 0;
        for entry in entries {
            let path = entry
                .map_err(|e| NotifyError::Config(format!("template dir entry: {e}")))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|e| {
                NotifyError::Config(format!("cannot read template {}: {e}", path.display()))
            })?;
            self.env.add_template_owned(name.clone(), source).map_err(|e| {
                NotifyError::Config(format!("invalid template {}: {e}", path.display()))
            })?;
            tracing::debug!(template = %name, path = %path.display(), "loaded template override");
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn has_template(&self, kind: &EventKind) -> bool {
        self.env.get_template(kind.as_str()).is_ok()
    }

    fn build_env() -> Environment<'static> {
        let mut env = Environment::new();
        // block tags sit on their own lines in the templates
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_filter("datetime", datetime_filter);
        env.add_filter("epoch_ms", epoch_ms_filter);
        env.add_filter("humanize_ms", humanize_ms);
        env
    }
}

impl RenderNotification for TemplateRenderer {
    fn render(&self, kind: &EventKind, ctx: &TemplateContext<'_>) -> Result<String, NotifyError> {
        let template = self.env.get_template(kind.as_str()).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => NotifyError::TemplateMissing(kind.to_string()),
            _ => NotifyError::Template(e.to_string()),
        })?;
        template
            .render(ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, minijinja::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            minijinja::Error::new(
                ErrorKind::InvalidOperation,
                format!("'{value}' is not an RFC 3339 timestamp: {e}"),
            )
        })
}

/// Filter: format a timestamp with a strftime pattern.
fn datetime_filter(value: String, format: Option<String>) -> Result<String, minijinja::Error> {
    let dt = parse_timestamp(&value)?;
    let format = format.as_deref().unwrap_or(DEFAULT_DATETIME_FORMAT);
    let mut out = String::new();
    // an invalid pattern surfaces as fmt::Error here instead of a panic
    write!(out, "{}", dt.format(format)).map_err(|_| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid datetime format '{format}'"),
        )
    })?;
    Ok(out)
}

/// Filter: timestamp as milliseconds since the Unix epoch.
fn epoch_ms_filter(value: String) -> Result<i64, minijinja::Error> {
    Ok(parse_timestamp(&value)?.timestamp_millis())
}

/// Filter: a duration in milliseconds, in words ("5 minutes", "an hour").
pub fn humanize_ms(ms: u64) -> String {
    let secs = ms as f64 / 1000.0;
    let minutes = (secs / 60.0).round() as u64;
    let hours = (secs / 3600.0).round() as u64;
    let days = (secs / 86_400.0).round() as u64;

    if secs < 45.0 {
        "a few seconds".into()
    } else if secs < 90.0 {
        "a minute".into()
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if minutes < 90 {
        "an hour".into()
    } else if hours < 22 {
        format!("{hours} hours")
    } else if hours < 36 {
        "a day".into()
    } else if days < 26 {
        format!("{days} days")
    } else if days < 45 {
        "a month".into()
    } else if days < 320 {
        format!("{} months", (days as f64 / 30.0).round() as u64)
    } else if days < 548 {
        "a year".into()
    } else {
        format!("{} years", (days as f64 / 365.0).round() as u64)
    }
}
