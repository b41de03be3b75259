use thiserror::Error;

/// Errors raised while loading or validating [`NotifyConfig`](crate::NotifyConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Errors returned by a [`CheckLookup`](crate::CheckLookup) backend.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("check not found: {0}")]
    NotFound(String),

    #[error("check lookup failed: {0}")]
    Backend(String),
}
