// Error types and user-friendly error messages
//
// Every library operation returns `Result<T>` with an `OadinError` that carries
// a machine-readable `ErrorKind` next to the human-readable message.
//
// Localization Support:
// Suggestion text follows the LANG environment variable.
// Currently supported: English (en_US) and Simplified Chinese (zh_CN).

use std::fmt;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, OadinError>;

/// What went wrong, so callers can branch on the cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request body could not be serialized
    Serialization,
    /// Connection, DNS or body transfer failure
    Transport,
    /// Daemon answered with a non-success status code
    Status(u16),
    /// A document (response line, config export, import file) was not valid JSON
    Parse,
    /// Local filesystem failure
    Io,
    /// Current OS has no daemon build
    UnsupportedPlatform,
    /// Daemon executable is missing from the product directory
    NotInstalled,
    /// A subprocess failed to start or exited unsuccessfully
    Process(Option<i32>),
    /// Client configuration is missing or malformed
    Config,
}

/// Structured error returned by every fallible operation
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OadinError {
    kind: ErrorKind,
    message: String,
}

impl OadinError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with call-site context, keeping the kind
    pub fn context(self, context: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", context, self.message),
        }
    }

    pub fn io(context: impl fmt::Display, err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{}: {}", context, err))
    }

    pub fn parse(context: impl fmt::Display, err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Parse, format!("{}: {}", context, err))
    }

    /// True for failures where the daemon could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        self.kind == ErrorKind::Transport
    }
}

impl From<reqwest::Error> for OadinError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::new(ErrorKind::Status(status.as_u16()), err.to_string()),
            None => Self::new(ErrorKind::Transport, err.to_string()),
        }
    }
}

/// Get the current locale from environment
fn get_locale() -> &'static str {
    if let Ok(lang) = std::env::var("LANG") {
        if lang.starts_with("zh") {
            return "zh";
        }
    }
    "en"
}

/// Localized text helper
fn t(key: &str) -> String {
    let text = match (get_locale(), key) {
        ("zh", "try") => "尝试:",
        ("zh", "suggestion") => "建议",
        ("zh", "possible_causes") => "可能原因:",

        _ => match key {
            "try" => "Try:",
            "suggestion" => "Suggestion",
            "possible_causes" => "Possible causes:",
            _ => key,
        },
    };

    text.to_string()
}

/// Format a daemon-unreachable error with helpful suggestions
pub fn daemon_unreachable_error(base_url: &str) -> String {
    format!(
        "Could not reach the Oadin daemon at {}\n\n\
        \x1b[1;33m{}\x1b[0m\n\
        • Daemon is not running\n\
        • Daemon is not installed yet\n\
        • Wrong endpoint or API version in ~/Oadin/client.toml\n\n\
        \x1b[1;32m{}\x1b[0m\n\
        1. Start the daemon:\n\
           \x1b[36moadin-client start\x1b[0m\n\n\
        2. Download it first if missing:\n\
           \x1b[36moadin-client download\x1b[0m",
        base_url,
        t("possible_causes"),
        t("try")
    )
}

/// Format a daemon-not-installed error with helpful suggestions
pub fn daemon_not_installed_error(executable: &str) -> String {
    format!(
        "Oadin executable not found: {}\n\n\
        \x1b[1;32m{}\x1b[0m\n\
        1. Download the daemon:\n\
           \x1b[36moadin-client download\x1b[0m\n\n\
        2. Then start it:\n\
           \x1b[36moadin-client start\x1b[0m",
        executable,
        t("try")
    )
}

/// Wrap a generic error with suggestions
pub fn wrap_error_with_suggestion(error: impl fmt::Display, suggestion: &str) -> String {
    format!(
        "{}\n\n\
        \x1b[1;33m{}:\x1b[0m {}",
        error,
        t("suggestion"),
        suggestion
    )
}
