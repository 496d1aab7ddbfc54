//! Error types for inbox triage.

use std::time::Duration;

/// Errors that end a triage cycle.
///
/// Model failures degrade to templates and per-conversation failures are
/// recorded in the report, so neither appears here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Retrying cannot help: the browser will not start or login is impossible.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Browser(BrowserError::Launch(_))
                | Self::Session(SessionError::CredentialsUnavailable | SessionError::Invalid(_))
        )
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Errors raised while driving the messaging UI.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Browser failed to launch: {0}")]
    Launch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authentication/session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session invalid: {0}")]
    Invalid(String),

    #[error("No credentials available and no interactive operator to ask")]
    CredentialsUnavailable,

    #[error("Session artifact error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error during login: {0}")]
    Browser(#[from] BrowserError),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Per-conversation pipeline errors, caught at the triage-loop boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Conversation {ordinal} could not be opened: {reason}")]
    OpenFailed { ordinal: usize, reason: String },

    #[error("Conversation list could not be restored: {0}")]
    RestoreFailed(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_error_converts_into_top_level() {
        let err: Error = BrowserError::Launch("no chrome binary".into()).into();
        assert!(matches!(err, Error::Browser(_)));
        assert!(err.to_string().contains("no chrome binary"));
    }

    #[test]
    fn session_error_converts_into_top_level() {
        let err: Error = SessionError::CredentialsUnavailable.into();
        assert!(matches!(err, Error::Session(SessionError::CredentialsUnavailable)));
    }

    #[test]
    fn only_startup_and_login_failures_are_fatal() {
        assert!(Error::from(BrowserError::Launch("x".into())).is_fatal());
        assert!(Error::from(SessionError::CredentialsUnavailable).is_fatal());
        assert!(Error::from(SessionError::Invalid("wrong password".into())).is_fatal());

        let timeout = BrowserError::NavigationTimeout {
            url: "https://example.com/feed/".into(),
            timeout: Duration::from_secs(15),
        };
        assert!(!Error::from(SessionError::Browser(timeout)).is_fatal());
        assert!(!Error::from(BrowserError::Protocol("socket closed".into())).is_fatal());
    }

    #[test]
    fn navigation_timeout_message_includes_url() {
        let err = BrowserError::NavigationTimeout {
            url: "https://example.com/messaging/".into(),
            timeout: Duration::from_secs(15),
        };
        let text = err.to_string();
        assert!(text.contains("https://example.com/messaging/"));
        assert!(text.contains("15s"));
    }

    #[test]
    fn session_error_wraps_browser_error() {
        let err: SessionError = BrowserError::Protocol("socket closed".into()).into();
        assert!(err.to_string().contains("socket closed"));
    }
}
