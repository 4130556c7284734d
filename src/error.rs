use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the dispatcher.
///
/// Variants fall into three classes. Configuration errors are raised before any
/// network I/O, transport errors come from the HTTP exchange itself, and decode
/// errors cover a complete response body that is not JSON. Use
/// [`LLMError::is_config`] and [`LLMError::is_transport`] when the class is all
/// the caller cares about.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Represents connection or body-read failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The per-request timeout elapsed before the exchange finished.
    #[error("request timed out: {message}")]
    Timeout { message: String },
    /// A non-2xx status that is not covered by a more specific variant.
    #[error("http status {status}: {message}")]
    Status {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Error message extracted from the body, or the raw body.
        message: String,
    },
    /// Reports invalid or missing credentials.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// Indicates that the backend answered with HTTP 429.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Raw message returned by the upstream backend.
        message: String,
        /// Optional wait duration suggested through `Retry-After`.
        retry_after: Option<Duration>,
    },
    /// Signals that a request body could not be serialized.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Raised when the request shape or a backend description is unusable.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the field that is missing or invalid.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// Wraps strategy-level decode failures of a complete response.
    #[error("strategy {provider} error: {message}")]
    Provider {
        /// Name of the strategy, such as `chat`.
        provider: &'static str,
        /// Human-readable description of the failure.
        message: String,
    },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_dispatch::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// assert!(err.is_transport());
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::InvalidConfig`] for the given field.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_dispatch::error::LLMError;
    ///
    /// let err = LLMError::invalid_config("prompt", "claude-style backends require a prompt");
    /// assert!(err.is_config());
    /// assert_eq!(
    ///     err.to_string(),
    ///     "invalid configuration for prompt: claude-style backends require a prompt"
    /// );
    /// ```
    pub fn invalid_config<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`LLMError::Provider`] with the given strategy name and message.
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Returns `true` for client-side failures raised before any network I/O.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::Validation { .. })
    }

    /// Returns `true` for failures of the HTTP exchange, including non-2xx statuses.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::Status { .. }
                | Self::Auth { .. }
                | Self::RateLimit { .. }
        )
    }
}
