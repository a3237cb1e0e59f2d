//! Error types shared across the crate.

/// Configuration errors raised while resolving startup settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by channel (HTTP gateway) startup.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },
}

/// Errors from case store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    #[error("Case not found")]
    NotFound(u64),
}

/// Errors from the AI gateway.
///
/// Chat and document operations never surface these to HTTP callers; they are
/// converted to fallback text at the call site.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("AI gateway is not configured")]
    NotConfigured,

    #[error("AI gateway request failed: {0}")]
    Request(String),

    #[error("AI gateway returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("AI gateway returned an empty response")]
    EmptyResponse,

    #[error("AI gateway returned an unusable response: {0}")]
    InvalidResponse(String),
}
