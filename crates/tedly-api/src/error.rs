use thiserror::Error;

/// Top-level error type for the `tedly-api` crate.
///
/// Covers every failure mode of the vendor surface: the token endpoint,
/// transport, non-success API responses, and payload decoding.
/// `tedly-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The token endpoint rejected the account or stayed unreachable
    /// after the token retry budget ran out.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from an API endpoint.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if retrying the whole operation cannot help.
    ///
    /// An exhausted token budget and a malformed base URL abort the
    /// enclosing operation; everything else goes through the API retry
    /// policy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::InvalidUrl(_))
    }

    /// Returns `true` if the API rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 401,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 404,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }
}
