//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tedly_config::ConfigError;
use tedly_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the tedee cloud at {url}")]
    #[diagnostic(
        code(tedly::connection_failed),
        help("Check your network connection and the api_uri / token_uri settings.")
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(tedly::timeout),
        help("Raise [api] timeout in the config file or retry later.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(tedly::auth_failed),
        help(
            "Verify the email and password of your tedee account.\n\
             Run: tedly config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("No password configured for '{email}'")]
    #[diagnostic(
        code(tedly::no_credentials),
        help(
            "Store one with: tedly config set-password\n\
             Or set the TEDLY_PASSWORD environment variable."
        )
    )]
    NoCredentials { email: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Lock '{name}' not found")]
    #[diagnostic(
        code(tedly::not_found),
        help("Run: tedly locks to see the locks in your account")
    )]
    LockNotFound { name: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(tedly::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tedly::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(tedly::config),
        help("Check the config file: tedly config path")
    )]
    Config(Box<ConfigError>),

    #[error("Internal error: {0}")]
    #[diagnostic(code(tedly::internal))]
    Internal(String),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::LockNotFound { .. }
            | Self::ApiError {
                status: Some(404), ..
            } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::ApiError { .. } | Self::Internal(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::LockNotFound { identifier } => CliError::LockNotFound { name: identifier },
            CoreError::Api { message, status } => CliError::ApiError { message, status },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<tedly_api::Error> for CliError {
    fn from(err: tedly_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { email } => CliError::NoCredentials { email },
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let auth: CliError = CoreError::AuthenticationFailed {
            message: "invalid_grant".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing: CliError = CoreError::LockNotFound {
            identifier: "Garage".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let offline: CliError = CoreError::ConnectionFailed {
            url: "https://api.tedee.com".into(),
            reason: "refused".into(),
        }
        .into();
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err: CliError = ConfigError::Validation {
            field: "email".into(),
            reason: "required".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(err.to_string(), "Invalid value for email: required");
    }
}
