//! CLI error types with miette diagnostics.
//!
//! Maps library errors into user-facing errors with actionable help text
//! and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use beszel_config::ConfigError;
use beszel_core::{CoreError, PollError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the hub: {message}")]
    #[diagnostic(
        code(beszel::connection_failed),
        help(
            "Check that the hub is running and reachable.\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed { message: String },

    #[error("Request to the hub timed out")]
    #[diagnostic(
        code(beszel::timeout),
        help("Increase the timeout with --timeout or check hub responsiveness.")
    )]
    Timeout { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(beszel::auth_failed),
        help(
            "Fix the username or password for this hub.\n\
             Run: beszel-monitor config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(beszel::no_credentials),
        help(
            "Configure credentials with: beszel-monitor config init\n\
             Or set BESZEL_USERNAME and BESZEL_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Hub responses ────────────────────────────────────────────────
    #[error("Unexpected response from the hub: {message}")]
    #[diagnostic(
        code(beszel::decode),
        help("The hub may be running an incompatible Beszel version. Re-run with -vv for details.")
    )]
    Decode { message: String },

    #[error("{message}")]
    #[diagnostic(code(beszel::rejected))]
    Rejected { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(beszel::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(beszel::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: beszel-monitor config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No hub configured")]
    #[diagnostic(
        code(beszel::no_config),
        help(
            "Create a profile with: beszel-monitor config init\n\
             Expected at: {path}\n\
             Or pass --host with BESZEL_USERNAME and BESZEL_PASSWORD."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(beszel::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    #[diagnostic(code(beszel::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to an authentication failure.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.into(),
                message,
            },
            other => other,
        }
    }
}

// ── Library error mapping ────────────────────────────────────────────

impl From<PollError> for CliError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Auth { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },
            PollError::Transient {
                message,
                timed_out: true,
            } => CliError::Timeout { message },
            PollError::Transient { message, .. } => CliError::ConnectionFailed { message },
            PollError::Decode { message } => CliError::Decode { message },
            rejected @ PollError::Rejected { .. } => CliError::Rejected {
                message: rejected.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Poll(poll) => poll.into(),
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            other @ (CoreError::AlreadyRunning | CoreError::ShutDown) => CliError::Rejected {
                message: other.to_string(),
            },
        }
    }
}

impl From<beszel_api::Error> for CliError {
    fn from(err: beszel_api::Error) -> Self {
        PollError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_errors_map_to_exit_codes() {
        let auth: CliError = PollError::Auth {
            message: "bad password".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let refused: CliError = PollError::Transient {
            message: "connection refused".into(),
            timed_out: false,
        }
        .into();
        assert_eq!(refused.exit_code(), exit_code::CONNECTION);

        let slow: CliError = PollError::Transient {
            message: "deadline elapsed".into(),
            timed_out: true,
        }
        .into();
        assert_eq!(slow.exit_code(), exit_code::TIMEOUT);

        let decode: CliError = PollError::Decode {
            message: "expected object".into(),
        }
        .into();
        assert_eq!(decode.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_errors_keep_their_meaning() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "home".into(),
        }
        .into();
        assert!(matches!(err, CliError::NoCredentials { ref profile } if profile == "home"));
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err: CliError = CoreError::Config {
            message: "poll interval must be greater than zero".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn auth_failure_names_the_profile() {
        let err = CliError::from(PollError::Auth {
            message: "rejected".into(),
        })
        .for_profile("lab");
        match err {
            CliError::AuthFailed { profile, .. } => assert_eq!(profile, "lab"),
            other => panic!("expected auth failure, got {other:?}"),
        }
    }
}
