// ── Core error types ──
//
// `PollError` is the outcome taxonomy of a single poll cycle; the
// coordinator decides between backoff and the regular interval from it.
// `CoreError` covers coordinator lifecycle failures. The
// `From<beszel_api::Error>` impl translates transport-layer errors.

use thiserror::Error;

/// Why a poll cycle failed.
///
/// Every variant leaves the previously published snapshot in place.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// Credentials rejected, or a token still refused after re-authentication.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Network failure, timeout, or server-side error. Retried with backoff.
    #[error("Hub unreachable: {message}")]
    Transient { message: String, timed_out: bool },

    /// The hub answered with a body we could not decode.
    #[error("Could not decode hub response: {message}")]
    Decode { message: String },

    /// Any other refusal (4xx, invalid URL, TLS setup).
    #[error("Request rejected{}: {message}", http_suffix(.status.as_ref()))]
    Rejected { status: Option<u16>, message: String },
}

fn http_suffix(status: Option<&u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl PollError {
    /// Whether the next attempt should use the backoff schedule.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<beszel_api::Error> for PollError {
    fn from(err: beszel_api::Error) -> Self {
        use beszel_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::Auth { message },
            Api::MissingToken => Self::Auth {
                message: "login response did not contain a token".into(),
            },
            Api::Transport(ref e) if e.is_decode() => Self::Decode {
                message: e.to_string(),
            },
            Api::Transport(ref e) if e.is_builder() => Self::Rejected {
                status: None,
                message: e.to_string(),
            },
            Api::Transport(e) => Self::Transient {
                timed_out: e.is_timeout(),
                message: e.to_string(),
            },
            Api::Api { status, message } if status >= 500 || status == 429 => Self::Transient {
                message: format!("HTTP {status}: {message}"),
                timed_out: false,
            },
            Api::Api { status, message } => Self::Rejected {
                status: Some(status),
                message,
            },
            Api::CollectionNotFound { collection } => Self::Rejected {
                status: Some(404),
                message: format!("collection not found: {collection}"),
            },
            Api::Deserialization { message, .. } => Self::Decode { message },
            Api::InvalidUrl(e) => Self::Rejected {
                status: None,
                message: format!("invalid URL: {e}"),
            },
            Api::Tls(message) => Self::Rejected {
                status: None,
                message: format!("TLS error: {message}"),
            },
        }
    }
}

/// Coordinator lifecycle errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The HTTP client could not be built from the configuration.
    #[error("Invalid monitor configuration: {message}")]
    Config { message: String },

    /// `start()` was called on a coordinator that is already running.
    #[error("Coordinator is already running")]
    AlreadyRunning,

    /// The coordinator was shut down and cannot be restarted.
    #[error("Coordinator has been shut down")]
    ShutDown,

    #[error(transparent)]
    Poll(#[from] PollError),
}

impl From<beszel_api::Error> for CoreError {
    fn from(err: beszel_api::Error) -> Self {
        match err {
            beszel_api::Error::Tls(message) => CoreError::Config {
                message: format!("TLS: {message}"),
            },
            beszel_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("URL: {e}"),
            },
            other => CoreError::Poll(PollError::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_map_to_transient() {
        let err = PollError::from(beszel_api::Error::Api {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_map_to_rejected() {
        let err = PollError::from(beszel_api::Error::Api {
            status: 403,
            message: "forbidden".into(),
        });
        assert_eq!(
            err,
            PollError::Rejected {
                status: Some(403),
                message: "forbidden".into()
            }
        );
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Request rejected (HTTP 403): forbidden");
    }

    #[test]
    fn auth_failures_are_permanent() {
        let err = PollError::from(beszel_api::Error::Authentication {
            message: "credentials rejected (HTTP 400 Bad Request)".into(),
        });
        assert!(err.is_auth());
        assert!(!err.is_transient());
        assert!(PollError::from(beszel_api::Error::MissingToken).is_auth());
    }

    #[test]
    fn decode_failures_are_permanent() {
        let err = PollError::from(beszel_api::Error::Deserialization {
            message: "expected value at line 1".into(),
            body: "<html>".into(),
        });
        assert!(matches!(err, PollError::Decode { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn tls_setup_is_a_config_error() {
        let err = CoreError::from(beszel_api::Error::Tls("bad pem".into()));
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
