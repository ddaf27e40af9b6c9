use thiserror::Error;

/// Top-level error type for the `beszel-api` crate.
///
/// Covers every failure mode of the hub's HTTP surface: credential
/// rejection, transport, HTTP status errors, and JSON decoding.
/// `beszel-core` classifies these into poll-cycle outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, or a request still got 401 after re-authenticating.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login answered 200 but carried no bearer token.
    #[error("Login response did not contain a token")]
    MissingToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status from a collection endpoint.
    #[error("API request failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The requested collection does not exist on this hub.
    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the hub rejected our credentials or token.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::MissingToken)
    }

    /// Returns `true` if this is a transient error worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_decode() && !e.is_builder(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CollectionNotFound { .. } => true,
            Self::Api { status: 404, .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if the response body could not be decoded.
    pub fn is_decode(&self) -> bool {
        match self {
            Self::Deserialization { .. } => true,
            Self::Transport(e) => e.is_decode(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_auth_expired());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = Error::Api {
            status: 400,
            message: "bad filter".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn auth_and_decode_classification() {
        assert!(
            Error::Authentication {
                message: "nope".into()
            }
            .is_auth_expired()
        );
        assert!(Error::MissingToken.is_auth_expired());

        let decode = Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        };
        assert!(decode.is_decode());
        assert!(!decode.is_transient());
    }

    #[test]
    fn not_found_covers_missing_collections() {
        let err = Error::CollectionNotFound {
            collection: "container_stats".into(),
        };
        assert!(err.is_not_found());
        assert!(
            Error::Api {
                status: 404,
                message: String::new()
            }
            .is_not_found()
        );
    }
}
