use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;

/// Path of the PocketBase password login endpoint for hub users.
pub const LOGIN_PATH: &str = "/api/collections/users/auth-with-password";

/// Username/password pair exchanged for a bearer token.
///
/// PocketBase calls the username field `identity`; it accepts either the
/// user's email or username.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identity: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, password: SecretString) -> Self {
        Self {
            identity: identity.into(),
            password,
        }
    }
}

/// An authenticated session against one hub.
///
/// Holds the bearer token returned by the login endpoint. The token is
/// kept until a 401 forces re-authentication or, when a lifetime was
/// configured, until `expires_at` passes.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SecretString,
    pub obtained_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub(crate) fn new(token: SecretString, lifetime: Option<Duration>) -> Self {
        let obtained_at = Utc::now();
        let expires_at = lifetime
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| obtained_at + ttl);
        Self {
            token,
            obtained_at,
            expires_at,
        }
    }

    /// Whether the configured lifetime has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Body of a successful `auth-with-password` response.
///
/// Only the token matters here; the `record` field is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_without_lifetime_never_expires() {
        let session = Session::new(SecretString::from("t".to_string()), None);
        let far_future = Utc::now() + chrono::Duration::days(3650);
        assert!(!session.is_expired_at(far_future));
    }

    #[test]
    fn session_expires_after_lifetime() {
        let session = Session::new(
            SecretString::from("t".to_string()),
            Some(Duration::from_secs(60)),
        );
        assert!(!session.is_expired_at(session.obtained_at));
        assert!(session.is_expired_at(session.obtained_at + chrono::Duration::seconds(61)));
    }
}
