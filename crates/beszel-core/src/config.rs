// ── Runtime monitor configuration ──
//
// Describes *how* to reach one hub and how often to poll it. Carries
// credential data and tuning but never touches disk; the binary (or any
// other host) builds a `MonitorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Default hub port.
pub const DEFAULT_PORT: u16 = 8090;

/// Default interval between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed hubs).
    DangerAcceptInvalid,
}

/// Exponential backoff bounds applied after transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(300),
        }
    }
}

/// Everything the coordinator needs to poll a single hub.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Hub base URL (e.g. `http://10.0.0.2:8090`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Interval between regular poll cycles.
    pub poll_interval: Duration,
    /// Fetch Docker container stats alongside systems.
    pub include_docker: bool,
    pub backoff: BackoffPolicy,
    /// Proactively re-login after this long. `None` keeps the token until a 401.
    pub token_lifetime: Option<Duration>,
}

impl MonitorConfig {
    /// Config with default tuning for the given hub and credentials.
    pub fn new(url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            url,
            username: username.into(),
            password,
            tls: TlsVerification::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            include_docker: true,
            backoff: BackoffPolicy::default(),
            token_lifetime: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hub_conventions() {
        let cfg = MonitorConfig::new(
            Url::parse("http://hub:8090").unwrap(),
            "admin",
            SecretString::from("pw".to_string()),
        );
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert!(cfg.include_docker);
        assert_eq!(cfg.backoff.initial, Duration::from_secs(5));
        assert_eq!(cfg.backoff.max, Duration::from_secs(300));
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
    }
}
