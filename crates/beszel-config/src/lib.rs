//! Shared configuration for beszel-monitor.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `beszel_core::MonitorConfig`. The binary adds
//! flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use beszel_core::{BackoffPolicy, MonitorConfig, TlsVerification};

/// Keyring service name under which passwords are stored.
pub const KEYRING_SERVICE: &str = "beszel-monitor";

/// Env var consulted first for the hub password.
pub const PASSWORD_ENV: &str = "BESZEL_PASSWORD";

/// Env var consulted when a profile has no username.
pub const USERNAME_ENV: &str = "BESZEL_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Profile name selected by `requested`, else the default profile.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profile_names(),
            })
    }

    fn profile_names(&self) -> String {
        if self.profiles.is_empty() {
            "(none)".into()
        } else {
            self.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    30
}
fn default_port() -> u16 {
    beszel_core::config::DEFAULT_PORT
}
fn default_true() -> bool {
    true
}

/// A named hub profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Hub hostname or IP address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Use HTTPS.
    #[serde(default)]
    pub ssl: bool,

    /// Login identity (email or username).
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or `BESZEL_PASSWORD`).
    pub password: Option<String>,

    /// Also poll Docker container stats.
    #[serde(default = "default_true")]
    pub include_docker: bool,

    /// Override poll interval (seconds).
    pub poll_interval: Option<u64>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Re-login after this many seconds even without a 401.
    pub token_lifetime: Option<u64>,

    /// First retry delay after a transient failure (seconds).
    pub backoff_initial: Option<u64>,

    /// Retry delay ceiling (seconds).
    pub backoff_max: Option<u64>,
}

impl Profile {
    /// A profile for `host` with every other field at its default.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            ssl: false,
            username: None,
            password: None,
            include_docker: true,
            poll_interval: None,
            timeout: None,
            insecure: None,
            ca_cert: None,
            token_lifetime: None,
            backoff_initial: None,
            backoff_max: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "beszel-monitor", "beszel-monitor").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("beszel-monitor");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit path, layering `BESZEL_` env vars on top.
///
/// Nested keys use a double underscore: `BESZEL_DEFAULTS__TIMEOUT=20`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("BESZEL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Resolve the login identity: profile value, then `BESZEL_USERNAME`.
pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: `BESZEL_PASSWORD`, then keyring, then plaintext.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    let env = std::env::var(PASSWORD_ENV).ok();
    let from_keyring = || {
        keyring_entry(profile_name)
            .and_then(|entry| entry.get_password())
            .ok()
    };
    first_password(env, from_keyring, profile.password.as_deref()).ok_or_else(|| {
        ConfigError::NoCredentials {
            profile: profile_name.into(),
        }
    })
}

/// The keyring is only consulted when the env var is unset.
fn first_password(
    env: Option<String>,
    keyring: impl FnOnce() -> Option<String>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    env.filter(|p| !p.is_empty())
        .or_else(keyring)
        .or_else(|| plaintext.map(str::to_owned))
        .map(SecretString::from)
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

// ── MonitorConfig translation ───────────────────────────────────────

/// Build a `MonitorConfig` from a profile, resolving credentials.
pub fn profile_to_monitor_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<MonitorConfig, ConfigError> {
    let username = resolve_username(profile, profile_name)?;
    let password = resolve_password(profile, profile_name)?;
    build_monitor_config(profile, defaults, username, password)
}

/// Translate a profile once credentials are known.
pub fn build_monitor_config(
    profile: &Profile,
    defaults: &Defaults,
    username: String,
    password: SecretString,
) -> Result<MonitorConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "hub host is not set".into(),
        });
    }

    let url = beszel_api::hub_url(&profile.host, profile.port, profile.ssl).map_err(|e| {
        ConfigError::Validation {
            field: "host".into(),
            reason: format!("cannot build hub URL from '{}': {e}", profile.host),
        }
    })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let poll_interval = profile.poll_interval.unwrap_or(defaults.poll_interval);
    if poll_interval == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let fallback = BackoffPolicy::default();
    let backoff = BackoffPolicy {
        initial: profile
            .backoff_initial
            .map_or(fallback.initial, Duration::from_secs),
        max: profile.backoff_max.map_or(fallback.max, Duration::from_secs),
    };

    let mut cfg = MonitorConfig::new(url, username, password);
    cfg.tls = tls;
    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    cfg.poll_interval = Duration::from_secs(poll_interval);
    cfg.include_docker = profile.include_docker;
    cfg.backoff = backoff;
    cfg.token_lifetime = profile.token_lifetime.map(Duration::from_secs);
    Ok(cfg)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn sample_config() -> Config {
        let mut profile = Profile::new("10.0.0.2");
        profile.username = Some("admin@example.com".into());
        profile.poll_interval = Some(15);
        let mut cfg = Config::default();
        cfg.profiles.insert("home".into(), profile);
        cfg.default_profile = Some("home".into());
        cfg
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.defaults.timeout, 10);
        assert_eq!(cfg.defaults.poll_interval, 30);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = sample_config();

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.default_profile.as_deref(), Some("home"));
        let home = loaded.profile("home").unwrap();
        assert_eq!(home.host, "10.0.0.2");
        assert_eq!(home.port, 8090);
        assert!(home.include_docker);
        assert_eq!(home.poll_interval, Some(15));
    }

    #[test]
    fn minimal_profile_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[profiles.lab]\nhost = \"beszel.lab\"\nssl = true\n").unwrap();

        let cfg = load_config_from(&path).unwrap();
        let lab = cfg.profile("lab").unwrap();
        assert!(lab.ssl);
        assert_eq!(lab.port, 8090);
        assert!(lab.username.is_none());
    }

    #[test]
    fn unknown_profile_lists_available() {
        let err = sample_config().profile("work").unwrap_err();
        assert_eq!(
            err.to_string(),
            "profile 'work' not found (available: home)"
        );
    }

    #[test]
    fn active_profile_prefers_request() {
        let cfg = sample_config();
        assert_eq!(cfg.active_profile_name(Some("other")), "other");
        assert_eq!(cfg.active_profile_name(None), "home");
    }

    #[test]
    fn password_chain_order() {
        let from_env = first_password(Some("env".into()), || Some("ring".into()), Some("plain"));
        assert_eq!(from_env.unwrap().expose_secret(), "env");

        let from_ring = first_password(None, || Some("ring".into()), Some("plain"));
        assert_eq!(from_ring.unwrap().expose_secret(), "ring");

        let from_plain = first_password(Some(String::new()), || None, Some("plain"));
        assert_eq!(from_plain.unwrap().expose_secret(), "plain");

        assert!(first_password(None, || None, None).is_none());
    }

    #[test]
    fn profile_translates_to_monitor_config() {
        let mut profile = Profile::new("beszel.lan");
        profile.ssl = true;
        profile.port = 443;
        profile.include_docker = false;
        profile.token_lifetime = Some(3600);
        profile.backoff_max = Some(60);

        let cfg = build_monitor_config(
            &profile,
            &Defaults::default(),
            "admin".into(),
            SecretString::from("pw".to_string()),
        )
        .unwrap();

        assert_eq!(cfg.url.as_str(), "https://beszel.lan/");
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert!(!cfg.include_docker);
        assert_eq!(cfg.token_lifetime, Some(Duration::from_secs(3600)));
        assert_eq!(cfg.backoff.initial, Duration::from_secs(5));
        assert_eq!(cfg.backoff.max, Duration::from_secs(60));
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
    }

    #[test]
    fn insecure_and_custom_ca() {
        let mut profile = Profile::new("hub");
        profile.ca_cert = Some("/etc/ca.pem".into());
        let defaults = Defaults::default();
        let pw = || SecretString::from("pw".to_string());

        let cfg = build_monitor_config(&profile, &defaults, "a".into(), pw()).unwrap();
        assert_eq!(cfg.tls, TlsVerification::CustomCa("/etc/ca.pem".into()));

        profile.insecure = Some(true);
        let cfg = build_monitor_config(&profile, &defaults, "a".into(), pw()).unwrap();
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = build_monitor_config(
            &Profile::new(" "),
            &Defaults::default(),
            "a".into(),
            SecretString::from("pw".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "host"));
    }
}
