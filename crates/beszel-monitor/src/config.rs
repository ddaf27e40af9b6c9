//! CLI configuration: thin wrapper around `beszel_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --port, --username, ...).

use std::path::PathBuf;

use beszel_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use beszel_config::{Config, Profile};

/// Config file in effect: `--config` / `BESZEL_CONFIG`, else the platform path.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(beszel_config::config_path)
}

/// Load the config file in effect, or defaults when there is none.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    match global.config {
        Some(ref path) => Ok(beszel_config::load_config_from(path)?),
        None => Ok(beszel_config::load_config_or_default()),
    }
}

pub fn save(cfg: &Config, global: &GlobalOpts) -> Result<PathBuf, CliError> {
    let path = config_path(global);
    beszel_config::save_config_to(cfg, &path)?;
    Ok(path)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.active_profile_name(global.profile.as_deref())
}

/// Build the `MonitorConfig` for this invocation.
///
/// Uses the active profile with flag overrides on top. Without a profile,
/// `--host` plus `BESZEL_USERNAME` / `BESZEL_PASSWORD` is enough.
pub fn resolve(global: &GlobalOpts) -> Result<(String, MonitorConfig), CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let base = match (cfg.profiles.get(&profile_name), global.host.as_deref()) {
        (Some(profile), _) => profile.clone(),
        (None, Some(host)) => Profile::new(host),
        (None, None) => {
            if global.profile.is_some() {
                cfg.profile(&profile_name)?;
            }
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };

    let profile = apply_overrides(base, global);
    let username = match global.username {
        Some(ref user) => user.clone(),
        None => beszel_config::resolve_username(&profile, &profile_name)?,
    };
    let password = beszel_config::resolve_password(&profile, &profile_name)?;
    let monitor = beszel_config::build_monitor_config(&profile, &cfg.defaults, username, password)?;
    Ok((profile_name, monitor))
}

/// Flags win over profile values; unset flags leave the profile alone.
fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if global.ssl {
        profile.ssl = true;
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    profile
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["beszel-monitor"];
        argv.extend_from_slice(args);
        argv.push("check");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_profile_fields() {
        let mut profile = Profile::new("old.lan");
        profile.timeout = Some(5);
        let overridden = apply_overrides(
            profile,
            &global(&["--host", "new.lan", "--port", "443", "--ssl", "-k"]),
        );
        assert_eq!(overridden.host, "new.lan");
        assert_eq!(overridden.port, 443);
        assert!(overridden.ssl);
        assert_eq!(overridden.insecure, Some(true));
        assert_eq!(overridden.timeout, Some(5));
    }

    #[test]
    fn unset_flags_keep_profile() {
        let mut profile = Profile::new("hub.lan");
        profile.ssl = true;
        let kept = apply_overrides(profile.clone(), &global(&[]));
        assert_eq!(kept, profile);
    }

    #[test]
    fn missing_profile_and_host_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();
        let err = resolve(&global(&["--config", path])).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn unknown_named_profile_lists_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[profiles.home]\nhost = \"10.0.0.2\"\nusername = \"a@b.c\"\npassword = \"pw\"\n",
        )
        .unwrap();
        let err = resolve(&global(&["--config", path.to_str().unwrap(), "-p", "lab"])).unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "lab");
                assert_eq!(available, "home");
            }
            other => panic!("expected ProfileNotFound, got {other:?}"),
        }
    }
}
