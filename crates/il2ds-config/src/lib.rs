//! Shared configuration for IL-2 FB dedicated server tools.
//!
//! TOML profiles, one per server, with console and Device Link
//! addresses, and translation to the `il2ds_api` settings types.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use il2ds_api::{ConsoleSettings, DeviceLinkSettings};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

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
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request deadline in seconds for both clients.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    20
}

/// A named dedicated-server profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Console TCP address (e.g., "127.0.0.1:20000").
    pub console: String,

    /// Device Link UDP address. Absent when the server does not expose
    /// Device Link.
    pub device_link: Option<String>,

    /// Override the request deadline, in seconds.
    pub timeout: Option<u64>,
}

impl Profile {
    fn timeout(&self, defaults: &Defaults) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(defaults.timeout))
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: "<default>".into(),
            })?;
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })?;
        Ok((name, profile))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "il2ds", "il2ds").map_or_else(
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
    p.push("il2ds");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_at(&config_path())
}

/// Load the full Config from an explicit file + environment.
pub fn load_config_at(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("IL2DS_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write to an explicit path.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Settings translation ────────────────────────────────────────────

/// Build [`ConsoleSettings`] from a profile.
pub fn profile_to_console_settings(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConsoleSettings, ConfigError> {
    let address: SocketAddr = profile
        .console
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "console".into(),
            reason: format!("invalid socket address: {}", profile.console),
        })?;
    Ok(ConsoleSettings::new(address).with_request_timeout(profile.timeout(defaults)))
}

/// Build [`DeviceLinkSettings`] from a profile, or `None` when the
/// profile has no Device Link address.
pub fn profile_to_device_link_settings(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<Option<DeviceLinkSettings>, ConfigError> {
    let Some(raw) = &profile.device_link else {
        return Ok(None);
    };
    let address: SocketAddr = raw.parse().map_err(|_| ConfigError::Validation {
        field: "device_link".into(),
        reason: format!("invalid socket address: {raw}"),
    })?;
    Ok(Some(
        DeviceLinkSettings::new(address).with_request_timeout(profile.timeout(defaults)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_profiles_from_toml() {
        let (_dir, path) = write_config(
            r#"
            default_profile = "local"

            [defaults]
            timeout = 5

            [profiles.local]
            console = "127.0.0.1:20000"
            device_link = "127.0.0.1:10000"

            [profiles.remote]
            console = "192.168.1.10:20000"
            timeout = 60
            "#,
        );

        let config = load_config_at(&path).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("local"));
        assert_eq!(config.defaults.timeout, 5);

        let (name, profile) = config.profile(None).unwrap();
        assert_eq!(name, "local");
        assert_eq!(profile.console, "127.0.0.1:20000");

        let (_, remote) = config.profile(Some("remote")).unwrap();
        assert_eq!(remote.timeout, Some(60));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_at(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let config = Config::default();
        assert!(matches!(
            config.profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn translates_console_settings() {
        let profile = Profile {
            console: "127.0.0.1:20000".into(),
            device_link: None,
            timeout: Some(7),
        };
        let settings = profile_to_console_settings(&profile, &Defaults::default()).unwrap();
        assert_eq!(settings.address.port(), 20000);
        assert_eq!(settings.request_timeout, Duration::from_secs(7));

        assert!(
            profile_to_device_link_settings(&profile, &Defaults::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        let profile = Profile {
            console: "not-an-address".into(),
            device_link: None,
            timeout: None,
        };
        assert!(matches!(
            profile_to_console_settings(&profile, &Defaults::default()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn saves_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "local".into(),
            Profile {
                console: "127.0.0.1:20000".into(),
                device_link: Some("127.0.0.1:10000".into()),
                timeout: None,
            },
        );
        save_config_to(&config, &path).unwrap();

        let reloaded = load_config_at(&path).unwrap();
        let (_, profile) = reloaded.profile(Some("local")).unwrap();
        assert_eq!(profile.device_link.as_deref(), Some("127.0.0.1:10000"));
    }
}
