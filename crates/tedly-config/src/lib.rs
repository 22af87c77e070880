//! Configuration for the tedly bridge.
//!
//! TOML file + `TEDLY_` environment overrides, password resolution
//! (env → keyring → plaintext), and translation to
//! `tedly_core::BridgeConfig`.

use std::collections::HashSet;
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
use url::Url;

use tedly_api::auth::DEFAULT_TOKEN_URL;
use tedly_api::client::DEFAULT_API_URL;
use tedly_api::{Account, ClientConfig, RetryPolicy, TransportConfig};
use tedly_core::{BridgeConfig, BridgeSettings, ControllerTimings, DeviceConfig};

/// Keyring service under which passwords are stored, keyed by email.
pub const KEYRING_SERVICE: &str = "tedly";

/// Environment variable checked first for the account password.
pub const PASSWORD_ENV: &str = "TEDLY_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for '{email}'")]
    NoCredentials { email: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Email address of the tedee account.
    pub email: Option<String>,

    /// Account password (plaintext; prefer keyring or `TEDLY_PASSWORD`).
    pub password: Option<String>,

    /// Seconds between two background syncs. Values below 10 are raised to 10.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    /// Endpoint and retry tuning. Rarely needs changing.
    #[serde(default)]
    pub api: ApiSettings,

    /// Locks to expose, matched by name.
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            update_interval: default_update_interval(),
            api: ApiSettings::default(),
            devices: Vec::new(),
        }
    }
}

fn default_update_interval() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default = "default_api_uri")]
    pub api_uri: String,

    /// Retries after the first token request.
    #[serde(default = "default_retries")]
    pub maximum_token_retry: u32,

    /// Milliseconds between token retries.
    #[serde(default = "default_token_retry_interval")]
    pub token_retry_interval: u64,

    /// Retries after the first API call.
    #[serde(default = "default_retries")]
    pub maximum_api_retry: u32,

    /// Milliseconds between API retries.
    #[serde(default = "default_api_retry_interval")]
    pub api_retry_interval: u64,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            token_uri: default_token_uri(),
            api_uri: default_api_uri(),
            maximum_token_retry: default_retries(),
            token_retry_interval: default_token_retry_interval(),
            maximum_api_retry: default_retries(),
            api_retry_interval: default_api_retry_interval(),
            timeout: default_timeout(),
        }
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URL.into()
}
fn default_api_uri() -> String {
    DEFAULT_API_URL.into()
}
fn default_retries() -> u32 {
    3
}
fn default_token_retry_interval() -> u64 {
    2000
}
fn default_api_retry_interval() -> u64 {
    5000
}
fn default_timeout() -> u64 {
    30
}

/// One exposed lock.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Device {
    /// Name of the lock in the tedee app.
    pub name: String,

    /// Expose a second lock mechanism that pulls the spring.
    #[serde(default)]
    pub expose_latch: bool,

    #[serde(default = "default_lock_name")]
    pub lock_name: String,

    #[serde(default = "default_latch_name")]
    pub latch_name: String,

    #[serde(default)]
    pub disable_unlock: bool,

    #[serde(default)]
    pub unlatch_from_locked: bool,

    #[serde(default)]
    pub unlatch_from_unlocked: bool,

    #[serde(default)]
    pub prevent_unlatch_if_locked: bool,
}

fn default_lock_name() -> String {
    "Lock".into()
}
fn default_latch_name() -> String {
    "Latch".into()
}

impl From<&Device> for DeviceConfig {
    fn from(d: &Device) -> Self {
        Self {
            name: d.name.clone(),
            expose_latch: d.expose_latch,
            lock_label: d.lock_name.clone(),
            latch_label: d.latch_name.clone(),
            disable_unlock: d.disable_unlock,
            unlatch_from_locked: d.unlatch_from_locked,
            unlatch_from_unlocked: d.unlatch_from_unlocked,
            prevent_unlatch_if_locked: d.prevent_unlatch_if_locked,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tedly", "tedly").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("tedly");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the platform config path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys use a double underscore: `TEDLY_API__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TEDLY_").split("__"));

    Ok(figment.extract()?)
}

/// Render the config as TOML with the plaintext password masked.
pub fn render_redacted(cfg: &Config) -> Result<String, ConfigError> {
    let mut shown = cfg.clone();
    if shown.password.is_some() {
        shown.password = Some("********".into());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Check everything that can be checked without network access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.email.as_deref() {
            Some(email) if !email.trim().is_empty() => {}
            _ => return Err(invalid("email", "the account email address is required")),
        }

        parse_url("api.api_uri", &self.api.api_uri)?;
        parse_url("api.token_uri", &self.api.token_uri)?;

        let mut seen = HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            if device.name.trim().is_empty() {
                return Err(invalid(format!("devices[{i}].name"), "must not be empty"));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(invalid(
                    format!("devices[{i}].name"),
                    format!("'{}' is configured more than once", device.name),
                ));
            }
        }
        Ok(())
    }

    /// Validate, resolve the password, and build the runtime config.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        self.validate()?;
        let password = resolve_password(self)?;
        self.bridge_config_with(password)
    }

    fn bridge_config_with(&self, password: SecretString) -> Result<BridgeConfig, ConfigError> {
        let username = self.email.clone().unwrap_or_default();
        let api = &self.api;

        let client = ClientConfig {
            api_url: parse_url("api.api_uri", &api.api_uri)?,
            token_url: parse_url("api.token_uri", &api.token_uri)?,
            token_retry: RetryPolicy::new(
                api.maximum_token_retry,
                Duration::from_millis(api.token_retry_interval),
            ),
            api_retry: RetryPolicy::new(
                api.maximum_api_retry,
                Duration::from_millis(api.api_retry_interval),
            ),
            operation_poll_interval: Duration::from_secs(1),
            transport: TransportConfig::default().with_timeout(Duration::from_secs(api.timeout)),
        };

        let settings = BridgeSettings {
            update_interval: tedly_core::config::clamp_update_interval(Duration::from_secs(
                self.update_interval,
            )),
            devices: self.devices.iter().map(DeviceConfig::from).collect(),
            timings: ControllerTimings::default(),
        };

        Ok(BridgeConfig {
            account: Account { username, password },
            client,
            settings,
        })
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse()
        .map_err(|e: url::ParseError| invalid(field, format!("'{raw}' is not a valid URL: {e}")))
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the account password: `TEDLY_PASSWORD`, then the system
/// keyring (`tedly` / `<email>`), then the plaintext config value.
pub fn resolve_password(cfg: &Config) -> Result<SecretString, ConfigError> {
    let email = cfg.email.clone().unwrap_or_default();
    let from_keyring = || {
        keyring::Entry::new(KEYRING_SERVICE, &email)
            .and_then(|entry| entry.get_password())
            .ok()
    };
    first_password(
        std::env::var(PASSWORD_ENV).ok(),
        from_keyring,
        cfg.password.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        email: email.clone(),
    })
}

/// Store `password` in the system keyring for `email`.
pub fn store_password(email: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, email)?.set_password(password)?;
    Ok(())
}

/// The first non-empty source wins. The keyring is only queried when the
/// environment has nothing.
fn first_password(
    env: Option<String>,
    keyring: impl FnOnce() -> Option<String>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    env.filter(|p| !p.is_empty())
        .or_else(|| keyring().filter(|p| !p.is_empty()))
        .or_else(|| plaintext.filter(|p| !p.is_empty()).map(String::from))
        .map(SecretString::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn parse(contents: &str) -> Config {
        let file = write_config(contents);
        load_config_from(file.path()).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.update_interval, 15);
        assert_eq!(cfg.api.api_uri, DEFAULT_API_URL);
        assert_eq!(cfg.api.maximum_token_retry, 3);
        assert_eq!(cfg.api.token_retry_interval, 2000);
        assert_eq!(cfg.api.api_retry_interval, 5000);
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn devices_and_overrides_are_read() {
        let cfg = parse(
            r#"
            email = "me@example.com"
            update_interval = 30

            [api]
            timeout = 10

            [[devices]]
            name = "Front Door"
            expose_latch = true
            latch_name = "Door opener"
            unlatch_from_locked = true

            [[devices]]
            name = "Garage"
            "#,
        );

        assert_eq!(cfg.email.as_deref(), Some("me@example.com"));
        assert_eq!(cfg.update_interval, 30);
        assert_eq!(cfg.api.timeout, 10);
        assert_eq!(cfg.api.maximum_api_retry, 3);
        assert_eq!(cfg.devices.len(), 2);

        let front = &cfg.devices[0];
        assert!(front.expose_latch);
        assert!(front.unlatch_from_locked);
        assert_eq!(front.lock_name, "Lock");
        assert_eq!(front.latch_name, "Door opener");
        assert!(!cfg.devices[1].expose_latch);
    }

    #[test]
    fn email_is_required() {
        let cfg = parse("update_interval = 20");
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "email"
        ));
    }

    #[test]
    fn duplicate_device_names_are_rejected() {
        let cfg = parse(
            r#"
            email = "me@example.com"
            [[devices]]
            name = "Door"
            [[devices]]
            name = "Door"
            "#,
        );
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid devices[1].name: 'Door' is configured more than once"
        );
    }

    #[test]
    fn empty_device_name_is_rejected() {
        let cfg = parse(
            r#"
            email = "me@example.com"
            [[devices]]
            name = "  "
            "#,
        );
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bad_url_is_rejected() {
        let cfg = parse(
            r#"
            email = "me@example.com"
            [api]
            api_uri = "not a url"
            "#,
        );
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "api.api_uri"
        ));
    }

    #[test]
    fn bridge_config_carries_tuning() {
        let cfg = parse(
            r#"
            email = "me@example.com"
            update_interval = 5

            [api]
            maximum_api_retry = 1
            api_retry_interval = 250

            [[devices]]
            name = "Front Door"
            disable_unlock = true
            "#,
        );

        let bridge = cfg
            .bridge_config_with(SecretString::from("hunter2"))
            .unwrap();

        assert_eq!(bridge.account.username, "me@example.com");
        assert_eq!(bridge.account.password.expose_secret(), "hunter2");
        assert_eq!(
            bridge.client.api_retry,
            RetryPolicy::new(1, Duration::from_millis(250))
        );
        assert_eq!(bridge.client.token_retry, RetryPolicy::TOKEN);
        assert_eq!(bridge.settings.update_interval, Duration::from_secs(10));
        assert_eq!(bridge.settings.devices.len(), 1);
        assert!(bridge.settings.devices[0].disable_unlock);
        assert_eq!(bridge.settings.devices[0].lock_label, "Lock");
    }

    #[test]
    fn password_chain_order() {
        let pick = |env: Option<&str>, keyring: Option<&str>, plain: Option<&str>| {
            first_password(env.map(String::from), || keyring.map(String::from), plain)
                .map(|s| s.expose_secret().to_owned())
        };

        assert_eq!(
            pick(Some("env"), Some("ring"), Some("plain")).as_deref(),
            Some("env")
        );
        assert_eq!(pick(None, Some("ring"), Some("plain")).as_deref(), Some("ring"));
        assert_eq!(pick(Some(""), None, Some("plain")).as_deref(), Some("plain"));
        assert_eq!(pick(None, None, None), None);
    }

    #[test]
    fn keyring_not_queried_when_env_is_set() {
        let picked = first_password(
            Some("env".into()),
            || panic!("keyring should not be consulted"),
            None,
        );
        assert!(picked.is_some());
    }

    #[test]
    fn redacted_render_masks_password() {
        let cfg = Config {
            email: Some("me@example.com".into()),
            password: Some("hunter2".into()),
            ..Config::default()
        };
        let rendered = render_redacted(&cfg).unwrap();
        assert!(rendered.contains("********"));
        assert!(!rendered.contains("hunter2"));
    }
}
