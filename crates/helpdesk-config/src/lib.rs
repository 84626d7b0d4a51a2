use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_HELPDESK_CONFIG: &str = "HELPDESK_CONFIG";
pub const ENV_HELPDESK_STORE_API_URL: &str = "HELPDESK_STORE_API_URL";
pub const ENV_HELPDESK_STORE_API_TOKEN: &str = "HELPDESK_STORE_API_TOKEN";

const DEFAULT_STORE_PROVIDER: &str = "store.http";
const DEFAULT_STORE_API_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_STORE_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_SYNC_POLL_INTERVAL_SECS: u64 = 15;
const MIN_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 300;
const LOG_FILE_NAME: &str = "helpdesk.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelpdeskConfig {
    #[serde(default = "default_store_provider")]
    pub store_provider: String,
    #[serde(default)]
    pub store: StoreConfigToml,
    #[serde(default)]
    pub sync: SyncConfigToml,
    #[serde(default)]
    pub notifications: NotificationsConfigToml,
    #[serde(default)]
    pub assistant: AssistantConfigToml,
    #[serde(default)]
    pub logging: LoggingConfigToml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfigToml {
    #[serde(default = "default_store_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default = "default_store_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for StoreConfigToml {
    fn default() -> Self {
        Self {
            api_url: default_store_api_url(),
            api_token: None,
            request_timeout_secs: default_store_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfigToml {
    #[serde(default = "default_sync_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SyncConfigToml {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_sync_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationsConfigToml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantConfigToml {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfigToml {
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

impl Default for LoggingConfigToml {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
        }
    }
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        Self {
            store_provider: default_store_provider(),
            store: StoreConfigToml::default(),
            sync: SyncConfigToml::default(),
            notifications: NotificationsConfigToml::default(),
            assistant: AssistantConfigToml::default(),
            logging: LoggingConfigToml::default(),
        }
    }
}

/// Resolved settings for building a ticket store client.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreRuntimeConfig {
    pub provider: String,
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for StoreRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRuntimeConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl HelpdeskConfig {
    pub fn store_runtime(&self) -> StoreRuntimeConfig {
        StoreRuntimeConfig {
            provider: self.store_provider.clone(),
            api_url: self.store.api_url.clone(),
            api_token: self.store.api_token.clone(),
            request_timeout: Duration::from_secs(self.store.request_timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    pub fn log_path(&self) -> PathBuf {
        PathBuf::from(self.logging.log_path.as_str())
    }
}

/// Loads the file named by `HELPDESK_CONFIG` (or the default path) and then
/// applies the store URL/token environment overrides. Overrides are never
/// written back to disk.
pub fn load_from_env() -> Result<HelpdeskConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<HelpdeskConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("helpdesk").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_HELPDESK_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "HELPDESK_CONFIG contained invalid UTF-8",
        )),
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn non_blank_env(name: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => Ok(Some(raw.trim().to_owned()).filter(|value| !value.is_empty())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(_) => Err(ConfigError::configuration(format!(
            "{name} contained invalid UTF-8"
        ))),
    }
}

fn apply_env_overrides(config: &mut HelpdeskConfig) -> Result<(), ConfigError> {
    if let Some(api_url) = non_blank_env(ENV_HELPDESK_STORE_API_URL)? {
        config.store.api_url = api_url;
    }
    if let Some(api_token) = non_blank_env(ENV_HELPDESK_STORE_API_TOKEN)? {
        config.store.api_token = Some(api_token);
    }
    Ok(())
}

fn default_store_provider() -> String {
    DEFAULT_STORE_PROVIDER.to_owned()
}

fn default_store_api_url() -> String {
    DEFAULT_STORE_API_URL.to_owned()
}

fn default_store_request_timeout_secs() -> u64 {
    DEFAULT_STORE_REQUEST_TIMEOUT_SECS
}

fn default_sync_poll_interval_secs() -> u64 {
    DEFAULT_SYNC_POLL_INTERVAL_SECS
}

fn default_log_path() -> String {
    default_config_path()
        .ok()
        .and_then(|path| path.parent().map(Path::to_path_buf))
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

fn persist_config(path: &Path, config: &HelpdeskConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to serialize HELPDESK_CONFIG for {}: {err}",
            path.display()
        ))
    })?;

    std::fs::write(path, rendered.as_bytes()).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write HELPDESK_CONFIG to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<HelpdeskConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for HELPDESK_CONFIG: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = HelpdeskConfig::default();
            persist_config(path, &default_config)?;

            toml::to_string_pretty(&default_config).map_err(|err| {
                ConfigError::configuration(format!(
                    "Failed to serialize default HELPDESK_CONFIG: {err}"
                ))
            })?
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read HELPDESK_CONFIG from {}: {err}",
                path.display()
            )));
        }
    };

    let mut config: HelpdeskConfig = toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse HELPDESK_CONFIG from {}: {err}",
            path.display()
        ))
    })?;

    let changed = normalize_config(&mut config)?;
    if changed {
        persist_config(path, &config)?;
    }

    Ok(config)
}

fn normalize_config(config: &mut HelpdeskConfig) -> Result<bool, ConfigError> {
    let mut changed = false;

    changed |= normalize_provider_selection(
        &mut config.store_provider,
        DEFAULT_STORE_PROVIDER,
        "store_provider",
        "store",
    )?;
    changed |= normalize_store_config(&mut config.store);
    changed |= normalize_sync_config(&mut config.sync);
    changed |= normalize_optional_string(&mut config.notifications.url);
    changed |= normalize_optional_string(&mut config.assistant.url);
    changed |= normalize_non_empty_string(&mut config.logging.log_path, default_log_path());

    Ok(changed)
}

pub fn normalize_store_config(config: &mut StoreConfigToml) -> bool {
    let mut changed = false;

    changed |= normalize_non_empty_string(&mut config.api_url, default_store_api_url());
    changed |= normalize_optional_string(&mut config.api_token);

    let normalized_timeout = config
        .request_timeout_secs
        .clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
    if normalized_timeout != config.request_timeout_secs {
        config.request_timeout_secs = normalized_timeout;
        changed = true;
    }

    changed
}

pub fn normalize_sync_config(config: &mut SyncConfigToml) -> bool {
    let normalized = config
        .poll_interval_secs
        .clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
    if normalized != config.poll_interval_secs {
        config.poll_interval_secs = normalized;
        return true;
    }
    false
}

fn normalize_provider_selection(
    value: &mut String,
    default: &str,
    field_name: &str,
    provider_namespace: &str,
) -> Result<bool, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    let canonical = if normalized.is_empty() {
        default.to_owned()
    } else {
        normalized
    };
    let expected_prefix = format!("{provider_namespace}.");

    if !canonical.starts_with(expected_prefix.as_str()) {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in HELPDESK_CONFIG: provider keys must be namespaced under `{expected_prefix}*` (for example `{default}`)."
        )));
    }
    let suffix = canonical[expected_prefix.len()..].trim();
    if suffix.is_empty()
        || !suffix
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
    {
        return Err(ConfigError::configuration(format!(
            "Invalid `{field_name}` value '{canonical}' in HELPDESK_CONFIG: expected format `{provider_namespace}.<provider_key>` using only lowercase letters, digits, `_`, or `-`."
        )));
    }

    if *value != canonical {
        *value = canonical;
        return Ok(true);
    }

    Ok(false)
}

fn normalize_non_empty_string(value: &mut String, default: String) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        if *value != default {
            *value = default;
            return true;
        }
        return false;
    }

    if trimmed != value {
        *value = trimmed.to_owned();
        return true;
    }
    false
}

fn normalize_optional_string(value: &mut Option<String>) -> bool {
    let normalized = value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);
    if *value != normalized {
        *value = normalized;
        return true;
    }
    false
}
