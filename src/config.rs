use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOGIN_ROUTE: &str = "/auth/login";

/// Paths of the authentication endpoint family, relative to `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
    pub login: String,
    pub register: String,
    pub refresh: String,
    pub change_password: String,
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            refresh: "/auth/refresh-token".to_string(),
            change_password: "/auth/change-password".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub login_route: String,
    pub endpoints: AuthEndpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            endpoints: AuthEndpoints::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Join a request path onto the base URL without doubling slashes.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// On-disk config file. Every field is optional so local files can override
/// just one setting of the global file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_route: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<AuthEndpoints>,
}

/// Resolve the config with priority: ENV > local > global > default
pub fn load() -> ClientConfig {
    let local = load_local_config().ok();
    let global = load_global_config().ok();
    resolve(
        std::env::var("HAULAGE_API_URL").ok(),
        std::env::var("HAULAGE_TIMEOUT_SECS").ok(),
        local,
        global,
    )
}

fn resolve(
    env_url: Option<String>,
    env_timeout: Option<String>,
    local: Option<ConfigFile>,
    global: Option<ConfigFile>,
) -> ClientConfig {
    let files = [local, global];
    let pick = |f: fn(&ConfigFile) -> Option<String>| files.iter().flatten().find_map(f);

    let defaults = ClientConfig::default();

    let base_url = env_url
        .filter(|v| !v.trim().is_empty())
        .or_else(|| pick(|c| c.base_url.clone()))
        .unwrap_or(defaults.base_url);

    let timeout_secs = env_timeout
        .and_then(|v| match v.trim().parse::<u64>() {
            Ok(secs) => Some(secs),
            Err(_) => {
                tracing::warn!(value = %v, "ignoring invalid HAULAGE_TIMEOUT_SECS");
                None
            }
        })
        .or_else(|| files.iter().flatten().find_map(|c| c.timeout_secs))
        .unwrap_or(defaults.timeout_secs);

    let login_route = pick(|c| c.login_route.clone()).unwrap_or(defaults.login_route);

    let endpoints = files
        .iter()
        .flatten()
        .find_map(|c| c.endpoints.clone())
        .unwrap_or(defaults.endpoints);

    ClientConfig {
        base_url,
        timeout_secs,
        login_route,
        endpoints,
    }
}

pub fn global_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Failed to get config directory")?
        .join("haulage"))
}

fn local_config_path() -> PathBuf {
    PathBuf::from(".haulage").join("config.json")
}

/// Load local config from .haulage/config.json
pub fn load_local_config() -> Result<ConfigFile> {
    let contents =
        std::fs::read_to_string(local_config_path()).context("Failed to read local config")?;
    serde_json::from_str(&contents).context("Failed to parse local config")
}

/// Load global config from ~/.config/haulage/config.json
pub fn load_global_config() -> Result<ConfigFile> {
    let config_path = global_config_dir()?.join("config.json");
    let contents =
        std::fs::read_to_string(&config_path).context("Failed to read global config")?;
    serde_json::from_str(&contents).context("Failed to parse global config")
}

/// Save local config to .haulage/config.json
pub fn save_local_config(config: &ConfigFile) -> Result<()> {
    let config_path = local_config_path();
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create local config directory")?;
    }
    let contents = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&config_path, contents).context("Failed to write local config")?;
    Ok(())
}

/// Save global config to ~/.config/haulage/config.json
pub fn save_global_config(config: &ConfigFile) -> Result<()> {
    let config_dir = global_config_dir()?;
    std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    let contents = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(config_dir.join("config.json"), contents)
        .context("Failed to write global config")?;
    Ok(())
}
