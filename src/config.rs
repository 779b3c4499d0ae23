use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP method used for single-entity updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    #[default]
    Put,
    Patch,
    Merge,
}

impl UpdateMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateMethod::Put => "PUT",
            UpdateMethod::Patch => "PATCH",
            UpdateMethod::Merge => "MERGE",
        }
    }
}

/// Options recognised by [`crate::Service`] and the default transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    pub verify_ssl: bool,
    /// Namespace the generated types are registered under, e.g. `Northwind::Model`
    pub namespace: Option<String>,
    /// Query parameters appended to every request, including `$metadata`
    pub additional_params: BTreeMap<String, String>,
    /// Follow partial-collection continuations inside `execute`
    pub eager_partial: bool,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
    /// Connect timeout in seconds
    pub open_timeout: Option<u64>,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
    pub update_method: UpdateMethod,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            verify_ssl: true,
            namespace: None,
            additional_params: BTreeMap::new(),
            eager_partial: true,
            timeout: None,
            open_timeout: None,
            headers: BTreeMap::new(),
            update_method: UpdateMethod::default(),
            user_agent: None,
            proxy: None,
        }
    }
}

impl ServiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn additional_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_params.insert(key.into(), value.into());
        self
    }

    pub fn eager_partial(mut self, eager: bool) -> Self {
        self.eager_partial = eager;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn open_timeout(mut self, seconds: u64) -> Self {
        self.open_timeout = Some(seconds);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn open_timeout_duration(&self) -> Option<Duration> {
        self.open_timeout.map(Duration::from_secs)
    }

    /// Build options from `ODATA_*` environment variables (a `.env` file is honoured)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut options = Self::default();
        options.username = std::env::var("ODATA_USERNAME").ok();
        options.password = std::env::var("ODATA_PASSWORD").ok();
        options.namespace = std::env::var("ODATA_NAMESPACE").ok();

        if let Ok(value) = std::env::var("ODATA_VERIFY_SSL") {
            options.verify_ssl = parse_bool(&value)
                .with_context(|| format!("Invalid ODATA_VERIFY_SSL value: {}", value))?;
        }
        if let Ok(value) = std::env::var("ODATA_EAGER_PARTIAL") {
            options.eager_partial = parse_bool(&value)
                .with_context(|| format!("Invalid ODATA_EAGER_PARTIAL value: {}", value))?;
        }
        if let Ok(value) = std::env::var("ODATA_TIMEOUT") {
            options.timeout = Some(
                value
                    .parse()
                    .with_context(|| format!("Invalid ODATA_TIMEOUT value: {}", value))?,
            );
        }

        debug!("Loaded service options from environment");
        Ok(options)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

/// A named service entry in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub uri: String,
    #[serde(flatten)]
    pub options: ServiceOptions,
}

/// On-disk configuration: a set of named services
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    pub default_service: Option<String>,
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
}

impl ConfigFile {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("odata-client")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".odata-client")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location; a missing file yields an empty config
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            info!("Config file doesn't exist, using default config");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: ConfigFile = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        debug!("Loaded config with {} services", config.services.len());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)
                    .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
                info!("Created config directory: {:?}", config_dir);
            }
        }

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved to {:?}", config_path);
        Ok(())
    }

    pub fn add_service(&mut self, name: impl Into<String>, service: ServiceConfig) {
        let name = name.into();
        info!("Adding service: {}", name);
        self.services.insert(name.clone(), service);

        if self.default_service.is_none() {
            self.default_service = Some(name);
        }
    }

    pub fn service(&self, name: &str) -> Result<&ServiceConfig> {
        self.services
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Service '{}' not found in config", name))
    }

    pub fn default_service(&self) -> Option<&ServiceConfig> {
        let name = self.default_service.as_ref()?;
        self.services.get(name)
    }
}
