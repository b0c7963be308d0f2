use serde::Deserialize;
use std::{fs, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "/app/config/config.toml";
const CONFIG_PATH_ENV: &str = "GH_RELAY_CONFIG";
const DEFAULT_MIRROR_BASE: &str = "https://cdn.jsdelivr.net/gh";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: String,
    },
    #[error("failed to parse config: {0}")]
    Parse(toml::de::Error),
    #[error("configuration validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Settings {
    /// Load settings from the config file, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let config_path = explicit
            .clone()
            .unwrap_or_else(|| default_config_path().to_string_lossy().to_string());
        let mut settings = match fs::read_to_string(&config_path) {
            Ok(raw) => Self::from_toml(&raw)?,
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                Settings::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    source,
                    path: config_path,
                });
            }
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(ConfigError::Parse)
    }

    /// Apply the edge-runtime style variables `UA`, `URL302` and `URL`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(extra) = lookup("UA") {
            if self.agents.block.trim().is_empty() {
                self.agents.block = extra;
            } else {
                self.agents.block = format!("{},{}", self.agents.block, extra);
            }
        }
        if let Some(url) = lookup("URL302") {
            self.fallback.redirect_url = url;
        }
        if let Some(url) = lookup("URL") {
            self.fallback.url = url;
        }
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.finalize();
        self.server.validate()?;
        self.proxy.validate()?;
        self.fallback.validate()?;
        self.log.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "connectTimeoutSecs")]
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            connect_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    fn finalize(&mut self) {
        if self.host.is_empty() {
            self.host = "0.0.0.0".to_string();
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.connectTimeoutSecs must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deploy-time routing knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Route prefix this service is mounted under, always `/`-delimited.
    pub prefix: String,
    /// Redirect blob/raw paths to the mirror CDN instead of proxying them.
    pub mirror: bool,
    #[serde(rename = "mirrorBase")]
    pub mirror_base: String,
    /// Substrings a target must contain; empty allows everything.
    pub whitelist: Vec<String>,
    #[serde(rename = "maxRedirects")]
    pub max_redirects: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
            mirror: false,
            mirror_base: DEFAULT_MIRROR_BASE.to_string(),
            whitelist: Vec::new(),
            max_redirects: 10,
        }
    }
}

impl ProxyConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let trimmed = self.prefix.trim().trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };

        let base = self.mirror_base.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "proxy.mirrorBase '{}' must be an http(s) URL",
                self.mirror_base
            )));
        }
        self.mirror_base = base.to_string();

        if self.max_redirects == 0 {
            return Err(ConfigError::Validation(
                "proxy.maxRedirects must be at least 1".to_string(),
            ));
        }

        self.whitelist = self
            .whitelist
            .iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        Ok(())
    }

    pub fn is_whitelisted(&self, target: &str) -> bool {
        self.whitelist.is_empty() || self.whitelist.iter().any(|entry| target.contains(entry))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentsConfig {
    /// Extra User-Agent tokens, delimited by commas, whitespace, `|` or quotes.
    pub block: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
    /// `nginx` serves the decoy page, anything else is proxied as an origin.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackAction<'a> {
    Redirect(&'a str),
    Decoy,
    Origin(&'a str),
    Landing,
}

impl FallbackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let FallbackAction::Origin(url) = self.action()
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Validation(format!(
                "fallback.url '{}' must be 'nginx' or an http(s) URL",
                url
            )));
        }
        Ok(())
    }

    pub fn action(&self) -> FallbackAction<'_> {
        let redirect = self.redirect_url.trim();
        let url = self.url.trim();
        if !redirect.is_empty() {
            FallbackAction::Redirect(redirect)
        } else if url.eq_ignore_ascii_case("nginx") {
            FallbackAction::Decoy
        } else if !url.is_empty() {
            FallbackAction::Origin(url)
        } else {
            FallbackAction::Landing
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    #[serde(rename = "logFilePath")]
    pub log_file_path: String,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file_path: String::new(),
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn get_level(&self) -> &str {
        &self.level
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.level.to_lowercase().as_str() {
            "debug" | "info" | "warn" | "error" | "trace" | "none" => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "Invalid log level '{}'. Valid values: debug, info, warn, error, trace, none",
                    self.level
                )));
            }
        }
        Ok(())
    }
}

pub fn default_config_path() -> &'static Path {
    Path::new(DEFAULT_CONFIG_PATH)
}
