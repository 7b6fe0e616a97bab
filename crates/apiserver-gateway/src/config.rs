use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen_addr: String,
    #[serde(default = "default_tls_cert")]
    pub tls_cert: PathBuf,
    #[serde(default = "default_tls_key")]
    pub tls_key: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen(),
            tls_cert: default_tls_cert(),
            tls_key: default_tls_key(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// Expected Origin of WebSocket upgrades and the Origin sent on
    /// forwarded REST calls. Empty means any origin is accepted.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Backend certificate verification: `system-roots` or
    /// `insecure-skip-verify`.
    #[serde(default = "default_verify")]
    pub verify: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            origin: default_origin(),
            verify: default_verify(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_health_ttl")]
    pub health_ttl_secs: u64,
    #[serde(default = "default_api_ttl")]
    pub api_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            health_ttl_secs: default_health_ttl(),
            api_ttl_secs: default_api_ttl(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_tls_cert() -> PathBuf {
    PathBuf::from("cert/tls.crt")
}

fn default_tls_key() -> PathBuf {
    PathBuf::from("cert/tls.key")
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_host() -> String {
    "kubernetes.default.svc".to_string()
}

fn default_origin() -> String {
    "http://localhost".to_string()
}

fn default_verify() -> String {
    "insecure-skip-verify".to_string()
}

fn default_health_ttl() -> u64 {
    30
}

fn default_api_ttl() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted, so the gateway can start with in-cluster defaults
/// before an operator has written a config file.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok(config)
}
