//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The API key is loaded from BUNGIE_API_KEY or `provider.api_key_file`,
//! never stored in the TOML directly to avoid leaking secrets.

use bungie_auth::{ProviderConfig, TOKEN_ENDPOINT};
use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

/// Env var holding the Bungie.net application API key
pub const API_KEY_ENV: &str = "BUNGIE_API_KEY";

/// Paths the gateway serves itself; the callback must not shadow them.
const RESERVED_PATHS: &[&str] = &["/health", "/metrics", "/session"];

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderSettings,
}

/// Inbound HTTP settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Route the provider redirects back to with `code` and `state`
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Authorization provider settings
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    /// Authorization endpoint including the application's `client_id`.
    /// Defaults to the public Bungie.net endpoint when unset.
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    /// Path to a file containing the API key (alternative to BUNGIE_API_KEY)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
}

fn default_callback_path() -> String {
    "/oauth/callback".to_string()
}

fn default_max_connections() -> usize {
    1000
}

fn default_token_url() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Parse `value` as an absolute http(s) URL, naming `field` on failure.
fn parse_http_url(field: &str, value: &str) -> common::Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| common::Error::Config(format!("{field} is not a valid URL ({e}): {value}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(common::Error::Config(format!(
            "{field} must use http or https, got scheme {other}: {value}"
        ))),
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. BUNGIE_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Some(ref authorize_url) = config.provider.authorize_url {
            parse_http_url("authorize_url", authorize_url)?;
        }
        parse_http_url("token_url", &config.provider.token_url)?;

        let callback_path = &config.server.callback_path;
        if !callback_path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "callback_path must start with '/', got: {callback_path}"
            )));
        }
        if RESERVED_PATHS.contains(&callback_path.as_str()) {
            return Err(common::Error::Config(format!(
                "callback_path {callback_path} collides with a built-in route"
            )));
        }

        if config.provider.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Env var takes precedence over file
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.provider.api_key = Some(Secret::new(key));
        } else if let Some(ref key_file) = config.provider.api_key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read api_key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.provider.api_key = Some(Secret::new(key));
            }
        }

        if config.provider.api_key.is_none() {
            return Err(common::Error::MissingSecret(format!(
                "set {API_KEY_ENV} or provider.api_key_file"
            )));
        }

        Ok(config)
    }

    /// Provider settings in the shape the authenticator and callback consume.
    pub fn provider_config(&self) -> common::Result<ProviderConfig> {
        let api_key = self.provider.api_key.clone().ok_or_else(|| {
            common::Error::MissingSecret(format!("set {API_KEY_ENV} or provider.api_key_file"))
        })?;
        let mut provider = ProviderConfig::bungie(api_key)
            .map_err(|e| common::Error::Config(format!("default authorize_url: {e}")))?;
        if let Some(ref authorize_url) = self.provider.authorize_url {
            provider.authorize_url = parse_http_url("authorize_url", authorize_url)?;
        }
        provider.token_url = self.provider.token_url.clone();
        Ok(provider)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("destiny-auth-gateway.toml")
    }
}
