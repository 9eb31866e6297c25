use crate::credentials::{FileCredentialProvider, DEFAULT_CLIENT_ID};
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upstream base used when the credential snapshot has no `resource_url`.
pub const DEFAULT_ENDPOINT: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_endpoint")]
    pub default_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// When set, inbound requests must carry a matching `X-API-Key` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_timeout_secs: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_endpoint: default_endpoint(),
            credentials_path: None,
            client_id: default_client_id(),
            api_key: None,
            upstream_timeout_secs: None,
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `QWEN_GATEWAY_API_KEY` / `QWEN_GATEWAY_HOST` on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("QWEN_GATEWAY_API_KEY").ok(),
            std::env::var("QWEN_GATEWAY_HOST").ok(),
        );
    }

    fn apply_overrides(&mut self, api_key: Option<String>, host: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(host) = host.filter(|h| !h.is_empty()) {
            self.host = host;
        }
    }

    /// Where the file credential provider should read from.
    pub fn effective_credentials_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.credentials_path {
            return Ok(path.clone());
        }

        FileCredentialProvider::default_path().ok_or_else(|| {
            GatewayError::config(
                "HOME is not set and no credentials_path configured. \
                 Pass --credentials or set credentials_path in the config file",
            )
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("qwen-gateway.toml"));

    // XDG config dir
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("qwen-gateway").join("config.toml"));
    }
    if let Some(home) = dirs_path() {
        paths.push(home.join(".config").join("qwen-gateway").join("config.toml"));
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(".qwen-gateway.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000
host = "0.0.0.0"
default_endpoint = "https://example.test/v1"
credentials_path = "/tmp/creds.json"
api_key = "secret"
"#
        )
        .unwrap();

        let config = GatewayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
        assert_eq!(config.default_endpoint, "https://example.test/v1");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.effective_credentials_path().unwrap(),
            PathBuf::from("/tmp/creds.json")
        );
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = GatewayConfig::load(f.path()).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.default_endpoint, DEFAULT_ENDPOINT);
        assert!(config.api_key.is_none());
        assert!(config.upstream_timeout_secs.is_none());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GatewayConfig::find_and_load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(GatewayError::Config { .. })));
    }

    #[test]
    fn test_overrides_ignore_empty_values() {
        let mut config = GatewayConfig::default();
        config.apply_overrides(Some(String::new()), Some("0.0.0.0".to_string()));
        assert!(config.api_key.is_none());
        assert_eq!(config.host, "0.0.0.0");

        config.apply_overrides(Some("k".to_string()), None);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.host, "0.0.0.0");
    }
}
