//! Credential provider seam.
//!
//! The gateway never owns OAuth state. It asks a [`CredentialProvider`] for a
//! fresh snapshot on every forwarded request and reads the bearer token and
//! upstream base out of it. Acquisition and refresh live behind the trait.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Public OAuth client id used by the Qwen device flow.
pub const DEFAULT_CLIENT_ID: &str = "f0304373b74a44d2b584a3fb70ca9e56";

/// Point-in-time credential snapshot, in the on-disk `oauth_creds.json` shape.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, resource_url: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            resource_url,
            ..Self::default()
        }
    }

    /// The bearer token, or [`GatewayError::MissingAccessToken`] if absent or empty.
    pub fn bearer_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(GatewayError::MissingAccessToken)
    }

    /// Upstream base URL: `resource_url` when set, otherwise `default`.
    ///
    /// A bare host gets an `https://` scheme; trailing slashes are dropped.
    pub fn endpoint(&self, default: &str) -> String {
        let base = self
            .resource_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(default);

        let base = base.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("https://{base}")
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry_date.is_some_and(|exp| exp <= now_ms)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("resource_url", &self.resource_url)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// The OAuth client on whose behalf credentials are requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandle {
    pub client_id: String,
}

impl ClientHandle {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl Default for ClientHandle {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_ID)
    }
}

/// Source of valid credentials. Must be safe to call concurrently; any refresh
/// de-duplication is the implementor's job.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn valid_credentials(&self, client: &ClientHandle) -> Result<Credentials>;
}

/// Reads the Qwen CLI credential file on every call.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    path: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.qwen/oauth_creds.json`
    pub fn default_path() -> Option<PathBuf> {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join(".qwen").join("oauth_creds.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    async fn valid_credentials(&self, client: &ClientHandle) -> Result<Credentials> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GatewayError::credentials(format!(
                "Failed to read credentials {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let creds: Credentials = serde_json::from_str(&content)?;

        if creds.is_expired(chrono::Utc::now().timestamp_millis()) {
            tracing::warn!(
                path = %self.path.display(),
                client_id = %client.client_id,
                "Stored access token has expired; refresh it with the qwen CLI"
            );
        }

        Ok(creds)
    }
}

/// A fixed `token` when one is given on the command line, otherwise the
/// credential file named by the config.
pub fn select_provider(
    token: Option<String>,
    config: &GatewayConfig,
) -> Result<Arc<dyn CredentialProvider>> {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        return Ok(Arc::new(StaticCredentialProvider::new(Credentials::new(
            token, None,
        ))));
    }
    Ok(Arc::new(FileCredentialProvider::new(
        config.effective_credentials_path()?,
    )))
}

/// Hands out the same snapshot every time.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: Credentials,
}

impl StaticCredentialProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn valid_credentials(&self, _client: &ClientHandle) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}
