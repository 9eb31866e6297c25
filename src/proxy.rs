use crate::config::GatewayConfig;
use crate::credentials::{ClientHandle, CredentialProvider};
use crate::error::{GatewayError, Result};
use crate::translate::anthropic_types::{NativeChatRequest, NativeChatResponse};
use crate::translate::openai_types::UpstreamChatResponse;
use crate::translate::{from_upstream, to_upstream};

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::value::RawValue;
use std::time::Duration;
use tracing::{debug, info};

/// Status and raw body of an upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub url: String,
    pub status: u16,
    pub body: Bytes,
}

/// Outbound HTTP client. Attaches the bearer token and JSON content type to
/// every call; never retries.
#[derive(Debug, Clone, Default)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds the client, applying `upstream_timeout_secs` if configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.upstream_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::new(builder.build()?))
    }

    pub async fn forward(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<String>,
    ) -> Result<UpstreamReply> {
        let mut req = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            req = req.body(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        debug!(%method, url, status, body_len = body.len(), "Upstream replied");

        Ok(UpstreamReply {
            url: url.to_string(),
            status,
            body,
        })
    }
}

/// Token and base URL for one forwarded call.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    pub token: String,
    pub base_url: String,
}

impl UpstreamTarget {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Fetch a fresh credential snapshot and turn it into a target. Fails before
/// any network call when the snapshot has no usable token.
pub async fn resolve_target(
    provider: &dyn CredentialProvider,
    client: &ClientHandle,
    default_endpoint: &str,
) -> Result<UpstreamTarget> {
    let creds = provider.valid_credentials(client).await?;
    let token = creds.bearer_token()?.to_string();

    Ok(UpstreamTarget {
        token,
        base_url: creds.endpoint(default_endpoint),
    })
}

/// Forward an opaque body (or none) to `{base}{path}` and hand back the reply untouched.
pub async fn proxy_passthrough(
    upstream: &UpstreamClient,
    target: &UpstreamTarget,
    method: Method,
    path: &str,
    body: Option<&RawValue>,
) -> Result<UpstreamReply> {
    let url = target.url(path);
    info!(%method, url = %url, "Passthrough");

    upstream
        .forward(method, &url, &target.token, body.map(|b| b.get().to_string()))
        .await
}

/// Translate a Messages request, send it to `{base}/chat/completions` and
/// translate whatever comes back, error bodies included. The upstream status
/// is returned unchanged alongside the translated body.
pub async fn proxy_messages(
    upstream: &UpstreamClient,
    target: &UpstreamTarget,
    req: &NativeChatRequest,
) -> Result<(UpstreamReply, NativeChatResponse)> {
    let url = target.url("/chat/completions");
    let upstream_req = to_upstream(req);

    info!(
        url = %url,
        model = ?upstream_req.model,
        messages = upstream_req.messages.len(),
        "POST chat completion"
    );

    let body = serde_json::to_string(&upstream_req)?;
    let reply = upstream
        .forward(Method::POST, &url, &target.token, Some(body))
        .await?;

    let upstream_resp: UpstreamChatResponse =
        serde_json::from_slice(&reply.body).map_err(|e| {
            GatewayError::translation(format!(
                "Failed to parse upstream response (status {}): {}. Body: {}",
                reply.status,
                e,
                truncate(&String::from_utf8_lossy(&reply.body), 300)
            ))
        })?;

    let native = from_upstream(&upstream_resp);

    if let Some(usage) = native.usage {
        info!(
            status = reply.status,
            input_tokens = ?usage.input_tokens,
            output_tokens = ?usage.output_tokens,
            "Completed"
        );
    }

    Ok((reply, native))
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
