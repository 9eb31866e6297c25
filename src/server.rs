use crate::config::GatewayConfig;
use crate::credentials::{ClientHandle, CredentialProvider};
use crate::error::{GatewayError, Result};
use crate::logging::{ExchangeRecord, Outcome, RequestLogger};
use crate::proxy::{self, UpstreamClient, UpstreamReply, UpstreamTarget};
use crate::translate::anthropic_types::NativeChatRequest;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Everything a request task needs. Built once at startup and shared.
pub struct AppState {
    pub config: GatewayConfig,
    pub upstream: UpstreamClient,
    pub credentials: Arc<dyn CredentialProvider>,
    pub client: ClientHandle,
    pub logger: RequestLogger,
}

impl AppState {
    pub fn new(config: GatewayConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self> {
        Ok(Self {
            upstream: UpstreamClient::from_config(&config)?,
            client: ClientHandle::new(config.client_id.clone()),
            config,
            credentials,
            logger: RequestLogger::disabled(),
        })
    }

    pub fn with_logger(mut self, logger: RequestLogger) -> Self {
        self.logger = logger;
        self
    }

    async fn target(&self) -> Result<UpstreamTarget> {
        proxy::resolve_target(
            self.credentials.as_ref(),
            &self.client,
            &self.config.default_endpoint,
        )
        .await
    }

    fn forwarded(&self, route: &str, reply: &UpstreamReply) {
        self.logger.record(
            ExchangeRecord::new(route, reply.status, Outcome::Forwarded).with_upstream(&reply.url),
        );
    }

    fn fail(&self, route: &str, err: GatewayError) -> Response {
        error!(route, error = %err, "Request failed");
        self.logger.record(
            ExchangeRecord::new(route, err.status().as_u16(), Outcome::GatewayError)
                .with_error(err.to_string()),
        );
        err.into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/completions", endpoint(post(handle_completions), &state))
        .route("/v1/messages", endpoint(post(handle_messages), &state))
        .route("/v1/models", endpoint(get(handle_list_models), &state))
        .route(
            "/v1/models/*model_path",
            endpoint(get(handle_get_model), &state),
        )
        .fallback(handle_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Gates the registered method behind the API key. HEAD and every other
/// method fall through to a plain 404 without touching the gate.
fn endpoint(
    method_router: MethodRouter<Arc<AppState>>,
    state: &Arc<AppState>,
) -> MethodRouter<Arc<AppState>> {
    method_router
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .head(handle_not_found)
        .fallback(handle_not_found)
}

async fn handle_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    const ROUTE: &str = "POST /v1/completions";

    let result = async {
        let body: Box<RawValue> = parse_body(&body)?;
        let target = state.target().await?;
        proxy::proxy_passthrough(
            &state.upstream,
            &target,
            Method::POST,
            "/v1/completions",
            Some(&*body),
        )
        .await
    }
    .await;

    relay(&state, ROUTE, result)
}

async fn handle_messages(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    const ROUTE: &str = "POST /v1/messages";

    let result = async {
        let req: NativeChatRequest = parse_body(&body)?;
        let target = state.target().await?;
        let (reply, native) = proxy::proxy_messages(&state.upstream, &target, &req).await?;
        let body = serde_json::to_vec(&native)?;
        Ok::<_, GatewayError>(UpstreamReply {
            body: Bytes::from(body),
            ..reply
        })
    }
    .await;

    relay(&state, ROUTE, result)
}

async fn handle_list_models(State(state): State<Arc<AppState>>) -> Response {
    const ROUTE: &str = "GET /v1/models";

    let result = async {
        let target = state.target().await?;
        proxy::proxy_passthrough(&state.upstream, &target, Method::GET, "/models", None).await
    }
    .await;

    relay(&state, ROUTE, result)
}

async fn handle_get_model(
    State(state): State<Arc<AppState>>,
    Path(model_path): Path<String>,
) -> Response {
    const ROUTE: &str = "GET /v1/models/{id}";

    let model = last_segment(&model_path);
    let result = async {
        let target = state.target().await?;
        proxy::proxy_passthrough(
            &state.upstream,
            &target,
            Method::GET,
            &format!("/models/{model}"),
            None,
        )
        .await
    }
    .await;

    relay(&state, ROUTE, result)
}

async fn handle_not_found(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    let route = format!("{} {}", method, uri.path());
    state
        .logger
        .record(ExchangeRecord::new(route, 404, Outcome::NotFound));
    StatusCode::NOT_FOUND.into_response()
}

/// Rejects requests without the configured `X-API-Key`. No-op when unset.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(ref expected) = state.config.api_key {
        let provided = request
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "Rejected request with bad API key");
            return state.fail(request.uri().path(), GatewayError::Unauthorized);
        }
    }
    next.run(request).await
}

/// Parse a request body; an empty body counts as `{}`.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let raw: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(raw).map_err(GatewayError::InvalidBody)
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

fn relay(state: &AppState, route: &str, result: Result<UpstreamReply>) -> Response {
    match result {
        Ok(reply) => {
            state.forwarded(route, &reply);
            json_response(reply.status, reply.body)
        }
        Err(e) => state.fail(route, e),
    }
}

fn json_response(status: u16, body: Bytes) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
