//! HTTP wiring: routes, redirect middleware and error responses.
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::invalidation;
use crate::origin::{self, OriginClient};
use crate::redirect::{RedirectResolver, Resolution};
use crate::revalidate::{now, Dispatcher, WebhookError, WebhookHeaders};

/// Upper bound on pass-through request bodies.
const MAX_FORWARD_BODY: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub resolver: Arc<RedirectResolver>,
    pub origin: Option<Arc<OriginClient>>,
}

impl AppState {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let revalidator = invalidation::from_config(cfg)?;
        let origin = cfg
            .origin
            .as_ref()
            .map(OriginClient::from_config)
            .transpose()?
            .map(Arc::new);
        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(cfg, revalidator)),
            resolver: Arc::new(RedirectResolver::new(&cfg.redirects)),
            origin,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/revalidate", get(revalidate_status).post(revalidate))
        .fallback(pass_through)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            redirect_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answers legacy URLs with a redirect before any route sees them.
pub async fn redirect_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let uri = req.uri();
    match state.resolver.resolve(uri.path(), uri.query()) {
        Resolution::Redirect(redirect) => {
            info!(
                from = %uri,
                to = %redirect.location,
                status = redirect.status.code(),
                "redirecting"
            );
            redirect_response(&redirect.location, redirect.status.code())
        }
        Resolution::PassThrough => next.run(req).await,
    }
}

fn redirect_response(location: &str, code: u16) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::MOVED_PERMANENTLY);
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(err) => {
            error!(?err, location, "redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[instrument(skip_all)]
async fn revalidate(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let webhook_headers = WebhookHeaders {
        authorization: header_string(&headers, header::AUTHORIZATION.as_str()),
        topic: header_string(&headers, "x-contentful-topic"),
        webhook_name: header_string(&headers, "x-contentful-webhook-name"),
    };
    match state.dispatcher.handle(&webhook_headers, &body).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err, state.dispatcher.environment()),
    }
}

async fn revalidate_status(State(state): State<AppState>) -> Response {
    Json(state.dispatcher.status()).into_response()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// JSON body and status for each webhook failure. Authentication failures
/// carry no detail.
pub fn error_response(err: WebhookError, environment: &str) -> Response {
    match err {
        WebhookError::Unauthorized => {
            warn!("rejected webhook with bad credentials");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthorized" })),
            )
                .into_response()
        }
        WebhookError::MalformedPayload(err) => {
            warn!(?err, "webhook body is not valid JSON");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Invalid JSON payload" })),
            )
                .into_response()
        }
        WebhookError::MissingContentType => {
            warn!("webhook payload has no content type");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "Content type not found" })),
            )
                .into_response()
        }
        WebhookError::RevalidationFailed { ref failed, total } => {
            error!(failed = failed.len(), total, "revalidation partially failed");
            let (paths, tags): (Vec<_>, Vec<_>) = failed
                .iter()
                .partition(|f| f.kind == crate::invalidation::TargetKind::Path);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Revalidation failed",
                    "message": err.to_string(),
                    "failed": { "paths": paths, "tags": tags },
                    "timestamp": now(),
                    "environment": environment,
                })),
            )
                .into_response()
        }
        WebhookError::Internal(err) => {
            error!(?err, "revalidation error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Internal server error",
                    "message": format!("{err:#}"),
                    "timestamp": now(),
                    "environment": environment,
                })),
            )
                .into_response()
        }
    }
}

/// Everything the edge does not answer goes to the rendering origin.
async fn pass_through(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let Some(origin) = state.origin.as_ref() else {
        debug!(%uri, "no origin configured");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not Found" })),
        )
            .into_response();
    };

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(uri.path());
    let body = match axum::body::to_bytes(body, MAX_FORWARD_BODY).await {
        Ok(bytes) => bytes.to_vec(),
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {}", err),
            )
                .into_response();
        }
    };

    match origin.forward(method, path_and_query, headers, body).await {
        Ok(response) => origin::into_response(response).await,
        Err(err) => {
            warn!(?err, path = path_and_query, "origin unavailable");
            (StatusCode::BAD_GATEWAY, "Failed to reach origin").into_response()
        }
    }
}
