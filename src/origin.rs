//! Forwarding of pass-through requests to the rendering origin.
use anyhow::{bail, Context, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::config;

#[derive(Clone)]
pub struct OriginClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for OriginClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OriginClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        // Redirects from the origin go back to the browser untouched.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("failed to build origin HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(origin: &config::Origin) -> Result<Self> {
        let base_url = Url::parse(&origin.url).context("invalid origin.url")?;
        Self::new(base_url, Duration::from_millis(origin.timeout_ms))
    }

    /// Origin URL for a request target. Scheme and authority always come from
    /// the configured origin; `//host/...` stays a path on that origin.
    pub fn target(&self, path_and_query: &str) -> Result<Url> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        if !path.starts_with('/') {
            bail!("request target {path_and_query} is not origin-form");
        }
        let mut url = self.base_url.clone();
        url.set_path(path);
        url.set_query(query);
        url.set_fragment(None);
        Ok(url)
    }

    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let url = self.target(path_and_query)?;
        self.http
            .request(method, url)
            .headers(filter_headers(headers))
            .body(body)
            .send()
            .await
            .context("failed to reach origin")
    }
}

/// Convert an origin response into an axum response, dropping hop-by-hop
/// headers.
pub async fn into_response(response: reqwest::Response) -> Response {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(?err, "failed to read origin response");
            return (StatusCode::BAD_GATEWAY, "Failed to read origin response").into_response();
        }
    };

    let mut builder = Response::builder().status(status);
    if let Some(header_map) = builder.headers_mut() {
        for (name, value) in headers.iter() {
            if is_hop_by_hop(name.as_str()) || name == header::CONTENT_LENGTH {
                continue;
            }
            header_map.append(name, value.clone());
        }
    }

    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| (StatusCode::BAD_GATEWAY, "Failed to build response").into_response())
}

/// Request headers for the origin. `Authorization` and `Cookie` are kept:
/// the origin is the site's own renderer and `target` never leaves it.
fn filter_headers(headers: HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) || name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        filtered.append(name, value.clone());
    }
    filtered
}

fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
