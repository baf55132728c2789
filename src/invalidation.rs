use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Cache-invalidation capability of the rendering runtime.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate_path(&self, path: &str) -> Result<()>;

    async fn revalidate_tag(&self, tag: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Path,
    Tag,
}

/// Posts each invalidation to the runtime's on-demand revalidation endpoint.
#[derive(Clone)]
pub struct HttpRevalidator {
    http: Client,
    endpoint: Url,
    token: Option<String>,
}

impl fmt::Debug for HttpRevalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRevalidator")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpRevalidator {
    pub fn new(endpoint: Url, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("skillsite-edge/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .no_proxy()
            .build()
            .context("failed to build revalidation HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    pub fn build_request(&self, kind: TargetKind, value: &str) -> Result<reqwest::Request> {
        let mut req = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "kind": kind, "value": value }));
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req.build().context("failed to build revalidation request")
    }

    async fn send(&self, kind: TargetKind, value: &str) -> Result<()> {
        let request = self.build_request(kind, value)?;
        debug!(url=%request.url(), ?kind, value, "sending revalidation");
        let res = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("failed to reach revalidation endpoint for {value}"))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, ?kind, value, "revalidation rejected: {}", body);
            return Err(anyhow!("revalidation of {} failed with {}: {}", value, status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl Revalidator for HttpRevalidator {
    async fn revalidate_path(&self, path: &str) -> Result<()> {
        self.send(TargetKind::Path, path).await
    }

    async fn revalidate_tag(&self, tag: &str) -> Result<()> {
        self.send(TargetKind::Tag, tag).await
    }
}

/// Logs invalidations without calling anything. Used with mock content or
/// when no backend is configured.
#[derive(Debug, Clone, Default)]
pub struct LogRevalidator;

#[async_trait]
impl Revalidator for LogRevalidator {
    async fn revalidate_path(&self, path: &str) -> Result<()> {
        info!(path, "revalidate path (log only)");
        Ok(())
    }

    async fn revalidate_tag(&self, tag: &str) -> Result<()> {
        info!(tag, "revalidate tag (log only)");
        Ok(())
    }
}

/// Pick the backend for this configuration.
pub fn from_config(cfg: &Config) -> Result<Arc<dyn Revalidator>> {
    match (&cfg.revalidate.backend, cfg.app.use_mock_data) {
        (Some(backend), false) => {
            let endpoint = Url::parse(&backend.url).context("invalid revalidate.backend.url")?;
            info!(endpoint=%endpoint, "using HTTP revalidation backend");
            Ok(Arc::new(HttpRevalidator::new(
                endpoint,
                backend.token.clone(),
                Duration::from_millis(backend.timeout_ms),
            )?))
        }
        (_, mock) => {
            info!(mock, "using log-only revalidation backend");
            Ok(Arc::new(LogRevalidator))
        }
    }
}
