#![allow(dead_code)]

use anyhow::{anyhow, Result};
use axum::body::Body;
use axum::http::Request;
use skillsite_edge::config::{self, Config};
use skillsite_edge::http::AppState;
use skillsite_edge::invalidation::{Revalidator, TargetKind};
use skillsite_edge::redirect::RedirectResolver;
use skillsite_edge::revalidate::Dispatcher;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SECRET: &str = "test-secret";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn webhook_request(auth: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/revalidate")
        .header("content-type", "application/vnd.contentful.management.v1+json")
        .header("x-contentful-topic", "ContentManagement.Entry.publish")
        .header("x-contentful-webhook-name", "revalidate");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(body.into()).expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn entry(content_type: Option<&str>, slug: Option<&str>) -> serde_json::Value {
    let mut sys = serde_json::json!({
        "id": "entry-1",
        "type": "Entry",
        "space": { "sys": { "type": "Link", "linkType": "Space", "id": "space-1" } },
    });
    if let Some(ct) = content_type {
        sys["contentType"] = serde_json::json!({ "sys": { "type": "Link", "linkType": "ContentType", "id": ct } });
    }
    let mut body = serde_json::json!({ "sys": sys, "fields": { "title": { "ja-JP": "タイトル" } } });
    if let Some(slug) = slug {
        body["fields"]["slug"] = serde_json::json!({ "ja-JP": slug });
    }
    body
}

pub fn test_config(secret: Option<&str>) -> Config {
    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.revalidate.secret = secret.map(str::to_string);
    cfg.revalidate.backend = None;
    cfg.origin = None;
    cfg.app.environment = "test".into();
    cfg
}

pub fn state_with(cfg: &Config, revalidator: Arc<dyn Revalidator>) -> AppState {
    AppState {
        dispatcher: Arc::new(Dispatcher::new(cfg, revalidator)),
        resolver: Arc::new(RedirectResolver::new(&cfg.redirects)),
        origin: None,
    }
}

#[derive(Clone, Default)]
pub struct RecordingRevalidator {
    calls: Arc<Mutex<Vec<(TargetKind, String)>>>,
    failing: Arc<HashSet<String>>,
}

impl RecordingRevalidator {
    pub fn failing_on(values: &[&str]) -> Self {
        Self {
            failing: Arc::new(values.iter().map(|v| v.to_string()).collect()),
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<(TargetKind, String)> {
        self.calls.lock().await.clone()
    }

    pub async fn values(&self, kind: TargetKind) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }

    async fn record(&self, kind: TargetKind, value: &str) -> Result<()> {
        self.calls.lock().await.push((kind, value.to_string()));
        if self.failing.contains(value) {
            return Err(anyhow!("runtime rejected {}", value));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Revalidator for RecordingRevalidator {
    async fn revalidate_path(&self, path: &str) -> Result<()> {
        self.record(TargetKind::Path, path).await
    }

    async fn revalidate_tag(&self, tag: &str) -> Result<()> {
        self.record(TargetKind::Tag, tag).await
    }
}
