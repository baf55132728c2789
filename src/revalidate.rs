//! Webhook dispatcher: maps CMS change notifications to cache invalidations.
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::contentful::EntryWebhook;
use crate::invalidation::{Revalidator, TargetKind};

/// Tag invalidated for every notification, whatever its content type.
pub const CATCH_ALL_TAG: &str = "contentful";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid JSON payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("Content type not found")]
    MissingContentType,
    #[error("{} of {total} revalidation targets failed", .failed.len())]
    RevalidationFailed {
        failed: Vec<FailedTarget>,
        total: usize,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Schema of the changed entry, matched exactly on the content type id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Content,
    Category,
    Tag,
    Other(String),
}

impl ContentType {
    pub fn from_id(id: &str) -> Self {
        match id {
            "content" => ContentType::Content,
            "category" => ContentType::Category,
            "tag" => ContentType::Tag,
            other => ContentType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Content => "content",
            ContentType::Category => "category",
            ContentType::Tag => "tag",
            ContentType::Other(id) => id,
        }
    }
}

/// Paths and tags to invalidate, in insertion order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationSet {
    pub paths: Vec<String>,
    pub tags: Vec<String>,
}

impl InvalidationSet {
    pub fn for_change(content_type: &ContentType, slug: Option<&str>) -> Self {
        let mut set = InvalidationSet::default();
        match content_type {
            ContentType::Content => {
                set.add_paths(["/articles", "/", "/categories", "/search"]);
                if let Some(slug) = slug.map(str::trim).filter(|s| !s.is_empty()) {
                    push_unique(&mut set.paths, format!("/articles/{slug}"));
                }
                set.add_tags(["articles", "content"]);
            }
            ContentType::Category => {
                set.add_paths(["/articles", "/categories", "/"]);
                set.add_tags(["categories", "articles"]);
            }
            ContentType::Tag => {
                set.add_paths(["/articles", "/search"]);
                set.add_tags(["tags", "articles"]);
            }
            ContentType::Other(_) => {
                set.add_paths(["/", "/articles"]);
                set.add_tags(["contentful-content"]);
            }
        }
        set.add_tags([CATCH_ALL_TAG]);
        set
    }

    pub fn len(&self) -> usize {
        self.paths.len() + self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add_paths<const N: usize>(&mut self, items: [&str; N]) {
        for item in items {
            push_unique(&mut self.paths, item.to_string());
        }
    }

    fn add_tags<const N: usize>(&mut self, items: [&str; N]) {
        for item in items {
            push_unique(&mut self.tags, item.to_string());
        }
    }
}

fn push_unique(items: &mut Vec<String>, value: String) {
    if !items.contains(&value) {
        items.push(value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTarget {
    pub kind: TargetKind,
    pub value: String,
    pub error: String,
}

/// Request metadata the dispatcher reads besides the body.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub authorization: Option<String>,
    pub topic: Option<String>,
    pub webhook_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevalidationReport {
    pub success: bool,
    pub revalidated: InvalidationSet,
    pub content_type: String,
    pub entry_id: Option<String>,
    pub event_type: String,
    pub space_id: Option<String>,
    pub timestamp: String,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub environment: String,
    pub secret_configured: bool,
}

pub struct Dispatcher {
    secret: Option<String>,
    default_locale: String,
    environment: String,
    revalidator: Arc<dyn Revalidator>,
}

impl Dispatcher {
    pub fn new(cfg: &Config, revalidator: Arc<dyn Revalidator>) -> Self {
        Self {
            secret: cfg
                .revalidate
                .secret
                .clone()
                .filter(|s| !s.trim().is_empty()),
            default_locale: cfg.revalidate.default_locale.clone(),
            environment: cfg.app.environment.clone(),
            revalidator,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Exact match of the header against `Bearer <secret>`. Without a secret
    /// every request is refused.
    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), WebhookError> {
        match (&self.secret, authorization) {
            (Some(secret), Some(header)) if header == format!("Bearer {secret}") => Ok(()),
            _ => Err(WebhookError::Unauthorized),
        }
    }

    #[instrument(skip_all, fields(webhook = headers.webhook_name.as_deref().unwrap_or("-")))]
    pub async fn handle(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> Result<RevalidationReport, WebhookError> {
        self.authorize(headers.authorization.as_deref())?;

        let hook: EntryWebhook = serde_json::from_slice(body)?;
        let content_type_id = hook
            .content_type_id()
            .ok_or(WebhookError::MissingContentType)?;
        let content_type = ContentType::from_id(content_type_id);
        let event_type = headers
            .topic
            .clone()
            .or_else(|| hook.entity_type().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        info!(
            content_type = content_type.as_str(),
            entry_id = hook.entry_id().unwrap_or("-"),
            event = %event_type,
            "received content change"
        );

        let set = InvalidationSet::for_change(&content_type, hook.slug(&self.default_locale));
        self.apply(&set).await?;

        info!(
            paths = set.paths.len(),
            tags = set.tags.len(),
            "revalidation complete"
        );
        Ok(RevalidationReport {
            success: true,
            revalidated: set,
            content_type: content_type.as_str().to_string(),
            entry_id: hook.entry_id().map(str::to_string),
            event_type,
            space_id: hook.space_id().map(str::to_string),
            timestamp: now(),
            environment: self.environment.clone(),
        })
    }

    /// Issue every invalidation in order. A failed target never stops the
    /// remaining ones; all failures are returned together.
    async fn apply(&self, set: &InvalidationSet) -> Result<(), WebhookError> {
        let mut failed = Vec::new();
        for path in &set.paths {
            if let Err(err) = self.revalidator.revalidate_path(path).await {
                warn!(?err, path, "path revalidation failed");
                failed.push(FailedTarget {
                    kind: TargetKind::Path,
                    value: path.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
        for tag in &set.tags {
            if let Err(err) = self.revalidator.revalidate_tag(tag).await {
                warn!(?err, tag, "tag revalidation failed");
                failed.push(FailedTarget {
                    kind: TargetKind::Tag,
                    value: tag.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(WebhookError::RevalidationFailed {
                failed,
                total: set.len(),
            })
        }
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            status: "OK",
            message: "Revalidation endpoint is running",
            timestamp: now(),
            environment: self.environment.clone(),
            secret_configured: self.secret.is_some(),
        }
    }
}

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
