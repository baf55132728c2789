//! Configuration loader and validator for the site edge service.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::redirect::{ContentKind, RedirectStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub revalidate: Revalidate,
    #[serde(default)]
    pub origin: Option<Origin>,
    #[serde(default)]
    pub redirects: Redirects,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub bind: String,
    pub environment: String,
    #[serde(default)]
    pub use_mock_data: bool,
}

/// Webhook authentication and cache-invalidation backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Revalidate {
    /// Shared secret expected in `Authorization: Bearer <secret>`.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default)]
    pub backend: Option<Backend>,
}

/// On-demand revalidation endpoint exposed by the rendering runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Backend {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Rendering origin that receives every request the edge does not answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Origin {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Static redirect tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Redirects {
    #[serde(default = "default_legacy_roots")]
    pub legacy_roots: Vec<LegacyRoot>,
    #[serde(default = "default_legacy_types")]
    pub legacy_types: Vec<String>,
    #[serde(default = "default_category_aliases")]
    pub category_aliases: BTreeMap<String, String>,
    #[serde(default = "default_type_categories")]
    pub type_categories: BTreeMap<ContentKind, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyRoot {
    pub path: String,
    pub target: String,
    #[serde(default)]
    pub status: RedirectStatus,
}

impl Default for Redirects {
    fn default() -> Self {
        Self {
            legacy_roots: default_legacy_roots(),
            legacy_types: default_legacy_types(),
            category_aliases: default_category_aliases(),
            type_categories: default_type_categories(),
        }
    }
}

fn default_locale() -> String {
    "ja-JP".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_legacy_roots() -> Vec<LegacyRoot> {
    [
        ("/article", "/articles"),
        ("/videos", "/categories/thinking-methods"),
        ("/audios", "/categories/communication-skill"),
        ("/category", "/categories"),
    ]
    .into_iter()
    .map(|(path, target)| LegacyRoot {
        path: path.to_string(),
        target: target.to_string(),
        status: RedirectStatus::MovedPermanently,
    })
    .collect()
}

fn default_legacy_types() -> Vec<String> {
    vec!["articles".into(), "videos".into(), "audios".into()]
}

fn default_category_aliases() -> BTreeMap<String, String> {
    [
        ("basic", "basic-business-skill"),
        ("business-basic", "basic-business-skill"),
        ("ビジネス基礎", "basic-business-skill"),
        ("thinking", "thinking-methods"),
        ("思考法", "thinking-methods"),
        ("communication", "communication-skill"),
        ("コミュニケーション", "communication-skill"),
    ]
    .into_iter()
    .map(|(alias, slug)| (alias.to_string(), slug.to_string()))
    .collect()
}

fn default_type_categories() -> BTreeMap<ContentKind, String> {
    BTreeMap::from([
        (ContentKind::Article, "basic-business-skill".to_string()),
        (ContentKind::Video, "thinking-methods".to_string()),
        (ContentKind::Audio, "communication-skill".to_string()),
    ])
}

impl Config {
    /// Layer process environment over the file values. Called once at startup;
    /// components never read the environment themselves.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("CONTENTFUL_REVALIDATE_SECRET") {
            self.revalidate.secret = Some(secret);
        }
        if let Some(flag) = lookup("USE_MOCK_DATA") {
            self.app.use_mock_data = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        if let Some(env) = lookup("APP_ENV").filter(|v| !v.trim().is_empty()) {
            self.app.environment = env;
        }
        self
    }

    /// Whether a non-blank webhook secret is present.
    pub fn secret_configured(&self) -> bool {
        self.revalidate
            .secret
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.app
            .bind
            .parse()
            .map_err(|_| ConfigError::Invalid("app.bind must be a socket address"))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    cfg.bind_addr()?;
    if cfg.app.environment.trim().is_empty() {
        return Err(ConfigError::Invalid("app.environment must be non-empty"));
    }

    if cfg.revalidate.default_locale.trim().is_empty() {
        return Err(ConfigError::Invalid("revalidate.default_locale must be non-empty"));
    }
    if let Some(backend) = &cfg.revalidate.backend {
        if reqwest::Url::parse(&backend.url).is_err() {
            return Err(ConfigError::Invalid("revalidate.backend.url must be an absolute URL"));
        }
        if backend.timeout_ms == 0 {
            return Err(ConfigError::Invalid("revalidate.backend.timeout_ms must be > 0"));
        }
    }

    if let Some(origin) = &cfg.origin {
        if reqwest::Url::parse(&origin.url).is_err() {
            return Err(ConfigError::Invalid("origin.url must be an absolute URL"));
        }
        if origin.timeout_ms == 0 {
            return Err(ConfigError::Invalid("origin.timeout_ms must be > 0"));
        }
    }

    let r = &cfg.redirects;
    for root in &r.legacy_roots {
        if !root.path.starts_with('/') || !root.target.starts_with('/') {
            return Err(ConfigError::Invalid(
                "redirects.legacy_roots entries must use absolute paths",
            ));
        }
        if root.path == root.target {
            return Err(ConfigError::Invalid(
                "redirects.legacy_roots entry redirects to itself",
            ));
        }
    }
    if r
        .legacy_types
        .iter()
        .any(|t| t.trim().is_empty() || t.contains('/'))
    {
        return Err(ConfigError::Invalid(
            "redirects.legacy_types must be single path segments",
        ));
    }
    if r.legacy_types.iter().any(|t| t == "categories" || t == "content") {
        return Err(ConfigError::Invalid(
            "redirects.legacy_types must not shadow canonical sections",
        ));
    }
    let slug_ok = |s: &String| !s.trim().is_empty() && !s.contains('/');
    if !r
        .category_aliases
        .iter()
        .all(|(alias, slug)| slug_ok(alias) && slug_ok(slug))
    {
        return Err(ConfigError::Invalid(
            "redirects.category_aliases must map non-empty slugs",
        ));
    }
    if !r.type_categories.values().all(slug_ok) {
        return Err(ConfigError::Invalid(
            "redirects.type_categories must map to non-empty slugs",
        ));
    }

    Ok(())
}

/// Returns a documented example configuration.
pub fn example() -> &'static str {
    r#"app:
  bind: "0.0.0.0:3000"
  environment: "production"
  use_mock_data: false

revalidate:
  # Unset means every webhook is refused. Set here or through
  # CONTENTFUL_REVALIDATE_SECRET, which takes precedence.
  # secret: "YOUR_WEBHOOK_SECRET"
  default_locale: "ja-JP"
  backend:
    url: "http://127.0.0.1:3001/api/internal/revalidate"
    token: "YOUR_RUNTIME_REVALIDATE_TOKEN"
    timeout_ms: 5000

origin:
  url: "http://127.0.0.1:3001"
  timeout_ms: 10000

redirects:
  legacy_roots:
    - path: "/article"
      target: "/articles"
      status: 301
    - path: "/videos"
      target: "/categories/thinking-methods"
      status: 301
    - path: "/audios"
      target: "/categories/communication-skill"
      status: 301
    - path: "/category"
      target: "/categories"
      status: 301
  legacy_types: ["articles", "videos", "audios"]
  category_aliases:
    basic: "basic-business-skill"
    business-basic: "basic-business-skill"
    "ビジネス基礎": "basic-business-skill"
    thinking: "thinking-methods"
    "思考法": "thinking-methods"
    communication: "communication-skill"
    "コミュニケーション": "communication-skill"
  type_categories:
    article: "basic-business-skill"
    video: "thinking-methods"
    audio: "communication-skill"
"#
}
