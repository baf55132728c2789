//! Edge redirect rules for legacy and non-canonical URLs.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//! legacy section roots, legacy per-item paths, category alias
//! normalization, then the category `type` query rewrite. Anything else
//! passes through untouched. Resolution never fails; unknown input falls
//! through so navigation keeps working.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::config::Redirects;

static ITEM_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([^/]+)/([^/]+)/?$").expect("valid item path regex"));
static CATEGORY_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/categories/([^/]+)/?$").expect("valid category path regex"));

/// Redirect status codes the rule table may carry. The distinction is
/// visible to crawlers, so each rule keeps its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectStatus {
    #[default]
    MovedPermanently,
    Found,
    PermanentRedirect,
}

impl RedirectStatus {
    pub fn code(&self) -> u16 {
        match self {
            RedirectStatus::MovedPermanently => 301,
            RedirectStatus::Found => 302,
            RedirectStatus::PermanentRedirect => 308,
        }
    }
}

impl TryFrom<u16> for RedirectStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            301 => Ok(RedirectStatus::MovedPermanently),
            302 => Ok(RedirectStatus::Found),
            308 => Ok(RedirectStatus::PermanentRedirect),
            other => Err(format!("unsupported redirect status {other}")),
        }
    }
}

impl From<RedirectStatus> for u16 {
    fn from(status: RedirectStatus) -> Self {
        status.code()
    }
}

/// Legacy media kinds accepted in the category `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Article,
    Video,
    Audio,
}

impl ContentKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "article" => Some(ContentKind::Article),
            "video" => Some(ContentKind::Video),
            "audio" => Some(ContentKind::Audio),
            _ => None,
        }
    }
}

/// A single static redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub match_path: String,
    pub target: String,
    pub status: RedirectStatus,
}

/// Case-insensitive alias table resolving to canonical category slugs.
#[derive(Debug, Clone, Default)]
pub struct CategorySlugMap {
    slugs: HashMap<String, String>,
}

impl CategorySlugMap {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let mut slugs = HashMap::new();
        // Canonical slugs resolve to themselves so case variants normalize too.
        for canonical in aliases.values() {
            slugs.insert(canonical.to_lowercase(), canonical.clone());
        }
        for (alias, canonical) in aliases {
            slugs.insert(alias.to_lowercase(), canonical.clone());
        }
        Self { slugs }
    }

    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.slugs
            .get(raw)
            .or_else(|| self.slugs.get(&raw.to_lowercase()))
            .map(String::as_str)
    }

    /// Canonical slug for `raw`, or `raw` itself when unmapped.
    pub fn canonicalize<'a>(&'a self, raw: &'a str) -> &'a str {
        self.lookup(raw).unwrap_or(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
    pub status: RedirectStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Redirect(Redirect),
    PassThrough,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Redirect(r) => write!(f, "{} -> {}", r.status.code(), r.location),
            Resolution::PassThrough => write!(f, "pass-through"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectResolver {
    legacy_roots: HashMap<String, RedirectRule>,
    legacy_types: HashSet<String>,
    categories: CategorySlugMap,
    type_categories: BTreeMap<ContentKind, String>,
}

impl RedirectResolver {
    pub fn new(cfg: &Redirects) -> Self {
        let legacy_roots = cfg
            .legacy_roots
            .iter()
            .map(|root| {
                (
                    root.path.clone(),
                    RedirectRule {
                        match_path: root.path.clone(),
                        target: root.target.clone(),
                        status: root.status,
                    },
                )
            })
            .collect();
        Self {
            legacy_roots,
            legacy_types: cfg.legacy_types.iter().cloned().collect(),
            categories: CategorySlugMap::new(&cfg.category_aliases),
            type_categories: cfg.type_categories.clone(),
        }
    }

    pub fn categories(&self) -> &CategorySlugMap {
        &self.categories
    }

    pub fn resolve(&self, path: &str, query: Option<&str>) -> Resolution {
        if is_excluded(path) {
            return Resolution::PassThrough;
        }

        if let Some(rule) = self.legacy_roots.get(path) {
            return redirect(with_query(&rule.target, query), rule.status);
        }

        if let Some(caps) = ITEM_PATH.captures(path) {
            if self.legacy_types.contains(&caps[1]) {
                let location = format!("/content/{}", &caps[2]);
                return redirect(with_query(&location, query), RedirectStatus::MovedPermanently);
            }
        }

        let Some(caps) = CATEGORY_PATH.captures(path) else {
            return Resolution::PassThrough;
        };
        let raw = &caps[1];
        let decoded = decode(raw);
        let canonical = self.categories.canonicalize(&decoded);
        if canonical != decoded {
            let location = format!("/categories/{}", urlencoding::encode(canonical));
            return redirect(with_query(&location, query), RedirectStatus::PermanentRedirect);
        }

        if let Some((kind, rest)) = query.and_then(split_type_param) {
            if let Some(slug) = self.type_categories.get(&kind) {
                let location = format!("/categories/{}", urlencoding::encode(slug));
                let rest = (!rest.is_empty()).then_some(rest.as_str());
                return redirect(with_query(&location, rest), RedirectStatus::Found);
            }
        }

        Resolution::PassThrough
    }
}

fn redirect(location: String, status: RedirectStatus) -> Resolution {
    Resolution::Redirect(Redirect { location, status })
}

/// API routes, framework assets and the favicon never redirect.
fn is_excluded(path: &str) -> bool {
    path == "/api"
        || path.starts_with("/api/")
        || path.starts_with("/_next/static/")
        || path.starts_with("/_next/image")
        || path == "/favicon.ico"
}

fn with_query(target: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(q) => format!("{target}?{q}"),
        None => target.to_string(),
    }
}

fn decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Finds the first recognised `type` value and returns it with the query
/// minus every `type` pair. Remaining pairs keep their original bytes.
fn split_type_param(query: &str) -> Option<(ContentKind, String)> {
    let mut kind = None;
    let mut rest = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if decode(key) == "type" {
            if kind.is_none() {
                kind = ContentKind::parse(&decode(&value.replace('+', " ")));
            }
            continue;
        }
        rest.push(pair);
    }
    kind.map(|k| (k, rest.join("&")))
}
