//! Contentful entry webhook payload.
//!
//! Only the handful of fields the dispatcher reads are modelled; everything
//! else in the body is ignored.
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EntryWebhook {
    #[serde(default)]
    pub sys: Option<EntrySys>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EntrySys {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub content_type: Option<Link>,
    #[serde(default)]
    pub space: Option<Link>,
}

/// `{"sys": {"id": "..."}}` reference as Contentful nests it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Link {
    #[serde(default)]
    pub sys: Option<LinkSys>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LinkSys {
    #[serde(default)]
    pub id: Option<String>,
}

impl Link {
    fn id(&self) -> Option<&str> {
        self.sys.as_ref()?.id.as_deref()
    }
}

impl EntryWebhook {
    pub fn content_type_id(&self) -> Option<&str> {
        self.sys
            .as_ref()?
            .content_type
            .as_ref()?
            .id()
            .filter(|id| !id.is_empty())
    }

    pub fn entry_id(&self) -> Option<&str> {
        self.sys.as_ref()?.id.as_deref()
    }

    pub fn space_id(&self) -> Option<&str> {
        self.sys.as_ref()?.space.as_ref()?.id()
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.sys.as_ref()?.typ.as_deref()
    }

    /// Slug from the locale-keyed `fields.slug` map. Prefers `locale`, then
    /// the first non-empty value. Blank slugs count as absent.
    pub fn slug(&self, locale: &str) -> Option<&str> {
        let localized = self.fields.as_ref()?.get("slug")?.as_object()?;
        localized
            .get(locale)
            .and_then(non_blank)
            .or_else(|| localized.values().find_map(non_blank))
    }
}

fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}
