//! Edge service for the business-skills media site.
//!
//! Two rule layers sit in front of the rendering origin:
//! - [`revalidate`]: authenticates CMS webhooks and invalidates the cached
//!   paths and tags affected by a content change.
//! - [`redirect`]: sends legacy and non-canonical URLs to their canonical
//!   location.

pub mod config;
pub mod contentful;
pub mod http;
pub mod invalidation;
pub mod origin;
pub mod redirect;
pub mod revalidate;
