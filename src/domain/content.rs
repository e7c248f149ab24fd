//! Published content nodes as materialized from the content tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A published document; recreated per query, never long-lived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedNode {
    pub id: i32,
    /// `-1` for nodes at the top of the tree.
    pub parent_id: i32,
    pub name: String,
    /// Lower-case URL segment of this node.
    pub url_name: String,
    pub document_type_alias: String,
    /// Comma-joined ancestor id chain, ending with this node's id.
    pub path: String,
    pub level: u32,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub create_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub update_date: OffsetDateTime,
    /// Comma-separated alternative URLs for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_alias: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl PublishedNode {
    /// Whether `alias` equals one of this node's URL aliases, with or without a leading slash.
    pub fn matches_url_alias(&self, alias: &str) -> bool {
        let Some(aliases) = self.url_alias.as_deref() else {
            return false;
        };
        let wanted = alias.to_lowercase();
        let slashed = format!("/{wanted}");
        aliases
            .split(',')
            .map(|entry| entry.replace(' ', "").to_lowercase())
            .any(|entry| entry == wanted || entry == slashed)
    }
}
