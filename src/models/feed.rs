// src/models/feed.rs

//! Feed documents and their items.
//!
//! Both stored documents (the processed ledger and the public feed) are
//! RSS 2.0 channels. Items are kept newest first; new items only ever go to
//! index 0.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rss::{Channel, Guid, Item};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::FeedSettings;
use crate::utils::text;

/// Timestamp layout used for `pubDate` and `lastBuildDate`.
pub const RSS_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Render a timestamp the way the stored documents carry it.
pub fn format_rss_date(at: DateTime<Utc>) -> String {
    at.format(RSS_DATE_FORMAT).to_string()
}

/// Parse an RFC-822 style timestamp.
pub fn parse_rss_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// A single item of a stored feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Identity within a document
    pub guid: String,

    /// Item title
    pub title: String,

    /// Link to the original article
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    /// Item description
    pub description: String,

    /// Publication timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Convert an RSS item. Items without a guid fall back to their link;
    /// items with neither have no identity and are skipped.
    fn from_rss(item: &Item) -> Option<Self> {
        let guid = item
            .guid()
            .map(|g| g.value().trim().to_string())
            .filter(|g| !g.is_empty())
            .or_else(|| item.link().map(|l| l.trim().to_string()))
            .filter(|g| !g.is_empty())?;

        Some(Self {
            guid,
            title: item.title().unwrap_or_default().to_string(),
            link: item.link().map(str::to_string),
            description: item.description().unwrap_or_default().to_string(),
            published_at: item.pub_date().and_then(parse_rss_date),
        })
    }

    fn to_rss(&self) -> Item {
        let mut guid = Guid::default();
        guid.set_value(self.guid.clone());
        guid.set_permalink(false);

        let mut item = Item::default();
        item.set_guid(guid);
        item.set_title(self.title.clone());
        item.set_link(self.link.clone());
        item.set_description(self.description.clone());
        item.set_pub_date(self.published_at.map(format_rss_date));
        item
    }
}

/// An entry of the external source feed.
///
/// Never stored as-is in the public feed: it either becomes a ledger item
/// (verbatim, with the processing time as timestamp) or the input of the
/// classification flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSourceEntry {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
}

impl RawSourceEntry {
    /// Ledger copy of this entry, stamped with `now`.
    pub fn to_ledger_item(&self, now: DateTime<Utc>) -> FeedItem {
        FeedItem {
            guid: self.id.clone(),
            title: self.title.clone(),
            link: self.link.clone(),
            description: self.description.clone(),
            published_at: Some(now),
        }
    }

    /// Compact single-line digest handed to the flow as its input document.
    pub fn digest(&self) -> String {
        format!(
            "Id: {} | Title: {} | Link: {} | Description: {} | Published: {}",
            self.id,
            text::collapse_whitespace(&self.title),
            self.link.as_deref().unwrap_or_default(),
            text::html_to_text(&self.description),
            self.published.map(format_rss_date).unwrap_or_default()
        )
    }
}

/// An ordered feed document, newest item first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

impl FeedDocument {
    /// Empty document carrying the configured channel metadata.
    pub fn new(settings: &FeedSettings) -> Self {
        Self {
            title: settings.title.clone(),
            link: settings.link.clone(),
            description: settings.description.clone(),
            language: Some(settings.language.clone()).filter(|l| !l.is_empty()),
            last_build: None,
            items: Vec::new(),
        }
    }

    /// Parse an RSS 2.0 document.
    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        let channel = Channel::read_from(bytes)?;

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(channel.items().len());
        for item in channel.items() {
            match FeedItem::from_rss(item) {
                Some(item) if seen.insert(item.guid.clone()) => items.push(item),
                Some(item) => log::warn!("Dropping duplicate guid {} from document", item.guid),
                None => log::warn!(
                    "Skipping item without guid or link: {:?}",
                    item.title().unwrap_or_default()
                ),
            }
        }

        Ok(Self {
            title: channel.title().to_string(),
            link: channel.link().to_string(),
            description: channel.description().to_string(),
            language: channel.language().map(str::to_string),
            last_build: channel.last_build_date().and_then(parse_rss_date),
            items,
        })
    }

    /// Serialize as an RSS 2.0 document.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut channel = Channel::default();
        channel.set_title(self.title.clone());
        channel.set_link(self.link.clone());
        channel.set_description(self.description.clone());
        channel.set_language(self.language.clone());
        channel.set_last_build_date(self.last_build.map(format_rss_date));
        channel.set_items(self.items.iter().map(FeedItem::to_rss).collect::<Vec<_>>());

        let bytes = channel.write_to(Vec::new())?;
        Ok(bytes)
    }

    /// Identity set of the document.
    pub fn guids(&self) -> HashSet<&str> {
        self.items.iter().map(|item| item.guid.as_str()).collect()
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.items.iter().any(|item| item.guid == guid)
    }

    /// Insert `item` at index 0. Returns `false` (and leaves the document
    /// untouched) when an item with the same guid is already present.
    pub fn prepend(&mut self, item: FeedItem) -> bool {
        if self.contains(&item.guid) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Stamp the build time.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_build = Some(now);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
