// src/services/source.rs

//! Source feed retrieval.
//!
//! Fetches the external feed and maps its entries into `RawSourceEntry`
//! values, keeping the feed's own order (newest first for well-behaved feeds).

use std::path::PathBuf;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;

use crate::error::{AppError, Result};
use crate::models::{RawSourceEntry, SourceConfig};
use crate::utils::http;

/// Trait for source feed collaborators.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Fetch and parse the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<RawSourceEntry>>;
}

/// Parse a feed document (RSS 0.9x/1.0/2.0, Atom or JSON Feed).
pub fn parse_source(bytes: &[u8]) -> Result<Vec<RawSourceEntry>> {
    let feed = parser::parse(bytes).map_err(|e| AppError::feed(format!("Failed to parse feed: {e}")))?;

    let entries: Vec<RawSourceEntry> = feed.entries.into_iter().filter_map(map_entry).collect();
    log::debug!("Parsed {} source entries", entries.len());
    Ok(entries)
}

fn map_entry(entry: Entry) -> Option<RawSourceEntry> {
    let id = entry.id.trim().to_string();
    if id.is_empty() {
        log::warn!("Skipping source entry without id");
        return None;
    }

    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();

    Some(RawSourceEntry {
        id,
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        link: entry.links.into_iter().next().map(|l| l.href),
        description,
        published: entry.published.or(entry.updated),
    })
}

/// Fetches the source feed over HTTP.
pub struct HttpSourceFeed {
    client: reqwest::Client,
}

impl HttpSourceFeed {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(Self::new(http::create_async_client(config)?))
    }
}

#[async_trait]
impl SourceFeed for HttpSourceFeed {
    async fn fetch(&self, url: &str) -> Result<Vec<RawSourceEntry>> {
        let url = url::Url::parse(url)?;
        log::info!("Fetching source feed {}", url);
        let bytes = http::fetch_bytes(&self.client, url.as_str()).await?;
        parse_source(&bytes)
    }
}

/// Reads the source feed from a local file, ignoring the URL.
pub struct FileSourceFeed {
    path: PathBuf,
}

impl FileSourceFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceFeed for FileSourceFeed {
    async fn fetch(&self, _url: &str) -> Result<Vec<RawSourceEntry>> {
        log::info!("Reading source feed from {}", self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;
        parse_source(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_rss_date;

    const SOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
<title>What's New</title><link>https://aws.amazon.com/new/</link><description>News</description>
<item>
  <guid isPermaLink="false">b2</guid>
  <title>New Title</title>
  <link>http://x</link>
  <description>&lt;p&gt;desc&lt;/p&gt;</description>
  <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
</item>
<item>
  <guid isPermaLink="false">a1</guid>
  <title>Old Title</title>
  <link>http://y</link>
  <description>old</description>
  <pubDate>Sun, 31 Dec 2023 00:00:00 GMT</pubDate>
</item>
</channel></rss>"#;

    #[test]
    fn test_parse_source_keeps_order() {
        let entries = parse_source(SOURCE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "b2");
        assert_eq!(entries[1].id, "a1");
    }

    #[test]
    fn test_parse_source_fields() {
        let entries = parse_source(SOURCE.as_bytes()).unwrap();
        let first = &entries[0];
        assert_eq!(first.title, "New Title");
        assert_eq!(first.link.as_deref(), Some("http://x"));
        assert!(first.description.contains("desc"));
        assert_eq!(
            first.published,
            parse_rss_date("Mon, 01 Jan 2024 00:00:00 GMT")
        );
    }

    #[test]
    fn test_parse_source_rejects_garbage() {
        let err = parse_source(b"<html><body>nope</body></html>").unwrap_err();
        assert!(matches!(err, AppError::Feed(_)));
    }

    #[tokio::test]
    async fn test_file_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.xml");
        std::fs::write(&path, SOURCE).unwrap();

        let source = FileSourceFeed::new(&path);
        let entries = source.fetch("ignored").await.unwrap();
        assert_eq!(entries.len(), 2);
    }
}
