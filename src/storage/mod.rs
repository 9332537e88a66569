//! Storage abstractions for feed document persistence.
//!
//! Two flat documents live side by side in one store:
//!
//! ```text
//! {bucket or root}/
//! ├── processed.xml   # Ledger: every source entry ever offered to the flow
//! └── awsnews.xml     # Public feed: accepted, transformed items
//! ```
//!
//! There is no versioning or conditional write; overlapping runs against the
//! same pair of documents are prevented by the scheduler, not here.

pub mod local;
#[cfg(feature = "aws")]
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FeedDocument, FeedSettings};

// Re-export for convenience
pub use local::LocalBlobStore;
#[cfg(feature = "aws")]
pub use s3::S3BlobStore;

/// Content type of stored feed documents.
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

/// Trait for raw blob storage backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, returning `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob, replacing any previous content.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Human-readable location of a key, for logs.
    fn location(&self, key: &str) -> String;
}

/// Loads and saves feed documents by key.
#[derive(Clone, Copy)]
pub struct FeedStore<'a> {
    blobs: &'a dyn BlobStore,
    settings: &'a FeedSettings,
}

impl<'a> FeedStore<'a> {
    pub fn new(blobs: &'a dyn BlobStore, settings: &'a FeedSettings) -> Self {
        Self { blobs, settings }
    }

    /// Load the document at `key`. A missing blob yields an empty document
    /// with the configured channel metadata.
    pub async fn load(&self, key: &str) -> Result<FeedDocument> {
        match self.blobs.get(key).await? {
            Some(bytes) => {
                let document = FeedDocument::from_xml(&bytes)?;
                log::debug!(
                    "Loaded {} items from {}",
                    document.len(),
                    self.blobs.location(key)
                );
                Ok(document)
            }
            None => {
                log::warn!(
                    "No document at {}, starting from an empty feed",
                    self.blobs.location(key)
                );
                Ok(FeedDocument::new(self.settings))
            }
        }
    }

    /// Persist `document` at `key`.
    pub async fn save(&self, key: &str, document: &FeedDocument) -> Result<()> {
        let bytes = document.to_xml()?;
        self.blobs.put(key, bytes, RSS_CONTENT_TYPE).await?;
        log::info!(
            "Wrote {} items to {}",
            document.len(),
            self.blobs.location(key)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedItem;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let tmp = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(tmp.path());
        let settings = FeedSettings::default();
        let store = FeedStore::new(&blobs, &settings);

        let doc = store.load("processed.xml").await.unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.title, settings.title);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(tmp.path());
        let settings = FeedSettings::default();
        let store = FeedStore::new(&blobs, &settings);

        let mut doc = FeedDocument::new(&settings);
        doc.prepend(FeedItem {
            guid: "a1".into(),
            title: "First".into(),
            link: None,
            description: "d".into(),
            published_at: None,
        });
        store.save("awsnews.xml", &doc).await.unwrap();

        let loaded = store.load("awsnews.xml").await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].guid, "a1");
    }

    #[tokio::test]
    async fn test_corrupt_document_propagates() {
        let tmp = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(tmp.path());
        blobs
            .put("awsnews.xml", b"<html/>".to_vec(), RSS_CONTENT_TYPE)
            .await
            .unwrap();
        let settings = FeedSettings::default();
        let store = FeedStore::new(&blobs, &settings);

        assert!(store.load("awsnews.xml").await.is_err());
    }
}
