// src/seed.rs

//! Bundled starting documents for a fresh bucket.

use crate::error::Result;
use crate::storage::{BlobStore, RSS_CONTENT_TYPE};

/// A document shipped inside the binary.
#[derive(Debug, Clone, Copy)]
pub struct SeedDocument {
    pub key: &'static str,
    pub bytes: &'static [u8],
}

pub const SEED_DOCUMENTS: [SeedDocument; 3] = [
    SeedDocument {
        key: "awsnews.xml",
        bytes: include_bytes!("../seed/awsnews.xml"),
    },
    SeedDocument {
        key: "processed.xml",
        bytes: include_bytes!("../seed/processed.xml"),
    },
    SeedDocument {
        key: "testnews.xml",
        bytes: include_bytes!("../seed/testnews.xml"),
    },
];

/// Write every seed document, replacing existing content. Returns the
/// locations written.
pub async fn seed_store(store: &dyn BlobStore) -> Result<Vec<String>> {
    let mut written = Vec::with_capacity(SEED_DOCUMENTS.len());
    for seed in &SEED_DOCUMENTS {
        store
            .put(seed.key, seed.bytes.to_vec(), RSS_CONTENT_TYPE)
            .await?;
        let location = store.location(seed.key);
        log::info!("Seeded {location}");
        written.push(location);
    }
    Ok(written)
}
