//! Document-store backends.
//!
//! A [`DocumentStore`] keeps one document per fully qualified key. Like a
//! [`CommandExecutor`](super::CommandExecutor) it sees only bytes: the
//! driver owns namespacing, codecs and the default TTL.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Fully qualified key (the document `_id`).
    pub key: String,
    pub payload: Vec<u8>,
    /// Unix epoch milliseconds; `None` never expires.
    pub expires_at_ms: Option<u64>,
}

impl StoredDocument {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|exp| now_ms >= exp)
    }
}

/// Operations a document backend must offer.
///
/// Expired documents may still be returned by `find`/`find_many` until the
/// backend reaps them; callers check [`StoredDocument::is_expired`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the document stored under `key`.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn find(&self, key: &str) -> Result<Option<StoredDocument>>;

    /// Fetch every document whose key is in `keys`, in any order, in one
    /// round trip.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn find_many(&self, keys: &[String]) -> Result<Vec<StoredDocument>>;

    /// Insert or replace a document.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn upsert(&self, document: StoredDocument) -> Result<()>;

    /// Insert or replace several documents.
    ///
    /// Default implementation calls `upsert()` for each document and stops
    /// at the first failure, leaving earlier documents written.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn upsert_many(&self, documents: Vec<StoredDocument>) -> Result<()> {
        for document in documents {
            self.upsert(document).await?;
        }
        Ok(())
    }

    /// Remove documents by key; returns how many existed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Cursor over the keys of live documents matching the anchored
    /// `regex`, as of `now_ms`. The stream is lazy: documents are pulled in
    /// backend-sized batches as it is polled.
    fn keys_matching(&self, regex: &str, now_ms: u64) -> BoxStream<'static, Result<String>>;

    /// Remove every document whose key matches the anchored `regex`;
    /// returns how many were removed.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete_matching(&self, regex: &str) -> Result<u64>;

    /// Connectivity check used by driver constructors.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn ping(&self) -> Result<()>;

    /// Free-form diagnostic text.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn info(&self) -> Result<String> {
        Ok(String::new())
    }

    /// Release connections. Calls after the first must not panic.
    ///
    /// # Errors
    /// Returns `Err` if the backend reports a shutdown failure
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
