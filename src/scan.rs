//! Cursor-driven enumeration of namespaced keys.
//!
//! The keyspace is never listed in one call. [`KeyScanner::batches`] walks
//! the backend's SCAN cursor one page at a time and yields each page as it
//! arrives; every call starts a fresh walk from cursor 0.

use crate::backend::CommandExecutor;
use crate::error::{Error, Result};
use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;

/// Page-size hint passed to SCAN when none is configured.
pub const DEFAULT_SCAN_COUNT: usize = 100;

enum Cursor {
    Start,
    At(u64),
    Done,
}

async fn step(
    executor: Arc<dyn CommandExecutor>,
    pattern: String,
    count: usize,
    state: Cursor,
) -> Result<Option<(Vec<String>, Cursor)>> {
    let cursor = match state {
        Cursor::Start => 0,
        Cursor::At(c) => c,
        Cursor::Done => return Ok(None),
    };
    let page = executor.scan(cursor, &pattern, count).await?;
    let next = if page.cursor == 0 {
        Cursor::Done
    } else {
        Cursor::At(page.cursor)
    };
    Ok(Some((page.keys, next)))
}

/// Scanner over the keys matching one glob pattern.
#[derive(Clone)]
pub struct KeyScanner {
    executor: Arc<dyn CommandExecutor>,
    pattern: String,
    count: usize,
}

impl KeyScanner {
    pub fn new(executor: Arc<dyn CommandExecutor>, pattern: impl Into<String>, count: usize) -> Self {
        KeyScanner {
            executor,
            pattern: pattern.into(),
            count: count.max(1),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Lazy stream of raw key batches. Empty pages are skipped.
    pub fn batches(&self) -> impl Stream<Item = Result<Vec<String>>> + Send + 'static {
        let executor = Arc::clone(&self.executor);
        let pattern = self.pattern.clone();
        let count = self.count;

        stream::try_unfold(Cursor::Start, move |state| {
            step(Arc::clone(&executor), pattern.clone(), count, state)
        })
        .try_filter(|keys| futures::future::ready(!keys.is_empty()))
    }

    /// Number of matching keys.
    ///
    /// SCAN may report a key more than once while the keyspace is being
    /// rehashed; the count is exact on a quiescent backend.
    pub async fn count(&self) -> Result<usize> {
        self.batches()
            .try_fold(0usize, |total, keys| async move {
                Ok::<usize, Error>(total + keys.len())
            })
            .await
    }

    /// Delete every matching key, one batch delete per page.
    ///
    /// Returns the number of keys the backend reported as removed.
    pub async fn delete_all(&self) -> Result<u64> {
        let executor = Arc::clone(&self.executor);
        self.batches()
            .try_fold(0u64, move |total, keys| {
                let executor = Arc::clone(&executor);
                async move {
                    let removed = executor.delete(&keys).await?;
                    Ok::<u64, Error>(total + removed)
                }
            })
            .await
    }
}
