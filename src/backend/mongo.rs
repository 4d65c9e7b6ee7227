//! MongoDB document store.
//!
//! Each entry is one document `{ _id, payload, expires_at }` in a single
//! collection. `expires_at` is a BSON date covered by a TTL index, so the
//! server reaps expired entries on its own schedule; reads still filter on
//! it because the reaper runs only about once a minute.

use super::document::{DocumentStore, StoredDocument};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use mongodb::bson::document::ValueAccessError;
use mongodb::bson::{doc, spec::BinarySubtype, Binary, Bson, DateTime, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "cache";
pub const DEFAULT_COLLECTION: &str = "cache_entries";

/// Connection settings for [`MongoStore`].
#[derive(Clone, Debug)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Document store over one MongoDB collection.
///
/// # Example
///
/// ```no_run
/// # use cache_facade::backend::{DocumentStore, MongoConfig, MongoStore};
/// # async fn example() -> cache_facade::Result<()> {
/// let store = MongoStore::connect(MongoConfig::default()).await?;
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect, ping the server and make sure the TTL index exists.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the URI is invalid, the server does
    /// not answer, or the index cannot be created.
    pub async fn connect(config: MongoConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri).await?;
        let store = Self::from_client(client, &config.database, &config.collection);
        store.ping().await?;
        store.ensure_ttl_index().await?;

        info!(
            "✓ MongoDB store initialized: {}.{}",
            config.database, config.collection
        );
        Ok(store)
    }

    /// Wrap an existing client. Does not touch the server.
    pub fn from_client(client: Client, database: &str, collection: &str) -> Self {
        let collection = client.database(database).collection::<Document>(collection);
        MongoStore { client, collection }
    }

    /// Create the `expires_at` TTL index if it is missing.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the server rejects the index.
    pub async fn ensure_ttl_index(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(IndexOptions::builder().expire_after(Duration::ZERO).build())
            .build();
        self.collection.create_index(index).await?;
        debug!("✓ TTL index ready on {}", self.collection.namespace());
        Ok(())
    }
}

fn invalid(e: ValueAccessError) -> Error {
    Error::InvalidCacheEntry(format!("cache document: {}", e))
}

fn to_document(entry: StoredDocument) -> Document {
    let payload = Binary {
        subtype: BinarySubtype::Generic,
        bytes: entry.payload,
    };
    let mut document = doc! { "_id": entry.key, "payload": payload };
    if let Some(ms) = entry.expires_at_ms {
        let ms = i64::try_from(ms).unwrap_or(i64::MAX);
        document.insert("expires_at", DateTime::from_millis(ms));
    }
    document
}

fn from_document(document: &Document) -> Result<StoredDocument> {
    let key = document.get_str("_id").map_err(invalid)?.to_string();
    let payload = document.get_binary_generic("payload").map_err(invalid)?.clone();
    let expires_at_ms = match document.get("expires_at") {
        Some(Bson::DateTime(at)) => Some(u64::try_from(at.timestamp_millis()).unwrap_or(0)),
        _ => None,
    };
    Ok(StoredDocument {
        key,
        payload,
        expires_at_ms,
    })
}

/// Documents under `regex` that have not expired at `now_ms`. A missing
/// `expires_at` matches the `null` branch.
fn live_filter(regex: &str, now_ms: u64) -> Document {
    let now = DateTime::from_millis(i64::try_from(now_ms).unwrap_or(i64::MAX));
    doc! {
        "_id": { "$regex": regex },
        "$or": [
            { "expires_at": Bson::Null },
            { "expires_at": { "$gt": now } },
        ],
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, key: &str) -> Result<Option<StoredDocument>> {
        self.collection
            .find_one(doc! { "_id": key })
            .await?
            .as_ref()
            .map(from_document)
            .transpose()
    }

    async fn find_many(&self, keys: &[String]) -> Result<Vec<StoredDocument>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let documents: Vec<Document> = self
            .collection
            .find(doc! { "_id": { "$in": keys.to_vec() } })
            .await?
            .try_collect()
            .await?;
        documents.iter().map(from_document).collect()
    }

    async fn upsert(&self, entry: StoredDocument) -> Result<()> {
        let filter = doc! { "_id": entry.key.as_str() };
        self.collection
            .replace_one(filter, to_document(entry))
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .delete_many(doc! { "_id": { "$in": keys.to_vec() } })
            .await?;
        Ok(result.deleted_count)
    }

    fn keys_matching(&self, regex: &str, now_ms: u64) -> BoxStream<'static, Result<String>> {
        let collection = self.collection.clone();
        let filter = live_filter(regex, now_ms);
        stream::once(async move {
            collection
                .find(filter)
                .projection(doc! { "_id": 1 })
                .await
                .map_err(Error::from)
        })
        .map_ok(|cursor| {
            cursor.map(|document| -> Result<String> {
                let document = document?;
                Ok(document.get_str("_id").map_err(invalid)?.to_string())
            })
        })
        .try_flatten()
        .boxed()
    }

    async fn delete_matching(&self, regex: &str) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! { "_id": { "$regex": regex } })
            .await?;
        Ok(result.deleted_count)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn info(&self) -> Result<String> {
        let build = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await?;
        let version = build.get_str("version").unwrap_or("unknown");
        Ok(format!(
            "mongodb_version:{}\r\nnamespace:{}",
            version,
            self.collection.namespace()
        ))
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        info!("✓ MongoDB client shut down");
        Ok(())
    }
}
