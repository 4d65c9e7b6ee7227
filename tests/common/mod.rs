//! Scripted in-memory stand-ins for the network backends.
//!
//! [`FakeRedis`] implements [`CommandExecutor`] over a sorted map so SCAN
//! pages are deterministic; [`FakeDocuments`] does the same for
//! [`DocumentStore`]. Every command is appended to a log, and any command
//! can be made to fail on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use cache_facade::backend::{CommandExecutor, DocumentStore, ScanPage, StoredDocument};
use futures::stream::{self, BoxStream, StreamExt};
use cache_facade::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct Slot {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |exp| Instant::now() < exp)
    }
}

#[derive(Default)]
pub struct FakeRedis {
    data: Mutex<BTreeMap<String, Slot>>,
    log: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    // open SCAN cursors: id -> last key returned
    cursors: Mutex<HashMap<u64, String>>,
    next_cursor: AtomicU64,
    closes: AtomicUsize,
}

impl FakeRedis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `command` (e.g. `"GET"`, `"PING"`) fail.
    pub fn fail_on(&self, command: &str) {
        self.failing.lock().insert(command.to_string());
    }

    pub fn recover(&self, command: &str) {
        self.failing.lock().remove(command);
    }

    /// Commands issued so far, names only.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count_of(&self, command: &str) -> usize {
        self.log.lock().iter().filter(|c| *c == command).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Store raw bytes, bypassing any codec.
    pub fn insert_raw(&self, key: &str, bytes: &[u8]) {
        self.data.lock().insert(
            key.to_string(),
            Slot {
                data: bytes.to_vec(),
                expires_at: None,
            },
        );
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.data
            .lock()
            .get(key)
            .filter(|s| s.is_live())
            .map(|s| s.data.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// Remaining lifetime of `key`, if it has one.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.data
            .lock()
            .get(key)
            .and_then(|s| s.expires_at)
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.data
            .lock()
            .iter()
            .filter(|(_, s)| s.is_live())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn run(&self, command: &str) -> Result<()> {
        self.log.lock().push(command.to_string());
        if self.failing.lock().contains(command) {
            return Err(Error::BackendError(format!("{} failed: connection refused", command)));
        }
        Ok(())
    }

    fn store(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.data.lock().insert(
            key.to_string(),
            Slot {
                data: value,
                expires_at,
            },
        );
    }
}

/// Redis glob matching for `*`, `?` and backslash escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    matches_from(&p, &t)
}

fn matches_from(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => (0..=t.len()).any(|i| matches_from(&p[1..], &t[i..])),
        Some('?') => !t.is_empty() && matches_from(&p[1..], &t[1..]),
        Some('\\') if p.len() > 1 => {
            t.first() == Some(&p[1]) && matches_from(&p[2..], &t[1..])
        }
        Some(c) => t.first() == Some(c) && matches_from(&p[1..], &t[1..]),
    }
}

#[async_trait]
impl CommandExecutor for FakeRedis {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.run("GET")?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.run("SET")?;
        self.store(key, value, ttl);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.run("EXISTS")?;
        Ok(self.contains(key))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.run("DEL")?;
        let mut data = self.data.lock();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count() as u64)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.run("MGET")?;
        Ok(keys.iter().map(|k| self.raw(k)).collect())
    }

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>, ttl: Duration) -> Result<()> {
        self.run("PIPELINE")?;
        for (key, value) in entries {
            self.store(&key, value, ttl);
        }
        Ok(())
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        self.run("SCAN")?;
        let lower = if cursor == 0 {
            Bound::Unbounded
        } else {
            match self.cursors.lock().remove(&cursor) {
                Some(last) => Bound::Excluded(last),
                None => return Err(Error::BackendError("ERR invalid cursor".to_string())),
            }
        };

        let (visited, more) = {
            let data = self.data.lock();
            let mut live = data
                .range::<String, _>((lower, Bound::Unbounded))
                .filter(|(_, s)| s.is_live())
                .map(|(k, _)| k.clone());
            let visited: Vec<String> = live.by_ref().take(count.max(1)).collect();
            let more = live.next().is_some();
            (visited, more)
        };

        let next = match visited.last() {
            Some(last) if more => {
                let id = self.next_cursor.fetch_add(1, Ordering::SeqCst) + 1;
                self.cursors.lock().insert(id, last.clone());
                id
            }
            _ => 0,
        };
        let keys = visited
            .into_iter()
            .filter(|k| glob_match(pattern, k))
            .collect();
        Ok(ScanPage { cursor: next, keys })
    }

    async fn info(&self) -> Result<String> {
        self.run("INFO")?;
        Ok("# Server\r\nredis_version:7.2.0\r\n".to_string())
    }

    async fn ping(&self) -> Result<()> {
        self.run("PING")
    }

    async fn close(&self) -> Result<()> {
        self.run("CLOSE")?;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Document collection keyed by `_id`.
#[derive(Default)]
pub struct FakeDocuments {
    docs: Mutex<BTreeMap<String, StoredDocument>>,
    log: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    closes: AtomicUsize,
}

impl FakeDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `command` (e.g. `"FIND"`, `"PING"`) fail.
    pub fn fail_on(&self, command: &str) {
        self.failing.lock().insert(command.to_string());
    }

    pub fn recover(&self, command: &str) {
        self.failing.lock().remove(command);
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count_of(&self, command: &str) -> usize {
        self.log.lock().iter().filter(|c| *c == command).count()
    }

    pub fn clear_log(&self) {
        self.log.lock().clear();
    }

    /// Store a document as-is, bypassing the driver.
    pub fn insert(&self, document: StoredDocument) {
        self.docs.lock().insert(document.key.clone(), document);
    }

    pub fn document(&self, key: &str) -> Option<StoredDocument> {
        self.docs.lock().get(key).cloned()
    }

    /// Every stored `_id`, expired or not.
    pub fn keys(&self) -> Vec<String> {
        self.docs.lock().keys().cloned().collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn run(&self, command: &str) -> Result<()> {
        self.log.lock().push(command.to_string());
        if self.failing.lock().contains(command) {
            return Err(Error::BackendError(format!("{} failed: server selection timeout", command)));
        }
        Ok(())
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Literal prefix of an anchored regex built from escaped text (`^a\.b`).
pub fn regex_prefix(regex: &str) -> String {
    let mut prefix = String::new();
    let mut chars = regex.strip_prefix('^').unwrap_or(regex).chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => prefix.extend(chars.next()),
            c => prefix.push(c),
        }
    }
    prefix
}

#[async_trait]
impl DocumentStore for FakeDocuments {
    async fn find(&self, key: &str) -> Result<Option<StoredDocument>> {
        self.run("FIND")?;
        Ok(self.document(key))
    }

    async fn find_many(&self, keys: &[String]) -> Result<Vec<StoredDocument>> {
        self.run("FIND_MANY")?;
        let docs = self.docs.lock();
        Ok(keys.iter().filter_map(|k| docs.get(k).cloned()).collect())
    }

    async fn upsert(&self, document: StoredDocument) -> Result<()> {
        self.run("UPSERT")?;
        self.insert(document);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.run("DELETE")?;
        let mut docs = self.docs.lock();
        Ok(keys.iter().filter(|k| docs.remove(*k).is_some()).count() as u64)
    }

    fn keys_matching(&self, regex: &str, now_ms: u64) -> BoxStream<'static, Result<String>> {
        if let Err(e) = self.run("KEYS") {
            return stream::iter(vec![Err(e)]).boxed();
        }
        let prefix = regex_prefix(regex);
        let keys: Vec<Result<String>> = self
            .docs
            .lock()
            .values()
            .filter(|d| d.key.starts_with(&prefix) && !d.is_expired(now_ms))
            .map(|d| Ok(d.key.clone()))
            .collect();
        stream::iter(keys).boxed()
    }

    async fn delete_matching(&self, regex: &str) -> Result<u64> {
        self.run("DELETE_MATCHING")?;
        let prefix = regex_prefix(regex);
        let mut docs = self.docs.lock();
        let before = docs.len();
        docs.retain(|key, _| !key.starts_with(&prefix));
        Ok((before - docs.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.run("PING")
    }

    async fn info(&self) -> Result<String> {
        self.run("INFO")?;
        Ok("mongodb_version:7.0.0\r\nnamespace:cache.cache_entries".to_string())
    }

    async fn close(&self) -> Result<()> {
        self.run("CLOSE")?;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Route `log` output to the test harness; repeated calls are harmless.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
