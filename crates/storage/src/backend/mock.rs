//! In-memory object store for testing.

use super::BoxAsyncRead;
use crate::error::{ErrorKind, Result};
use crate::models::{Entry, ListQuery, ObjectInfo, Page};
use crate::ObjectStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

const DEFAULT_PAGE_SIZE: usize = 1000;

struct MockObject {
    created: UtcDateTime,
    data: Vec<u8>,
}

type Buckets = BTreeMap<String, BTreeMap<String, MockObject>>;

/// In-memory object store for testing.
///
/// Buckets are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Listings
/// are returned in key order and split into pages of
/// [`with_page_size()`](Self::with_page_size) entries, so callers exercise the
/// same continuation-token loop as against a real store.
///
/// A few knobs exist purely to exercise failure handling in callers:
/// - [`fail_next_reads()`](Self::fail_next_reads) makes the next N calls to
///   [`reader()`](ObjectStore::reader) fail with a retryable network error.
/// - [`truncate_next_reads()`](Self::truncate_next_reads) makes the next N
///   readers yield only the first half of the object, like a dropped
///   connection that went unnoticed.
/// - [`deny_next_stats()`](Self::deny_next_stats) makes the next N calls to
///   [`stat()`](ObjectStore::stat) fail with a permission error, which is
///   never retryable.
/// - [`without_checksums()`](Self::without_checksums) stops the store from
///   reporting CRC32C checksums, like objects uploaded without one.
/// - [`bytes_transferred()`](Self::bytes_transferred) counts every byte
///   handed out by a reader.
///
/// # Examples
///
/// ```
/// use spotcheck_storage::backend::MockBackend;
/// use spotcheck_storage::ObjectStore;
/// use time::UtcDateTime;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockBackend::default()
///     .with_object("backups", "db/2024-06-01.sql.gz", b"...", UtcDateTime::now());
/// let info = store.stat("backups", "db/2024-06-01.sql.gz").await?;
/// assert_eq!(info.size, 3);
/// assert!(info.crc32c.is_some());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    page_size: usize,
    checksums: bool,
    buckets: RwLock<Buckets>,
    denied_stats: AtomicUsize,
    failing_reads: AtomicUsize,
    truncated_reads: AtomicUsize,
    transferred: AtomicU64,
}

impl MockBackend {
    /// Change how many entries are returned per listing page.
    ///
    /// Panics on zero; a page size of zero would never make progress.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0, "MockBackend::with_page_size: page size must be positive");
        self.page_size = page_size;
        self
    }

    /// Report objects without a CRC32C checksum.
    pub fn without_checksums(mut self) -> Self {
        self.checksums = false;
        self
    }

    /// Create an (empty) bucket if it doesn't already exist.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.get_mut().entry(bucket.into()).or_default();
        self
    }

    /// Add an object, creating its bucket if needed.
    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
        created: UtcDateTime,
    ) -> Self {
        let object = MockObject { created, data: data.into() };
        self.buckets.get_mut().entry(bucket.into()).or_default().insert(key.into(), object);
        self
    }

    /// Remove an object, as if someone deleted it behind our back.
    pub async fn remove(&self, bucket: &str, key: &str) -> bool {
        let mut guard = self.buckets.write().await;
        guard.get_mut(bucket).and_then(|objects| objects.remove(key)).is_some()
    }

    /// The next `count` stats fail with a permission error.
    pub fn deny_next_stats(&self, count: usize) {
        self.denied_stats.store(count, Ordering::SeqCst);
    }

    /// The next `count` readers fail with a retryable network error.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// The next `count` readers only return the first half of the object.
    pub fn truncate_next_reads(&self, count: usize) {
        self.truncated_reads.store(count, Ordering::SeqCst);
    }

    /// Total bytes handed out by readers so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    fn object_info(key: &str, object: &MockObject) -> ObjectInfo {
        ObjectInfo::new(key, object.data.len() as u64, object.created).with_crc32c(crc32c::crc32c(&object.data))
    }

    fn not_found(bucket: &str, key: &str) -> ErrorKind {
        ErrorKind::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Decrement `counter` if it is positive, returning whether it was.
    fn take(counter: &AtomicUsize) -> bool {
        counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            checksums: true,
            buckets: RwLock::new(BTreeMap::new()),
            denied_stats: AtomicUsize::new(0),
            failing_reads: AtomicUsize::new(0),
            truncated_reads: AtomicUsize::new(0),
            transferred: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ObjectStore for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, bucket: &str, query: &ListQuery, token: Option<&str>) -> Result<Page> {
        let offset = match token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| exn::Exn::from(ErrorKind::BackendError(format!("invalid page token `{token}`"))))?,
            None => 0,
        };
        let guard = self.buckets.read().await;
        let objects = guard.get(bucket).ok_or_else(|| exn::Exn::from(ErrorKind::BucketNotFound(bucket.to_string())))?;
        let prefix = query.prefix.as_deref().unwrap_or_default();

        // Build the complete (ordered) listing, then cut the requested page
        // out of it. Cheap enough for test-sized buckets.
        let mut entries = Vec::new();
        let mut seen_prefixes = BTreeSet::new();
        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else { break };
            match query.delimiter.as_deref().and_then(|d| rest.find(d).map(|i| i + d.len())) {
                Some(end) => {
                    let common = format!("{prefix}{}", &rest[..end]);
                    if seen_prefixes.insert(common.clone()) {
                        entries.push(Entry::Prefix(common));
                    }
                },
                None => entries.push(Entry::Object(Self::object_info(key, object))),
            }
        }

        let page: Vec<Entry> = entries.iter().skip(offset).take(self.page_size).cloned().collect();
        let end = offset + page.len();
        let next_token = (end < entries.len()).then(|| end.to_string());
        Ok(Page { entries: page, next_token })
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let guard = self.buckets.read().await;
        let objects = guard.get(bucket).ok_or_else(|| exn::Exn::from(ErrorKind::BucketNotFound(bucket.to_string())))?;
        let object = objects.get(key).ok_or_else(|| exn::Exn::from(Self::not_found(bucket, key)))?;
        if Self::take(&self.denied_stats) {
            exn::bail!(ErrorKind::PermissionDenied(format!("injected denial for {bucket}/{key}")));
        }
        let mut info = Self::object_info(key, object);
        if !self.checksums {
            info.crc32c = None;
        }
        Ok(info)
    }

    async fn reader(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let guard = self.buckets.read().await;
        let objects = guard.get(bucket).ok_or_else(|| exn::Exn::from(ErrorKind::BucketNotFound(bucket.to_string())))?;
        let object = objects.get(key).ok_or_else(|| exn::Exn::from(Self::not_found(bucket, key)))?;
        if Self::take(&self.failing_reads) {
            exn::bail!(ErrorKind::Network(format!("injected failure reading {bucket}/{key}")));
        }
        let mut data = object.data.clone();
        if Self::take(&self.truncated_reads) {
            data.truncate(data.len() / 2);
        }
        self.transferred.fetch_add(data.len() as u64, Ordering::SeqCst);
        Ok(Box::pin(Cursor::new(data)))
    }
}
