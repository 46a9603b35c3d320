//! Object store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, a read-only view of a remote
//! object store (S3-compatible services, or an in-memory store for tests).
//! Nothing in this trait can create, modify or delete a remote object.

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::{Entry, ListQuery, ObjectInfo, Page};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;
use tokio::io::AsyncRead;

pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<Entry>> + Send + 'a>>;
pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;

/// Unified, read-only interface for object stores.
///
/// Implementations only have to provide single requests ([`list_page()`](Self::list_page),
/// [`stat()`](Self::stat) and [`reader()`](Self::reader)); pagination is
/// handled once, here, by [`list_stream()`](Self::list_stream).
///
/// # Examples
///
/// ```
/// use spotcheck_storage::{ObjectStore, ListQuery, error::Result};
///
/// async fn total_size(store: &dyn ObjectStore, bucket: &str) -> Result<u64> {
///     let mut size = 0;
///     for entry in store.list(bucket, ListQuery::default()).await? {
///         if let Some(object) = entry.into_object() {
///             size += object.size;
///         }
///     }
///     Ok(size)
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store, used for logging only.
    fn name(&self) -> &str;

    /// Fetch a single page of listing results.
    ///
    /// `token` is `None` for the first page, and afterwards whatever the
    /// previous page returned as [`Page::next_token`]. Returns
    /// [`BucketNotFound`](crate::error::ErrorKind::BucketNotFound) if the
    /// bucket does not exist.
    async fn list_page(&self, bucket: &str, query: &ListQuery, token: Option<&str>) -> Result<Page>;

    /// Stream every listing entry matching `query`.
    ///
    /// Pages are requested lazily, one at a time, as the stream is polled.
    /// The stream is one-shot: it can be drained or dropped, but not rewound;
    /// call this method again for a fresh listing. The first error ends the
    /// stream (no retries happen at this level).
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// use spotcheck_storage::{Entry, ListQuery, ObjectStore, error::Result};
    /// # async fn example(store: &dyn ObjectStore) -> Result<()> {
    ///
    /// // Top-level "directories" of a bucket
    /// let mut shows = store.list_stream("media", ListQuery::default().with_delimiter("/"));
    /// while let Some(entry) = shows.try_next().await? {
    ///     if let Entry::Prefix(show) = entry {
    ///         println!("{show}");
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, bucket: &'a str, query: ListQuery) -> EntryStream<'a> {
        Box::pin(stream! {
            let mut token: Option<String> = None;
            loop {
                let page = match self.list_page(bucket, &query, token.as_deref()).await {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(e);
                        break;
                    },
                };
                for entry in page.entries {
                    yield Ok(entry);
                }
                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }
        })
    }

    /// Collect every listing entry matching `query` into a [`Vec`].
    async fn list(&self, bucket: &str, query: ListQuery) -> Result<Vec<Entry>> {
        self.list_stream(bucket, query).try_collect().await
    }

    /// Get object metadata, including its checksum, without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// Open an object for streaming reads.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn reader(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead>;
}
