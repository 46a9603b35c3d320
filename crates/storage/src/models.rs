//! Object store models.
//!
//! These types describe what a listing or metadata lookup returns. They are
//! snapshots: the remote store is never locked, so a descriptor is only
//! meaningful for the listing pass that produced it.

use time::UtcDateTime;

/// Object metadata returned by object stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full object key within the bucket
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Creation timestamp (last-modified on stores without a separate
    /// creation time)
    pub created: UtcDateTime,
    /// CRC32C (Castagnoli) checksum of the object contents, when the store
    /// reports one for this request
    pub crc32c: Option<u32>,
}
impl ObjectInfo {
    /// Create a new ObjectInfo from a listing operation (no checksum yet).
    pub fn new(key: impl Into<String>, size: u64, created: UtcDateTime) -> Self {
        Self {
            key: key.into(),
            size,
            created,
            crc32c: None,
        }
    }

    pub fn with_crc32c(mut self, crc32c: u32) -> Self {
        self.crc32c = Some(crc32c);
        self
    }
}

/// A single listing result.
///
/// Plain listings only ever yield [`Object`](Self::Object). Listings with a
/// delimiter also yield [`Prefix`](Self::Prefix) for every distinct "directory"
/// one level below the query prefix, with the delimiter included (`"show/"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Object(ObjectInfo),
    Prefix(String),
}
impl Entry {
    pub fn into_object(self) -> Option<ObjectInfo> {
        match self {
            Self::Object(object) => Some(object),
            Self::Prefix(_) => None,
        }
    }

    pub fn into_prefix(self) -> Option<String> {
        match self {
            Self::Object(_) => None,
            Self::Prefix(prefix) => Some(prefix),
        }
    }
}

/// Filter applied to a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}
impl ListQuery {
    /// Only objects whose key starts with `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            delimiter: None,
        }
    }

    /// Group keys on `delimiter`, returning one [`Entry::Prefix`] per group.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

/// One page of listing results plus the token to request the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<Entry>,
    /// `None` when this is the last page.
    pub next_token: Option<String>,
}
