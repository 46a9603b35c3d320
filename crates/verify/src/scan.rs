//! Whole-bucket scans for the oldest and newest object.

use crate::error::{Result, StorageResultExt};
use futures::TryStreamExt;
use spotcheck_storage::{Entry, ListQuery, ObjectInfo, ObjectStore};

/// The object with the earliest creation time, or `None` for an empty bucket.
///
/// Ties keep whichever object was listed first.
pub async fn oldest(store: &dyn ObjectStore, bucket: &str) -> Result<Option<ObjectInfo>> {
    extremum(store, bucket, |candidate, current| candidate.created < current.created).await
}

/// The object with the latest creation time, or `None` for an empty bucket.
///
/// Ties keep whichever object was listed first.
pub async fn newest(store: &dyn ObjectStore, bucket: &str) -> Result<Option<ObjectInfo>> {
    extremum(store, bucket, |candidate, current| candidate.created > current.created).await
}

async fn extremum(
    store: &dyn ObjectStore,
    bucket: &str,
    replaces: fn(&ObjectInfo, &ObjectInfo) -> bool,
) -> Result<Option<ObjectInfo>> {
    let mut entries = store.list_stream(bucket, ListQuery::default());
    let mut best: Option<ObjectInfo> = None;
    while let Some(entry) = entries.try_next().await.or_storage(|| format!("listing bucket `{bucket}`"))? {
        let Entry::Object(object) = entry else {
            continue;
        };
        if best.as_ref().is_none_or(|current| replaces(&object, current)) {
            best = Some(object);
        }
    }
    Ok(best)
}
