//! Choosing which objects to spot-check.
//!
//! Each bucket type has its own strategy, built from two primitives:
//! [`sample_indices`] (random sampling without replacement) and
//! [`MostRecent`] (bounded top-K by creation time).
//!
//! - **media**: every top-level "directory" is a show; a fixed number of
//!   random episodes is drawn from each.
//! - **photo**: keys start with `YYYY-MM`; a fixed number of random photos is
//!   drawn from every year since 2010, plus some from the current month.
//! - **server-backup**: the most recent backups.
//!
//! Any shortfall fails the whole bucket with [`ErrorKind::NotFound`]; a
//! requested count of zero selects nothing.

mod random;
mod recent;

pub use self::random::sample_indices;
pub use self::recent::MostRecent;
use self::random::random_keys;
use crate::classify::classify;
use crate::consts::PHOTO_EPOCH_YEAR;
use crate::error::{ErrorKind, Result, StorageResultExt};
use futures::TryStreamExt;
use spotcheck_config::{BucketKind, BucketSpec, SampleRule};
use spotcheck_storage::{Entry, ListQuery, ObjectStore};
use time::UtcDateTime;
use tracing::instrument;

/// Choose the keys to download from `bucket`, according to its type.
#[instrument(skip(store, specs, rule, now))]
pub async fn sample_bucket(
    store: &dyn ObjectStore,
    bucket: &str,
    specs: &[BucketSpec],
    rule: &SampleRule,
    now: UtcDateTime,
) -> Result<Vec<String>> {
    let keys = match classify(bucket, specs)? {
        BucketKind::Media => sample_media(store, bucket, rule.episodes_per_show as usize).await?,
        BucketKind::Photo => {
            sample_photos(store, bucket, rule.photos_per_year as usize, rule.photos_per_month as usize, now).await?
        },
        BucketKind::ServerBackup => sample_server_backups(store, bucket, rule.server_backups as usize).await?,
    };
    tracing::debug!(count = keys.len(), "Sampled bucket");
    Ok(keys)
}

/// Random episodes from every show (top-level prefix) in the bucket.
pub async fn sample_media(store: &dyn ObjectStore, bucket: &str, per_show: usize) -> Result<Vec<String>> {
    let shows: Vec<String> = store
        .list(bucket, ListQuery::default().with_delimiter("/"))
        .await
        .or_storage(|| format!("listing shows in bucket `{bucket}`"))?
        .into_iter()
        .filter_map(Entry::into_prefix)
        .collect();
    tracing::debug!(bucket, shows = shows.len(), "Found shows");
    let mut keys = Vec::with_capacity(shows.len() * per_show);
    for show in &shows {
        keys.extend(random_keys(store, bucket, show, per_show).await?);
    }
    Ok(keys)
}

/// Random photos from every year since 2010 up to `now`, plus random photos
/// from the current month.
pub async fn sample_photos(
    store: &dyn ObjectStore,
    bucket: &str,
    per_year: usize,
    per_month: usize,
    now: UtcDateTime,
) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for year in PHOTO_EPOCH_YEAR..=now.year() {
        keys.extend(random_keys(store, bucket, &format!("{year}-"), per_year).await?);
    }
    let this_month = format!("{}-{:02}", now.year(), u8::from(now.month()));
    keys.extend(random_keys(store, bucket, &this_month, per_month).await?);
    Ok(keys)
}

/// The `count` most recently created objects in the bucket.
pub async fn sample_server_backups(store: &dyn ObjectStore, bucket: &str, count: usize) -> Result<Vec<String>> {
    let mut top = MostRecent::new(count);
    let mut entries = store.list_stream(bucket, ListQuery::default());
    while let Some(entry) = entries.try_next().await.or_storage(|| format!("listing bucket `{bucket}`"))? {
        if let Entry::Object(object) = entry {
            top.push(object);
        }
    }
    match top.into_full() {
        Some(objects) => Ok(objects.into_iter().map(|object| object.key).collect()),
        None => exn::bail!(ErrorKind::NotFound(format!(
            "not enough files to sample in bucket `{bucket}`: wanted {count}"
        ))),
    }
}
