use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a bucket is validated and sampled.
///
/// This is a closed set: an unknown `type` in the configuration file is a
/// parse error, and every consumer matches on it exhaustively.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketKind {
    /// Top-level "directories" are shows; episodes are sampled per show.
    #[display("media")]
    Media,
    /// Keys are prefixed `YYYY-MM/`; photos are sampled per year and for the
    /// current month.
    #[display("photo")]
    Photo,
    /// Flat bucket of periodic backups; freshness is checked and the most
    /// recent backups are sampled.
    #[display("server-backup")]
    ServerBackup,
}

/// A bucket to process, and how to treat it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BucketKind,
}
impl BucketSpec {
    pub fn new(name: impl Into<String>, kind: BucketKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// Maximum age, in whole days, of the oldest and newest objects in a
/// [`ServerBackup`](BucketKind::ServerBackup) bucket. An object exactly this
/// old is already too old.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRule {
    pub oldest_max_age_days: u32,
    pub newest_max_age_days: u32,
}

/// How many objects each sampling strategy selects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleRule {
    /// Most recent objects taken from each server-backup bucket.
    pub server_backups: u32,
    /// Random episodes taken from each show in a media bucket.
    pub episodes_per_show: u32,
    /// Random photos taken from the current month.
    pub photos_per_month: u32,
    /// Random photos taken from each year.
    pub photos_per_year: u32,
}

/// Connection details for the S3-compatible object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub key_id: String,
    pub key_secret: String,
}

/// The complete configuration for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Local directory that sampled objects are downloaded into, one
    /// subdirectory per bucket.
    pub download_root: PathBuf,
    /// Retries allowed per object after the first failed attempt.
    #[serde(default = "default_max_download_retries")]
    pub max_download_retries: u32,
    /// Where the in-progress download list is kept between runs.
    #[serde(default)]
    pub resume_file: Option<PathBuf>,
    #[serde(default)]
    pub freshness: FreshnessRule,
    #[serde(default)]
    pub sampling: SampleRule,
    pub buckets: Vec<BucketSpec>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
}

pub(crate) const DEFAULT_MAX_DOWNLOAD_RETRIES: u32 = 3;

fn default_max_download_retries() -> u32 {
    DEFAULT_MAX_DOWNLOAD_RETRIES
}
