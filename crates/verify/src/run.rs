//! The whole check, end to end: validate every bucket, decide what to
//! download (sampling fresh, or resuming a saved plan), then download it.

use crate::download::{DownloadEvent, download};
use crate::error::Result;
use crate::freshness::validate_bucket;
use crate::resume::{BucketAndFiles, ResumeStore};
use crate::sample::sample_bucket;
use futures::TryStreamExt;
use spotcheck_config::Config;
use spotcheck_storage::ObjectStore;
use time::UtcDateTime;

/// Totals for a completed download run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub buckets: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub retries: usize,
    pub bytes: u64,
}

/// Check every configured bucket for freshness, stopping at the first
/// failure.
pub async fn validate_buckets(store: &dyn ObjectStore, config: &Config, now: UtcDateTime) -> Result<()> {
    let total = config.buckets.len();
    tracing::info!(store = store.name(), buckets = total, "Validating buckets");
    for (index, spec) in config.buckets.iter().enumerate() {
        tracing::info!(bucket = %spec.name, kind = %spec.kind, "Validating bucket {} of {total}", index + 1);
        validate_bucket(store, &spec.name, &config.buckets, &config.freshness, now).await?;
    }
    tracing::info!("All buckets validated");
    Ok(())
}

/// Sample every configured bucket, in configuration order.
pub async fn sample_buckets(store: &dyn ObjectStore, config: &Config, now: UtcDateTime) -> Result<Vec<BucketAndFiles>> {
    let total = config.buckets.len();
    let mut plan = Vec::with_capacity(total);
    for (index, spec) in config.buckets.iter().enumerate() {
        tracing::info!(bucket = %spec.name, kind = %spec.kind, "Sampling bucket {} of {total}", index + 1);
        let files = sample_bucket(store, &spec.name, &config.buckets, &config.sampling, now).await?;
        plan.push(BucketAndFiles::new(&spec.name, files));
    }
    Ok(plan)
}

/// The saved plan if there is one; otherwise a freshly sampled plan, saved
/// before it is returned.
pub async fn plan(
    store: &dyn ObjectStore,
    config: &Config,
    resume: &dyn ResumeStore,
    now: UtcDateTime,
) -> Result<Vec<BucketAndFiles>> {
    if resume.exists().await? {
        let plan = resume.load().await?;
        tracing::info!(buckets = plan.len(), "Resuming saved download plan");
        return Ok(plan);
    }
    let plan = sample_buckets(store, config, now).await?;
    resume.save(&plan).await?;
    Ok(plan)
}

/// Download every file in `plan`, logging progress as it goes.
pub async fn download_plan(
    store: &dyn ObjectStore,
    config: &Config,
    plan: &[BucketAndFiles],
) -> Result<Summary> {
    let mut summary = Summary::default();
    tracing::info!(store = store.name(), root = %config.download_root.display(), "Downloading plan");
    let mut events = Box::pin(download(store, &config.download_root, plan, config.max_download_retries));
    while let Some(event) = events.try_next().await? {
        match event {
            DownloadEvent::Started { buckets } => summary.buckets = buckets,
            DownloadEvent::BucketStarted { bucket, index, files } => {
                tracing::info!(bucket = %bucket, files, "Downloading bucket {} of {}", index + 1, summary.buckets);
            },
            DownloadEvent::Retrying { bucket, key, attempt } => {
                tracing::debug!(bucket = %bucket, key = %key, attempt, "Retrying download");
                summary.retries += 1;
            },
            DownloadEvent::Downloaded { key, path, bytes, .. } => {
                tracing::info!(key = %key, path = %path.display(), bytes, "Downloaded");
                summary.downloaded += 1;
                summary.bytes += bytes;
            },
            DownloadEvent::Skipped { key, path, .. } => {
                tracing::info!(key = %key, path = %path.display(), "Already downloaded");
                summary.skipped += 1;
            },
            DownloadEvent::BucketComplete { bucket } => tracing::debug!(bucket = %bucket, "Bucket complete"),
            DownloadEvent::Complete => (),
        }
    }
    Ok(summary)
}

/// Validate, plan, download; then forget the plan.
///
/// The saved plan is only deleted once every file in it has been downloaded
/// and verified, so a failed run can be resumed.
pub async fn run(
    store: &dyn ObjectStore,
    config: &Config,
    resume: &dyn ResumeStore,
    now: UtcDateTime,
) -> Result<Summary> {
    validate_buckets(store, config, now).await?;
    let plan = plan(store, config, resume, now).await?;
    let summary = download_plan(store, config, &plan).await?;
    resume.delete().await?;
    tracing::info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        bytes = summary.bytes,
        "Download complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resume::MemoryStore;
    use spotcheck_config::{BucketKind, BucketSpec, FreshnessRule, SampleRule};
    use spotcheck_storage::backend::MockBackend;
    use std::collections::HashSet;
    use std::path::Path;
    use time::Duration;

    fn now() -> UtcDateTime {
        // 2012-03-15
        UtcDateTime::from_unix_timestamp(1_331_769_600).unwrap()
    }

    fn config(root: &Path, buckets: Vec<BucketSpec>, sampling: SampleRule) -> Config {
        Config {
            download_root: root.to_path_buf(),
            max_download_retries: 2,
            resume_file: None,
            freshness: FreshnessRule {
                oldest_max_age_days: 10,
                newest_max_age_days: 2,
            },
            sampling,
            buckets,
            store: None,
        }
    }

    fn backups_only(root: &Path, server_backups: u32) -> Config {
        config(
            root,
            vec![BucketSpec::new("b1", BucketKind::ServerBackup)],
            SampleRule {
                server_backups,
                ..SampleRule::default()
            },
        )
    }

    fn backups(ages: &[i64]) -> MockBackend {
        ages.iter().enumerate().fold(MockBackend::default().with_bucket("b1"), |store, (i, age)| {
            store.with_object("b1", format!("backup-{i}.tar.gz"), format!("backup {i}").into_bytes(), now() - Duration::days(*age))
        })
    }

    #[tokio::test]
    async fn test_scenario_fresh_backup_validates() {
        let root = tempfile::tempdir().unwrap();
        validate_buckets(&backups(&[1]), &backups_only(root.path(), 1), now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_scenario_stale_backup_fails() {
        let root = tempfile::tempdir().unwrap();
        let err = validate_buckets(&backups(&[11]), &backups_only(root.path(), 1), now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotValid(m) if m.contains("check backup file archiving")));
    }

    #[tokio::test]
    async fn test_scenario_media_sampling() {
        let root = tempfile::tempdir().unwrap();
        let mut store = MockBackend::default();
        for show in ["s1", "s2"] {
            for episode in 0..5 {
                store = store.with_object("tv", format!("{show}/e{episode}.mkv"), b"video".as_slice(), now());
            }
        }
        let config = config(
            root.path(),
            vec![BucketSpec::new("tv", BucketKind::Media)],
            SampleRule {
                episodes_per_show: 3,
                ..SampleRule::default()
            },
        );
        let plan = sample_buckets(&store, &config, now()).await.unwrap();
        assert_eq!(plan.len(), 1);
        let files = &plan[0].files;
        assert_eq!(files.len(), 6);
        for show in ["s1/", "s2/"] {
            let picked: HashSet<_> = files.iter().filter(|f| f.starts_with(show)).collect();
            assert_eq!(picked.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_scenario_server_backup_sampling() {
        let root = tempfile::tempdir().unwrap();
        let store = backups(&[0, 1, 2, 3]);
        let plan = sample_buckets(&store, &backups_only(root.path(), 4), now()).await.unwrap();
        assert_eq!(plan[0].files.iter().collect::<HashSet<_>>().len(), 4);

        let err = sample_buckets(&store, &backups_only(root.path(), 5), now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scenario_verified_file_is_not_downloaded() {
        let root = tempfile::tempdir().unwrap();
        let store = backups(&[0]);
        let local = root.path().join("b1/backup-0.tar.gz");
        tokio::fs::create_dir_all(local.parent().unwrap()).await.unwrap();
        tokio::fs::write(&local, b"backup 0").await.unwrap();
        // Any read would fail, and no retries are allowed.
        store.fail_next_reads(1);
        let mut config = backups_only(root.path(), 1);
        config.max_download_retries = 0;
        let summary = download_plan(&store, &config, &[BucketAndFiles::new("b1", vec!["backup-0.tar.gz".to_string()])])
            .await
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(store.bytes_transferred(), 0);
    }

    #[tokio::test]
    async fn test_full_run_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = backups(&[0, 1, 5]);
        let config = backups_only(root.path(), 2);
        let resume = MemoryStore::default();

        let first = run(&store, &config, &resume, now()).await.unwrap();
        assert_eq!(first.downloaded, 2);
        assert!(!resume.exists().await.unwrap());
        assert!(root.path().join("b1/backup-0.tar.gz").is_file());
        assert!(root.path().join("b1/backup-1.tar.gz").is_file());

        let transferred = store.bytes_transferred();
        let second = run(&store, &config, &resume, now()).await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.downloaded, 0);
        assert_eq!(store.bytes_transferred(), transferred);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_plan_and_resumes() {
        let root = tempfile::tempdir().unwrap();
        let store = backups(&[0, 1]);
        let config = backups_only(root.path(), 2);
        let resume = MemoryStore::default();

        store.fail_next_reads(10);
        let err = run(&store, &config, &resume, now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RetriesExhausted { .. }));
        let saved = resume.load().await.unwrap();

        // The saved plan is used as-is, even though sampling would now fail.
        let mut smaller = config.clone();
        smaller.sampling.server_backups = 99;
        store.fail_next_reads(0);
        run(&store, &smaller, &resume, now()).await.unwrap();
        assert!(!resume.exists().await.unwrap());
        for key in &saved[0].files {
            assert!(root.path().join("b1").join(key).is_file());
        }
    }

    #[tokio::test]
    async fn test_failed_validation_downloads_nothing() {
        let root = tempfile::tempdir().unwrap();
        let store = backups(&[0, 30]);
        let resume = MemoryStore::default();
        let err = run(&store, &backups_only(root.path(), 1), &resume, now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotValid(_)));
        assert!(!resume.exists().await.unwrap());
        assert_eq!(store.bytes_transferred(), 0);
    }

    #[tokio::test]
    async fn test_photos_land_in_year_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut store = MockBackend::default();
        for year in 2010..=2012 {
            store = store.with_object("pictures", format!("{year}-03/IMG_1.jpg"), b"jpeg".as_slice(), now());
        }
        let config = config(
            root.path(),
            vec![BucketSpec::new("pictures", BucketKind::Photo)],
            SampleRule {
                photos_per_year: 1,
                photos_per_month: 1,
                ..SampleRule::default()
            },
        );
        let summary = run(&store, &config, &MemoryStore::default(), now()).await.unwrap();
        // 2012-03/IMG_1.jpg is sampled twice (year and month); the second is a skip.
        assert_eq!(summary.downloaded, 3);
        assert_eq!(summary.skipped, 1);
        for year in 2010..=2012 {
            assert!(root.path().join(format!("pictures/{year}/IMG_1.jpg")).is_file());
        }
    }
}
