//! Freshness checks for server-backup buckets.
//!
//! A backup bucket is fresh when its newest object is recent enough (backups
//! are still being written) and its oldest object is recent enough (old
//! backups are being archived away). Other bucket types have nothing to
//! check and always pass.

use crate::classify::classify;
use crate::error::{ErrorKind, Result};
use crate::scan;
use exn::ResultExt;
use spotcheck_config::{BucketKind, BucketSpec, FreshnessRule};
use spotcheck_storage::{ObjectInfo, ObjectStore};
use time::UtcDateTime;
use tracing::instrument;

/// Whole days elapsed between `created` and `now`, rounded down.
pub fn age_in_days(created: UtcDateTime, now: UtcDateTime) -> i64 {
    (now - created).whole_days()
}

/// Check a single bucket against `rule`, as of `now`.
///
/// # Errors
/// - [`ErrorKind::NotFound`] if the bucket has no configured type.
/// - [`ErrorKind::Validation`] if the bucket could not be listed.
/// - [`ErrorKind::NotValid`] if the bucket is empty, or its oldest or newest
///   object is at least as old as the corresponding threshold.
#[instrument(skip(store, specs, rule, now))]
pub async fn validate_bucket(
    store: &dyn ObjectStore,
    bucket: &str,
    specs: &[BucketSpec],
    rule: &FreshnessRule,
    now: UtcDateTime,
) -> Result<()> {
    match classify(bucket, specs)? {
        BucketKind::Media | BucketKind::Photo => Ok(()),
        BucketKind::ServerBackup => validate_server_backup(store, bucket, rule, now).await,
    }
}

async fn validate_server_backup(
    store: &dyn ObjectStore,
    bucket: &str,
    rule: &FreshnessRule,
    now: UtcDateTime,
) -> Result<()> {
    let oldest = scan::oldest(store, bucket)
        .await
        .or_raise(|| ErrorKind::Validation(format!("cannot determine oldest object in bucket `{bucket}`")))?;
    let Some(oldest) = oldest else {
        exn::bail!(ErrorKind::NotValid(format!("cannot verify freshness of empty backup bucket `{bucket}`")));
    };
    let age = age_in_days(oldest.created, now);
    tracing::debug!(bucket, key = %oldest.key, age, "Oldest backup");
    if age >= i64::from(rule.oldest_max_age_days) {
        exn::bail!(too_old("oldest", bucket, &oldest, age, rule.oldest_max_age_days, "check backup file archiving"));
    }

    let newest = scan::newest(store, bucket)
        .await
        .or_raise(|| ErrorKind::Validation(format!("cannot determine newest object in bucket `{bucket}`")))?;
    let Some(newest) = newest else {
        // Emptied between the two listings.
        exn::bail!(ErrorKind::NotValid(format!("cannot verify freshness of empty backup bucket `{bucket}`")));
    };
    let age = age_in_days(newest.created, now);
    tracing::debug!(bucket, key = %newest.key, age, "Newest backup");
    if age >= i64::from(rule.newest_max_age_days) {
        exn::bail!(too_old("newest", bucket, &newest, age, rule.newest_max_age_days, "make sure backups are running"));
    }
    Ok(())
}

fn too_old(which: &str, bucket: &str, object: &ObjectInfo, age: i64, max_age: u32, advice: &str) -> ErrorKind {
    ErrorKind::NotValid(format!(
        "{which} file `{}` in bucket `{bucket}` is {age} days old (limit {max_age}); too long in the past, {advice}",
        object.key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use spotcheck_storage::backend::MockBackend;
    use time::Duration;

    const RULE: FreshnessRule = FreshnessRule {
        oldest_max_age_days: 30,
        newest_max_age_days: 2,
    };

    fn now() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_750_000_000).unwrap()
    }

    fn days_ago(days: i64) -> UtcDateTime {
        now() - Duration::days(days)
    }

    fn specs() -> Vec<BucketSpec> {
        vec![
            BucketSpec::new("nightly", BucketKind::ServerBackup),
            BucketSpec::new("tv", BucketKind::Media),
            BucketSpec::new("pictures", BucketKind::Photo),
        ]
    }

    fn backups(oldest: i64, newest: i64) -> MockBackend {
        MockBackend::default()
            .with_object("nightly", "db-old.sql.gz", b"old", days_ago(oldest))
            .with_object("nightly", "db-mid.sql.gz", b"mid", days_ago((oldest + newest) / 2))
            .with_object("nightly", "db-new.sql.gz", b"new", days_ago(newest))
    }

    #[rstest]
    #[case(0, 0)]
    #[case(0, 23)]
    #[case(1, 0)]
    #[case(29, 12)]
    fn test_age_rounds_down(#[case] days: i64, #[case] extra_hours: i64) {
        let created = days_ago(days) - Duration::hours(extra_hours);
        assert_eq!(age_in_days(created, now()), days);
    }

    #[test]
    fn test_future_objects_have_no_age() {
        assert!(age_in_days(now() + Duration::hours(5), now()) <= 0);
    }

    #[tokio::test]
    async fn test_fresh_bucket_passes() {
        let store = backups(29, 1);
        validate_bucket(&store, "nightly", &specs(), &RULE, now()).await.unwrap();
    }

    #[rstest]
    #[case::oldest_at_limit(30, 1, "check backup file archiving")]
    #[case::oldest_past_limit(45, 1, "check backup file archiving")]
    #[case::newest_at_limit(29, 2, "make sure backups are running")]
    #[case::newest_past_limit(29, 5, "make sure backups are running")]
    #[tokio::test]
    async fn test_stale_bucket_fails(#[case] oldest: i64, #[case] newest: i64, #[case] advice: &str) {
        let store = backups(oldest, newest);
        let err = validate_bucket(&store, "nightly", &specs(), &RULE, now()).await.unwrap_err();
        match &*err {
            ErrorKind::NotValid(message) => assert!(message.contains(advice), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_other_kinds_always_pass() {
        // Neither bucket exists; they must not even be listed.
        let store = MockBackend::default();
        validate_bucket(&store, "tv", &specs(), &RULE, now()).await.unwrap();
        validate_bucket(&store, "pictures", &specs(), &RULE, now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_bucket_is_not_found() {
        let store = backups(1, 1);
        let err = validate_bucket(&store, "weekly", &specs(), &RULE, now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_backup_bucket_is_not_valid() {
        let store = MockBackend::default().with_bucket("nightly");
        let err = validate_bucket(&store, "nightly", &specs(), &RULE, now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotValid(m) if m.contains("empty")));
    }

    #[tokio::test]
    async fn test_listing_failure_is_a_validation_error() {
        let store = MockBackend::default();
        let err = validate_bucket(&store, "nightly", &specs(), &RULE, now()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(m) if m.contains("oldest")));
    }
}
