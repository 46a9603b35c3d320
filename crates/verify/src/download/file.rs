use crate::download::path::destination;
use crate::error::{Error, ErrorKind, Result, StorageResultExt};
use crate::integrity;
use exn::ResultExt;
use spotcheck_storage::ObjectStore;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// The outcome of (successfully) downloading a single object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    /// The object was fetched and verified.
    Downloaded { path: PathBuf, bytes: u64 },
    /// A verified copy was already on disk; nothing was transferred.
    AlreadyExists(PathBuf),
}

/// Result of one try at getting an object onto disk.
enum Attempt {
    Done(Action),
    /// Possibly transient; worth another go.
    Retry(Error),
    /// Trying again would give the same answer.
    Fatal(Error),
}
impl Attempt {
    fn failed(err: Error) -> Self {
        if err.is_retryable() { Self::Retry(err) } else { Self::Fatal(err) }
    }
}

/// What [`ObjectDownload::step`] achieved.
#[derive(Debug)]
pub(crate) enum Step {
    Done(Action),
    /// The attempt failed; this is the number of the attempt to make next.
    Retrying(u32),
}

/// Tracks failed attempts for one object against the configured limit.
struct RetryBudget<'a> {
    bucket: &'a str,
    key: &'a str,
    max_retries: u32,
    failures: u32,
}
impl<'a> RetryBudget<'a> {
    fn new(bucket: &'a str, key: &'a str, max_retries: u32) -> Self {
        Self {
            bucket,
            key,
            max_retries,
            failures: 0,
        }
    }

    /// Record a failed attempt. Returns the attempt number to try next, or
    /// the error (with the object named) once the limit is exceeded.
    fn spend(&mut self, err: Error) -> Result<u32> {
        self.failures += 1;
        if self.failures > self.max_retries {
            return Err(err).or_raise(|| ErrorKind::RetriesExhausted {
                bucket: self.bucket.to_string(),
                key: self.key.to_string(),
                attempts: self.failures,
            });
        }
        tracing::warn!(bucket = self.bucket, key = self.key, failures = self.failures, error = %err, "Download attempt failed, retrying");
        Ok(self.failures + 1)
    }
}

/// Download of `key` from `bucket` into `root`, one attempt at a time.
///
/// A verified local copy is left alone. Errors that can't be fixed by trying
/// again (missing objects, refused requests, keys that can't be stored
/// locally) fail immediately; anything else is retried until `max_retries`
/// retries have failed.
pub(crate) struct ObjectDownload<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    key: &'a str,
    path: PathBuf,
    budget: RetryBudget<'a>,
}
impl<'a> ObjectDownload<'a> {
    pub(crate) fn new(
        store: &'a dyn ObjectStore,
        root: &Path,
        bucket: &'a str,
        key: &'a str,
        max_retries: u32,
    ) -> Result<Self> {
        Ok(Self {
            store,
            bucket,
            key,
            path: destination(root, bucket, key)?,
            budget: RetryBudget::new(bucket, key, max_retries),
        })
    }

    /// Make one attempt.
    pub(crate) async fn step(&mut self) -> Result<Step> {
        match attempt(self.store, self.bucket, self.key, &self.path).await {
            Attempt::Done(action) => Ok(Step::Done(action)),
            Attempt::Fatal(e) => Err(e),
            Attempt::Retry(e) => self.budget.spend(e).map(Step::Retrying),
        }
    }
}

async fn attempt(store: &dyn ObjectStore, bucket: &str, key: &str, path: &Path) -> Attempt {
    let remote = match store.stat(bucket, key).await.or_storage(|| format!("`{key}` in bucket `{bucket}`")) {
        Ok(remote) => remote,
        Err(e) => return Attempt::failed(e),
    };
    if remote.crc32c.is_none() {
        return Attempt::Fatal(exn::Exn::from(ErrorKind::NotValid(format!(
            "`{key}` in bucket `{bucket}` has no CRC32C checksum; \
             re-upload it with a CRC32C checksum so downloads can be verified"
        ))));
    }

    if integrity::verify(Some(&remote), path).await.is_ok() {
        tracing::debug!(bucket, key, "Verified copy already on disk");
        return Attempt::Done(Action::AlreadyExists(path.to_path_buf()));
    }

    if let Err(e) = fetch(store, bucket, key, path).await {
        return Attempt::failed(e);
    }
    // A mismatch straight after a transfer is treated as transfer corruption.
    match integrity::verify(Some(&remote), path).await {
        Ok(()) => Attempt::Done(Action::Downloaded {
            path: path.to_path_buf(),
            bytes: remote.size,
        }),
        Err(e) => Attempt::Retry(e),
    }
}

async fn fetch(store: &dyn ObjectStore, bucket: &str, key: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .or_raise(|| ErrorKind::Io(format!("could not create {}", parent.display())))?;
    }
    let mut reader = store.reader(bucket, key).await.or_storage(|| format!("reading `{key}` from bucket `{bucket}`"))?;
    let mut file = tokio::fs::File::create(path)
        .await
        .or_raise(|| ErrorKind::Io(format!("could not create {}", path.display())))?;
    let written = tokio::io::copy(&mut reader, &mut file)
        .await
        .or_raise(|| ErrorKind::Io(format!("could not download `{key}` to {}", path.display())))?;
    file.flush().await.or_raise(|| ErrorKind::Io(format!("could not write {}", path.display())))?;
    tracing::debug!(bucket, key, written, "Fetched object");
    Ok(())
}
