use crate::download::file::{Action, ObjectDownload, Step};
use crate::error::Result;
use crate::resume::BucketAndFiles;
use async_stream::stream;
use futures::Stream;
use spotcheck_storage::ObjectStore;
use std::path::{Path, PathBuf};

/// Progress events emitted by [`download`] as it works through a plan.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. For each bucket, in plan order: [`BucketStarted`](Self::BucketStarted),
///    then one [`Downloaded`](Self::Downloaded) or [`Skipped`](Self::Skipped)
///    per key (each possibly preceded by [`Retrying`](Self::Retrying)), then
///    [`BucketComplete`](Self::BucketComplete).
/// 3. [`Complete`](Self::Complete) exactly once.
///
/// The first unresolved failure is yielded as an `Err` and ends the stream,
/// in which case [`Complete`](Self::Complete) is never emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadEvent {
    Started { buckets: usize },
    BucketStarted { bucket: String, index: usize, files: usize },
    /// An attempt failed in a way that may be transient; `attempt` is the
    /// number of the attempt about to start.
    Retrying { bucket: String, key: String, attempt: u32 },
    Downloaded { bucket: String, key: String, path: PathBuf, bytes: u64 },
    /// A verified copy was already on disk.
    Skipped { bucket: String, key: String, path: PathBuf },
    BucketComplete { bucket: String },
    Complete,
}
impl DownloadEvent {
    fn from_action(bucket: &str, key: &str, action: Action) -> Self {
        match action {
            Action::Downloaded { path, bytes } => Self::Downloaded {
                bucket: bucket.to_string(),
                key: key.to_string(),
                path,
                bytes,
            },
            Action::AlreadyExists(path) => Self::Skipped {
                bucket: bucket.to_string(),
                key: key.to_string(),
                path,
            },
        }
    }
}

/// Streams [`DownloadEvent`]s while downloading every key in `plan` into
/// `root`, one object at a time, in plan order.
///
/// Each object is retried up to `max_retries` times, but only for failures
/// that may be transient (network and local I/O errors, corrupted transfers).
pub fn download<'a>(
    store: &'a dyn ObjectStore,
    root: &'a Path,
    plan: &'a [BucketAndFiles],
    max_retries: u32,
) -> impl Stream<Item = Result<DownloadEvent>> + 'a {
    stream!({
        yield Ok(DownloadEvent::Started { buckets: plan.len() });

        for (index, entry) in plan.iter().enumerate() {
            let bucket = entry.bucket_name.as_str();
            yield Ok(DownloadEvent::BucketStarted {
                bucket: bucket.to_string(),
                index,
                files: entry.files.len(),
            });

            for key in &entry.files {
                let mut object = match ObjectDownload::new(store, root, bucket, key, max_retries) {
                    Ok(object) => object,
                    Err(e) => {
                        yield Err(e);
                        return;
                    },
                };
                let action = loop {
                    match object.step().await {
                        Ok(Step::Done(action)) => break action,
                        Ok(Step::Retrying(next)) => {
                            yield Ok(DownloadEvent::Retrying {
                                bucket: bucket.to_string(),
                                key: key.clone(),
                                attempt: next,
                            });
                        },
                        Err(e) => {
                            yield Err(e);
                            return;
                        },
                    }
                };
                yield Ok(DownloadEvent::from_action(bucket, key, action));
            }

            yield Ok(DownloadEvent::BucketComplete { bucket: bucket.to_string() });
        }

        yield Ok(DownloadEvent::Complete);
    })
}
