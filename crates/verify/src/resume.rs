//! Persisted download plans, so an interrupted run can pick up where it left
//! off instead of sampling again.
//!
//! The plan is written once, right after sampling, and deleted only when
//! every bucket in it has been downloaded and verified. In between it is
//! never rewritten: a resumed run re-checks every file, and files that are
//! already complete are skipped cheaply.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// The keys selected from one bucket, in download order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAndFiles {
    pub bucket_name: String,
    pub files: Vec<String>,
}
impl BucketAndFiles {
    pub fn new(bucket_name: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            files,
        }
    }
}

/// Where the download plan lives between runs.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Whether a plan is waiting to be resumed.
    async fn exists(&self) -> Result<bool>;
    /// Read the plan back.
    ///
    /// Fails with [`ErrorKind::NotFound`] if there is none, or
    /// [`ErrorKind::Resume`] if it can't be read or parsed.
    async fn load(&self) -> Result<Vec<BucketAndFiles>>;
    /// Store the plan, replacing any previous one.
    async fn save(&self, plan: &[BucketAndFiles]) -> Result<()>;
    /// Forget the plan. Succeeds if there was nothing to forget.
    async fn delete(&self) -> Result<()>;
}

fn encode(plan: &[BucketAndFiles]) -> Result<String> {
    serde_json::to_string_pretty(plan).or_raise(|| ErrorKind::Resume("could not encode download plan".to_string()))
}

fn decode(contents: &str, origin: &str) -> Result<Vec<BucketAndFiles>> {
    serde_json::from_str(contents).or_raise(|| ErrorKind::Resume(format!("malformed download plan in {origin}")))
}

/// A JSON file on local disk: an array of `{"bucket_name", "files"}` objects.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}
impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResumeStore for JsonFileStore {
    async fn exists(&self) -> Result<bool> {
        tokio::fs::try_exists(&self.path)
            .await
            .or_raise(|| ErrorKind::Resume(format!("could not check for {}", self.path.display())))
    }

    async fn load(&self) -> Result<Vec<BucketAndFiles>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(format!("no download plan at {}", self.path.display())))
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Resume(format!("could not read {}", self.path.display()))),
        };
        decode(&contents, &self.path.display().to_string())
    }

    async fn save(&self, plan: &[BucketAndFiles]) -> Result<()> {
        let contents = encode(plan)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .or_raise(|| ErrorKind::Resume(format!("could not create {}", parent.display())))?;
        }
        tokio::fs::write(&self.path, contents)
            .await
            .or_raise(|| ErrorKind::Resume(format!("could not write {}", self.path.display())))
    }

    async fn delete(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).or_raise(|| ErrorKind::Resume(format!("could not delete {}", self.path.display()))),
        }
    }
}

/// Keeps the encoded plan in memory. For tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: Mutex<Option<String>>,
}

#[async_trait]
impl ResumeStore for MemoryStore {
    async fn exists(&self) -> Result<bool> {
        Ok(self.contents.lock().await.is_some())
    }

    async fn load(&self) -> Result<Vec<BucketAndFiles>> {
        match self.contents.lock().await.as_deref() {
            Some(contents) => decode(contents, "memory"),
            None => exn::bail!(ErrorKind::NotFound("no download plan in memory".to_string())),
        }
    }

    async fn save(&self, plan: &[BucketAndFiles]) -> Result<()> {
        let contents = encode(plan)?;
        *self.contents.lock().await = Some(contents);
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        *self.contents.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<BucketAndFiles> {
        vec![
            BucketAndFiles::new("tv", vec!["Ünïcødé Show/épisode 1.mkv".to_string(), "日本/第1話.mp4".to_string()]),
            BucketAndFiles::new("фото", vec!["2021-07/пляж.jpg".to_string()]),
            BucketAndFiles::new("empty", vec![]),
            BucketAndFiles::new("nightly", vec!["db-2024-06-01.sql.gz".to_string()]),
        ]
    }

    async fn round_trip(store: &dyn ResumeStore) {
        assert!(!store.exists().await.unwrap());
        let err = store.load().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));

        store.save(&plan()).await.unwrap();
        assert!(store.exists().await.unwrap());
        assert_eq!(store.load().await.unwrap(), plan());

        // Saving again replaces rather than appends.
        store.save(&plan()[..1]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), plan()[..1].to_vec());

        store.delete().await.unwrap();
        assert!(!store.exists().await.unwrap());
        store.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        round_trip(&MemoryStore::default()).await;
    }

    #[tokio::test]
    async fn test_file_round_trip_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/state/in-progress.json"));
        round_trip(&store).await;
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in-progress.json");
        tokio::fs::write(&path, r#"[{"bucket_name": "tv", "files": ["a/b.mkv"]}, {"bucket_name": "x", "files": []}]"#)
            .await
            .unwrap();
        let plan = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(
            plan,
            vec![BucketAndFiles::new("tv", vec!["a/b.mkv".to_string()]), BucketAndFiles::new("x", vec![])]
        );
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in-progress.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Resume(_)));
    }

    #[tokio::test]
    async fn test_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        tokio::fs::write(&blocker, "").await.unwrap();
        let store = JsonFileStore::new(blocker.join("in-progress.json"));
        let err = store.save(&plan()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Resume(_)));
    }
}
