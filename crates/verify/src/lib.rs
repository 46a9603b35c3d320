//! Spot-checking backups held in an object store.
//!
//! Every configured bucket is first checked for freshness (server backups
//! must be recent, and old ones must be archived away). Then a small sample
//! of each bucket is chosen for a human to look at, and downloaded with
//! size and CRC32C verification. The sample is saved before downloading
//! starts, so an interrupted run resumes with the same files.

mod classify;
mod consts;
pub mod download;
pub mod error;
pub mod freshness;
pub mod integrity;
pub mod resume;
pub mod run;
pub mod sample;
pub mod scan;

pub use crate::classify::classify;
pub use crate::resume::{BucketAndFiles, JsonFileStore, MemoryStore, ResumeStore};
pub use crate::run::{Summary, run};
