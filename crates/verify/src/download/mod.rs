//! Downloading a sampled plan to local disk, verifying every file.
//!
//! Objects are processed strictly one at a time. For each one the remote
//! metadata is fetched first; a missing object ends the run. If a verified
//! copy is already on disk nothing is transferred, which makes re-running an
//! interrupted plan cheap. Otherwise the object is streamed to disk and
//! verified again, with the whole attempt retried on anything that might be
//! transient (network errors, local I/O errors, a corrupted transfer).

mod file;
mod path;
mod stream;

pub use self::stream::{DownloadEvent, download};
