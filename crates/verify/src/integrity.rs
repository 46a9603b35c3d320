//! Comparing a downloaded file against the remote object it came from.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use spotcheck_storage::ObjectInfo;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// CRC32C (Castagnoli) of a local file, read in chunks.
pub async fn crc32c_file(path: &Path) -> Result<u32> {
    let mut file = tokio::fs::File::open(path)
        .await
        .or_raise(|| ErrorKind::Io(format!("could not open {}", path.display())))?;
    let mut buffer = vec![0; CHUNK_SIZE];
    let mut crc = 0;
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .or_raise(|| ErrorKind::Io(format!("could not read {}", path.display())))?;
        if read == 0 {
            return Ok(crc);
        }
        crc = crc32c::crc32c_append(crc, &buffer[..read]);
    }
}

/// Check that `path` holds exactly the object described by `remote`.
///
/// # Errors
/// - [`ErrorKind::NotFound`] if there is no file at `path`.
/// - [`ErrorKind::NotValid`] if there is no remote description, the store
///   did not report a checksum, or the size or checksum differ.
pub async fn verify(remote: Option<&ObjectInfo>, path: &Path) -> Result<()> {
    let Some(remote) = remote else {
        exn::bail!(ErrorKind::NotValid(format!("no remote object to compare {} against", path.display())));
    };
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            exn::bail!(ErrorKind::NotFound(format!("local file {}", path.display())))
        },
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io(format!("could not inspect {}", path.display()))),
    };
    if metadata.len() != remote.size {
        exn::bail!(ErrorKind::NotValid(format!(
            "{} is {} bytes, but `{}` is {} bytes",
            path.display(),
            metadata.len(),
            remote.key,
            remote.size
        )));
    }
    let Some(expected) = remote.crc32c else {
        exn::bail!(ErrorKind::NotValid(format!("no CRC32C checksum available for `{}`", remote.key)));
    };
    let actual = crc32c_file(path).await?;
    if actual != expected {
        exn::bail!(ErrorKind::NotValid(format!(
            "checksum mismatch for {}: expected {expected:08x}, got {actual:08x}",
            path.display()
        )));
    }
    Ok(())
}
