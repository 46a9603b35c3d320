use crate::consts::PHOTO_KEY_REGEX;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use spotcheck_storage::key_to_path;
use std::path::{Path, PathBuf};

/// Where `key` from `bucket` is stored under `root`.
///
/// Photo keys (`YYYY-MM/<rest>`) are grouped by year only, as
/// `{root}/{bucket}/YYYY/<rest>`; every other key is mirrored as-is under
/// `{root}/{bucket}/`.
///
/// # Errors
/// [`ErrorKind::NotValid`] for keys that can't be stored inside the bucket
/// directory (empty, `..` segments, NUL bytes).
pub fn destination(root: &Path, bucket: &str, key: &str) -> Result<PathBuf> {
    let relative = match PHOTO_KEY_REGEX.captures(key) {
        Some(captures) => format!("{}/{}", &captures[1], &captures[2]),
        None => key.to_string(),
    };
    let relative = key_to_path(&relative)
        .or_raise(|| ErrorKind::NotValid(format!("`{key}` in bucket `{bucket}` cannot be stored locally")))?;
    Ok(root.join(bucket).join(relative))
}
