//! Object key to local path conversion.
//!
//! Object keys are arbitrary strings chosen by whoever uploaded the object.
//! Before one is used to build a path on the local filesystem it has to be
//! checked so that it can never land outside the directory it is joined onto.

use std::path::PathBuf;

use crate::error::{ErrorKind, Result};

/// Converts a `/`-separated object key into a relative local path.
///
/// Empty segments and `.` segments are dropped (`a//b/./c` becomes `a/b/c`).
/// Any `..` segment is rejected outright rather than resolved: a backup key
/// that walks upwards is suspicious, not something to normalize.
///
/// > **Note:** Null bytes, backslashes and Windows drive prefixes are rejected
/// >           too, because they change meaning once handed to the OS.
///
/// # Returns
/// Returns the relative path if valid, or [`InvalidKey`](crate::error::ErrorKind::InvalidKey)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use spotcheck_storage::key_to_path;
/// assert_eq!(key_to_path("show/s01e01.mkv").unwrap(), Path::new("show/s01e01.mkv"));
/// assert_eq!(key_to_path("/a//b/./c/").unwrap(), Path::new("a/b/c"));
/// assert!(key_to_path("../etc/passwd").is_err());
/// assert!(key_to_path("a/../b").is_err());
/// assert!(key_to_path("a\0b").is_err());
/// assert!(key_to_path("").is_err());
/// ```
pub fn key_to_path(key: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
            // Null bytes cause truncation in C-based syscalls, backslashes
            // are separators on Windows, and a colon could smuggle in a drive
            // prefix.
            s if s.contains(['\0', '\\']) || (cfg!(windows) && s.contains(':')) => {
                exn::bail!(ErrorKind::InvalidKey(key.to_string()))
            },
            s => path.push(s),
        }
    }
    match path.as_os_str().is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case("server/db-2024-01-01.sql.gz", "server/db-2024-01-01.sql.gz")]
    #[case("simple.tar", "simple.tar")]
    #[case("2024/IMG_0001.jpg", "2024/IMG_0001.jpg")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("/leading/slash", "leading/slash")]
    #[case("Show Name/trailing/", "Show Name/trailing")]
    #[case("naïve/ünïcödé.mkv", "naïve/ünïcödé.mkv")]
    fn test_valid_keys(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(key_to_path(key).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a/../b")]
    #[case("..")]
    #[case("a\0b")]
    #[case("a\\..\\b")]
    #[case("")]
    #[case(".")]
    #[case("./")]
    #[case("//")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = key_to_path(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(k) if k == key));
    }
}
