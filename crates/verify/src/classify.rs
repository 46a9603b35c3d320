use crate::error::{ErrorKind, Result};
use spotcheck_config::{BucketKind, BucketSpec};

/// Find the declared type of `bucket`.
///
/// Returns [`ErrorKind::NotFound`] if no spec names it.
pub fn classify(bucket: &str, specs: &[BucketSpec]) -> Result<BucketKind> {
    match specs.iter().find(|spec| spec.name == bucket) {
        Some(spec) => Ok(spec.kind),
        None => exn::bail!(ErrorKind::NotFound(format!("bucket `{bucket}` has no configured type"))),
    }
}
