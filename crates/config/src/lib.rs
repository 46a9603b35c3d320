//! Configuration for spotcheck.
//!
//! Configuration is read once, validated, and then treated as immutable for
//! the rest of the run. See [`Config::load`] for where it comes from.

pub mod error;
mod load;
mod models;

pub use crate::load::default_config_path;
pub use crate::models::{BucketKind, BucketSpec, Config, FreshnessRule, SampleRule, StoreConfig};
