pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::ObjectStore;
pub use crate::models::{Entry, ListQuery, ObjectInfo, Page};
pub use crate::path::key_to_path;
