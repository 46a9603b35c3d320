//! Loading, layering and validating the configuration.

use crate::error::{ErrorKind, Result};
use crate::models::{BucketKind, Config};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SPOTCHECK_";
const CONFIG_FILE_NAME: &str = "config.toml";
const RESUME_FILE_NAME: &str = "downloads-in-progress.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "spotcheck")
}

/// Default configuration file location (`~/.config/spotcheck/config.toml` on
/// Linux).
pub fn default_config_path() -> Result<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .ok_or_else(|| exn::Exn::from(ErrorKind::NoDefaultLocation))
}

impl Config {
    /// Load the configuration from `path` (or the default location), with
    /// `SPOTCHECK_`-prefixed environment variables layered on top.
    ///
    /// Nested keys are separated with a double underscore in environment
    /// variables, e.g. `SPOTCHECK_FRESHNESS__NEWEST_MAX_AGE_DAYS=2`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path));
        }
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Figment::from(Toml::file(&path)),
            Some("yaml" | "yml") => Figment::from(Yaml::file(&path)),
            Some("json") => Figment::from(Json::file(&path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path)),
        };
        tracing::debug!(path = %path.display(), "Loading configuration");
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| exn::Exn::from(ErrorKind::Malformed(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would fail (or silently do nothing) once
    /// bucket I/O starts.
    pub fn validate(&self) -> Result<()> {
        if self.download_root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("download_root must not be empty".to_string()));
        }
        if self.buckets.is_empty() {
            exn::bail!(ErrorKind::Invalid("no buckets configured".to_string()));
        }
        let mut seen = HashSet::new();
        for bucket in &self.buckets {
            if bucket.name.is_empty() || bucket.name.contains(['/', '\\']) || bucket.name == ".." {
                exn::bail!(ErrorKind::Invalid(format!("invalid bucket name `{}`", bucket.name)));
            }
            if !seen.insert(bucket.name.as_str()) {
                exn::bail!(ErrorKind::Invalid(format!("bucket `{}` is configured more than once", bucket.name)));
            }
        }
        let has_server_backups = self.buckets.iter().any(|b| b.kind == BucketKind::ServerBackup);
        if has_server_backups && (self.freshness.oldest_max_age_days == 0 || self.freshness.newest_max_age_days == 0) {
            // An age of zero days is already "too old", so every bucket would fail.
            exn::bail!(ErrorKind::Invalid(
                "freshness thresholds must be positive when server-backup buckets are configured".to_string()
            ));
        }
        Ok(())
    }

    /// Location of the in-progress download list: the configured path, or
    /// the project data directory, or the working directory as a last resort.
    pub fn resume_path(&self) -> PathBuf {
        self.resume_file
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_local_dir().join(RESUME_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(RESUME_FILE_NAME))
    }
}
