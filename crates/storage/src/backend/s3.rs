//! S3-compatible object store.
//!
//! This module provides an object store implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file.
//!
//! # Checksums
//!
//! `ListObjectsV2` never returns checksum values, so listed objects have no
//! CRC32C. [`stat()`](ObjectStore::stat) sends `HeadObject` with checksum mode
//! enabled, which returns the CRC32C for objects uploaded with one.

use crate::{
    ObjectStore,
    backend::BoxAsyncRead,
    error::{ErrorKind, Result},
    models::{Entry, ListQuery, ObjectInfo, Page},
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, http::HttpResponse, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::DateTime,
    types::ChecksumMode,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use exn::{OptionExt, ResultExt};
use time::UtcDateTime;

/// S3-compatible object store.
///
/// One backend serves every bucket reachable with its credentials; the bucket
/// is chosen per request.
///
/// # Examples
///
/// ```no_run
/// use spotcheck_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = S3Backend::new(
///     "b2",
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
}

impl S3Backend {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in logging)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub async fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Credentials::new(key_id, key_secret, None, None, "spotcheck-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Downloads retry on their own; listing errors surface immediately.
            .retry_config(RetryConfig::disabled())
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
        })
    }

    /// Convert AWS DateTime to UtcDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<UtcDateTime> {
        UtcDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    /// Decode the base64, big-endian CRC32C that S3 reports in checksum headers.
    fn parse_crc32c(encoded: &str) -> Result<u32> {
        let bytes = BASE64
            .decode(encoded)
            .or_raise(|| ErrorKind::BackendError(format!("invalid CRC32C checksum `{encoded}`")))?;
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| exn::Exn::from(ErrorKind::BackendError(format!("invalid CRC32C checksum `{encoded}`"))))?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn size(size: Option<i64>) -> u64 {
        size.and_then(|s| u64::try_from(s).ok()).unwrap_or_default()
    }

    /// Map an SDK error onto the storage error categories.
    fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, bucket: &str, key: Option<&str>) -> exn::Exn<ErrorKind>
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let message = DisplayErrorContext(&err).to_string();
        let kind = match &err {
            SdkError::ServiceError(service) => {
                let status = service.raw().status().as_u16();
                match (service.err().code(), key) {
                    (Some("NoSuchBucket"), _) => ErrorKind::BucketNotFound(bucket.to_string()),
                    (Some("NoSuchKey"), Some(key)) => ErrorKind::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    },
                    // HeadObject has no response body, so a missing key is
                    // only visible as a bare 404.
                    (_, Some(key)) if status == 404 => ErrorKind::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    },
                    (_, None) if status == 404 => ErrorKind::BucketNotFound(bucket.to_string()),
                    (Some("AccessDenied"), _) => ErrorKind::PermissionDenied(bucket.to_string()),
                    _ if status == 401 || status == 403 => ErrorKind::PermissionDenied(bucket.to_string()),
                    _ => ErrorKind::BackendError(message),
                }
            },
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
                ErrorKind::Network(message)
            },
            _ => ErrorKind::BackendError(message),
        };
        exn::Exn::from(kind)
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, bucket: &str, query: &ListQuery, token: Option<&str>) -> Result<Page> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(query.prefix.clone())
            .set_delimiter(query.delimiter.clone())
            .set_continuation_token(token.map(str::to_string))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket, None))?;

        let mut entries = Vec::new();
        for object in output.contents() {
            let Some(key) = object.key() else { continue };
            let created = object
                .last_modified()
                .ok_or_raise(|| ErrorKind::BackendError(format!("object `{key}` has no last-modified time")))?;
            entries.push(Entry::Object(ObjectInfo::new(
                key,
                Self::size(object.size()),
                Self::parse_datetime(created)?,
            )));
        }
        entries.extend(output.common_prefixes().iter().filter_map(|p| p.prefix()).map(|p| Entry::Prefix(p.to_string())));

        let next_token = match output.is_truncated() {
            Some(true) => output.next_continuation_token().map(str::to_string),
            _ => None,
        };
        tracing::debug!(bucket, entries = entries.len(), more = next_token.is_some(), "Listed page");
        Ok(Page { entries, next_token })
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .checksum_mode(ChecksumMode::Enabled)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket, Some(key)))?;
        let created = output
            .last_modified()
            .ok_or_raise(|| ErrorKind::BackendError(format!("object `{key}` has no last-modified time")))?;
        let info = ObjectInfo::new(key, Self::size(output.content_length()), Self::parse_datetime(created)?);
        Ok(match output.checksum_crc32_c() {
            Some(encoded) => info.with_crc32c(Self::parse_crc32c(encoded)?),
            None => info,
        })
    }

    async fn reader(&self, bucket: &str, key: &str) -> Result<BoxAsyncRead> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket, Some(key)))?;
        Ok(Box::pin(output.body.into_async_read()))
    }
}
