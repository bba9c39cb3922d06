//! Signed URL issuing for artifacts stored in S3.
//!
//! Artifact paths reported by the testing service carry a scheme and bucket
//! prefix (`gs://bucket/android-tests/...`); they are normalized to object keys
//! before signing. Supports both AWS S3 and MinIO for development.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::StorageSettings;
use crate::error::{AppError, AppResult};

/// Issues time-limited URLs for stored objects.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Signed download URL for an object path. Never retried.
    async fn resolve(&self, path: &str) -> AppResult<String>;

    /// Signed upload URL for an object path.
    async fn upload_url(&self, path: &str) -> AppResult<String>;

    /// Keys of every object under `prefix`.
    async fn list(&self, prefix: &str) -> AppResult<Vec<String>>;
}

/// Turn an artifact path into an object key of `bucket`.
///
/// Strips any `scheme://` prefix, then the bucket name when it is the whole
/// leading path segment, then leading separators.
pub fn normalize_object_path(path: &str, bucket: &str) -> String {
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let path = match path.strip_prefix(bucket) {
        Some(rest) if !bucket.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path,
    };
    path.trim_start_matches('/').to_string()
}

/// S3 presigning client.
#[derive(Clone)]
pub struct S3ArtifactResolver {
    client: Client,
    bucket: String,
    expiry: Duration,
}

impl S3ArtifactResolver {
    /// Create a new S3 client from configuration.
    pub async fn new(config: &StorageSettings) -> AppResult<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            config.secret_key.expose_secret(),
            None,
            None,
            "dtr",
        );

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .force_path_style(true); // Required for MinIO

        if let Some(ref endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let resolver = Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
            expiry: Duration::from_secs(config.url_expiry_secs),
        };

        resolver.ensure_bucket_exists().await?;

        info!(
            "S3 artifact storage initialized: bucket={}, url_expiry={}s",
            config.bucket, config.url_expiry_secs
        );

        Ok(resolver)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Ensure the bucket exists, creating it if necessary.
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    info!("Creating S3 bucket '{}'", self.bucket);
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(|e| {
                            AppError::Storage(format!("Failed to create bucket: {}", e))
                        })?;
                    Ok(())
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to access bucket '{}': {}",
                        self.bucket, service_error
                    )))
                }
            }
        }
    }

    fn presigning_config(&self, path: &str) -> AppResult<PresigningConfig> {
        PresigningConfig::expires_in(self.expiry).map_err(|e| AppError::artifact(path, e))
    }
}

#[async_trait]
impl ArtifactResolver for S3ArtifactResolver {
    async fn resolve(&self, path: &str) -> AppResult<String> {
        let key = normalize_object_path(path, &self.bucket);
        debug!(path = %path, key = %key, "Signing download URL");

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(self.presigning_config(path)?)
            .await
            .map_err(|e| AppError::artifact(path, e))?;

        Ok(presigned.uri().to_string())
    }

    async fn upload_url(&self, path: &str) -> AppResult<String> {
        let key = normalize_object_path(path, &self.bucket);

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(self.presigning_config(path)?)
            .await
            .map_err(|e| AppError::artifact(path, e))?;

        Ok(presigned.uri().to_string())
    }

    async fn list(&self, prefix: &str) -> AppResult<Vec<String>> {
        let prefix = normalize_object_path(prefix, &self.bucket);
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    AppError::Storage(format!("Failed to list objects under '{}': {}", prefix, e))
                })?;

            keys.extend(output.contents().iter().filter_map(|o| o.key().map(String::from)));

            match output.next_continuation_token() {
                Some(token) if output.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }

        debug!(prefix = %prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }
}
