use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;

/// Lifetime of a presigned upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract for the object storage layer (avatars and other uploads).
/// Handlers only see this trait; `S3StorageClient` talks to MinIO or Cloudflare R2,
/// `MockStorageService` stands in during tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in `Env::Local` to provision the
    /// MinIO bucket on startup.
    async fn ensure_bucket_exists(&self);

    /// Generates a signed URL allowing a client to PUT `key` directly into the bucket.
    ///
    /// # Arguments
    /// * `key`: The final object key in the bucket.
    /// * `content_type`: The MIME type the upload must be sent with.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, AppError>;

    /// Removes an object. Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), AppError>;

    /// The public URL an uploaded object is served from.
    fn public_url(&self, key: &str) -> String;
}

// 2. The Real Implementation (MinIO / Cloudflare R2)
/// S3StorageClient
///
/// Concrete implementation on top of the AWS SDK. Both MinIO and R2 speak the S3
/// API; `force_path_style(true)` is required by MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3StorageClient {
    /// new
    ///
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// CreateBucket is idempotent for our purposes: an "already owned" error is ignored.
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket({}) skipped: {:?}", self.bucket_name, e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // The client must upload with exactly this Content-Type.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

/// sanitize_key
///
/// Strips directory navigation (`..`, `.`, empty segments) and flattens the
/// remaining segments, so a user-provided file name can never escape its key.
pub fn sanitize_key(name: &str) -> String {
    name.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("-")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// In-memory stand-in for `StorageService`. Deleted keys are recorded so tests can
/// assert on storage side effects.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys removed through `delete_object`, in call order.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted
            .lock()
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, AppError> {
        if self.should_fail {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            key
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        if self.should_fail {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(key.to_string());
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("http://localhost:9000/mock-bucket/{}", key)
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key_removes_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc-passwd");
        assert_eq!(sanitize_key("./logo.png"), "logo.png");
        assert_eq!(sanitize_key("a\\..\\b.png"), "a-b.png");
    }

    #[tokio::test]
    async fn test_mock_records_deletes() {
        let storage = MockStorageService::new();
        storage.delete_object("old.png").await.unwrap();
        storage.delete_object("older.png").await.unwrap();
        assert_eq!(storage.deleted_keys(), vec!["old.png", "older.png"]);
    }

    #[tokio::test]
    async fn test_failing_mock_errors() {
        let storage = MockStorageService::new_failing();
        assert!(storage.get_presigned_upload_url("k", "image/png").await.is_err());
        assert!(storage.delete_object("k").await.is_err());
        assert!(storage.deleted_keys().is_empty());
    }
}
