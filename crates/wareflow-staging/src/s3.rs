//! Amazon S3 staging store
//!
//! Writes staged CSV batches to S3 or an S3-compatible store (MinIO,
//! LocalStack via a custom endpoint). Credentials resolve from the AWS
//! default chain unless explicit keys are handed to the constructor.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let staging = S3Staging::connect(
//!     "etl-staging",
//!     "eu-west-1",
//!     None,        // endpoint_url
//!     Some(("AKIA...".into(), "secret".into())),
//! ).await?;
//! ```

#[cfg(feature = "s3")]
use tracing::{debug, info};

use crate::store::{StagingStore, StagingError};

#[cfg(feature = "s3")]
use aws_config::BehaviorVersion;

#[cfg(feature = "s3")]
use aws_sdk_s3::{primitives::ByteStream, Client as S3Client};

/// S3 staging store
pub struct S3Staging {
    /// Staging bucket name
    bucket: String,

    /// Bucket region
    region: String,

    /// S3 client (only available with s3 feature)
    #[cfg(feature = "s3")]
    client: S3Client,

    /// Placeholder for when feature is disabled
    #[cfg(not(feature = "s3"))]
    _phantom: std::marker::PhantomData<()>,
}

impl S3Staging {
    /// Connect to S3 (or an S3-compatible endpoint)
    ///
    /// # Arguments
    ///
    /// * `bucket` - Staging bucket name
    /// * `region` - Bucket region
    /// * `endpoint_url` - Custom endpoint for S3-compatible stores
    /// * `credentials` - Explicit `(access_key_id, secret_access_key)`;
    ///   `None` uses the AWS default credential chain
    #[cfg(feature = "s3")]
    pub async fn connect(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint_url: Option<&str>,
        credentials: Option<(String, String)>,
    ) -> Result<Self, StagingError> {
        let bucket = bucket.into();
        let region = region.into();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()));

        if let Some((access_key, secret_key)) = credentials {
            let creds =
                aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "wareflow");
            loader = loader.credentials_provider(creds);
        }

        let aws_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);

        // S3-compatible services need path-style addressing
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            bucket,
            region,
            client: S3Client::from_conf(builder.build()),
        })
    }

    /// Create store without s3 feature (returns error)
    #[cfg(not(feature = "s3"))]
    pub async fn connect(
        bucket: impl Into<String>,
        region: impl Into<String>,
        _endpoint_url: Option<&str>,
        _credentials: Option<(String, String)>,
    ) -> Result<Self, StagingError> {
        let _ = (bucket.into(), region.into());
        Err(StagingError::ConfigError(
            "S3 support not compiled. Rebuild with: cargo build --features s3".to_string(),
        ))
    }

    /// Get the bucket region
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait::async_trait]
impl StagingStore for S3Staging {
    fn name(&self) -> &'static str {
        "S3"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[cfg(feature = "s3")]
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StagingError> {
        debug!(bucket = %self.bucket, key = %key, bytes = bytes.len(), "uploading staged batch");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("text/csv")
            .send()
            .await
            .map_err(|e| StagingError::UploadError(format!("S3 upload failed: {}", e)))?;

        info!(bucket = %self.bucket, key = %key, "staged batch uploaded");
        Ok(())
    }

    #[cfg(not(feature = "s3"))]
    async fn put(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), StagingError> {
        Err(StagingError::ConfigError(
            "S3 support not compiled. Rebuild with: cargo build --features s3".to_string(),
        ))
    }

    #[cfg(feature = "s3")]
    async fn delete(&self, key: &str) -> Result<(), StagingError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StagingError::DeleteError(format!("S3 delete failed: {}", e)))?;

        debug!(bucket = %self.bucket, key = %key, "staged batch deleted");
        Ok(())
    }

    #[cfg(not(feature = "s3"))]
    async fn delete(&self, _key: &str) -> Result<(), StagingError> {
        Err(StagingError::ConfigError(
            "S3 support not compiled. Rebuild with: cargo build --features s3".to_string(),
        ))
    }

    #[cfg(feature = "s3")]
    async fn test_connection(&self) -> Result<(), StagingError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StagingError::ConnectionError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "s3"))]
    async fn test_connection(&self) -> Result<(), StagingError> {
        Err(StagingError::ConfigError(
            "S3 support not compiled. Rebuild with: cargo build --features s3".to_string(),
        ))
    }
}
