//! S3 Client module
//!
//! Thin wrapper over `aws-sdk-s3` exposing the single operation the relay
//! needs: a whole-object PutObject with a canned ACL.
//!
//! The client is built once at startup and shared by every request task. The
//! SDK client is internally reference counted and issues independent calls per
//! invocation, so no locking is involved.
//!
//! Retries are disabled: a failed put is reported to the caller immediately.
//!
//! # Example
//!
//! ```no_run
//! use photo_relay::s3::{CredentialSource, S3Client, S3ClientConfig};
//! use photo_relay::upload::ObjectAcl;
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = S3ClientConfig {
//!     bucket: "my-bucket".to_string(),
//!     region: "us-east-1".to_string(),
//!     endpoint: None,
//!     credentials: CredentialSource::Ambient,
//!     force_path_style: false,
//!     timeout: None,
//! };
//!
//! let client = S3Client::new(config).await?;
//! let body = Bytes::from("Hello, World!");
//! let response = client
//!     .put_object("hello.txt", body, Some("text/plain"), ObjectAcl::PublicRead)
//!     .await?;
//! println!("ETag: {:?}", response.etag);
//! # Ok(())
//! # }
//! ```

mod credentials;

pub use credentials::{CredentialSource, StaticCredentials};

use crate::config::StorageConfig;
use crate::upload::{ObjectAcl, ObjectStore, UploadError, UploadResult};
use async_trait::async_trait;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Backend rejection or transport failure, described as the backend
    /// reported it.
    #[error("{0}")]
    RequestError(String),
}

/// S3 Client configuration
#[derive(Debug, Clone)]
pub struct S3ClientConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub credentials: CredentialSource,
    pub force_path_style: bool,
    pub timeout: Option<Duration>,
}

impl From<&StorageConfig> for S3ClientConfig {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            bucket: storage.bucket.clone(),
            region: storage.region.clone(),
            endpoint: storage.endpoint.clone(),
            credentials: CredentialSource::from_config(storage),
            force_path_style: storage.force_path_style,
            timeout: storage.timeout_seconds.map(Duration::from_secs),
        }
    }
}

/// S3 PutObject response
#[derive(Debug, Clone)]
pub struct S3PutObjectResponse {
    pub etag: Option<String>,
}

/// S3 Client
#[derive(Clone)]
pub struct S3Client {
    config: S3ClientConfig,
    inner: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client
    ///
    /// With [`CredentialSource::Ambient`] this resolves the AWS default
    /// provider chain, which is why construction is async.
    pub async fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        if config.region.is_empty() {
            return Err(S3ClientError::ConfigError("region is required".into()));
        }
        let region = Region::new(config.region.clone());

        let mut builder = match &config.credentials {
            CredentialSource::Static(creds) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(creds.to_sdk()),
            CredentialSource::Ambient => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region.clone())
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        builder = builder
            .region(region)
            .retry_config(RetryConfig::disabled())
            // Plain S3-compatible stores reject the optional flexible checksums
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .force_path_style(config.force_path_style);

        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if let Some(timeout) = config.timeout {
            builder = builder.timeout_config(
                TimeoutConfig::builder().operation_timeout(timeout).build(),
            );
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            static_credentials = config.credentials.is_static(),
            "Built S3 client"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(builder.build()),
            config,
        })
    }

    /// Build a client straight from the storage section of the configuration
    pub async fn from_storage_config(storage: &StorageConfig) -> Result<Self, S3ClientError> {
        Self::new(S3ClientConfig::from(storage)).await
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> String {
        self.config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.config.region))
    }

    /// Upload an object to S3 (PutObject)
    ///
    /// An existing object under `key` is replaced.
    ///
    /// # Tracing
    ///
    /// Creates a span named `s3.put_object` with attributes:
    /// - `s3.bucket`, `s3.key`, `s3.acl`
    /// - `upload.bytes` - Size of object
    /// - `s3.etag` - ETag from response (recorded after upload)
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, body),
        fields(
            s3.bucket = %self.config.bucket,
            s3.key = %key,
            s3.acl = acl.as_str(),
            http.method = "PUT",
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<S3PutObjectResponse, S3ClientError> {
        let content_length = body.len() as i64;

        let output = self
            .inner
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .acl(canned_acl(acl))
            .content_length(content_length)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(describe_sdk_error(&e)))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        Ok(S3PutObjectResponse { etag })
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<UploadResult, UploadError> {
        let bytes_written = body.len() as u64;
        let response = self
            .put_object(key, body, content_type, acl)
            .await
            .map_err(|e| UploadError::S3Error(e.to_string()))?;

        Ok(UploadResult {
            etag: response.etag,
            bytes_written,
        })
    }
}

fn canned_acl(acl: ObjectAcl) -> ObjectCannedAcl {
    match acl {
        ObjectAcl::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

/// Render an SDK error with the backend's own code and message when present.
fn describe_sdk_error<E, R>(err: &SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = match err {
        SdkError::ServiceError(service) => {
            let meta = service.err();
            match (meta.code(), meta.message()) {
                (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
                (Some(code), None) => Some(code.to_string()),
                (None, Some(message)) => Some(message.to_string()),
                (None, None) => None,
            }
        }
        _ => None,
    };

    detail.unwrap_or_else(|| DisplayErrorContext(err).to_string())
}
