//! Upload module
//!
//! Form intake, the scoped upload stream, and the relay that forwards a
//! single file to object storage.

use thiserror::Error;

pub mod multipart;
pub mod relay;
pub mod stream;

pub use relay::StorageRelay;
pub use stream::{StreamTracker, UploadStream};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// The form or its `file` part is missing or unparsable.
    #[error("{0}")]
    InvalidForm(String),

    /// The request body could not be read to completion.
    #[error("{0}")]
    BodyRead(String),

    /// The storage backend rejected the write or could not be reached.
    #[error("{0}")]
    S3Error(String),
}

/// Canned access policy applied to stored objects; relayed uploads are always public-read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    PublicRead,
}

impl ObjectAcl {
    /// Wire value of the `x-amz-acl` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicRead => "public-read",
        }
    }
}

/// Upload result
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub etag: Option<String>,
    pub bytes_written: u64,
}

/// A key-addressed object store that accepts whole-object writes.
///
/// Implementations must be safe to call concurrently from many request tasks
/// without external locking.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        body: bytes::Bytes,
        content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<UploadResult, UploadError>;
}
