//! Storage relay
//!
//! Forwards one uploaded file to object storage as a single, publicly
//! readable object.
//!
//! # Example
//!
//! ```no_run
//! use photo_relay::config::StorageConfig;
//! use photo_relay::s3::S3Client;
//! use photo_relay::upload::{StorageRelay, StreamTracker};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = StorageConfig {
//!     bucket: "my-bucket".into(),
//!     region: "us-east-1".into(),
//!     ..Default::default()
//! };
//! let client = S3Client::from_storage_config(&storage).await?;
//! let relay = StorageRelay::new(Arc::new(client));
//!
//! let tracker = StreamTracker::new();
//! let mut stream = tracker.open("hello.txt", None, Bytes::from("Hello, World!"));
//! relay.put("hello.txt", &mut stream).await?;
//! # Ok(())
//! # }
//! ```

use super::{ObjectAcl, ObjectStore, UploadError, UploadResult, UploadStream};
use crate::metrics;
use std::sync::Arc;
use std::time::Instant;

/// Access policy applied to every relayed object
pub const RELAY_ACL: ObjectAcl = ObjectAcl::PublicRead;

/// Relays upload streams to an [`ObjectStore`]
///
/// Cheap to clone; clones share the same store handle.
#[derive(Clone)]
pub struct StorageRelay {
    store: Arc<dyn ObjectStore>,
}

impl StorageRelay {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Read `stream` to completion and store it under `key`.
    ///
    /// `key` is used verbatim and overwrites any existing object. Exactly one
    /// write is attempted; a failure is returned without retrying.
    ///
    /// The stream is borrowed, not consumed: releasing it stays with the
    /// caller that opened it.
    #[tracing::instrument(
        name = "upload.relay",
        skip(self, stream),
        fields(
            s3.key = %key,
            upload.bytes = stream.size(),
            upload.bytes_written = tracing::field::Empty
        ),
        err
    )]
    pub async fn put(
        &self,
        key: &str,
        stream: &mut UploadStream,
    ) -> Result<UploadResult, UploadError> {
        let start_time = Instant::now();

        let body = stream.read_all();
        let result = self
            .store
            .put(key, body, stream.content_type(), RELAY_ACL)
            .await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(duration.as_secs_f64());

        match result {
            Ok(result) => {
                metrics::record_upload_success(result.bytes_written);
                tracing::Span::current().record("upload.bytes_written", result.bytes_written);

                tracing::info!(
                    etag = ?result.etag,
                    bytes_written = result.bytes_written,
                    duration_ms = duration.as_millis() as u64,
                    "Upload relayed"
                );

                Ok(result)
            }
            Err(e) => {
                metrics::record_upload_failure();
                metrics::record_error("s3_upload");

                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "Upload relay failed"
                );

                Err(e)
            }
        }
    }
}
