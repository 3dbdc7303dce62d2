//! Request context shared by every connection task

use super::ServerError;
use crate::config::{Config, UploadConfig};
use crate::s3::S3Client;
use crate::upload::{ObjectStore, StorageRelay, StreamTracker};
use std::sync::Arc;

/// Immutable state built once at startup and handed to every request.
///
/// Nothing in here is mutated after construction; the stream tracker only
/// holds atomic counters.
#[derive(Clone)]
pub struct AppContext {
    relay: StorageRelay,
    streams: StreamTracker,
    upload: UploadConfig,
}

impl AppContext {
    /// Create a context around an arbitrary object store
    pub fn new(store: Arc<dyn ObjectStore>, upload: UploadConfig) -> Self {
        Self {
            relay: StorageRelay::new(store),
            streams: StreamTracker::new(),
            upload,
        }
    }

    /// Build the S3 client described by `config` and wrap it in a context
    pub async fn from_config(config: &Config) -> Result<Self, ServerError> {
        let client = S3Client::from_storage_config(&config.storage)
            .await
            .map_err(|e| ServerError::StartupError(e.to_string()))?;

        tracing::info!(
            bucket = %client.bucket(),
            region = %client.region(),
            endpoint = %client.endpoint(),
            "Storage relay ready"
        );

        Ok(Self::new(Arc::new(client), config.upload.clone()))
    }

    pub fn relay(&self) -> &StorageRelay {
        &self.relay
    }

    /// Tracker for streams opened by request handlers
    pub fn streams(&self) -> &StreamTracker {
        &self.streams
    }

    /// Body size cap, if one is configured
    pub fn max_body_bytes(&self) -> Option<usize> {
        self.upload.max_body_bytes
    }
}
