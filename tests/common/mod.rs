//! Shared test infrastructure
//!
//! - An in-memory [`ObjectStore`] that records every put
//! - A running relay server on an ephemeral port
//! - A client that does not follow redirects, so 303s stay observable

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use photo_relay::config::UploadConfig;
use photo_relay::server::{AppContext, Server};
use photo_relay::upload::{ObjectAcl, ObjectStore, UploadError, UploadResult};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// One recorded PutObject call
#[derive(Debug, Clone)]
pub struct RecordedPut {
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub acl: ObjectAcl,
}

/// Object store that keeps everything in memory
#[derive(Default)]
pub struct RecordingStore {
    puts: Mutex<Vec<RecordedPut>>,
    objects: Mutex<HashMap<String, Bytes>>,
    fail_with: Option<String>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A store that rejects every write with `message`
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(message.to_string()),
            ..Default::default()
        })
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
        acl: ObjectAcl,
    ) -> Result<UploadResult, UploadError> {
        self.puts.lock().unwrap().push(RecordedPut {
            key: key.to_string(),
            body: body.clone(),
            content_type: content_type.map(String::from),
            acl,
        });

        if let Some(message) = &self.fail_with {
            return Err(UploadError::S3Error(message.clone()));
        }

        let bytes_written = body.len() as u64;
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(UploadResult {
            etag: Some("\"d41d8cd98f00b204e9800998ecf8427e\"".to_string()),
            bytes_written,
        })
    }
}

/// A relay server running in the background
pub struct TestServer {
    pub addr: SocketAddr,
    pub context: AppContext,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Start a server on 127.0.0.1 with an ephemeral port
    pub async fn start(store: Arc<dyn ObjectStore>) -> Self {
        Self::start_with_config(store, UploadConfig::default()).await
    }

    /// Start a server that caps request bodies at `max_body_bytes`
    pub async fn start_with_limit(store: Arc<dyn ObjectStore>, max_body_bytes: usize) -> Self {
        let upload = UploadConfig {
            max_body_bytes: Some(max_body_bytes),
        };
        Self::start_with_config(store, upload).await
    }

    pub async fn start_with_config(store: Arc<dyn ObjectStore>, upload: UploadConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let context = AppContext::new(store, upload);
        Self::serve(Server::from_listener(listener, context.clone()).unwrap(), context)
    }

    /// Run an already bound server
    pub fn serve(server: Server, context: AppContext) -> Self {
        let addr = server.local_addr();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            server.run_until(shutdown).await.unwrap();
        });

        Self {
            addr,
            context,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// HTTP client that reports redirects instead of following them
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap()
}

/// A multipart form with `bytes` under the `file` field, filename sent raw
/// the way browsers send it
pub fn photo_form(filename: &str, bytes: &[u8]) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name(filename.to_string())
        .mime_str("image/jpeg")
        .unwrap();
    reqwest::multipart::Form::new()
        .percent_encode_noop()
        .part("file", part)
}

/// The first bytes of a JPEG file
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
