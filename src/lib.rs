//! Photo Relay Library
//!
//! Web intake for family photos: a single-page upload form whose files are
//! relayed straight to an S3-compatible bucket as publicly readable objects.
//!
//! # Features
//!
//! - **Upload Only**: One form, one `POST /upload`, nothing to list or fetch
//! - **Public Objects**: Every stored object carries the `public-read` ACL
//! - **S3 Compatible**: AWS S3, MinIO, or any endpoint speaking PutObject
//! - **Port Fallback**: Binds the configured port, or 8081 if that fails
//!
//! # Example
//!
//! ```no_run
//! use photo_relay::{config::Config, server::{AppContext, Server}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let context = AppContext::from_config(&config).await?;
//!     let server = Server::bind(&config.server, context).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod s3;
pub mod server;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
