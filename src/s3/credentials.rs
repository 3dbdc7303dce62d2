//! S3 Credentials Module
//!
//! Decides where the S3 client gets its credentials from.
//!
//! - A complete access-key/secret-key pair in the configuration is used as
//!   static credentials.
//! - Anything else falls back to the AWS default provider chain
//!   (environment, profile, web identity, IMDS, ...).
//!
//! # Example
//!
//! ```
//! use photo_relay::config::StorageConfig;
//! use photo_relay::s3::CredentialSource;
//!
//! let config = StorageConfig {
//!     bucket: "photos".into(),
//!     region: "us-east-1".into(),
//!     access_key: Some("access-key".into()),
//!     secret_key: Some("secret-key".into()),
//!     ..Default::default()
//! };
//!
//! let source = CredentialSource::from_config(&config);
//! assert!(source.is_static());
//! ```

use crate::config::StorageConfig;

/// Provider name reported by the SDK for configured credentials
const PROVIDER_NAME: &str = "photo-relay-config";

/// Static credential pair
#[derive(Clone)]
pub struct StaticCredentials {
    access_key_id: String,
    secret_access_key: String,
}

impl StaticCredentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Convert into the SDK credential type
    pub fn to_sdk(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.clone(),
            None,
            None,
            PROVIDER_NAME,
        )
    }
}

// Never print the secret
impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .finish()
    }
}

/// Where the S3 client resolves credentials from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Static(StaticCredentials),
    /// AWS default provider chain
    Ambient,
}

impl CredentialSource {
    /// Pick the credential source for a storage configuration
    pub fn from_config(config: &StorageConfig) -> Self {
        match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Self::Static(StaticCredentials::new(access.clone(), secret.clone()))
            }
            _ => Self::Ambient,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}
