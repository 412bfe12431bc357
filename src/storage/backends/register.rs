use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::StorageBackend;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfigs {
    /// Any S3 compatible store, e.g. AWS S3, Cloudflare R2 or MinIO.
    BlobStorage {
        /// The bucket name.
        name: String,
        region: String,
        endpoint: String,
        access_key: String,
        secret_key: String,
        #[serde(default)]
        /// The request timeout in seconds.
        request_timeout: Option<u64>,
    },

    /// Local disk, intended for development.
    FileSystem {
        directory: PathBuf,
        #[serde(default)]
        /// The URL the directory is served from, signed URLs are
        /// built relative to this.
        public_url: Option<String>,
    },
}

impl BackendConfigs {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn StorageBackend>> {
        match self {
            Self::BlobStorage {
                name,
                region,
                endpoint,
                access_key,
                secret_key,
                request_timeout,
            } => {
                let backend = super::blob_storage::BlobStorageBackend::new(
                    name.clone(),
                    region.clone(),
                    endpoint.clone(),
                    access_key.clone(),
                    secret_key.clone(),
                    request_timeout.map(Duration::from_secs),
                )?;

                Ok(Arc::new(backend))
            },
            Self::FileSystem { directory, public_url } => {
                tokio::fs::create_dir_all(directory).await?;

                Ok(Arc::new(super::filesystem::FileSystemBackend::new(
                    directory.clone(),
                    public_url.clone(),
                )))
            },
        }
    }
}
