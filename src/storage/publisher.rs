use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::processor::Artifact;
use crate::StorageBackend;

/// How long a minted URL stays valid.
pub const SIGNED_URL_EXPIRY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedResult {
    /// The storage key the artifact was written to.
    pub file_name: String,

    /// Only present when signing was requested.
    pub signed_url: Option<String>,
}

/// Writes artifacts to the storage backend.
///
/// Nothing is retried, the first error is returned as-is.
#[derive(Clone)]
pub struct Publisher {
    storage: Arc<dyn StorageBackend>,
}

impl Publisher {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    #[instrument(
        name = "publish",
        skip(self, artifact),
        fields(key = %artifact.file_name, size = artifact.data.len()),
    )]
    pub async fn publish(&self, artifact: Artifact, sign: bool) -> anyhow::Result<PublishedResult> {
        let Artifact {
            file_name,
            content_type,
            data,
            width,
            height,
        } = artifact;

        self.storage.store(&file_name, content_type, data).await?;

        let signed_url = if sign {
            Some(self.storage.sign(&file_name, SIGNED_URL_EXPIRY).await?)
        } else {
            None
        };

        debug!("Published {}x{} artifact {}", width, height, &file_name);

        Ok(PublishedResult {
            file_name,
            signed_url,
        })
    }
}
