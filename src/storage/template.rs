use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait StorageBackend: Sync + Send + 'static {
    /// Persists `data` under `key`, overwriting anything already there.
    async fn store(&self, key: &str, content_type: &str, data: Bytes) -> anyhow::Result<()>;

    /// Mints a read URL for `key` valid for `expires_in`.
    async fn sign(&self, key: &str, expires_in: Duration) -> anyhow::Result<String>;
}
