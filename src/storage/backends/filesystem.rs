use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;

use crate::StorageBackend;

pub struct FileSystemBackend {
    directory: PathBuf,
    public_url: String,
}

impl FileSystemBackend {
    pub fn new(directory: PathBuf, public_url: Option<String>) -> Self {
        let public_url = public_url
            .unwrap_or_else(|| format!("file://{}", directory.display()))
            .trim_end_matches('/')
            .to_string();

        Self { directory, public_url }
    }

    #[inline]
    fn format_path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    async fn store(&self, key: &str, _content_type: &str, data: Bytes) -> anyhow::Result<()> {
        let path = self.format_path(key);

        debug!("Storing artifact @ {:?}", &path);
        match tokio::fs::write(&path, &data).await {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.directory).await?;
                tokio::fs::write(&path, data).await?;
                Ok(())
            },
            Err(other) => Err(other.into()),
        }
    }

    async fn sign(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        let expires_at = SystemTime::now().duration_since(UNIX_EPOCH)? + expires_in;

        // Local files have no access control, the expiry is advisory.
        Ok(format!("{}/{}?expires={}", self.public_url, key, expires_at.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_creates_missing_directory() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let directory = tmp.path().join("nested");
        let backend = FileSystemBackend::new(directory.clone(), None);

        backend
            .store("compressed-1.webp", "image/webp", Bytes::from_static(b"data"))
            .await?;

        let written = tokio::fs::read(directory.join("compressed-1.webp")).await?;
        assert_eq!(written, b"data");

        Ok(())
    }

    #[tokio::test]
    async fn test_sign_is_relative_to_public_url() -> anyhow::Result<()> {
        let backend = FileSystemBackend::new(
            PathBuf::from("/srv/images"),
            Some("https://cdn.example.com/images/".to_string()),
        );

        let url = backend.sign("resized-1.webp", Duration::from_secs(3600)).await?;
        assert!(url.starts_with("https://cdn.example.com/images/resized-1.webp?expires="));

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let expires: u64 = url.rsplit('=').next().unwrap().parse()?;
        assert!(expires >= now + 3599 && expires <= now + 3601);

        Ok(())
    }
}
