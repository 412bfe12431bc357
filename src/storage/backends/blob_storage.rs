use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rusoto_core::credential::{AwsCredentials, StaticProvider};
use rusoto_core::{ByteStream, HttpClient, Region};
use rusoto_s3::util::{PreSignedRequest, PreSignedRequestOption};
use rusoto_s3::{GetObjectRequest, PutObjectRequest, S3Client, S3};

use crate::StorageBackend;

pub struct BlobStorageBackend {
    bucket: String,
    region: Region,
    credentials: AwsCredentials,
    client: S3Client,
    request_timeout: Option<Duration>,
}

impl BlobStorageBackend {
    pub fn new(
        name: String,
        region: String,
        endpoint: String,
        access_key: String,
        secret_key: String,
        request_timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let region = Region::Custom { name: region, endpoint };
        let credentials = AwsCredentials::new(access_key.clone(), secret_key.clone(), None, None);
        let provider = StaticProvider::new_minimal(access_key, secret_key);
        let client = S3Client::new_with(HttpClient::new()?, provider, region.clone());

        Ok(Self {
            bucket: name,
            region,
            credentials,
            client,
            request_timeout,
        })
    }
}

#[async_trait]
impl StorageBackend for BlobStorageBackend {
    async fn store(&self, key: &str, content_type: &str, data: Bytes) -> anyhow::Result<()> {
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_type: Some(content_type.to_string()),
            content_length: Some(data.len() as i64),
            body: Some(ByteStream::from(data.to_vec())),
            ..Default::default()
        };

        debug!("Storing artifact in bucket {} @ {}", &self.bucket, key);
        let upload = self.client.put_object(request);
        match self.request_timeout {
            Some(timeout) => {
                tokio::time::timeout(timeout, upload).await??;
            },
            None => {
                upload.await?;
            },
        }

        Ok(())
    }

    async fn sign(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        let option = PreSignedRequestOption { expires_in };
        Ok(request.get_presigned_url(&self.region, &self.credentials, &option))
    }
}
