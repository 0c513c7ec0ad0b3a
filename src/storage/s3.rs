//! S3-compatible object store client (Backblaze B2, MinIO, AWS).

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use futures::StreamExt;
use log::debug;

use super::{ByteChunks, CredentialCipher, ObjectStorage, ObjectStorageFactory, StoredObject};
use crate::error::{DocumentError, Result};
use crate::models::ObjectStoreConfig;

const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Builds a client from a configuration whose `keyId` and
    /// `applicationKey` are stored encrypted.
    pub fn new(config: &ObjectStoreConfig, cipher: &CredentialCipher) -> Result<Self> {
        let (Some(key_id), Some(secret), Some(endpoint), Some(bucket)) = (
            config.key_id.as_deref(),
            config.application_key.as_deref(),
            config.endpoint.as_deref(),
            config.bucket.as_deref(),
        ) else {
            return Err(DocumentError::storage("incomplete object store configuration"));
        };

        let key_id = cipher.decrypt(key_id)?;
        let secret = cipher.decrypt(secret)?;
        let endpoint = endpoint_url(endpoint);
        let credentials = Credentials::new(key_id, secret, None, None, "organization");
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region_of(&endpoint)))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: bucket.to_string(),
        })
    }
}

fn endpoint_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

/// `https://s3.us-west-002.backblazeb2.com` is in region `us-west-002`.
fn region_of(endpoint: &str) -> String {
    let host = endpoint
        .split("://")
        .nth(1)
        .unwrap_or(endpoint)
        .split(['/', ':'])
        .next()
        .unwrap_or_default();
    let mut labels = host.split('.');
    match (labels.next(), labels.next()) {
        (Some("s3"), Some(region)) if region.contains('-') => region.to_string(),
        _ => DEFAULT_REGION.to_string(),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_file(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<Option<String>> {
        debug!("put {} in bucket {}", key, self.bucket);
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| DocumentError::storage(format!("put {}: {}", key, e)))?;
        Ok(output.version_id().map(String::from))
    }

    async fn download_file(&self, key: &str) -> Result<Option<ByteChunks>> {
        debug!("get {} from bucket {}", key, self.bucket);
        let output = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => return Ok(None),
            Err(e) => return Err(DocumentError::storage(format!("get {}: {}", key, e))),
        };
        // Stops after the first read error.
        let chunks = futures::stream::unfold(Some(output.body), |body| async move {
            let mut body = body?;
            match body.try_next().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(body))),
                Ok(None) => None,
                Err(e) => Some((Err(DocumentError::storage(format!("read object: {}", e))), None)),
            }
        });
        Ok(Some(chunks.boxed()))
    }

    async fn delete_files(&self, objects: &[StoredObject]) -> Result<()> {
        let identifiers = objects
            .iter()
            .map(|object| {
                ObjectIdentifier::builder()
                    .key(&object.key)
                    .set_version_id(object.version_id.clone())
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DocumentError::storage(format!("invalid object identifier: {}", e)))?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .build()
            .map_err(|e| DocumentError::storage(format!("invalid delete request: {}", e)))?;

        debug!("delete {} object(s) from bucket {}", objects.len(), self.bucket);
        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| DocumentError::storage(format!("delete objects: {}", e)))?;
        Ok(())
    }
}

/// Factory building one [`S3Storage`] per organization configuration.
#[derive(Debug, Clone)]
pub struct S3StorageFactory {
    cipher: CredentialCipher,
}

impl S3StorageFactory {
    pub fn new(cipher: CredentialCipher) -> Self {
        Self { cipher }
    }
}

impl ObjectStorageFactory for S3StorageFactory {
    fn connect(&self, config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStorage>> {
        Ok(Arc::new(S3Storage::new(config, &self.cipher)?))
    }
}
