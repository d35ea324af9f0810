use std::{ops::Deref, time::Duration};

use bytes::Bytes;
use opendal::{Configurator, ErrorKind, Operator, layers::LoggingLayer};
use uuid::Uuid;

use crate::{entity::photo_key, error::Result};

pub use opendal::services::S3Config;

/// How long a signed photo URL stays valid.
pub static EXPIRE_AT: Duration = Duration::from_secs(3600);

/// The blob store holding one photo per entity.
pub struct Storage {
    operator: Operator,
    public_base_url: Option<String>,
}

impl Storage {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            public_base_url: None,
        }
    }

    pub fn from_config(config: S3Config) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let client = config.into_builder();

        let operator = Operator::new(client)
            .context("Failed to build OpenDAL operator for S3")?
            .layer(LoggingLayer::default())
            .finish();

        Ok(Self::new(operator))
    }

    /// A storage kept in memory, for tests.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn memory() -> anyhow::Result<Self> {
        let operator = Operator::new(opendal::services::Memory::default())?
            .layer(LoggingLayer::default())
            .finish();

        Ok(Self::new(operator))
    }

    /// Serve the photos from `base_url` instead of signing a URL for each read.
    ///
    /// It is meant for buckets that are public or sit behind a CDN.
    pub fn with_public_base_url(mut self, base_url: Option<String>) -> Self {
        self.public_base_url = base_url.map(|url| url.trim_end_matches('/').to_string());
        self
    }
}

impl Storage {
    /// Put the photo of the entity `id` to the storage.
    #[tracing::instrument(skip(self, photo), fields(size = photo.len()))]
    pub async fn put_photo(&self, id: Uuid, photo: Bytes, content_type: &str) -> Result<()> {
        let key = photo_key(id);

        if self
            .operator
            .info()
            .full_capability()
            .write_with_content_type
        {
            self.operator
                .write_with(&key, photo)
                .content_type(content_type)
                .await?;
        } else {
            self.operator.write(&key, photo).await?;
        }

        Ok(())
    }

    /// Read the photo of the entity `id`.
    ///
    /// Returning `None` if there is no such photo.
    #[tracing::instrument(skip(self))]
    pub async fn read_photo(&self, id: Uuid) -> Result<Option<Bytes>> {
        match self.operator.read(&photo_key(id)).await {
            Ok(buffer) => Ok(Some(buffer.to_bytes())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Get a URL the clients can read the photo of the entity `id` from.
    ///
    /// Note that a signed URL expires in 1 hour. Therefore, clients should
    /// not save it and always get the URL from the entity again.
    pub async fn photo_url(&self, id: Uuid) -> Result<String> {
        let key = photo_key(id);

        if let Some(base_url) = &self.public_base_url {
            return Ok(format!("{base_url}/{key}"));
        }

        let request = self.operator.presign_read(&key, EXPIRE_AT).await?;

        Ok(request.uri().to_string())
    }
}

impl Deref for Storage {
    type Target = Operator;

    fn deref(&self) -> &Self::Target {
        &self.operator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_read_photo() {
        let storage = Storage::memory().unwrap();
        let id = Uuid::new_v4();

        assert!(storage.read_photo(id).await.unwrap().is_none());

        let photo = Bytes::from_static(b"\x89PNG\r\n\x1a\nfake");
        storage
            .put_photo(id, photo.clone(), "image/png")
            .await
            .unwrap();

        assert_eq!(storage.read_photo(id).await.unwrap(), Some(photo));
    }

    #[tokio::test]
    async fn test_public_photo_url() {
        let storage = Storage::memory()
            .unwrap()
            .with_public_base_url(Some("https://cdn.example/photos/".to_string()));
        let id = Uuid::new_v4();

        assert_eq!(
            storage.photo_url(id).await.unwrap(),
            format!("https://cdn.example/photos/{id}")
        );
    }

    #[tokio::test]
    async fn test_memory_storage_cannot_sign() {
        let storage = Storage::memory().unwrap();

        assert!(storage.photo_url(Uuid::new_v4()).await.is_err());
    }
}
