use async_nats::jetstream::{
    self,
    consumer::{PullConsumer, pull},
    stream::{self, RetentionPolicy},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Where the uploaded photos are queued for recognition.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// The JetStream stream holding the pending photos.
    pub stream: String,
    /// The subject a message is published to for every uploaded photo.
    pub subject: String,
    /// The durable consumer the recognition workers share.
    pub consumer: String,
    /// How many times a message is delivered before it is given up.
    pub max_deliver: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stream: "PHOTOS".to_string(),
            subject: "photos.uploaded".to_string(),
            consumer: "recognition-worker".to_string(),
            max_deliver: 5,
        }
    }
}

/// The queue of photos waiting for recognition.
#[async_trait::async_trait]
pub trait PhotoQueue: Send + Sync {
    /// Queue the entity `id` for recognition.
    async fn enqueue(&self, id: Uuid) -> Result<()>;
}

/// Decode the entity ID carried by a queue message.
pub fn decode_message(payload: &[u8]) -> anyhow::Result<Uuid> {
    let payload = std::str::from_utf8(payload)?;
    let id = Uuid::parse_str(payload.trim())?;

    Ok(id)
}

#[derive(Clone)]
pub struct JetStreamQueue {
    context: jetstream::Context,
    config: QueueConfig,
}

impl JetStreamQueue {
    /// Connect to NATS and create the work-queue stream if it does not exist yet.
    pub async fn connect(nats_url: &str, config: QueueConfig) -> Result<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|err| Error::Queue(format!("failed to connect to NATS: {err}")))?;

        let queue = Self {
            context: jetstream::new(client),
            config,
        };
        queue.ensure().await?;

        Ok(queue)
    }

    async fn ensure(&self) -> Result<stream::Stream> {
        self.context
            .get_or_create_stream(stream::Config {
                name: self.config.stream.clone(),
                subjects: vec![self.config.subject.clone()],
                retention: RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|err| Error::Queue(format!("failed to create the photo stream: {err}")))
    }

    /// Get the durable pull consumer the recognition workers share.
    pub async fn consumer(&self) -> Result<PullConsumer> {
        let stream = self.ensure().await?;

        stream
            .get_or_create_consumer(
                &self.config.consumer,
                pull::Config {
                    durable_name: Some(self.config.consumer.clone()),
                    max_deliver: self.config.max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| Error::Queue(format!("failed to create the photo consumer: {err}")))
    }
}

#[async_trait::async_trait]
impl PhotoQueue for JetStreamQueue {
    #[tracing::instrument(skip(self))]
    async fn enqueue(&self, id: Uuid) -> Result<()> {
        let payload = id.hyphenated().to_string();

        // wait for the stream to persist the message
        self.context
            .publish(self.config.subject.clone(), payload.into())
            .await
            .map_err(|err| Error::Queue(format!("failed to publish the photo: {err}")))?
            .await
            .map_err(|err| Error::Queue(format!("the photo was not acknowledged: {err}")))?;

        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryQueue;

#[cfg(any(test, feature = "test-utils"))]
mod memory {
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::PhotoQueue;
    use crate::error::Result;

    /// A queue kept in memory, for tests.
    #[derive(Default)]
    pub struct MemoryQueue {
        messages: Mutex<Vec<Uuid>>,
    }

    impl MemoryQueue {
        pub fn new() -> Self {
            Self::default()
        }

        /// The queued entity IDs, oldest first.
        pub async fn messages(&self) -> Vec<Uuid> {
            self.messages.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl PhotoQueue for MemoryQueue {
        async fn enqueue(&self, id: Uuid) -> Result<()> {
            self.messages.lock().await.push(id);

            Ok(())
        }
    }
}
