use entity_common::{QueueConfig, S3Config, config::load_config};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RecognitionConfig {
    /// The PostgreSQL database holding the entity table.
    pub database_url: String,
    /// The NATS server the photos are queued to.
    pub nats_url: String,
    pub vision: VisionConfig,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// The Azure AI Vision resource analyzing the photos.
#[derive(Deserialize)]
pub struct VisionConfig {
    /// For example `https://<resource>.cognitiveservices.azure.com`.
    pub endpoint: String,
    pub key: String,
}

impl std::fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

pub fn parse_config() -> anyhow::Result<RecognitionConfig> {
    let config: RecognitionConfig = load_config()?;

    if config.s3.bucket.is_empty() {
        anyhow::bail!("You should define the KEYPER_S3__BUCKET. S3 is required for reading the photos.");
    }

    if config.vision.key.is_empty() {
        anyhow::bail!("You should define the KEYPER_VISION__KEY. The vision service is required for recognizing the keys.");
    }

    Ok(config)
}
