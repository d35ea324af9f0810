use std::net::SocketAddr;

use entity_common::{QueueConfig, S3Config, config::load_config};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// The PostgreSQL database holding the entity table.
    pub database_url: String,
    /// The NATS server the photos are queued to.
    pub nats_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// The origins a browser may call the API from.
    ///
    /// CORS is disabled when it is empty.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Serve the photos from this URL instead of signing a URL for each read.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

pub fn parse_config() -> anyhow::Result<ApiConfig> {
    let config: ApiConfig = load_config()?;

    if config.s3.bucket.is_empty() {
        anyhow::bail!("You should define the KEYPER_S3__BUCKET. S3 is required for storing the photos.");
    }

    Ok(config)
}
