use anyhow::Context as _;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

/// The Image Analysis API version the analyzer speaks.
const API_VERSION: &str = "2024-02-01";

/// The visual features requested for every photo.
const FEATURES: &str = "tags,objects,denseCaptions";

/// A service that describes what is in a photo.
#[async_trait::async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, photo: Bytes) -> anyhow::Result<ImageAnalysis>;
}

/// What the vision service found in a photo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageAnalysis {
    #[serde(rename = "objectsResult", default)]
    pub objects: Detected<DetectedObject>,
    #[serde(rename = "tagsResult", default)]
    pub tags: Detected<Tag>,
    #[serde(rename = "denseCaptionsResult", default)]
    pub dense_captions: Detected<DenseCaption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Detected<T> {
    pub values: Vec<T>,
}

impl<T> Default for Detected<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

/// A rectangle in the photo, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedObject {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenseCaption {
    pub text: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

/// The Azure AI Vision Image Analysis service.
#[derive(Clone)]
pub struct AzureVisionAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    key: String,
}

impl AzureVisionAnalyzer {
    pub fn new(endpoint: &str, key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key,
        }
    }

    fn analyze_url(&self) -> String {
        format!("{}/computervision/imageanalysis:analyze", self.endpoint)
    }
}

#[async_trait::async_trait]
impl ImageAnalyzer for AzureVisionAnalyzer {
    #[tracing::instrument(skip(self, photo), fields(size = photo.len()))]
    async fn analyze(&self, photo: Bytes) -> anyhow::Result<ImageAnalysis> {
        let response = self
            .client
            .post(self.analyze_url())
            .query(&[("api-version", API_VERSION), ("features", FEATURES)])
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(photo)
            .send()
            .await
            .context("Failed to reach the vision service")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("The vision service rejected the photo ({status}): {body}");
        }

        response
            .json()
            .await
            .context("Failed to parse the analysis of the vision service")
    }
}
