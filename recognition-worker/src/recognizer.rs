use std::sync::Arc;

use anyhow::Context as _;
use entity_common::{AnalysisResult, EntityTable, Storage};
use uuid::Uuid;

use crate::analyzer::{BoundingBox, ImageAnalysis, ImageAnalyzer};

/// The tag names that mean a key is in the photo.
const KEY_TAGS: [&str; 2] = ["key", "keys"];

/// The label of a detected object that is tagged as a key.
const KEY_LABEL: &str = "keys";

fn is_key_tag(name: &str) -> bool {
    KEY_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

fn located(bounding_box: BoundingBox, label: String, confidence: f64) -> AnalysisResult {
    let BoundingBox { x, y, w, h } = bounding_box;

    AnalysisResult {
        x,
        y,
        w,
        h,
        label,
        confidence,
    }
}

/// Pick the keys out of what the vision service found.
///
/// The results are, in order: the objects tagged as a key, the image tags
/// naming a key (without a bounding box), and the dense captions mentioning
/// a key.
pub fn detect_keys(analysis: &ImageAnalysis) -> Vec<AnalysisResult> {
    let objects = analysis.objects.values.iter().filter_map(|object| {
        let confidence = object
            .tags
            .iter()
            .filter(|tag| is_key_tag(&tag.name))
            .map(|tag| tag.confidence)
            .reduce(f64::max)?;

        Some(located(object.bounding_box, KEY_LABEL.to_string(), confidence))
    });

    let tags = analysis
        .tags
        .values
        .iter()
        .filter(|tag| is_key_tag(&tag.name))
        .map(|tag| AnalysisResult::tag(tag.name.clone(), tag.confidence));

    let captions = analysis
        .dense_captions
        .values
        .iter()
        .filter(|caption| caption.text.to_lowercase().contains("key"))
        .map(|caption| located(caption.bounding_box, caption.text.clone(), caption.confidence));

    objects.chain(tags).chain(captions).collect()
}

/// What became of a queued photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The entity is processed, with this many keys found.
    Processed(usize),
    /// There was nothing to do.
    Skipped(&'static str),
}

#[derive(Clone)]
pub struct RecognitionWorker {
    table: Arc<dyn EntityTable>,
    storage: Arc<Storage>,
    analyzer: Arc<dyn ImageAnalyzer>,
}

impl RecognitionWorker {
    pub fn new(
        table: Arc<dyn EntityTable>,
        storage: Arc<Storage>,
        analyzer: Arc<dyn ImageAnalyzer>,
    ) -> Self {
        Self {
            table,
            storage,
            analyzer,
        }
    }

    /// Analyze the photo of the entity `id` and record the keys found in it.
    ///
    /// An entity is processed once. The queue may deliver a photo more than
    /// once, so a processed entity is skipped.
    #[tracing::instrument(skip(self))]
    pub async fn recognize(&self, id: Uuid) -> anyhow::Result<Outcome> {
        tracing::info!("Recognizing entity {id}…");

        let Some(mut entity) = self.table.get(id).await? else {
            tracing::warn!("There is no entity {id}; skipping.");
            return Ok(Outcome::Skipped("no such entity"));
        };

        if entity.is_processed() {
            tracing::info!("Entity {id} is already processed; skipping.");
            return Ok(Outcome::Skipped("already processed"));
        }

        let photo = self
            .storage
            .read_photo(id)
            .await?
            .with_context(|| format!("the photo of entity {id} is missing"))?;

        let analysis = self.analyzer.analyze(photo).await?;
        let results = detect_keys(&analysis);

        tracing::info!("Recognized! Found {} keys.", results.len());
        for result in &results {
            tracing::debug!("Key: {:?}", result);
        }

        entity.process(results)?;
        self.table.upsert(&entity).await?;

        Ok(Outcome::Processed(entity.results.len()))
    }
}
