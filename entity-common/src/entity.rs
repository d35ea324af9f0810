use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// The coordinate used for every side of a result that carries no bounding box,
/// for example an image-level tag.
pub const NO_BOUNDING_BOX: i32 = -10;

/// The processing status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    /// The photo is stored and waits for the recognition worker.
    Uploaded,
    /// The recognition worker has recorded its results.
    Processed,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Uploaded => "uploaded",
            EntityStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(EntityStatus::Uploaded),
            "processed" => Ok(EntityStatus::Processed),
            other => Err(format!("unknown entity status: {other}")),
        }
    }
}

/// A key detected in a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The left edge of the bounding box, in pixels.
    pub x: i32,
    /// The top edge of the bounding box, in pixels.
    pub y: i32,
    /// The width of the bounding box, in pixels.
    pub w: i32,
    /// The height of the bounding box, in pixels.
    pub h: i32,
    /// What was detected.
    pub label: String,
    /// The confidence of the detection.
    ///
    /// It should be in the range of 0.0 to 1.0.
    pub confidence: f64,
}

impl AnalysisResult {
    /// A result that applies to the whole photo and has no bounding box.
    pub fn tag(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            x: NO_BOUNDING_BOX,
            y: NO_BOUNDING_BOX,
            w: NO_BOUNDING_BOX,
            h: NO_BOUNDING_BOX,
            label: label.into(),
            confidence,
        }
    }
}

/// A photo-analysis record.
///
/// An entity is created as [`EntityStatus::Uploaded`] when a photo is uploaded
/// and moves to [`EntityStatus::Processed`] exactly once, when the recognition
/// worker records its results. Entities are never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Uuid,
    pub status: EntityStatus,
    pub results: Vec<AnalysisResult>,
}

impl Entity {
    /// A freshly uploaded entity without results.
    pub fn uploaded(id: Uuid) -> Self {
        Self {
            id,
            status: EntityStatus::Uploaded,
            results: Vec::new(),
        }
    }

    /// Record the analysis results and mark the entity as processed.
    pub fn process(&mut self, results: Vec<AnalysisResult>) -> Result<()> {
        if self.is_processed() {
            return Err(Error::AlreadyProcessed(self.id));
        }

        self.status = EntityStatus::Processed;
        self.results = results;

        Ok(())
    }

    pub fn is_processed(&self) -> bool {
        self.status == EntityStatus::Processed
    }
}

/// The key of the photo of the entity `id` in the blob store.
pub fn photo_key(id: Uuid) -> String {
    id.hyphenated().to_string()
}

/// The representation of an entity returned to the clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResponse {
    pub id: Uuid,
    /// A temporary URL to the photo.
    ///
    /// Note that it expires. Always get the URL from a fresh response
    /// instead of saving it.
    pub url: String,
    pub status: EntityStatus,
    pub results: Vec<AnalysisResult>,
}

impl EntityResponse {
    pub fn new(entity: Entity, url: String) -> Self {
        Self {
            id: entity.id,
            url,
            status: entity.status,
            results: entity.results,
        }
    }
}

/// The body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub reason: String,
}

impl ErrorBody {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            reason: reason.into(),
        }
    }
}
