//! Core data types produced by the tagger.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A tag with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Display name (underscores replaced by spaces, except kaomoji)
    pub name: String,

    /// Score after the optional sigmoid and TTA merge
    pub score: f32,
}

impl Tag {
    /// Create a new tag with the given name and score.
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// Result of post-processing one score vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// General and character tags above threshold, sorted descending, capped
    pub tags: Vec<Tag>,

    /// Rating scores, sorted descending. Never part of `tags`.
    pub ratings: Vec<Tag>,
}

impl Prediction {
    /// The highest-scoring rating, if the label table has any.
    pub fn top_rating(&self) -> Option<&Tag> {
        self.ratings.first()
    }

    /// Tag names joined for a caption file.
    pub fn caption(&self, separator: &str) -> String {
        crate::output::caption_text(&self.tags, separator)
    }
}

/// Output record for one image of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path to the source file
    pub file_path: PathBuf,

    /// Just the filename portion
    pub file_name: String,

    /// BLAKE3 hash for skip-existing detection
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_hash: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Final tag list; empty when the image failed
    pub tags: Vec<Tag>,

    /// Rating scores
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ratings: Vec<Tag>,

    /// Error message when the image could not be tagged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageRecord {
    /// An empty record for an image that failed to process.
    pub fn failed(path: PathBuf, message: impl Into<String>) -> Self {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self {
            file_path: path,
            file_name,
            content_hash: String::new(),
            width: 0,
            height: 0,
            tags: Vec::new(),
            ratings: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Whether the image was tagged successfully.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchSummary {
    /// Images tagged successfully
    pub succeeded: usize,

    /// Images that failed
    pub failed: usize,

    /// Images skipped (already tagged)
    pub skipped: usize,

    /// Whether TTA ran for this batch
    pub tta_applied: bool,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

impl BatchSummary {
    /// Processing rate in images per second.
    pub fn images_per_second(&self) -> f64 {
        if self.total_seconds > 0.0 {
            (self.succeeded + self.failed) as f64 / self.total_seconds
        } else {
            0.0
        }
    }
}
