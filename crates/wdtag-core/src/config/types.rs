//! Sub-configuration structs and their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,

    /// Model name; artifacts live in `{model_dir}/{model}/`
    pub model: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.wdtag/models"),
            model: "wd-swinv2-tagger-v3".to_string(),
        }
    }
}

/// How two TTA score vectors are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Element-wise average
    #[default]
    Mean,
    /// Element-wise maximum
    Max,
}

/// Throughput/accuracy trade-off preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerfTier {
    /// Disables TTA on large batches
    Speed,
    #[default]
    Balanced,
    Quality,
}

/// Tagger settings read by every inference call.
///
/// Field names match the JSON settings object exported alongside projects,
/// so a `TaggerConfig` can be read from either the TOML config file or such
/// a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Minimum score for general tags (exclusive)
    pub general_threshold: f32,

    /// Minimum score for character tags (exclusive)
    pub character_threshold: f32,

    /// Maximum number of returned tags; 0 means unlimited
    pub max_tags: usize,

    /// Use the MCut adaptive threshold for general tags
    pub general_mcut_enabled: bool,

    /// Use the MCut adaptive threshold for character tags
    pub character_mcut_enabled: bool,

    /// Clamp the general MCut threshold to at least `general_mcut_min`
    pub general_mcut_min_enabled: bool,

    pub general_mcut_min: f32,

    /// Clamp the character MCut threshold to at least `character_mcut_min`
    pub character_mcut_min_enabled: bool,

    pub character_mcut_min: f32,

    /// Map raw scores through the logistic function before thresholding
    pub apply_sigmoid: bool,

    /// Run a second, augmented pass and merge the scores
    pub tta_enabled: bool,

    /// Use a horizontal flip as the TTA augmentation
    pub tta_horizontal_flip: bool,

    pub tta_merge_mode: MergeMode,

    pub perf_tier: PerfTier,

    /// Square input side length expected by the model
    pub target_size: u32,

    /// Background used for alpha compositing and letterbox padding
    pub pad_color: [u8; 3],

    /// Try a GPU execution provider before falling back to CPU
    pub prefer_accelerated: bool,

    /// Tags never returned, by display or raw name
    pub exclude_tags: Vec<String>,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            general_threshold: 0.35,
            character_threshold: 0.85,
            max_tags: 0,
            general_mcut_enabled: false,
            character_mcut_enabled: false,
            general_mcut_min_enabled: false,
            general_mcut_min: 0.0,
            character_mcut_min_enabled: false,
            character_mcut_min: 0.15,
            apply_sigmoid: false,
            tta_enabled: false,
            tta_horizontal_flip: true,
            tta_merge_mode: MergeMode::Mean,
            perf_tier: PerfTier::Balanced,
            target_size: 448,
            pad_color: [255, 255, 255],
            prefer_accelerated: true,
            exclude_tags: Vec::new(),
        }
    }
}

impl TaggerConfig {
    /// Parse a JSON settings object. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TaggerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to the JSON settings object.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Supported input formats
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
                "gif".to_string(),
                "bmp".to_string(),
                "tiff".to_string(),
            ],
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,

    /// Include rating scores in output records
    pub include_ratings: bool,

    /// Separator used when writing caption sidecar files
    pub caption_separator: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: false,
            include_ratings: true,
            caption_separator: ", ".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
