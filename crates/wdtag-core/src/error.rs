//! Error types for the wdtag tagging pipeline.
//!
//! Errors are split by how fatal they are: configuration and load errors stop
//! everything, pipeline errors affect a single image and are recovered by the
//! batch loop.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for wdtag operations.
#[derive(Error, Debug)]
pub enum TaggerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model or label table could not be loaded
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Per-image pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse a JSON tagger settings object
    #[error("Failed to parse tagger settings: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Fatal errors raised while loading the label table or the model.
///
/// A load error never leaves a partially built table or session behind.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Label file does not exist
    #[error("Label file not found: {0}")]
    LabelsNotFound(PathBuf),

    /// Label file exists but cannot be used
    #[error("Invalid label file {path}: {message}")]
    Labels { path: PathBuf, message: String },

    /// Model file does not exist
    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    /// Model file exists but the runtime rejected it
    #[error("Failed to load model {path}: {message}")]
    Model { path: PathBuf, message: String },
}

/// Per-image pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Preprocessing produced an unusable tensor
    #[error("Preprocessing failed: {message}")]
    Preprocess { message: String },

    /// The inference engine failed or returned an unexpected output
    #[error("Inference failed: {message}")]
    Inference { message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Convenience type alias for wdtag results.
pub type Result<T> = std::result::Result<T, TaggerError>;
