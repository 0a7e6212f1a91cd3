//! A loaded model plus its label table, ready to tag images.

use std::path::Path;

use image::DynamicImage;

use crate::config::{Config, TaggerConfig};
use crate::error::{LoadError, PipelineError, TaggerError};
use crate::types::Prediction;

use super::backend::{InferenceBackend, OnnxBackend, ScoreVector};
use super::labels::LabelTable;
use super::postprocess::postprocess;
use super::preprocess::Preprocessor;
use super::tta::{merge_scores, tta_active};

/// Owns everything needed to tag images with one model.
///
/// Immutable after construction, so a session can be shared across threads
/// behind an `Arc`. Callers that switch models build a new session; there is
/// no global cache.
pub struct TaggerSession {
    labels: LabelTable,
    backend: Box<dyn InferenceBackend>,
    config: TaggerConfig,
    preprocessor: Preprocessor,
}

impl TaggerSession {
    /// Assemble a session from an already-loaded label table and backend.
    pub fn load(
        labels: LabelTable,
        backend: impl InferenceBackend + 'static,
        config: TaggerConfig,
    ) -> Result<Self, TaggerError> {
        config.validate()?;
        if labels.is_empty() {
            return Err(LoadError::Labels {
                path: Default::default(),
                message: "Label table is empty".to_string(),
            }
            .into());
        }
        tracing::debug!(
            "Tagger session ready: {} labels, backend {}, target size {}",
            labels.len(),
            backend.name(),
            config.target_size
        );
        Ok(Self {
            preprocessor: Preprocessor::from_config(&config),
            labels,
            backend: Box::new(backend),
            config,
        })
    }

    /// Load the label CSV and ONNX model from explicit paths.
    pub fn from_files(
        model_path: &Path,
        labels_path: &Path,
        config: TaggerConfig,
    ) -> Result<Self, TaggerError> {
        config.validate()?;
        let labels = LabelTable::load(labels_path)?;
        tracing::info!("Loading tagger model from {:?}", model_path);
        let backend = OnnxBackend::load(model_path, config.prefer_accelerated)?;
        tracing::info!("Tagger model loaded ({})", backend.name());
        Self::load(labels, backend, config)
    }

    /// Load the model configured in `[general]` with the `[tagger]` settings.
    pub fn from_config(config: &Config) -> Result<Self, TaggerError> {
        Self::from_files(
            &config.model_path(),
            &config.labels_path(),
            config.tagger.clone(),
        )
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Preprocess and run the model, merging a flipped pass when `tta` is set.
    pub fn scores(&self, image: &DynamicImage, tta: bool) -> Result<ScoreVector, PipelineError> {
        let tensor = self.preprocessor.prepare(image)?;
        let scores = self.backend.infer(&tensor)?;
        if !tta {
            return Ok(scores);
        }

        let flipped = self.preprocessor.prepare_flipped(image)?;
        let flipped_scores = self.backend.infer(&flipped)?;
        merge_scores(&scores, &flipped_scores, self.config.tta_merge_mode)
    }

    /// Tag one image using the session's TTA setting.
    pub fn tag_image(&self, image: &DynamicImage) -> Result<Prediction, PipelineError> {
        self.tag_image_with(image, tta_active(&self.config))
    }

    /// Tag one image with TTA explicitly on or off.
    ///
    /// Turning TTA on has no effect when no augmentation is configured.
    pub fn tag_image_with(
        &self,
        image: &DynamicImage,
        tta: bool,
    ) -> Result<Prediction, PipelineError> {
        let tta = tta && tta_active(&self.config);
        let scores = self.scores(image, tta)?;
        postprocess(
            &scores,
            &self.labels,
            &self.config,
            &self.config.exclude_tags,
        )
    }
}
