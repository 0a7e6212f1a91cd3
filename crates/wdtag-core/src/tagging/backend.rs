//! Inference backends.
//!
//! The tagger treats the model as an opaque function from a prepared tensor to
//! one score per label. [`OnnxBackend`] runs a WD tagger export through ONNX
//! Runtime; any `Fn(&PreparedTensor) -> Result<ScoreVector, _>` closure is also
//! a backend, which is how tests and custom runtimes plug in.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;

use crate::error::{LoadError, PipelineError};

use super::preprocess::PreparedTensor;

/// Raw per-label scores, index-aligned with the label table.
pub type ScoreVector = Vec<f32>;

/// Something that turns a prepared tensor into raw label scores.
pub trait InferenceBackend: Send + Sync {
    /// Run the model on a (1, size, size, 3) tensor and return the first output row.
    fn infer(&self, tensor: &PreparedTensor) -> Result<ScoreVector, PipelineError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> InferenceBackend for F
where
    F: Fn(&PreparedTensor) -> Result<ScoreVector, PipelineError> + Send + Sync,
{
    fn infer(&self, tensor: &PreparedTensor) -> Result<ScoreVector, PipelineError> {
        self(tensor)
    }
}

/// ONNX Runtime session for a WD tagger model.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct OnnxBackend {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    accelerated: bool,
}

impl OnnxBackend {
    /// Load a WD tagger model from an ONNX file.
    ///
    /// With `prefer_accelerated`, the CUDA execution provider is registered
    /// ahead of CPU when the crate is built with the `cuda` feature; ONNX
    /// Runtime falls back to CPU on machines without a usable GPU.
    pub fn load(model_path: &Path, prefer_accelerated: bool) -> Result<Self, LoadError> {
        if !model_path.exists() {
            return Err(LoadError::ModelNotFound(model_path.to_path_buf()));
        }

        let model_err = |message: String| LoadError::Model {
            path: model_path.to_path_buf(),
            message,
        };

        let builder = Session::builder()
            .map_err(|e| model_err(format!("Failed to create ONNX session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| model_err(format!("Failed to set optimization level: {e}")))?;

        let (builder, accelerated) = if prefer_accelerated {
            Self::register_accelerated(builder)
                .map_err(|e| model_err(format!("Failed to register execution providers: {e}")))?
        } else {
            (builder, false)
        };

        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| model_err(format!("Failed to load ONNX model: {e}")))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input".to_string());

        tracing::debug!(
            "Loaded tagger model from {:?} (input: {:?}, outputs: {:?}, accelerated: {})",
            model_path,
            input_name,
            session
                .outputs()
                .iter()
                .map(|o| o.name())
                .collect::<Vec<_>>(),
            accelerated
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            accelerated,
        })
    }

    #[cfg(feature = "cuda")]
    fn register_accelerated(
        builder: ort::session::builder::SessionBuilder,
    ) -> Result<(ort::session::builder::SessionBuilder, bool), String> {
        use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};

        let providers = vec![
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ];
        let builder = builder
            .with_execution_providers(providers)
            .map_err(|e| e.to_string())?;
        Ok((builder, true))
    }

    #[cfg(not(feature = "cuda"))]
    fn register_accelerated(
        builder: ort::session::builder::SessionBuilder,
    ) -> Result<(ort::session::builder::SessionBuilder, bool), String> {
        tracing::debug!("Accelerated inference requested but built without `cuda`; using CPU");
        Ok((builder, false))
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, tensor: &PreparedTensor) -> Result<ScoreVector, PipelineError> {
        let inference_err = |message: String| PipelineError::Inference { message };

        // Convert ndarray to (shape, flat_data) for ort.
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = tensor.iter().copied().collect();

        let input_value = Value::from_array((shape, flat_data))
            .map_err(|e| inference_err(format!("Failed to create input tensor: {e}")))?;

        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let mut session = self
            .session
            .lock()
            .map_err(|e| inference_err(format!("Session lock poisoned: {e}")))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| inference_err(format!("ONNX inference failed: {e}")))?;

        let (_, first) = outputs
            .iter()
            .next()
            .ok_or_else(|| inference_err("Model produced no outputs".to_string()))?;

        let (out_shape, data) = first
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_err(format!("Failed to extract output tensor: {e}")))?;

        first_row(&out_shape, data)
    }

    fn name(&self) -> &str {
        if self.accelerated {
            "onnx-cuda"
        } else {
            "onnx-cpu"
        }
    }
}

/// Take the first batch row from a `[N, classes]` or `[classes]` output.
fn first_row(shape: &[i64], data: &[f32]) -> Result<ScoreVector, PipelineError> {
    match shape.len() {
        1 => Ok(data.to_vec()),
        2 => {
            let dim = shape[1].max(0) as usize;
            data.get(..dim)
                .map(|row| row.to_vec())
                .ok_or_else(|| PipelineError::Inference {
                    message: format!(
                        "Output shape {:?} does not match {} values",
                        shape,
                        data.len()
                    ),
                })
        }
        _ => Err(PipelineError::Inference {
            message: format!("Unexpected output shape: {:?}", shape),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_first_row_from_batch_output() {
        let data = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let row = first_row(&[2, 3], &data).unwrap();
        assert_eq!(row, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_first_row_flat_output() {
        let row = first_row(&[3], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(row, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_first_row_rejects_bad_shapes() {
        assert!(first_row(&[1, 4], &[1.0, 2.0]).is_err());
        assert!(first_row(&[1, 2, 2], &[0.0; 4]).is_err());
    }

    #[test]
    fn test_closure_is_a_backend() {
        let backend = |t: &PreparedTensor| -> Result<ScoreVector, PipelineError> {
            Ok(vec![t[[0, 0, 0, 0]]; 2])
        };
        let tensor = Array4::<f32>::from_elem((1, 2, 2, 3), 7.0);
        assert_eq!(backend.infer(&tensor).unwrap(), vec![7.0, 7.0]);
        assert_eq!(InferenceBackend::name(&backend), "custom");
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxBackend::load(&dir.path().join("model.onnx"), false);
        assert!(matches!(result, Err(LoadError::ModelNotFound(_))));
    }
}
