//! WD tagger inference pipeline.
//!
//! Converts an image into scored tags in four stages:
//!
//! ```text
//! LabelTable ─┐
//! Image → Preprocessor → InferenceBackend → postprocess → Prediction
//!                 └── flipped pass (TTA) ──┘
//! ```

pub mod backend;
pub mod labels;
pub mod postprocess;
pub mod preprocess;
pub mod session;
pub mod tta;

pub use backend::{InferenceBackend, OnnxBackend, ScoreVector};
pub use labels::{Category, LabelTable};
pub use postprocess::{postprocess, CategoryRule};
pub use preprocess::{prepare, PreparedTensor, Preprocessor};
pub use session::TaggerSession;
pub use tta::{merge_scores, tta_active, tta_for_batch};
