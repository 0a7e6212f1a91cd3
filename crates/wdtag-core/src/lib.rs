//! wdtag core - WD tagger inference as an embeddable library.
//!
//! Turns an image into scored, thresholded tags using a WD-family ONNX
//! classifier and its `selected_tags.csv` label table. Everything here is
//! synchronous; callers that need concurrency share a [`TaggerSession`]
//! behind an `Arc` or run batches on a blocking thread.
//!
//! # Architecture
//!
//! ```text
//! Image → Preprocess (pad, resize, BGR) → Model → Sigmoid? → Thresholds / MCut → Prediction
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use wdtag_core::{Config, TaggerSession};
//!
//! fn main() -> wdtag_core::Result<()> {
//!     let config = Config::load()?;
//!     let session = TaggerSession::from_config(&config)?;
//!
//!     let image = image::open("./image.png").expect("readable image");
//!     let prediction = session.tag_image(&image)?;
//!     println!("{}", prediction.caption(", "));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod tagging;
pub mod types;

pub use config::{Config, MergeMode, PerfTier, TaggerConfig};
pub use error::{ConfigError, LoadError, PipelineError, Result, TaggerError};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{BatchEvent, BatchTagger, FileDiscovery, Hasher, ImageDecoder};
pub use tagging::{Category, InferenceBackend, LabelTable, OnnxBackend, TaggerSession};
pub use types::{BatchSummary, ImageRecord, Prediction, Tag};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
