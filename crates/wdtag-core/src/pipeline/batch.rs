//! Sequential batch tagging with per-image error recovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::tagging::{tta_for_batch, TaggerSession};
use crate::types::{BatchSummary, ImageRecord};

use super::decode::ImageDecoder;
use super::hash::Hasher;

/// Notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Sent after every image, whatever its outcome
    Progress { completed: usize, total: usize },
    /// An image could not be tagged; an empty record was stored for it
    Failed { path: PathBuf, message: String },
    /// An image was skipped because its hash was already known
    Skipped { path: PathBuf },
}

/// Tags a list of files one after another.
pub struct BatchTagger<'a> {
    session: &'a TaggerSession,
    decoder: ImageDecoder,
    skip_hashes: HashSet<String>,
    include_ratings: bool,
}

impl<'a> BatchTagger<'a> {
    pub fn new(session: &'a TaggerSession, limits: LimitsConfig) -> Self {
        Self {
            session,
            decoder: ImageDecoder::new(limits),
            skip_hashes: HashSet::new(),
            include_ratings: true,
        }
    }

    /// Skip files whose content hash is in `hashes`.
    pub fn with_skip_hashes(mut self, hashes: HashSet<String>) -> Self {
        self.skip_hashes = hashes;
        self
    }

    /// Keep or drop rating scores in the produced records.
    pub fn with_ratings(mut self, include: bool) -> Self {
        self.include_ratings = include;
        self
    }

    /// Decode and tag a single file.
    pub fn tag_file(&self, path: &Path, tta: bool) -> Result<ImageRecord, PipelineError> {
        let start = Instant::now();

        let decoded = self.decoder.decode_file(path)?;
        tracing::trace!("  Decode: {:?}", start.elapsed());

        let infer_start = Instant::now();
        let prediction = self.session.tag_image_with(&decoded.image, tta)?;
        tracing::trace!("  Inference + postprocess: {:?}", infer_start.elapsed());

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(
            "Tagged {:?} in {:?} ({:?}, {}x{}, {} tags)",
            file_name,
            start.elapsed(),
            decoded.format,
            decoded.width,
            decoded.height,
            prediction.tags.len()
        );

        Ok(ImageRecord {
            file_path: path.to_path_buf(),
            file_name,
            content_hash: decoded.content_hash,
            width: decoded.width,
            height: decoded.height,
            tags: prediction.tags,
            ratings: if self.include_ratings {
                prediction.ratings
            } else {
                Vec::new()
            },
            error: None,
        })
    }

    /// Tag every path in order.
    ///
    /// Failures are logged, reported through `on_event` and recorded as an
    /// empty result; the loop always continues with the next image. Skipped
    /// files produce no record and do not count towards the TTA batch size.
    pub fn run<F>(&self, paths: &[PathBuf], mut on_event: F) -> (Vec<ImageRecord>, BatchSummary)
    where
        F: FnMut(BatchEvent),
    {
        let total = paths.len();
        let known: Vec<bool> = paths.iter().map(|p| self.is_known(p)).collect();
        let to_tag = known.iter().filter(|k| !**k).count();
        let tta = tta_for_batch(self.session.config(), to_tag);
        let start = Instant::now();

        let mut summary = BatchSummary {
            tta_applied: tta,
            ..Default::default()
        };
        let mut records = Vec::with_capacity(to_tag);

        for (i, (path, is_known)) in paths.iter().zip(known).enumerate() {
            if is_known {
                summary.skipped += 1;
                on_event(BatchEvent::Skipped { path: path.clone() });
            } else {
                match self.tag_file(path, tta) {
                    Ok(record) => {
                        summary.succeeded += 1;
                        records.push(record);
                    }
                    Err(e) => {
                        summary.failed += 1;
                        tracing::error!("Failed: {:?} - {}", path, e);
                        let message = e.to_string();
                        records.push(ImageRecord::failed(path.clone(), message.clone()));
                        on_event(BatchEvent::Failed {
                            path: path.clone(),
                            message,
                        });
                    }
                }
            }

            on_event(BatchEvent::Progress {
                completed: i + 1,
                total,
            });
        }

        summary.total_seconds = start.elapsed().as_secs_f64();
        (records, summary)
    }

    fn is_known(&self, path: &Path) -> bool {
        if self.skip_hashes.is_empty() {
            return false;
        }
        Hasher::content_hash(path)
            .map(|hash| self.skip_hashes.contains(&hash))
            .unwrap_or(false)
    }
}
