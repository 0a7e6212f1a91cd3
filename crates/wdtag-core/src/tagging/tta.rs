//! Test-time augmentation: merging score vectors from augmented passes.

use crate::config::{MergeMode, PerfTier, TaggerConfig};
use crate::error::PipelineError;

use super::backend::ScoreVector;

/// Batches larger than this skip TTA under the speed tier.
pub const SPEED_TIER_TTA_BATCH_LIMIT: usize = 10;

/// Merge two score vectors element-wise.
pub fn merge_scores(
    a: &[f32],
    b: &[f32],
    mode: MergeMode,
) -> Result<ScoreVector, PipelineError> {
    if a.len() != b.len() {
        return Err(PipelineError::Inference {
            message: format!(
                "TTA passes returned different lengths ({} vs {})",
                a.len(),
                b.len()
            ),
        });
    }
    let merged = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| match mode {
            MergeMode::Mean => (x + y) / 2.0,
            MergeMode::Max => x.max(y),
        })
        .collect();
    Ok(merged)
}

/// Whether an augmented pass will actually run for an image.
///
/// TTA needs both the flag and an augmentation to apply; horizontal flip is
/// currently the only one.
pub fn tta_active(config: &TaggerConfig) -> bool {
    config.tta_enabled && config.tta_horizontal_flip
}

/// Decide TTA for a whole batch of `batch_len` images.
///
/// The speed tier trades accuracy for throughput on large batches.
pub fn tta_for_batch(config: &TaggerConfig, batch_len: usize) -> bool {
    if !tta_active(config) {
        return false;
    }
    if config.perf_tier == PerfTier::Speed && batch_len > SPEED_TIER_TTA_BATCH_LIMIT {
        tracing::info!(
            "Speed tier: TTA disabled for this batch of {} images (limit {})",
            batch_len,
            SPEED_TIER_TTA_BATCH_LIMIT
        );
        return false;
    }
    true
}
