//! Category-based thresholding of raw model scores.
//!
//! Scores are split by label category. Ratings are reported separately and
//! never become tags; general and character tags each get their own static or
//! MCut threshold, are merged, filtered against the exclusion list, sorted and
//! capped.

use std::collections::{HashMap, HashSet};

use crate::config::TaggerConfig;
use crate::error::PipelineError;
use crate::math::{cmp_desc, mcut_threshold, sigmoid_in_place};
use crate::types::{Prediction, Tag};

use super::labels::LabelTable;

/// Threshold rule for one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryRule {
    /// Static threshold used when MCut is off or not applicable
    pub threshold: f32,
    /// Use the MCut adaptive threshold
    pub mcut: bool,
    /// Lower bound for the MCut threshold
    pub mcut_min: Option<f32>,
}

impl CategoryRule {
    pub fn general(config: &TaggerConfig) -> Self {
        Self {
            threshold: config.general_threshold,
            mcut: config.general_mcut_enabled,
            mcut_min: config
                .general_mcut_min_enabled
                .then_some(config.general_mcut_min),
        }
    }

    pub fn character(config: &TaggerConfig) -> Self {
        Self {
            threshold: config.character_threshold,
            mcut: config.character_mcut_enabled,
            mcut_min: config
                .character_mcut_min_enabled
                .then_some(config.character_mcut_min),
        }
    }

    /// Resolve the threshold for this category's scores.
    ///
    /// MCut needs at least two scores; otherwise the static threshold applies.
    pub fn resolve(&self, scores: &[f32]) -> f32 {
        if !self.mcut {
            return self.threshold;
        }
        match mcut_threshold(scores) {
            Some(t) => match self.mcut_min {
                Some(min) => t.max(min),
                None => t,
            },
            None => self.threshold,
        }
    }

    /// Indices from `indexes` whose score is strictly above the resolved threshold.
    fn keep(&self, indexes: &[usize], scores: &[f32]) -> Vec<usize> {
        let category_scores: Vec<f32> = indexes.iter().map(|&i| scores[i]).collect();
        let threshold = self.resolve(&category_scores);
        tracing::trace!(
            "Category threshold {:.4} (mcut: {}) over {} scores",
            threshold,
            self.mcut,
            category_scores.len()
        );
        indexes
            .iter()
            .copied()
            .filter(|&i| scores[i] > threshold)
            .collect()
    }
}

/// Turn a raw score vector into the final tag list and rating scores.
///
/// `scores` must have exactly one entry per label. When `apply_sigmoid` is
/// set every score is mapped through the logistic function before any
/// threshold comparison, so thresholds are read in probability space.
/// `exclude_tags` entries match either the display or the raw tag name.
pub fn postprocess(
    scores: &[f32],
    labels: &LabelTable,
    config: &TaggerConfig,
    exclude_tags: &[String],
) -> Result<Prediction, PipelineError> {
    if scores.len() != labels.len() {
        return Err(PipelineError::Inference {
            message: format!(
                "Model returned {} scores but the label table has {} entries",
                scores.len(),
                labels.len()
            ),
        });
    }

    let mut scores = scores.to_vec();
    if config.apply_sigmoid {
        sigmoid_in_place(&mut scores);
    }

    let names = labels.tag_names();

    let mut ratings: Vec<Tag> = labels
        .rating_indexes()
        .iter()
        .map(|&i| Tag::new(names[i].clone(), scores[i]))
        .collect();
    sort_tags(&mut ratings);

    let general = CategoryRule::general(config).keep(labels.general_indexes(), &scores);
    let character = CategoryRule::character(config).keep(labels.character_indexes(), &scores);

    // Character entries overwrite general ones on a name collision
    let mut merged: HashMap<usize, f32> = HashMap::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for i in general.into_iter().chain(character) {
        if let Some(prev) = by_name.insert(names[i].as_str(), i) {
            merged.remove(&prev);
        }
        merged.insert(i, scores[i]);
    }

    let excluded: HashSet<&str> = exclude_tags.iter().map(String::as_str).collect();
    let raw_names = labels.raw_names();
    let mut tags: Vec<Tag> = merged
        .into_iter()
        .filter(|(i, _)| {
            !excluded.contains(names[*i].as_str()) && !excluded.contains(raw_names[*i].as_str())
        })
        .map(|(i, score)| Tag::new(names[i].clone(), score))
        .collect();

    sort_tags(&mut tags);
    if config.max_tags > 0 {
        tags.truncate(config.max_tags);
    }

    Ok(Prediction { tags, ratings })
}

/// Sort by score descending, then by name for a stable order on ties.
fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|a, b| cmp_desc(a.score, b.score).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, i64)]) -> LabelTable {
        LabelTable::from_rows(rows.iter().map(|(n, c)| (n.to_string(), *c)))
    }

    fn static_config(general: f32, character: f32, max_tags: usize) -> TaggerConfig {
        TaggerConfig {
            general_threshold: general,
            character_threshold: character,
            max_tags,
            ..Default::default()
        }
    }

    fn names(prediction: &Prediction) -> Vec<&str> {
        prediction.tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let labels = table(&[
            ("solo", 0),
            ("1girl", 0),
            ("blue_eyes", 0),
            ("rating:safe", 9),
        ]);
        let config = static_config(0.4, 0.85, 2);
        let result = postprocess(&[0.9, 0.2, 0.5, 0.7], &labels, &config, &[]).unwrap();

        assert_eq!(
            result.tags,
            vec![Tag::new("solo", 0.9), Tag::new("blue eyes", 0.5)]
        );
        assert_eq!(result.ratings, vec![Tag::new("rating:safe", 0.7)]);
    }

    #[test]
    fn test_ratings_never_in_tags() {
        let labels = table(&[("general", 9), ("explicit", 9), ("solo", 0)]);
        let config = static_config(0.0, 0.0, 0);
        let result = postprocess(&[0.99, 0.98, 0.5], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["solo"]);
        assert_eq!(result.ratings.len(), 2);
        assert_eq!(result.top_rating().unwrap().name, "general");
    }

    #[test]
    fn test_threshold_is_strict() {
        let labels = table(&[("solo", 0), ("smile", 0)]);
        let config = static_config(0.5, 0.85, 0);
        let result = postprocess(&[0.5, 0.51], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["smile"]);
    }

    #[test]
    fn test_character_uses_own_threshold() {
        let labels = table(&[("solo", 0), ("hatsune_miku", 4), ("kagamine_rin", 4)]);
        let config = static_config(0.35, 0.85, 0);
        let result = postprocess(&[0.6, 0.9, 0.6], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["hatsune miku", "solo"]);
    }

    #[test]
    fn test_other_categories_ignored() {
        let labels = table(&[("some_artist", 1), ("solo", 0), ("meta_tag", 5)]);
        let config = static_config(0.0, 0.0, 0);
        let result = postprocess(&[0.99, 0.5, 0.99], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["solo"]);
        assert!(result.ratings.is_empty());
    }

    #[test]
    fn test_threshold_monotonicity() {
        let labels = table(&[
            ("a", 0),
            ("b", 0),
            ("c", 0),
            ("d", 0),
            ("e", 0),
            ("f", 4),
        ]);
        let scores = [0.95, 0.7, 0.55, 0.4, 0.1, 0.9];
        let mut previous = usize::MAX;
        for step in 0..=20 {
            let threshold = step as f32 / 20.0;
            let config = static_config(threshold, 0.5, 0);
            let result = postprocess(&scores, &labels, &config, &[]).unwrap();
            let general = result.tags.iter().filter(|t| t.name != "f").count();
            assert!(general <= previous, "count grew at threshold {threshold}");
            previous = general;
        }
    }

    #[test]
    fn test_exclusion_by_display_and_raw_name() {
        let labels = table(&[("solo", 0), ("simple_background", 0), ("white_background", 0)]);
        let config = static_config(0.1, 0.85, 0);
        let exclude = vec!["simple background".to_string(), "white_background".to_string()];
        let result = postprocess(&[0.9, 0.95, 0.99], &labels, &config, &exclude).unwrap();
        assert_eq!(names(&result), vec!["solo"]);
    }

    #[test]
    fn test_exclusion_applies_before_cap() {
        let labels = table(&[("a", 0), ("b", 0), ("c", 0)]);
        let config = static_config(0.1, 0.85, 2);
        let exclude = vec!["a".to_string()];
        let result = postprocess(&[0.9, 0.8, 0.7], &labels, &config, &exclude).unwrap();
        assert_eq!(names(&result), vec!["b", "c"]);
    }

    #[test]
    fn test_cap_and_unbounded() {
        let labels = table(&[("a", 0), ("b", 0), ("c", 0), ("d", 0)]);
        let scores = [0.9, 0.8, 0.7, 0.6];

        let capped = postprocess(&scores, &labels, &static_config(0.1, 0.85, 3), &[]).unwrap();
        assert_eq!(capped.tags.len(), 3);

        let unbounded = postprocess(&scores, &labels, &static_config(0.1, 0.85, 0), &[]).unwrap();
        assert_eq!(unbounded.tags.len(), 4);
    }

    #[test]
    fn test_sorted_descending_with_name_tiebreak() {
        let labels = table(&[("zeta", 0), ("alpha", 0), ("mid", 4)]);
        let config = static_config(0.1, 0.1, 0);
        let result = postprocess(&[0.5, 0.5, 0.8], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_general_mcut_overrides_static_threshold() {
        let labels = table(&[("a", 0), ("b", 0), ("c", 0), ("d", 0)]);
        let config = TaggerConfig {
            general_threshold: 0.99,
            general_mcut_enabled: true,
            ..Default::default()
        };
        // Largest gap between 0.8 and 0.3 -> threshold 0.55
        let result = postprocess(&[0.9, 0.8, 0.3, 0.2], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["a", "b"]);
    }

    #[test]
    fn test_mcut_min_clamps_threshold_upwards() {
        let labels = table(&[("a", 0), ("b", 0), ("c", 0), ("d", 0)]);
        let config = TaggerConfig {
            general_mcut_enabled: true,
            general_mcut_min_enabled: true,
            general_mcut_min: 0.85,
            ..Default::default()
        };
        let result = postprocess(&[0.9, 0.8, 0.3, 0.2], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["a"]);
    }

    #[test]
    fn test_mcut_min_disabled_is_ignored() {
        let rule = CategoryRule {
            threshold: 0.5,
            mcut: true,
            mcut_min: None,
        };
        let t = rule.resolve(&[0.9, 0.1]);
        assert!((t - 0.5).abs() < 1e-6);

        let clamped = CategoryRule {
            mcut_min: Some(0.7),
            ..rule
        };
        assert!((clamped.resolve(&[0.9, 0.1]) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_mcut_falls_back_with_single_score() {
        let rule = CategoryRule {
            threshold: 0.85,
            mcut: true,
            mcut_min: Some(0.15),
        };
        assert_eq!(rule.resolve(&[0.5]), 0.85);
        assert_eq!(rule.resolve(&[]), 0.85);

        let labels = table(&[("solo", 0), ("hatsune_miku", 4)]);
        let config = TaggerConfig {
            character_mcut_enabled: true,
            character_threshold: 0.85,
            general_threshold: 0.1,
            ..Default::default()
        };
        let result = postprocess(&[0.5, 0.6], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["solo"]);
    }

    #[test]
    fn test_character_mcut() {
        let labels = table(&[("x", 4), ("y", 4), ("z", 4)]);
        let config = TaggerConfig {
            character_mcut_enabled: true,
            ..Default::default()
        };
        // Sorted 0.92, 0.4, 0.35 -> gap 0.92/0.4 -> threshold 0.66
        let result = postprocess(&[0.4, 0.92, 0.35], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["y"]);
    }

    #[test]
    fn test_sigmoid_applied_before_threshold() {
        let labels = table(&[("a", 0), ("b", 0)]);
        // Logits 2.0 -> 0.88, -1.0 -> 0.27
        let config = TaggerConfig {
            general_threshold: 0.5,
            apply_sigmoid: true,
            ..Default::default()
        };
        let result = postprocess(&[2.0, -1.0], &labels, &config, &[]).unwrap();
        assert_eq!(names(&result), vec!["a"]);
        assert!((result.tags[0].score - 0.880_797).abs() < 1e-5);

        // Without sigmoid the raw logit 2.0 is compared directly
        let raw = TaggerConfig {
            apply_sigmoid: false,
            ..config
        };
        let result = postprocess(&[2.0, -1.0], &labels, &raw, &[]).unwrap();
        assert_eq!(result.tags[0].score, 2.0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let labels = table(&[("a", 0), ("b", 0)]);
        let err = postprocess(&[0.5], &labels, &TaggerConfig::default(), &[]).unwrap_err();
        assert!(err.to_string().contains("label table"));
    }

    #[test]
    fn test_postprocess_is_deterministic() {
        let labels = table(&[("a", 0), ("b", 0), ("c", 4), ("d", 0), ("e", 9)]);
        let scores = [0.6, 0.6, 0.9, 0.6, 0.3];
        let config = static_config(0.5, 0.5, 0);
        let first = postprocess(&scores, &labels, &config, &[]).unwrap();
        for _ in 0..10 {
            assert_eq!(postprocess(&scores, &labels, &config, &[]).unwrap(), first);
        }
    }
}
