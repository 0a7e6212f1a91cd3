//! Shared math utilities.

use std::cmp::Ordering;

/// Standard logistic function.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Apply [`sigmoid`] to every score in place.
pub fn sigmoid_in_place(scores: &mut [f32]) {
    for s in scores.iter_mut() {
        *s = sigmoid(*s);
    }
}

/// Descending order for scores; NaN sorts last.
pub fn cmp_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Maximum-cut threshold over a set of scores.
///
/// Sorts descending, finds the largest gap between neighbours and returns its
/// midpoint. With several equally large gaps the highest one wins. Returns
/// `None` for fewer than two scores.
pub fn mcut_threshold(scores: &[f32]) -> Option<f32> {
    if scores.len() < 2 {
        return None;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| cmp_desc(*a, *b));

    let mut best = 0;
    let mut best_gap = f32::NEG_INFINITY;
    for (i, pair) in sorted.windows(2).enumerate() {
        let gap = pair[0] - pair[1];
        if gap > best_gap {
            best_gap = gap;
            best = i;
        }
    }
    Some((sorted[best] + sorted[best + 1]) / 2.0)
}
