//! Allocation helpers (probabilities, softmax, inverse-CDF sampling).
//!
//! These are deterministic utilities for turning per-backend scores into a
//! probability distribution in a stable (reproducible) way, and for drawing
//! an index from that distribution given a caller-supplied uniform sample.

/// Compute a stable softmax distribution over `scores / temperature`.
///
/// - `temperature` controls sharpness (must be finite and > 0; anything else
///   is treated as `1.0`).
/// - Uses the max-trick: the largest exponentiated term is exactly 1, so every
///   weight lies in `[0, 1]` and the normaliser in `[1, scores.len()]`.
/// - Returns a distribution aligned to `scores` that sums to 1 (or empty if
///   the input is empty).
pub fn softmax_probs(scores: &[f64], temperature: f64) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let t = if temperature.is_finite() && temperature > 0.0 {
        temperature
    } else {
        1.0
    };

    let max_scaled = scores
        .iter()
        .map(|s| s / t)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut out: Vec<f64> = Vec::with_capacity(scores.len());
    let mut denom = 0.0;
    for &s in scores {
        let x = (s / t - max_scaled).exp();
        denom += x;
        out.push(x);
    }
    if denom <= 0.0 || !denom.is_finite() {
        // Degenerate input (NaN or infinite scores): uniform.
        let n = scores.len() as f64;
        return vec![1.0 / n; scores.len()];
    }

    for v in &mut out {
        *v /= denom;
    }
    out
}

/// Inverse-CDF sampling: the first index `i` with `u <= p_0 + ... + p_i`.
///
/// If rounding leaves the cumulative sum just under `u`, the last index is
/// returned. `None` only when `probs` is empty.
pub fn sample_index(probs: &[f64], u: f64) -> Option<usize> {
    let mut cdf = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cdf += *p;
        if u <= cdf {
            return Some(i);
        }
    }
    // Numerical fallback.
    probs.len().checked_sub(1)
}
