//! Plain-text rendering of run results.
//!
//! Everything here is read-only over [`RunMetrics`] and [`PolicySnapshot`];
//! each function returns a `String` so callers decide where it goes.

use std::fmt::Write as _;

use crate::{PolicySnapshot, RunMetrics};

const BAR_WIDTH: usize = 50;
const BAR: char = '█';
const SPARKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn bar(len: usize) -> String {
    std::iter::repeat(BAR).take(len).collect()
}

/// Scale `value / max` to `width` cells; `0` when `max` is not positive.
fn scaled(value: f64, max: f64, width: usize) -> usize {
    if max > 0.0 && value.is_finite() {
        ((width as f64) * value / max).clamp(0.0, width as f64) as usize
    } else {
        0
    }
}

/// Mean / p50 / p95 / p99 / regret per run, plus the winners.
pub fn comparison_table(results: &[RunMetrics]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:>9} {:>9} {:>9} {:>9} {:>14}",
        "algorithm", "mean", "p50", "p95", "p99", "cum. regret"
    );
    let _ = writeln!(out, "{}", "-".repeat(80));
    for m in results {
        let _ = writeln!(
            out,
            "{:<24} {:>7.1}ms {:>7.1}ms {:>7.1}ms {:>7.1}ms {:>12.1}ms",
            truncate(m.label(), 24),
            m.mean(),
            m.percentile(50.0),
            m.percentile(95.0),
            m.percentile(99.0),
            m.cumulative_regret()
        );
    }
    if let Some(best) = results.iter().min_by(|a, b| a.mean().total_cmp(&b.mean())) {
        let _ = writeln!(out, "\nbest mean latency: {} ({:.2} ms)", best.label(), best.mean());
    }
    if let Some(best) = results
        .iter()
        .min_by(|a, b| a.cumulative_regret().total_cmp(&b.cumulative_regret()))
    {
        let _ = writeln!(
            out,
            "lowest cumulative regret: {} ({:.2} ms)",
            best.label(),
            best.cumulative_regret()
        );
    }
    out
}

/// Horizontal bars of mean latency, scaled to the slowest run.
pub fn latency_bar_chart(results: &[RunMetrics]) -> String {
    let max = results.iter().map(RunMetrics::mean).fold(0.0, f64::max);
    let mut out = String::from("mean latency (lower is better)\n");
    for m in results {
        let _ = writeln!(
            out,
            "{:<24} │{} {:.1}ms",
            truncate(m.label(), 24),
            bar(scaled(m.mean(), max, BAR_WIDTH)),
            m.mean()
        );
    }
    out
}

/// Share of requests each backend received.
pub fn selection_distribution(metrics: &RunMetrics, backend_count: usize) -> String {
    let counts = metrics.selection_histogram(backend_count);
    let total = metrics.total_requests().max(1) as f64;
    let max = counts.iter().copied().max().unwrap_or(0) as f64;
    let mut out = String::new();
    let _ = writeln!(out, "selection distribution [{}]", metrics.label());
    for (i, &c) in counts.iter().enumerate() {
        let _ = writeln!(
            out,
            "server-{:<3} │ {} {:5.1}% ({})",
            i,
            bar(scaled(c as f64, max, BAR_WIDTH)),
            100.0 * c as f64 / total,
            c
        );
    }
    out
}

/// Estimates and probabilities of an adaptive policy.
pub fn policy_state(snapshot: &PolicySnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "temperature: {:.4} after {} steps",
        snapshot.temperature, snapshot.step_count
    );
    let _ = writeln!(out, "{:<10} {:>10} {:>8} {:>8}", "backend", "estimate", "prob", "picks");
    for (i, (q, p)) in snapshot
        .estimates
        .iter()
        .zip(&snapshot.probabilities)
        .enumerate()
    {
        let picks = snapshot.selection_counts.get(i).copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "server-{:<3} {:>10.4} {:>8.3} {:>8} │{}",
            i,
            q,
            p,
            picks,
            bar(scaled(*p, 1.0, 40))
        );
    }
    out
}

/// One sparkline per run: bucket means over arrival order, scaled per run.
pub fn latency_trend(results: &[RunMetrics], buckets: usize) -> String {
    let mut out = String::new();
    for m in results {
        let trend = m.latency_trend(buckets);
        if trend.is_empty() {
            continue;
        }
        let max = trend.iter().copied().fold(0.0, f64::max);
        let line: String = trend
            .iter()
            .map(|v| SPARKS[scaled(*v, max, SPARKS.len() - 1)])
            .collect();
        let _ = writeln!(out, "{:<24} │{}│ avg={:.1}ms", truncate(m.label(), 24), line, m.mean());
    }
    out
}

/// Mean-latency and regret improvement of `candidate` over each baseline.
pub fn improvement(candidate: &RunMetrics, baselines: &[RunMetrics]) -> String {
    let mut out = String::new();
    for b in baselines {
        let pct = if b.mean() > 0.0 {
            (b.mean() - candidate.mean()) / b.mean() * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "{} vs {}: {:+.1}% mean latency, {:.1} ms less cumulative regret",
            candidate.label(),
            b.label(),
            pct,
            b.cumulative_regret() - candidate.cumulative_regret()
        );
    }
    out
}
