//! The `SelectionPolicy` trait and the stateless baseline policies.
//!
//! Every policy shares the same capability set:
//! `select(backends) -> index`, `observe(index, latency)`, `reset()` and `name()`.
//! The simulation drives policies only through this trait, so a comparison
//! harness can swap between them without code changes.
//!
//! Policies receive the backend slice by shared reference and hand back an
//! index; they never hold on to backends between calls.
//!
//! [`RoundRobin`] and [`UniformRandom`] ignore feedback. The adaptive policy
//! lives in [`crate::SoftmaxPolicy`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

use crate::{Backend, Error, SoftmaxConfig, SoftmaxPolicy};

/// Default seed for [`UniformRandom`].
pub const DEFAULT_RANDOM_SEED: u64 = 99_999;

/// Read-only view of an adaptive policy's learned state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicySnapshot {
    /// Per-backend reward estimates.
    pub estimates: Vec<f64>,
    /// Selection probabilities the next `select` would use.
    pub probabilities: Vec<f64>,
    /// Requests routed to each backend so far.
    pub selection_counts: Vec<u64>,
    /// Current exploration temperature.
    pub temperature: f64,
    /// Selections made since construction or the last reset.
    pub step_count: u64,
}

/// Common interface for server-selection policies.
///
/// # Example
///
/// ```rust
/// use driftmux::{Backend, RoundRobin, SelectionPolicy, DEFAULT_CLUSTER};
///
/// fn route_once<P: SelectionPolicy + ?Sized>(policy: &mut P, backends: &mut [Backend]) -> f64 {
///     let i = policy.select(backends);
///     let latency = backends[i].observe();
///     policy.observe(i, latency);
///     latency
/// }
///
/// let mut backends: Vec<Backend> = DEFAULT_CLUSTER
///     .iter()
///     .enumerate()
///     .map(|(id, spec)| Backend::new(id, *spec))
///     .collect();
/// let mut rr = RoundRobin::new();
/// assert!(route_once(&mut rr, &mut backends) >= 1.0);
/// ```
pub trait SelectionPolicy {
    /// Pick the backend for the next request.
    ///
    /// # Panics
    ///
    /// If `backends` is empty.
    fn select(&mut self, backends: &[Backend]) -> usize;

    /// Feed back the latency observed on `index`. No-op for stateless policies.
    fn observe(&mut self, index: usize, latency_ms: f64) {
        let _ = (index, latency_ms);
    }

    /// Restore the just-constructed state.
    fn reset(&mut self);

    /// Label used for metrics and reports.
    fn name(&self) -> &str;

    /// Learned state, for policies that have any.
    fn snapshot(&self) -> Option<PolicySnapshot> {
        None
    }
}

fn assert_non_empty(backends: &[Backend]) -> usize {
    assert!(!backends.is_empty(), "cannot select from an empty backend set");
    backends.len()
}

/// Cycle through backends in index order.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    next: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobin {
    fn select(&mut self, backends: &[Backend]) -> usize {
        let n = assert_non_empty(backends);
        let chosen = self.next % n;
        self.next = self.next.wrapping_add(1);
        chosen
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn name(&self) -> &str {
        "Round-Robin"
    }
}

/// Uniformly random choice from a seeded generator.
#[derive(Debug, Clone)]
pub struct UniformRandom {
    seed: u64,
    rng: StdRng,
}

impl UniformRandom {
    /// Create with [`DEFAULT_RANDOM_SEED`].
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_RANDOM_SEED)
    }

    /// Create with an explicit seed (reproducible).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for UniformRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionPolicy for UniformRandom {
    fn select(&mut self, backends: &[Backend]) -> usize {
        let n = assert_non_empty(backends);
        self.rng.random_range(0..n)
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn name(&self) -> &str {
        "Random"
    }
}

/// Policy variants selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyKind {
    RoundRobin,
    Random,
    Softmax,
}

impl PolicyKind {
    /// All variants, baselines first.
    pub const ALL: [PolicyKind; 3] = [PolicyKind::RoundRobin, PolicyKind::Random, PolicyKind::Softmax];

    /// Build a boxed policy for `backend_count` backends.
    pub fn build(
        self,
        softmax: &SoftmaxConfig,
        backend_count: usize,
    ) -> Result<Box<dyn SelectionPolicy + Send>, Error> {
        if backend_count == 0 {
            return Err(Error::NoBackends);
        }
        Ok(match self {
            PolicyKind::RoundRobin => Box::new(RoundRobin::new()),
            PolicyKind::Random => Box::new(UniformRandom::new()),
            PolicyKind::Softmax => Box::new(SoftmaxPolicy::new(backend_count, softmax.clone())?),
        })
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::RoundRobin => "round-robin",
            PolicyKind::Random => "random",
            PolicyKind::Softmax => "softmax",
        })
    }
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "roundrobin" | "rr" => Ok(PolicyKind::RoundRobin),
            "random" | "uniform" => Ok(PolicyKind::Random),
            "softmax" | "adaptive" => Ok(PolicyKind::Softmax),
            _ => Err(Error::UnknownPolicy(s.to_string())),
        }
    }
}
