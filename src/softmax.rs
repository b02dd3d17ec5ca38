//! Adaptive softmax (Boltzmann) selection over EMA reward estimates.
//!
//! Each backend carries a reward estimate `q_i`, updated from observed latency
//! with an exponential moving average:
//!
//! ```text
//! reward = -latency_ms / 100
//! q_i    = (1 - alpha) * q_i + alpha * reward
//! ```
//!
//! Selection samples from `p_i = exp(q_i / tau) / sum_j exp(q_j / tau)` (computed
//! with the max-trick, see [`softmax_probs`]). The temperature cools linearly
//! with every selection and is clamped at a floor:
//!
//! ```text
//! tau(step) = max(floor, initial - decay * step)
//! ```
//!
//! Estimates start at `0.0`, so the first decisions are uniform. The EMA
//! discounts old observations geometrically, which lets the policy follow a
//! backend whose latency shifts after a shock.
//!
//! The policy is **seedable**; default construction uses a fixed seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::alloc::{sample_index, softmax_probs};
use crate::{Backend, Error, PolicySnapshot, SelectionPolicy};

/// Latency (ms) that maps to a reward of `-1.0`.
pub const REWARD_SCALE_MS: f64 = 100.0;

/// Smallest temperature ever used, even when the configured floor is `0.0`.
pub const MIN_TEMPERATURE: f64 = 1e-6;

/// Reward for an observed latency: `-latency_ms / REWARD_SCALE_MS`.
pub fn latency_to_reward(latency_ms: f64) -> f64 {
    -latency_ms / REWARD_SCALE_MS
}

/// Configuration for [`SoftmaxPolicy`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SoftmaxConfig {
    /// Temperature at step 0 (must be finite and > 0).
    pub initial_temperature: f64,
    /// Temperature floor in `[0, initial_temperature)`.
    pub min_temperature: f64,
    /// Linear temperature decrease per selection (>= 0).
    pub decay_per_step: f64,
    /// EMA weight of the newest observation, in `(0, 1]`.
    pub learning_rate: f64,
    /// Seed for the sampling RNG.
    pub seed: u64,
}

impl Default for SoftmaxConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 2.0,
            min_temperature: 0.1,
            decay_per_step: 0.001,
            learning_rate: 0.15,
            seed: 12_345,
        }
    }
}

impl SoftmaxConfig {
    /// Reject configurations that would make the schedule or the EMA degenerate.
    pub fn validate(&self) -> Result<(), Error> {
        let (initial, floor) = (self.initial_temperature, self.min_temperature);
        if !(initial.is_finite() && initial > 0.0 && floor.is_finite() && floor >= 0.0 && floor < initial) {
            return Err(Error::InvalidTemperature { initial, floor });
        }
        if !(self.decay_per_step.is_finite() && self.decay_per_step >= 0.0) {
            return Err(Error::InvalidDecay(self.decay_per_step));
        }
        let a = self.learning_rate;
        if !(a.is_finite() && a > 0.0 && a <= 1.0) {
            return Err(Error::InvalidLearningRate(a));
        }
        Ok(())
    }

    /// Temperature after `step` selections.
    pub fn temperature_at(&self, step: u64) -> f64 {
        (self.initial_temperature - self.decay_per_step * step as f64)
            .max(self.min_temperature)
            .max(MIN_TEMPERATURE)
    }
}

/// Seedable softmax policy with a cooling temperature.
#[derive(Debug, Clone)]
pub struct SoftmaxPolicy {
    cfg: SoftmaxConfig,
    rng: StdRng,
    estimates: Vec<f64>,
    selections: Vec<u64>,
    temperature: f64,
    steps: u64,
}

impl SoftmaxPolicy {
    /// Create a policy for `backend_count` backends.
    pub fn new(backend_count: usize, cfg: SoftmaxConfig) -> Result<Self, Error> {
        if backend_count == 0 {
            return Err(Error::NoBackends);
        }
        cfg.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            estimates: vec![0.0; backend_count],
            selections: vec![0; backend_count],
            temperature: cfg.temperature_at(0),
            steps: 0,
            cfg,
        })
    }

    pub fn config(&self) -> &SoftmaxConfig {
        &self.cfg
    }

    /// Number of backends this policy was built for.
    pub fn backend_count(&self) -> usize {
        self.estimates.len()
    }

    /// Current reward estimates, aligned to backend indices.
    pub fn estimates(&self) -> &[f64] {
        &self.estimates
    }

    /// Requests routed to each backend since construction or the last reset.
    pub fn selection_counts(&self) -> &[u64] {
        &self.selections
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// The distribution the next `select` would sample from.
    pub fn probabilities(&self) -> Vec<f64> {
        softmax_probs(&self.estimates, self.temperature)
    }

    /// Fold one latency observation for `index` into its EMA estimate.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn update(&mut self, index: usize, latency_ms: f64) {
        assert!(
            index < self.estimates.len(),
            "backend index {index} out of range for {} backends",
            self.estimates.len()
        );
        let alpha = self.cfg.learning_rate;
        let q = &mut self.estimates[index];
        *q = (1.0 - alpha) * *q + alpha * latency_to_reward(latency_ms);
    }
}

impl SelectionPolicy for SoftmaxPolicy {
    /// Sample a backend, then advance the temperature schedule.
    ///
    /// # Panics
    ///
    /// If `backends` is empty or its length differs from the policy's backend count.
    fn select(&mut self, backends: &[Backend]) -> usize {
        assert!(!backends.is_empty(), "cannot select from an empty backend set");
        assert_eq!(
            backends.len(),
            self.estimates.len(),
            "policy was built for {} backends",
            self.estimates.len()
        );

        let probs = self.probabilities();
        let u: f64 = self.rng.random();
        let chosen = sample_index(&probs, u).unwrap_or(probs.len() - 1);

        self.selections[chosen] += 1;
        self.steps += 1;
        self.temperature = self.cfg.temperature_at(self.steps);

        tracing::debug!(
            step = self.steps,
            temperature = self.temperature,
            chosen,
            probs = ?probs,
            "softmax decision"
        );
        chosen
    }

    fn observe(&mut self, index: usize, latency_ms: f64) {
        self.update(index, latency_ms);
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.cfg.seed);
        self.estimates.iter_mut().for_each(|q| *q = 0.0);
        self.selections.iter_mut().for_each(|c| *c = 0);
        self.steps = 0;
        self.temperature = self.cfg.temperature_at(0);
    }

    fn name(&self) -> &str {
        "Softmax (EMA, τ-decay)"
    }

    fn snapshot(&self) -> Option<PolicySnapshot> {
        Some(PolicySnapshot {
            estimates: self.estimates.clone(),
            probabilities: self.probabilities(),
            selection_counts: self.selections.clone(),
            temperature: self.temperature,
            step_count: self.steps,
        })
    }
}
