//! Synthetic backends with non-stationary latency.
//!
//! A [`Backend`] emits one latency per served request:
//!
//! ```text
//! latency(t) = max(floor, base + amplitude * sin(rate * t) + N(0, 1) * noise_scale)
//! ```
//!
//! where `t` is the backend's own tick, advanced once per request. `base` moves
//! only through multiplicative shocks ([`Backend::degrade`] / [`Backend::recover`]).
//!
//! Each backend owns a seeded generator for its noise, so its latency stream
//! depends only on its own seed and on how many requests it has served.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::Error;

/// Lowest latency a backend will ever report, in milliseconds.
pub const LATENCY_FLOOR_MS: f64 = 1.0;

/// Static description of one backend's latency profile.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackendSpec {
    /// Mean latency before drift and noise (ms). Must be finite and > 0.
    pub base_latency_ms: f64,
    /// Standard deviation of the Gaussian noise term (ms).
    pub noise_scale: f64,
    /// Angular rate of the sinusoidal drift, per tick.
    pub drift_rate: f64,
    /// Amplitude of the sinusoidal drift (ms).
    pub drift_amplitude: f64,
}

impl BackendSpec {
    pub const fn new(
        base_latency_ms: f64,
        noise_scale: f64,
        drift_rate: f64,
        drift_amplitude: f64,
    ) -> Self {
        Self {
            base_latency_ms,
            noise_scale,
            drift_rate,
            drift_amplitude,
        }
    }
}

/// The reference five-backend cluster.
///
/// | id | base | noise | drift rate | drift amplitude | profile            |
/// |----|------|-------|------------|-----------------|--------------------|
/// | 0  | 20   | 5     | 0.05       | 10              | fast, stable       |
/// | 1  | 50   | 10    | 0.08       | 20              | medium             |
/// | 2  | 80   | 15    | 0.12       | 30              | slow, high variance|
/// | 3  | 35   | 8     | 0.07       | 15              | medium-fast        |
/// | 4  | 100  | 20    | 0.15       | 40              | slow, very noisy   |
pub const DEFAULT_CLUSTER: [BackendSpec; 5] = [
    BackendSpec::new(20.0, 5.0, 0.05, 10.0),
    BackendSpec::new(50.0, 10.0, 0.08, 20.0),
    BackendSpec::new(80.0, 15.0, 0.12, 30.0),
    BackendSpec::new(35.0, 8.0, 0.07, 15.0),
    BackendSpec::new(100.0, 20.0, 0.15, 40.0),
];

/// Check a cluster table before any backend is built from it.
pub(crate) fn validate_cluster(specs: &[BackendSpec]) -> Result<(), Error> {
    if specs.is_empty() {
        return Err(Error::NoBackends);
    }
    for (index, s) in specs.iter().enumerate() {
        if !(s.base_latency_ms.is_finite() && s.base_latency_ms > 0.0) {
            return Err(Error::InvalidBaseLatency {
                index,
                value: s.base_latency_ms,
            });
        }
    }
    Ok(())
}

fn assert_shock_factor(factor: f64) {
    assert!(
        factor.is_finite() && factor > 0.0,
        "shock factor must be finite and > 0, got {factor}"
    );
}

/// One synthetic backend. Identified by its dense, 0-based index.
#[derive(Debug, Clone)]
pub struct Backend {
    id: usize,
    base_latency_ms: f64,
    noise_scale: f64,
    drift_rate: f64,
    drift_amplitude: f64,
    tick: u64,
    total_requests: u64,
    total_latency_ms: f64,
    rng: StdRng,
}

impl Backend {
    /// Build backend `id` with its default noise seed (`id * 42`).
    pub fn new(id: usize, spec: BackendSpec) -> Self {
        Self::with_seed(id, spec, (id as u64).wrapping_mul(42))
    }

    /// Build backend `id` with an explicit noise seed.
    pub fn with_seed(id: usize, spec: BackendSpec, seed: u64) -> Self {
        Self {
            id,
            base_latency_ms: spec.base_latency_ms,
            noise_scale: spec.noise_scale,
            drift_rate: spec.drift_rate,
            drift_amplitude: spec.drift_amplitude,
            tick: 0,
            total_requests: 0,
            total_latency_ms: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Serve one request and return its latency (ms).
    ///
    /// Advances the tick, then combines drift, Gaussian noise and the current
    /// base latency. The result is never below [`LATENCY_FLOOR_MS`].
    pub fn observe(&mut self) -> f64 {
        self.tick += 1;
        let drift = self.drift_amplitude * (self.drift_rate * self.tick as f64).sin();
        let z: f64 = self.rng.sample(StandardNormal);
        let latency = (self.base_latency_ms + drift + z * self.noise_scale).max(LATENCY_FLOOR_MS);

        self.total_requests += 1;
        self.total_latency_ms += latency;
        latency
    }

    /// Degradation shock: `base *= factor`.
    ///
    /// # Panics
    ///
    /// If `factor` is not finite and > 0.
    pub fn degrade(&mut self, factor: f64) {
        assert_shock_factor(factor);
        self.base_latency_ms *= factor;
    }

    /// Recovery shock: `base /= factor`.
    ///
    /// # Panics
    ///
    /// If `factor` is not finite and > 0.
    pub fn recover(&mut self, factor: f64) {
        assert_shock_factor(factor);
        self.base_latency_ms /= factor;
    }

    /// Noise-free latency the next request would see, without serving it.
    pub fn expected_latency(&self) -> f64 {
        let next = (self.tick + 1) as f64;
        (self.base_latency_ms + self.drift_amplitude * (self.drift_rate * next).sin())
            .max(LATENCY_FLOOR_MS)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Display name, `server-<id>`.
    pub fn name(&self) -> String {
        format!("server-{}", self.id)
    }

    pub fn base_latency(&self) -> f64 {
        self.base_latency_ms
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn total_latency(&self) -> f64 {
        self.total_latency_ms
    }

    /// Mean latency this backend has served, or `0.0` before its first request.
    pub fn average_latency(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms / self.total_requests as f64
        }
    }
}

/// Build backends `0..count` from the head of `specs`.
pub(crate) fn build_cluster(specs: &[BackendSpec], count: usize) -> Vec<Backend> {
    specs
        .iter()
        .take(count)
        .enumerate()
        .map(|(id, spec)| Backend::new(id, *spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tick_and_totals_advance_per_request() {
        let mut b = Backend::new(0, DEFAULT_CLUSTER[0]);
        assert_eq!(b.average_latency(), 0.0);
        let mut sum = 0.0;
        for _ in 0..25 {
            sum += b.observe();
        }
        assert_eq!(b.tick(), 25);
        assert_eq!(b.total_requests(), 25);
        assert!((b.total_latency() - sum).abs() < 1e-9);
        assert!((b.average_latency() - sum / 25.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = Backend::new(3, DEFAULT_CLUSTER[3]);
        let mut b = Backend::new(3, DEFAULT_CLUSTER[3]);
        for _ in 0..50 {
            assert_eq!(a.observe(), b.observe());
        }
    }

    #[test]
    fn noiseless_backend_follows_the_drift_curve() {
        let spec = BackendSpec::new(40.0, 0.0, 0.1, 5.0);
        let mut b = Backend::new(1, spec);
        for t in 1..=20u64 {
            let expected = b.expected_latency();
            let got = b.observe();
            let curve = 40.0 + 5.0 * (0.1 * t as f64).sin();
            assert!((got - curve).abs() < 1e-12, "t={t}");
            assert!((got - expected).abs() < 1e-12, "t={t}");
        }
    }

    #[test]
    fn expected_latency_has_no_side_effects() {
        let b = Backend::new(2, DEFAULT_CLUSTER[2]);
        let _ = b.expected_latency();
        assert_eq!(b.tick(), 0);
        assert_eq!(b.total_requests(), 0);
    }

    #[test]
    fn degrade_then_recover_restores_base() {
        let mut b = Backend::new(0, DEFAULT_CLUSTER[0]);
        b.degrade(1.5);
        assert!((b.base_latency() - 30.0).abs() < 1e-12);
        b.recover(1.5);
        assert!((b.base_latency() - 20.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "shock factor")]
    fn zero_shock_factor_panics() {
        let mut b = Backend::new(0, DEFAULT_CLUSTER[0]);
        b.degrade(0.0);
    }

    #[test]
    #[should_panic(expected = "shock factor")]
    fn negative_recovery_factor_panics() {
        let mut b = Backend::new(0, DEFAULT_CLUSTER[0]);
        b.recover(-2.0);
    }

    #[test]
    fn cluster_validation_rejects_bad_rows() {
        assert_eq!(validate_cluster(&[]), Err(Error::NoBackends));
        let bad = [DEFAULT_CLUSTER[0], BackendSpec::new(0.0, 1.0, 0.1, 1.0)];
        assert_eq!(
            validate_cluster(&bad),
            Err(Error::InvalidBaseLatency {
                index: 1,
                value: 0.0
            })
        );
        assert!(validate_cluster(&DEFAULT_CLUSTER).is_ok());
    }

    #[test]
    fn build_cluster_assigns_dense_ids() {
        let cluster = build_cluster(&DEFAULT_CLUSTER, 3);
        let ids: Vec<usize> = cluster.iter().map(Backend::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(cluster[2].name(), "server-2");
    }

    proptest! {
        #[test]
        fn latency_never_drops_below_floor(
            base in 0.01f64..500.0,
            noise in 0.0f64..400.0,
            rate in 0.0f64..3.0,
            amplitude in 0.0f64..400.0,
            recoveries in 0usize..4,
            seed in any::<u64>(),
        ) {
            let mut b = Backend::with_seed(0, BackendSpec::new(base, noise, rate, amplitude), seed);
            for _ in 0..recoveries {
                b.recover(3.0);
            }
            for _ in 0..200 {
                let l = b.observe();
                prop_assert!(l.is_finite());
                prop_assert!(l >= LATENCY_FLOOR_MS, "latency={}", l);
            }
        }
    }
}
