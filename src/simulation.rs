//! Request-by-request simulation over a non-stationary cluster.
//!
//! [`Simulation::run`] resets the policy, rebuilds every backend from the
//! cluster table, then for each request:
//!
//! 1. injects a shock if one is due,
//! 2. asks the policy for a backend,
//! 3. serves the request on that backend,
//! 4. feeds the latency back to the policy,
//! 5. records the outcome.
//!
//! Rebuilding the cluster per run means every compared policy faces the same
//! environment. Shocks fire every `interval` requests (never at request 0);
//! the 1st, 3rd, ... shock of a run degrades a random backend by `factor`,
//! the 2nd, 4th, ... recovers a random backend by the same factor.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::backend::{build_cluster, validate_cluster};
use crate::{Backend, BackendSpec, Error, RunMetrics, SelectionPolicy, DEFAULT_CLUSTER};

/// How the shock generator is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShockSeeding {
    /// Same shock targets on every run.
    Fixed(u64),
    /// Fresh OS entropy per run; shock targets differ between runs.
    Entropy,
}

impl Default for ShockSeeding {
    fn default() -> Self {
        ShockSeeding::Fixed(0x5348_4f43) // "SHOC"
    }
}

impl ShockSeeding {
    fn rng(self) -> StdRng {
        match self {
            ShockSeeding::Fixed(seed) => StdRng::seed_from_u64(seed),
            ShockSeeding::Entropy => StdRng::from_os_rng(),
        }
    }
}

/// Periodic degradation / recovery events.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShockConfig {
    pub enabled: bool,
    /// Requests between shocks.
    pub interval: usize,
    /// Multiplicative factor for both directions (> 0).
    pub factor: f64,
    pub seeding: ShockSeeding,
}

impl Default for ShockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 400,
            factor: 1.5,
            seeding: ShockSeeding::default(),
        }
    }
}

/// Direction of a shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShockKind {
    Degrade,
    Recover,
}

/// Shock due before `request`, if any.
///
/// `None` at request 0, off-interval requests, or when `interval == 0`.
pub fn shock_due(request: usize, interval: usize) -> Option<ShockKind> {
    if interval == 0 || request == 0 || request % interval != 0 {
        return None;
    }
    if (request / interval) % 2 == 1 {
        Some(ShockKind::Degrade)
    } else {
        Some(ShockKind::Recover)
    }
}

/// One injected shock.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShockEvent {
    pub request: usize,
    pub backend: usize,
    pub kind: ShockKind,
    /// Target's base latency after the shock.
    pub base_latency_ms: f64,
}

/// Full simulation configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Backends taken from the head of `cluster`.
    pub backend_count: usize,
    pub total_requests: usize,
    /// Best-case latency regret is measured against (ms).
    pub optimal_latency_ms: f64,
    /// Rolling-average window size.
    pub rolling_window: usize,
    pub shocks: ShockConfig,
    /// Backend profiles, indexed by backend id.
    pub cluster: Vec<BackendSpec>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            backend_count: DEFAULT_CLUSTER.len(),
            total_requests: 2_000,
            optimal_latency_ms: 20.0,
            rolling_window: 100,
            shocks: ShockConfig::default(),
            cluster: DEFAULT_CLUSTER.to_vec(),
        }
    }
}

impl SimulationConfig {
    /// Default cluster and baselines with the given size and shock schedule.
    pub fn new(
        backend_count: usize,
        total_requests: usize,
        shocks_enabled: bool,
        shock_interval: usize,
    ) -> Self {
        Self {
            backend_count,
            total_requests,
            shocks: ShockConfig {
                enabled: shocks_enabled,
                interval: shock_interval,
                ..ShockConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.backend_count == 0 {
            return Err(Error::NoBackends);
        }
        if self.backend_count > self.cluster.len() {
            return Err(Error::TooManyBackends {
                requested: self.backend_count,
                available: self.cluster.len(),
            });
        }
        validate_cluster(&self.cluster[..self.backend_count])?;
        if self.total_requests == 0 {
            return Err(Error::ZeroRequests);
        }
        if self.rolling_window == 0 {
            return Err(Error::ZeroWindow);
        }
        if self.shocks.enabled {
            if self.shocks.interval == 0 {
                return Err(Error::ZeroShockInterval);
            }
            let f = self.shocks.factor;
            if !(f.is_finite() && f > 0.0) {
                return Err(Error::InvalidShockFactor(f));
            }
        }
        Ok(())
    }
}

/// Owns the cluster and drives runs.
#[derive(Debug, Clone)]
pub struct Simulation {
    cfg: SimulationConfig,
    backends: Vec<Backend>,
    shock_log: Vec<ShockEvent>,
}

impl Simulation {
    pub fn new(cfg: SimulationConfig) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self::from_validated(cfg))
    }

    fn from_validated(cfg: SimulationConfig) -> Self {
        let backends = build_cluster(&cfg.cluster, cfg.backend_count);
        Self {
            cfg,
            backends,
            shock_log: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.cfg
    }

    pub fn backend_count(&self) -> usize {
        self.cfg.backend_count
    }

    /// Backends as left by the most recent run (fresh before the first).
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Shocks injected during the most recent run.
    pub fn shock_log(&self) -> &[ShockEvent] {
        &self.shock_log
    }

    /// Run `total_requests` requests through `policy` on a freshly built cluster.
    pub fn run<P: SelectionPolicy + ?Sized>(&mut self, policy: &mut P) -> RunMetrics {
        policy.reset();
        self.backends = build_cluster(&self.cfg.cluster, self.cfg.backend_count);
        self.shock_log.clear();

        let total = self.cfg.total_requests;
        let label = policy.name().to_string();
        let mut metrics = RunMetrics::new(label.as_str(), self.cfg.optimal_latency_ms, self.cfg.rolling_window);
        let mut shock_rng = self.cfg.shocks.seeding.rng();
        let progress_every = (total / 10).max(1);

        tracing::info!(
            policy = %label,
            requests = total,
            backends = self.backends.len(),
            shocks = self.cfg.shocks.enabled,
            "starting run"
        );

        for request in 0..total {
            if self.cfg.shocks.enabled {
                if let Some(kind) = shock_due(request, self.cfg.shocks.interval) {
                    self.inject_shock(request, kind, &mut shock_rng);
                }
            }

            let chosen = policy.select(&self.backends);
            let latency = self.backends[chosen].observe();
            policy.observe(chosen, latency);
            metrics.record(chosen, latency);

            if (request + 1) % progress_every == 0 {
                tracing::info!(
                    policy = %label,
                    progress_pct = 100 * (request + 1) / total,
                    rolling_avg_ms = metrics.rolling_average(),
                    "run progress"
                );
            }
        }

        tracing::info!(
            policy = %label,
            mean_ms = metrics.mean(),
            p99_ms = metrics.percentile(99.0),
            regret_ms = metrics.cumulative_regret(),
            "run complete"
        );
        metrics
    }

    fn inject_shock(&mut self, request: usize, kind: ShockKind, rng: &mut StdRng) {
        let backend = rng.random_range(0..self.backends.len());
        let factor = self.cfg.shocks.factor;
        let target = &mut self.backends[backend];
        match kind {
            ShockKind::Degrade => target.degrade(factor),
            ShockKind::Recover => target.recover(factor),
        }
        let event = ShockEvent {
            request,
            backend,
            kind,
            base_latency_ms: target.base_latency(),
        };
        tracing::info!(
            request,
            backend,
            kind = ?kind,
            base_latency_ms = event.base_latency_ms,
            "shock injected"
        );
        self.shock_log.push(event);
    }

    /// Run each policy in turn, in order.
    pub fn compare(&mut self, policies: &mut [Box<dyn SelectionPolicy + Send>]) -> Vec<RunMetrics> {
        policies.iter_mut().map(|p| self.run(p.as_mut())).collect()
    }

    /// Run each policy on its own thread-pool task.
    ///
    /// Every task builds its own cluster, shock generator and metrics, so with
    /// [`ShockSeeding::Fixed`] the results equal [`Simulation::compare`].
    pub fn compare_parallel(&self, policies: &mut [Box<dyn SelectionPolicy + Send>]) -> Vec<RunMetrics> {
        tracing::info!("running {} policies in parallel", policies.len());
        policies
            .par_iter_mut()
            .map(|p| Simulation::from_validated(self.cfg.clone()).run(p.as_mut()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PolicyKind, RoundRobin, SoftmaxConfig, SoftmaxPolicy};

    fn quiet(requests: usize) -> SimulationConfig {
        SimulationConfig::new(5, requests, false, 100)
    }

    #[test]
    fn shock_schedule_alternates_starting_with_degradation() {
        assert_eq!(shock_due(0, 400), None);
        assert_eq!(shock_due(399, 400), None);
        assert_eq!(shock_due(400, 400), Some(ShockKind::Degrade));
        assert_eq!(shock_due(800, 400), Some(ShockKind::Recover));
        assert_eq!(shock_due(1_200, 400), Some(ShockKind::Degrade));
        assert_eq!(shock_due(1_600, 400), Some(ShockKind::Recover));
        assert_eq!(shock_due(10, 0), None);
    }

    #[test]
    fn run_records_every_request() {
        let mut sim = Simulation::new(quiet(200)).unwrap();
        let mut p = SoftmaxPolicy::new(5, SoftmaxConfig::default()).unwrap();
        let m = sim.run(&mut p);
        assert_eq!(m.total_requests(), 200);
        assert_eq!(m.selections().len(), 200);
        assert_eq!(m.label(), "Softmax (EMA, τ-decay)");
        let served: u64 = sim.backends().iter().map(Backend::total_requests).sum();
        assert_eq!(served, 200);
        assert!(sim.shock_log().is_empty());
    }

    #[test]
    fn runs_are_reproducible() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        let mut p = SoftmaxPolicy::new(5, SoftmaxConfig::default()).unwrap();
        let a = sim.run(&mut p);
        let shocks_a = sim.shock_log().to_vec();
        let b = sim.run(&mut p);
        assert_eq!(a.latencies(), b.latencies());
        assert_eq!(a.selections(), b.selections());
        assert_eq!(shocks_a, sim.shock_log());
    }

    #[test]
    fn shocks_fire_on_schedule() {
        let mut sim = Simulation::new(SimulationConfig::new(5, 2_000, true, 400)).unwrap();
        sim.run(&mut RoundRobin::new());
        let log = sim.shock_log();
        let requests: Vec<usize> = log.iter().map(|e| e.request).collect();
        assert_eq!(requests, vec![400, 800, 1_200, 1_600]);
        let kinds: Vec<ShockKind> = log.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ShockKind::Degrade, ShockKind::Recover, ShockKind::Degrade, ShockKind::Recover]
        );
        assert!(log.iter().all(|e| e.backend < 5 && e.base_latency_ms > 0.0));
    }

    #[test]
    fn every_run_starts_from_a_fresh_cluster() {
        let mut sim = Simulation::new(SimulationConfig::new(5, 1_000, true, 100)).unwrap();
        sim.run(&mut RoundRobin::new());
        let first = sim.backends()[0].tick();
        sim.run(&mut RoundRobin::new());
        assert_eq!(sim.backends()[0].tick(), first);
        assert_eq!(first, 200);
    }

    #[test]
    fn parallel_matches_sequential() {
        let cfg = SimulationConfig::new(5, 600, true, 150);
        let soft = SoftmaxConfig::default();
        let build = || -> Vec<Box<dyn SelectionPolicy + Send>> {
            PolicyKind::ALL.iter().map(|k| k.build(&soft, 5).unwrap()).collect()
        };
        let mut seq_policies = build();
        let mut par_policies = build();

        let mut sim = Simulation::new(cfg).unwrap();
        let seq = sim.compare(&mut seq_policies);
        let par = sim.compare_parallel(&mut par_policies);
        assert_eq!(seq.len(), 3);
        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.label(), b.label());
            assert_eq!(a.latencies(), b.latencies());
            assert_eq!(a.selections(), b.selections());
        }
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut c = quiet(10);
        c.backend_count = 0;
        assert_eq!(Simulation::new(c).err(), Some(Error::NoBackends));

        let mut c = quiet(10);
        c.backend_count = 6;
        assert_eq!(
            c.validate(),
            Err(Error::TooManyBackends {
                requested: 6,
                available: 5
            })
        );

        assert_eq!(quiet(0).validate(), Err(Error::ZeroRequests));

        let mut c = quiet(10);
        c.rolling_window = 0;
        assert_eq!(c.validate(), Err(Error::ZeroWindow));

        assert_eq!(
            SimulationConfig::new(5, 10, true, 0).validate(),
            Err(Error::ZeroShockInterval)
        );

        let mut c = SimulationConfig::new(5, 10, true, 5);
        c.shocks.factor = -1.5;
        assert_eq!(c.validate(), Err(Error::InvalidShockFactor(-1.5)));

        // Disabled shocks do not need a valid schedule.
        assert!(SimulationConfig::new(5, 10, false, 0).validate().is_ok());
    }
}
