//! `driftmux`: seedable server-selection policies and a non-stationary latency
//! simulator for comparing them.
//!
//! The setting is a client-side load balancer choosing among a small set of
//! backends (2 to 10, say) whose latency drifts over time and occasionally
//! jumps. A policy picks one backend per request, sees the latency it got, and
//! is scored on mean latency, tail percentiles and cumulative regret.
//!
//! **Goals:**
//! - **Reproducible by default**: every stochastic component (policy sampling,
//!   per-backend noise, shock targets) owns its own seeded generator, so the same
//!   configuration gives the same run.
//! - **Non-stationarity friendly**: the adaptive policy uses an exponential moving
//!   average, not a lifetime mean, so it follows a backend after a shock.
//! - **Fair comparison**: each run rebuilds the cluster from the same table.
//!
//! **Selection policies** (all behind [`SelectionPolicy`]):
//! - [`RoundRobin`]: cycle through backends in index order.
//! - [`UniformRandom`]: seeded uniform choice.
//! - [`SoftmaxPolicy`]: softmax over EMA reward estimates with a linearly cooling
//!   temperature.
//! - [`softmax_probs`] / [`sample_index`]: the stable probability and inverse-CDF
//!   helpers the adaptive policy is built on.
//!
//! **Environment and scoring:**
//! - [`Backend`]: one synthetic backend, `base + sinusoidal drift + Gaussian noise`,
//!   floored at [`LATENCY_FLOOR_MS`], with multiplicative degrade/recover shocks.
//! - [`Simulation`]: drives a fixed number of requests through a policy and
//!   injects shocks on a fixed interval.
//! - [`RunMetrics`]: mean, nearest-rank percentiles, min/max, population
//!   standard deviation, cumulative regret, rolling average.
//! - [`report`]: plain-text tables and charts over finished runs.
//!
//! **Non-goals:**
//! - Not a networked load balancer: no connections, no transport, no live backends.
//!
//! # Example
//!
//! ```rust
//! use driftmux::{RoundRobin, Simulation, SimulationConfig, SoftmaxConfig, SoftmaxPolicy};
//!
//! let mut sim = Simulation::new(SimulationConfig::new(5, 2_000, false, 400)).unwrap();
//!
//! let mut softmax = SoftmaxPolicy::new(5, SoftmaxConfig::default()).unwrap();
//! let adaptive = sim.run(&mut softmax);
//! let baseline = sim.run(&mut RoundRobin::new());
//!
//! assert_eq!(adaptive.total_requests(), 2_000);
//! assert!(adaptive.mean() < baseline.mean());
//! ```

mod error;
pub use error::Error;

mod alloc;
pub use alloc::*;

mod backend;
pub use backend::{Backend, BackendSpec, DEFAULT_CLUSTER, LATENCY_FLOOR_MS};

mod policy;
pub use policy::*;

mod softmax;
pub use softmax::*;

mod metrics;
pub use metrics::{RunMetrics, RunSummary};

mod simulation;
pub use simulation::*;

pub mod report;
