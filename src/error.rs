//! Configuration errors.
//!
//! Everything here is raised at construction time. Call-time precondition
//! violations (an empty backend slice, an out-of-range index, a non-positive
//! shock factor passed straight to a [`Backend`][crate::Backend]) panic instead.

/// A rejected configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A policy or simulation was configured with zero backends.
    #[error("at least one backend is required")]
    NoBackends,

    /// More backends were requested than the cluster table describes.
    #[error("requested {requested} backends but the cluster table has {available}")]
    TooManyBackends { requested: usize, available: usize },

    /// A cluster table row has a base latency that is not finite and > 0.
    #[error("backend {index}: base latency must be finite and > 0, got {value}")]
    InvalidBaseLatency { index: usize, value: f64 },

    /// Initial temperature must be finite and > 0, floor must be in `[0, initial)`.
    #[error("temperature floor {floor} must be >= 0 and below the initial temperature {initial} (> 0)")]
    InvalidTemperature { initial: f64, floor: f64 },

    /// Temperature decay per step must be finite and >= 0.
    #[error("temperature decay must be finite and >= 0, got {0}")]
    InvalidDecay(f64),

    /// EMA learning rate must be in `(0, 1]`.
    #[error("learning rate must be in (0, 1], got {0}")]
    InvalidLearningRate(f64),

    /// Shock factor must be finite and > 0.
    #[error("shock factor must be finite and > 0, got {0}")]
    InvalidShockFactor(f64),

    /// Shocks are enabled with an interval of zero requests.
    #[error("shock interval must be at least one request")]
    ZeroShockInterval,

    /// Rolling window size of zero.
    #[error("rolling window must hold at least one latency")]
    ZeroWindow,

    /// A run with zero requests.
    #[error("a simulation needs at least one request")]
    ZeroRequests,

    /// Policy name that [`PolicyKind`][crate::PolicyKind] does not recognise.
    #[error("unknown policy {0:?} (expected round-robin, random or softmax)")]
    UnknownPolicy(String),
}
