use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use driftmux::{
    report, PolicyKind, RunMetrics, SelectionPolicy, ShockSeeding, Simulation, SimulationConfig,
    SoftmaxConfig,
};

/// Compare load-balancing policies on a simulated non-stationary cluster
#[derive(Parser)]
#[command(name = "driftmux")]
#[command(version)]
struct Cli {
    /// Number of backends (taken from the head of the default cluster table)
    #[arg(long, default_value_t = 5)]
    backends: usize,

    /// Requests per run
    #[arg(long, default_value_t = 2_000)]
    requests: usize,

    /// Policies to compare (round-robin, random, softmax); defaults to all
    #[arg(long = "policy", value_delimiter = ',')]
    policies: Vec<PolicyKind>,

    /// Disable degradation/recovery shocks
    #[arg(long)]
    no_shocks: bool,

    /// Requests between shocks
    #[arg(long, default_value_t = 400)]
    shock_interval: usize,

    /// Multiplicative shock factor
    #[arg(long, default_value_t = 1.5)]
    shock_factor: f64,

    /// Seed for shock targets
    #[arg(long, conflicts_with = "shock_entropy")]
    shock_seed: Option<u64>,

    /// Seed shock targets from OS entropy (runs are not reproducible)
    #[arg(long)]
    shock_entropy: bool,

    /// Softmax initial temperature
    #[arg(long, default_value_t = 2.0)]
    temperature: f64,

    /// Softmax temperature floor
    #[arg(long, default_value_t = 0.1)]
    min_temperature: f64,

    /// Softmax temperature decay per step
    #[arg(long, default_value_t = 0.001)]
    decay: f64,

    /// Softmax EMA learning rate
    #[arg(long, default_value_t = 0.15)]
    learning_rate: f64,

    /// Run policies in parallel
    #[arg(long)]
    parallel: bool,

    /// Print run summaries as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_tracing(log_level: &str, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        match log_level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("driftmux={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.verbose);

    let mut sim_cfg = SimulationConfig::new(cli.backends, cli.requests, !cli.no_shocks, cli.shock_interval);
    sim_cfg.shocks.factor = cli.shock_factor;
    if cli.shock_entropy {
        sim_cfg.shocks.seeding = ShockSeeding::Entropy;
    } else if let Some(seed) = cli.shock_seed {
        sim_cfg.shocks.seeding = ShockSeeding::Fixed(seed);
    }
    let softmax_cfg = SoftmaxConfig {
        initial_temperature: cli.temperature,
        min_temperature: cli.min_temperature,
        decay_per_step: cli.decay,
        learning_rate: cli.learning_rate,
        ..SoftmaxConfig::default()
    };
    softmax_cfg.validate()?;

    let kinds = if cli.policies.is_empty() {
        PolicyKind::ALL.to_vec()
    } else {
        cli.policies.clone()
    };
    let mut policies = kinds
        .iter()
        .map(|k| k.build(&softmax_cfg, cli.backends))
        .collect::<Result<Vec<Box<dyn SelectionPolicy + Send>>, _>>()?;

    let mut sim = Simulation::new(sim_cfg)?;
    info!("comparing {} policies", policies.len());
    let results = if cli.parallel {
        sim.compare_parallel(&mut policies)
    } else {
        sim.compare(&mut policies)
    };

    if cli.json {
        let summaries: Vec<_> = results.iter().map(RunMetrics::summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    print_report(&sim, &kinds, &policies, &results);
    Ok(())
}

fn print_report(
    sim: &Simulation,
    kinds: &[PolicyKind],
    policies: &[Box<dyn SelectionPolicy + Send>],
    results: &[RunMetrics],
) {
    let n = sim.backend_count();
    println!("{}", report::comparison_table(results));
    println!("{}", report::latency_bar_chart(results));
    for m in results {
        println!("{}", report::selection_distribution(m, n));
    }
    for p in policies {
        if let Some(snap) = p.snapshot() {
            println!("{} final state", p.name());
            println!("{}", report::policy_state(&snap));
        }
    }
    println!("{}", report::latency_trend(results, 50));

    let adaptive = kinds.iter().position(|k| *k == PolicyKind::Softmax);
    if let Some(i) = adaptive {
        let baselines: Vec<RunMetrics> = results
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, m)| m.clone())
            .collect();
        if !baselines.is_empty() {
            println!("{}", report::improvement(&results[i], &baselines));
        }
    }
}
