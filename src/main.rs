use std::time::Duration;

use clap::{Parser, ValueEnum};
use rand::Rng;
use tracing::{info, Level};
use tracing_subscriber;

use floodgate::config::FloodgateConfig;
use floodgate::{IntervalThrottle, SlidingWindowLimiter};

/// Simulate a stream of per-user messages against an admission component.
#[derive(Debug, Parser)]
#[command(name = "floodgate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Admission algorithm to simulate
    #[arg(long, value_enum, default_value_t = Algorithm::Window)]
    algorithm: Algorithm,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    /// Minimum interval between admissions per user
    Throttle,
    /// Capped admissions per user within a trailing window
    Window,
}

/// Either admission component behind one simulation-facing surface.
enum Limiter {
    Throttle(IntervalThrottle<String>),
    Window(SlidingWindowLimiter<String>),
}

impl Limiter {
    fn try_admit(&self, identity: String) -> bool {
        match self {
            Limiter::Throttle(throttle) => throttle.try_admit(identity),
            Limiter::Window(limiter) => limiter.try_admit(identity),
        }
    }

    fn time_until_next(&self, identity: &String) -> Duration {
        match self {
            Limiter::Throttle(throttle) => throttle.time_until_next(identity),
            Limiter::Window(limiter) => limiter.time_until_next(identity),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Starting Floodgate admission simulation");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => FloodgateConfig::from_file(path)?,
        None => FloodgateConfig::default(),
    };

    let (limiter, quiet_period) = match args.algorithm {
        Algorithm::Throttle => {
            let min_interval = config.throttle.min_interval();
            info!(?min_interval, "Simulating interval throttle");
            (
                Limiter::Throttle(IntervalThrottle::new(min_interval)?),
                min_interval,
            )
        }
        Algorithm::Window => {
            let window_size = config.window.window_size();
            info!(
                ?window_size,
                max_requests = config.window.max_requests,
                "Simulating sliding window limiter"
            );
            (
                Limiter::Window(SlidingWindowLimiter::new(
                    window_size,
                    config.window.max_requests,
                )?),
                window_size,
            )
        }
    };

    info!("=== First message series ===");
    run_series(&limiter, &config, 1).await;

    info!(?quiet_period, "Waiting for windows to drain");
    tokio::time::sleep(quiet_period).await;

    info!("=== Second message series ===");
    run_series(&limiter, &config, config.simulation.messages + 1).await;

    info!("Simulation complete");
    Ok(())
}

/// Run one series of synthetic messages, round-robining over users.
async fn run_series(limiter: &Limiter, config: &FloodgateConfig, first_message: u32) {
    let simulation = &config.simulation;

    for message_id in first_message..first_message + simulation.messages {
        let user = format!("user{}", message_id % simulation.users + 1);

        let admitted = limiter.try_admit(user.clone());
        if admitted {
            info!(message = message_id, %user, "Message admitted");
        } else {
            let wait = limiter.time_until_next(&user);
            info!(message = message_id, %user, ?wait, "Message denied");
        }

        let delay = rand::thread_rng()
            .gen_range(simulation.min_delay_ms..=simulation.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
