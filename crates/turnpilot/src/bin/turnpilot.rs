//! # TurnPilot
//!
//! Steers a rider along a planned route.
//!
//! ```bash
//! turnpilot --route routes/figure-eight.toml
//! turnpilot --config turnpilot.toml --route routes/figure-eight.toml --log-level debug
//! ```
//!
//! Runs until killed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use turnpilot::{AppConfig, DispatchEvent, Engine, RouteStore, TomlRouteStore};
use turnpilot_networking::{PassiveCodec, Plaintext};

#[derive(Debug, Parser)]
#[command(name = "turnpilot", version, about = "Steers a rider along a planned route")]
struct Args {
    /// Config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Route plan to ride.
    #[arg(long)]
    route: PathBuf,

    /// Log filter, e.g. `info` or `turnpilot=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn fatal(message: &str) -> ! {
    error!("{}", message);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match &args.config {
        Some(path) => AppConfig::load(path).unwrap_or_else(|e| fatal(&e.to_string())),
        None => AppConfig::default(),
    };

    let store = TomlRouteStore::open(&args.route).unwrap_or_else(|e| fatal(&e.to_string()));
    let (route, segments) = match (store.load_route(), store.load_segments()) {
        (Ok(route), Ok(segments)) => (route, segments),
        (Err(e), _) | (_, Err(e)) => fatal(&e.to_string()),
    };
    info!(
        "Riding '{}' over {} known segments, listening on {}",
        route.name,
        segments.len(),
        config.connection.socket_address()
    );

    let mut engine = Engine::new(
        config,
        route,
        segments,
        Arc::new(Plaintext),
        Arc::new(PassiveCodec),
    )
    .unwrap_or_else(|e| fatal(&e.to_string()));

    // No credential check: start logged in.
    if let Err(e) = engine.dispatcher().dispatch(DispatchEvent::LoggedIn) {
        fatal(&e.to_string());
    }

    engine.run();
}
