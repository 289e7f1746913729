//! Development harness for the Ringboard turn engine.
//!
//! Reads newline-delimited JSON commands on stdin and writes every session
//! event, snapshot, and rejection as a JSON line on stdout. Logs go to
//! stderr so they never interleave with the protocol stream.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `RINGBOARD_CONFIG` or `ringboard-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load the card catalog, if one is configured
//! 4. Drive the session registry from stdin until EOF, then end every game

mod error;
mod harness;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ringboard_core::config::RingboardConfig;
use ringboard_session::{MemoryCatalog, SessionRegistry};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::harness::Harness;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "ringboard-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration or the catalog cannot be loaded, or if
/// stdin/stdout fail.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config comes first so its log level can seed the filter.
    let config = load_config()?;
    init_tracing(&config);

    info!(
        roll_timeout_ms = config.turn.roll_timeout_ms,
        decision_timeout_ms = config.turn.decision_timeout_ms,
        board_tiles = config.session.board_tiles,
        seed = ?config.session.seed,
        "Configuration loaded"
    );

    let catalog = load_catalog(&config)?;
    info!(cards = catalog.len(), "Card catalog ready");

    let registry = Arc::new(SessionRegistry::new(config, Arc::new(catalog)));
    let (out_tx, out_rx) = Harness::output_channel();
    let writer = tokio::spawn(harness::write_lines(out_rx, tokio::io::stdout()));

    let harness = Harness::new(Arc::clone(&registry), out_tx);
    let result = harness.run(BufReader::new(tokio::io::stdin())).await;

    // Ending every game closes its broadcast, which stops its forwarder;
    // the writer drains once the last forwarder lets go of the queue.
    registry.shutdown().await;
    drop(harness);
    match writer.await {
        Ok(Err(err)) => warn!(error = %err, "stdout writer failed"),
        Err(err) => warn!(error = %err, "stdout writer panicked"),
        Ok(Ok(())) => {}
    }

    result?;
    info!("ringboard-engine stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(config: &RingboardConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Load configuration from `RINGBOARD_CONFIG`, then `ringboard-config.yaml`.
///
/// A missing file yields the defaults.
fn load_config() -> Result<RingboardConfig, EngineError> {
    let config_path = std::env::var("RINGBOARD_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if config_path.exists() {
        Ok(RingboardConfig::from_file(&config_path)?)
    } else {
        let mut config = RingboardConfig::default();
        config.catalog.apply_env_overrides();
        Ok(config)
    }
}

/// Load the configured card catalog, or an empty one when none is set.
fn load_catalog(config: &RingboardConfig) -> Result<MemoryCatalog, EngineError> {
    if let Some(path) = config.catalog.path.as_deref() {
        Ok(MemoryCatalog::from_file(Path::new(path))?)
    } else {
        warn!("No card catalog configured, turns will draw no cards");
        Ok(MemoryCatalog::new())
    }
}
