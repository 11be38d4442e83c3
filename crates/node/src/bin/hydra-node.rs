//! Head protocol node binary.
//!
//! Wires the deterministic head logic to the input queue, persistence,
//! the delay timer and the peer/chain adapters, then runs the node loop.
//!
//! The peer transport and the chain client are external collaborators
//! plugged in behind the `Network` and `Chain` traits; this binary runs in
//! standalone mode (in-memory network, recording chain), which is enough to
//! exercise a single-party head locally:
//!
//! ```bash
//! hydra-node run --signing-key me.sk --persistence-dir ./state
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use hydra_core::ChainState;
use hydra_ledger::MockLedger;
use hydra_logic::LogicConfig;
use hydra_node::options::{Cli, Command, RunOptions};
use hydra_node::sim::RecordingChain;
use hydra_node::{
    build_environment, load_or_initialize, publish_scripts_tx_id, InputQueue, NodeRuntime,
    RuntimeConfig, TimerThread,
};
use hydra_network::{Heartbeat, HeartbeatConfig};
use hydra_persistence::StateStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(options) => run(options),
        Command::PublishScripts(options) => {
            println!("{}", publish_scripts_tx_id(&options.network_id));
            Ok(())
        }
    }
}

fn run(options: RunOptions) -> Result<()> {
    init_tracing(&options.verbosity)?;

    let env = build_environment(&options).context("building environment")?;
    info!(party = %env.party, peers = options.peers.len(), "Starting node");

    let store = StateStore::open(&options.persistence_dir).context("opening state store")?;
    let logic = load_or_initialize(
        &store,
        env.clone(),
        MockLedger,
        LogicConfig {
            req_tx_ttl: options.req_tx_ttl,
            checkpoint_depth: options.rollback_depth,
            ..LogicConfig::default()
        },
        ChainState::default(),
    )
    .context("loading persisted state")?;

    let queue = Arc::new(InputQueue::new());
    let timers = Arc::new(TimerThread::spawn(Arc::clone(&queue)));

    // Standalone adapters; a real deployment substitutes the TCP transport
    // and the chain client behind the same traits.
    let hub = hydra_network::SimNetwork::<MockLedger>::hub();
    let network = hydra_network::SimNetwork::join(hub, env.party, |_, _| {});
    let chain = RecordingChain::new(Arc::clone(&queue));

    let heartbeat = Heartbeat::new(HeartbeatConfig::default(), env.other_parties.clone());
    let mut runtime = NodeRuntime::new(
        logic,
        Arc::clone(&queue),
        store,
        network,
        chain,
        timers,
        heartbeat,
        RuntimeConfig {
            default_ttl: options.req_tx_ttl,
        },
    );

    // In standalone mode, server outputs go to the log.
    {
        let outputs = runtime.subscribe(hydra_api::OutputFormat::default());
        std::thread::Builder::new()
            .name("api-log".into())
            .spawn(move || {
                for output in outputs.iter() {
                    info!(%output, "server output");
                }
            })
            .context("spawning output logger")?;
    }

    // Periodic clock for deadline tracking.
    {
        let queue = Arc::clone(&queue);
        std::thread::Builder::new()
            .name("tick".into())
            .spawn(move || loop {
                if queue
                    .enqueue(hydra_core::Input::Tick {
                        now: SystemTime::now(),
                    })
                    .is_none()
                {
                    break;
                }
                std::thread::sleep(Duration::from_secs(1));
            })
            .context("spawning tick thread")?;
    }

    runtime.run().context("node loop failed")?;
    Ok(())
}

fn init_tracing(verbosity: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
