//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Head protocol node.
#[derive(Parser, Debug)]
#[command(name = "hydra-node")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the node.
    Run(RunOptions),
    /// Publish the reference scripts this node's heads depend on and print
    /// their transaction id.
    PublishScripts(PublishScriptsOptions),
}

/// Options of the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunOptions {
    /// Address to bind the peer listener to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port of the peer listener.
    #[arg(long, default_value_t = 5001)]
    pub port: u16,

    /// Peer addresses (`host:port`), one per peer.
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Address to bind the client API to.
    #[arg(long, default_value = "127.0.0.1")]
    pub api_host: IpAddr,

    /// Port of the client API.
    #[arg(long, default_value_t = 4001)]
    pub api_port: u16,

    /// Port of the monitoring endpoint, if any.
    #[arg(long)]
    pub monitoring_port: Option<u16>,

    /// Directory the head state is persisted in.
    #[arg(long, default_value = "./hydra-state")]
    pub persistence_dir: PathBuf,

    /// Log level filter (overrides RUST_LOG).
    #[arg(long, default_value = "info")]
    pub verbosity: String,

    /// Path to our signing key file (hex-encoded 32-byte seed).
    #[arg(long)]
    pub signing_key: PathBuf,

    /// Verification keys of the other parties (hex), one per party.
    #[arg(long = "party")]
    pub parties: Vec<String>,

    /// Contestation period in seconds.
    #[arg(long, default_value_t = 60)]
    pub contestation_period: u64,

    /// Network this node follows.
    #[arg(long, default_value = "testnet")]
    pub network_id: String,

    /// Transaction id of the published head scripts.
    #[arg(long)]
    pub hydra_scripts_tx_id: Option<String>,

    /// Requeue budget for network messages that are not yet applicable.
    #[arg(long, default_value_t = 5)]
    pub req_tx_ttl: u32,

    /// How many chain transitions the rollback checkpoint ring retains.
    #[arg(long, default_value_t = 8)]
    pub rollback_depth: usize,
}

/// Options of the `publish-scripts` command.
#[derive(Args, Debug, Clone)]
pub struct PublishScriptsOptions {
    /// Network to publish on.
    #[arg(long, default_value = "testnet")]
    pub network_id: String,

    /// Path to the signing key funding the publication.
    #[arg(long)]
    pub signing_key: PathBuf,
}
