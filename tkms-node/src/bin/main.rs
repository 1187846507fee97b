//! Entrypoint for a key-management node.
//!
//! Wiring a concrete [`tkms_node::ports::BlockSource`],
//! [`tkms_node::ports::PeeringSource`], [`tkms_node::ports::AttestationVerifier`]
//! and [`tkms_transport::peer::PeerTransport`] to real infrastructure (a
//! chain client, a registry contract, an attestation service, a network
//! socket) is a deployment concern and explicitly out of scope here; this
//! binary only does what is left: initialise tracing, load the node's
//! configuration, and run the scheduler loop against whatever ports the
//! embedding deployment supplies by extending this `main`.

use std::process::ExitCode;

use eyre::Context;
use tkms_node::config::NodeConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "node exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> eyre::Result<()> {
    let config = load_config().context("while loading node configuration")?;
    tracing::info!(
        node_id = ?config.node_id,
        committee_size = config.committee_size,
        block_boundary = config.block_boundary,
        "starting key-management node"
    );

    // A concrete deployment wires a `BlockSource`, `PeeringSource`,
    // `AttestationVerifier` and `PeerTransport` here and drives
    // `tkms_node::scheduler::decide_trigger` off the resulting block stream,
    // launching `tkms_node::instance::run_dkg_instance` (or the analogous
    // reshare instance) per `tkms_node::scheduler::Trigger`. Those
    // collaborators are infrastructure-specific and out of scope for this
    // crate.
    tracing::warn!("no ports wired; nothing to drive. exiting");
    Ok(())
}

fn load_config() -> eyre::Result<NodeConfig> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| eyre::eyre!("usage: tkms-node <config.json>"))?;
    let contents = std::fs::read_to_string(&path).with_context(|| format!("while reading {path}"))?;
    serde_json::from_str(&contents).with_context(|| format!("while parsing {path}"))
}
