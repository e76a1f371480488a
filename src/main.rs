use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use tokio::runtime::Handle;

use std::sync::Arc;

use powledger::{Node, NodeConfig, PeerBroadcaster, Server};

/// Runs the reference scenario: two wallets, a credit and one transfer
fn run_demo(node: &Node) {
    for owner in ["Account_1", "Account_2"] {
        if let Err(err) = node.create_account(owner) {
            warn!("{}", err);
        }
    }

    show_wallet(node, "Account_1");
    show_wallet(node, "Account_2");

    if let Err(err) = node.credit("Account_1", 50) {
        warn!("{}", err);
    }
    show_wallet(node, "Account_1");

    if let Err(err) = node.submit_transfer("Account_1", "Account_2", 10) {
        warn!("Transfer rejected: {}", err);
    }

    for transaction in &node.transactions() {
        println!("{}", transaction);
    }

    println!("Is blockchain valid? {}", node.is_valid());

    for wallet in node.wallets() {
        println!("{}'s wallet balance: {}", wallet.owner, wallet.balance);
    }
}

fn show_wallet(node: &Node, owner: &str) {
    match node.balance_of(owner) {
        Ok(balance) => println!("{}'s wallet balance: {}", owner, balance),
        Err(err) => println!("{}", err),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    // Initialize logger
    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or(config.log_level.as_str()),
    );

    config.validate().context("invalid configuration")?;

    let broadcaster = PeerBroadcaster::new(
        config.peers.clone(),
        config.connect_timeout(),
        Handle::current(),
    );
    info!("Gossiping mined blocks to {} peers", broadcaster.peers().len());
    let node = Arc::new(Node::new(config.chain_settings()).with_sink(Arc::new(broadcaster)));

    let server = Server::bind(&config.host, config.port)
        .await
        .with_context(|| format!("failed to listen on {}:{}", config.host, config.port))?
        .with_read_timeout(config.read_timeout());
    let server_task = tokio::spawn(server.run(node.clone()));

    if config.demo {
        let node = node.clone();
        tokio::task::spawn_blocking(move || run_demo(&node))
            .await
            .context("demo driver panicked")?;
    }

    tokio::select! {
        result = server_task => {
            result
                .context("server task failed")?
                .context("server stopped")?;
            anyhow::bail!("server stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down with {} blocks", node.len());
        }
    }

    Ok(())
}
