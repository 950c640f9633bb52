//! BA2048 Server
//!
//! `serve` (default) runs the leaderboard read path against a JSON-RPC node.
//! `demo [seed]` plays one game against an in-process ledger and prints the
//! resulting leaderboard.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ba2048::{
    config::{AppConfig, LeaderboardConfig},
    leaderboard::{FileCache, LeaderboardAggregator, MemoryCache},
    ledger::{Address, InMemoryLedger, JsonRpcLedger},
    network::LeaderboardServer,
    session::{GameSession, SessionClient},
    DeterministicRng, Direction, VERSION,
};

/// Order in which the demo tries directions each turn.
const DEMO_PREFERENCE: [Direction; 4] = [
    Direction::Down,
    Direction::Left,
    Direction::Right,
    Direction::Up,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("BA2048 Server v{}", VERSION);

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None | Some("serve") => serve().await,
        Some("demo") => {
            let seed = args
                .next()
                .map(|s| s.parse::<u64>().with_context(|| format!("invalid seed {:?}", s)))
                .transpose()?;
            demo(seed).await
        }
        Some(other) => anyhow::bail!("unknown command {:?}; expected `serve` or `demo [seed]`", other),
    }
}

/// Serve the leaderboard over WebSocket until Ctrl-C.
async fn serve() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let contract = config.ledger.contract()?;
    info!("Ledger: {} (contract {})", config.ledger.rpc_url, contract);
    info!("Leaderboard cache: {}", config.leaderboard.cache_path.display());

    let reader = Arc::new(JsonRpcLedger::new(config.ledger.rpc_url.clone(), contract));
    let cache = Arc::new(FileCache::new(config.leaderboard.cache_path.clone()));
    let aggregator = Arc::new(LeaderboardAggregator::new(reader, cache, &config.leaderboard));

    let server = Arc::new(LeaderboardServer::new(config.server.clone(), aggregator));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    Ok(())
}

/// Play one game to the end, commit it, and print the leaderboard.
async fn demo(seed: Option<u64>) -> anyhow::Result<()> {
    info!("=== Starting Demo Game ===");

    let (mut rng, seed) = match seed {
        Some(seed) => (DeterministicRng::new(seed), seed),
        None => DeterministicRng::from_entropy(),
    };
    info!("RNG Seed: {}", seed);

    let config = AppConfig::default();
    let ledger = Arc::new(InMemoryLedger::new());
    let client = SessionClient::new(ledger.clone(), config.session.clone());

    let player = Address::new([0xba; 20]);
    let mut session = GameSession::new(player, &mut rng);
    let session_id = client.register(&mut session).await?;
    info!("Session {} opened for {}", session_id, player);

    while !session.is_over() {
        for direction in DEMO_PREFERENCE {
            let report = session.play(direction, &mut rng)?;
            if report.newly_won {
                info!("Reached 2048 after {} moves", session.moves());
            }
            if report.moved {
                break;
            }
        }
    }

    info!("=== Final Board ===");
    for line in session.board().to_string().lines() {
        info!("{}", line);
    }
    info!("Score: {} in {} moves", session.score(), session.moves());

    let receipt = client.finish(&mut session).await?;
    info!(
        "Session {} closed at block {} (tx {})",
        receipt.session_id, receipt.block_number, receipt.tx_hash
    );
    info!("Final commitment: {}", receipt.final_commitment);

    let leaderboard_config = LeaderboardConfig {
        deploy_block: 0,
        scan_delay: Duration::ZERO,
        ..LeaderboardConfig::default()
    };
    let aggregator = LeaderboardAggregator::new(
        ledger,
        Arc::new(MemoryCache::new()),
        &leaderboard_config,
    );

    info!("=== Leaderboard ===");
    for (rank, entry) in aggregator.get_leaderboard().await.iter().enumerate() {
        info!("#{}: {} - {}", rank + 1, entry.player, entry.score);
    }

    Ok(())
}
