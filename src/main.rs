//! Radial Siege Game Server
//!
//! Without arguments, plays one all-bot match to completion and verifies it
//! replays to the same state hash. With `--serve`, runs the WebSocket
//! server.
//!
//! Environment:
//! - `RUST_LOG`: log filter (default `info`)
//! - `SIEGE_CONFIG`: path to a JSON tuning file
//! - `SIEGE_BIND_ADDR`: listen address for `--serve` (default `0.0.0.0:8080`)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use radial_siege::{
    core::rng::derive_match_seed,
    game::{
        events::GameEventData,
        tick::{replay_match, start_match, tick},
        InputLog, InputQueue, MatchConfig, WorldState,
    },
    network::{GameServer, ServerConfig, SessionConfig},
    VERSION,
};

/// Hard stop for the demo match (20 minutes at 20 Hz).
const DEMO_TICK_CAP: u64 = 24_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    let config = load_config()?;
    info!("Radial Siege Server v{}", VERSION);
    info!("Tick Rate: {} Hz, {} teams", config.tick_rate, config.map.num_teams);

    if std::env::args().any(|a| a == "--serve") {
        serve(config).await
    } else {
        demo_match(&config);
        Ok(())
    }
}

fn load_config() -> anyhow::Result<MatchConfig> {
    match std::env::var("SIEGE_CONFIG") {
        Ok(path) => {
            let config = MatchConfig::load(&path).with_context(|| format!("loading {}", path))?;
            info!("Loaded tuning from {}", path);
            Ok(config)
        }
        Err(_) => Ok(MatchConfig::default()),
    }
}

async fn serve(config: MatchConfig) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = match std::env::var("SIEGE_BIND_ADDR") {
        Ok(addr) => addr.parse().with_context(|| format!("invalid SIEGE_BIND_ADDR {}", addr))?,
        Err(_) => ServerConfig::default().bind_addr,
    };

    let server = Arc::new(GameServer::new(ServerConfig {
        bind_addr,
        session: SessionConfig { match_config: config, ..Default::default() },
        ..Default::default()
    }));

    let runner = server.clone();
    let mut handle = tokio::spawn(async move { runner.run().await });

    tokio::select! {
        result = &mut handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            server.shutdown();
            handle.await??;
        }
    }
    Ok(())
}

/// Play an all-bot match and check it replays identically.
fn demo_match(config: &MatchConfig) {
    info!("=== Starting Demo Match ===");

    let rng_seed = derive_match_seed("demo", &[]);
    let mut world = WorldState::new(config, rng_seed);
    let mut bot_config = config.clone();
    bot_config.bots.fill_teams = true;
    start_match(&mut world, &bot_config);
    info!("RNG Seed: {}, {} bots", rng_seed, world.players.len());

    let mut queue = InputQueue::new();
    let mut total_events = 0;
    let report_every = bot_config.tick_rate as u64 * 60;

    while world.tick < DEMO_TICK_CAP {
        let result = tick(&mut world, &mut queue, &bot_config);
        total_events += result.events.len();

        for event in &result.events {
            match &event.data {
                GameEventData::BaseDestroyed { team, captured_by } => {
                    info!("Tick {}: base {} destroyed (captured by {:?})", event.tick, team, captured_by);
                }
                GameEventData::TeamEliminated { team } => {
                    info!("Tick {}: team {} eliminated", event.tick, team);
                }
                GameEventData::MatchEnded { winner_team, damage_by_team } => {
                    info!("Match ended! Winner: team {}, objective damage {:?}", winner_team, damage_by_team);
                }
                _ => {}
            }
        }

        if world.tick % report_every == 0 {
            info!(
                "Tick {}: {} minions, objective {:.0} hp, {} events so far",
                world.tick,
                world.alive_minion_count(),
                world.objective.hp,
                total_events
            );
        }

        if result.match_ended {
            break;
        }
    }

    info!("=== Match Results ===");
    let hash = world.compute_hash();
    info!("Final tick {}, phase {:?}, winner {:?}", world.tick, world.phase, world.winner);
    info!("Final State Hash: {}", hex::encode(hash));
    info!("Total events: {}", total_events);

    info!("=== Verifying Determinism ===");
    let (replayed, _) = replay_match(&bot_config, &[], &InputLog::new(rng_seed), world.tick);
    let replay_hash = replayed.compute_hash();
    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        warn!("DETERMINISM FAILURE: Hashes differ!");
    }
}
