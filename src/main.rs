use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use torus_arena::config::ArenaConfig;
use torus_arena::game::constants::{assets, replication::PLAYERS_KEYSPACE};
use torus_arena::game::game_loop::GameLoop;
use torus_arena::game::input_buffer::{InputHandle, Key};
use torus_arena::game::render::SpriteSheet;
use torus_arena::game::world::WorldEvent;
use torus_arena::metrics::Metrics;
use torus_arena::net::channel::MemoryHub;

const DRIVEN_KEYS: [Key; 6] = [
    Key::Left,
    Key::Right,
    Key::Up,
    Key::Down,
    Key::RotateLeft,
    Key::RotateRight,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Torus Arena v{}", env!("CARGO_PKG_VERSION"));

    let config = ArenaConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: world {}x{}, {} Hz, {} roamers, {} peers",
        config.world_width, config.world_height, config.frame_rate, config.ai_roamers, config.peer_count
    );

    let metrics = Arc::new(Metrics::new());

    #[cfg(feature = "metrics_server")]
    {
        if let Some(port) = config.metrics_port {
            let metrics = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = torus_arena::metrics::start_metrics_server(metrics, port).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            });
        }
    }

    let hub = MemoryHub::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let local = GameLoop::from_config(
        &config,
        Box::new(hub.connect(PLAYERS_KEYSPACE)),
        Box::new(SpriteSheet::with_player_sprites()),
        metrics.clone(),
    )?
    .with_reaction(Box::new(|event: &WorldEvent| {
        if let WorldEvent::CollisionStarted { remote_id } = event {
            info!("Bumped into {} ({})", remote_id, assets::COLLISION_SFX);
        }
    }));
    tasks.push(spawn_player(local, config.rng_seed.unwrap_or(0), &shutdown_rx));

    // Peers share the hub and play without roamers of their own
    for i in 0..config.peer_count {
        let peer_config = ArenaConfig {
            ai_roamers: 0,
            player_name: None,
            player_asset: assets::player_sprite(i as u8 + 1),
            ..config.clone()
        };
        let peer = GameLoop::from_config(
            &peer_config,
            Box::new(hub.connect(PLAYERS_KEYSPACE)),
            Box::new(SpriteSheet::with_player_sprites()),
            Arc::new(Metrics::new()),
        )?;
        tasks.push(spawn_player(peer, i as u64 + 1, &shutdown_rx));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown_tx.send(true).ok();

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Player task failed: {}", e);
        }
    }

    info!(
        "Stopped after {} ticks, {} collisions, {} records left in the hub",
        metrics.tick_count.load(std::sync::atomic::Ordering::Relaxed),
        metrics.collisions_started.load(std::sync::atomic::Ordering::Relaxed),
        hub.keys(PLAYERS_KEYSPACE).len()
    );
    Ok(())
}

/// Runs one player's tick driver plus a random keyboard
fn spawn_player(
    game: GameLoop,
    seed: u64,
    shutdown: &watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let keyboard = tokio::spawn(drive_keys(game.input_handle(), seed, shutdown.clone()));
    let driver = tokio::spawn(game.run(shutdown.clone()));
    tokio::spawn(async move {
        let _ = keyboard.await;
        if let Ok(game) = driver.await {
            info!(
                "{} left after {} ticks",
                game.world().local().name(),
                game.world().tick()
            );
        }
    })
}

/// Headless stand-in for a keyboard: toggles movement keys and now and then
/// cycles the sprite
async fn drive_keys(handle: InputHandle, seed: u64, mut shutdown: watch::Receiver<bool>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ticker = tokio::time::interval(Duration::from_millis(400));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let key = DRIVEN_KEYS[rng.gen_range(0..DRIVEN_KEYS.len())];
                if handle.is_held(key) {
                    if let Err(e) = handle.key_up(key) {
                        debug!("Key release dropped: {}", e);
                    }
                } else {
                    handle.key_down(key);
                }
                if rng.gen_bool(0.05) {
                    if let Err(e) = handle.key_up(Key::CycleSprite) {
                        debug!("Key release dropped: {}", e);
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
