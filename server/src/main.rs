use anyhow::{Context, Result};
use bevy::prelude::*;
use clap::Parser;
use quinn::Endpoint;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};
use tokio::{
    sync::mpsc::unbounded_channel,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arena_common::{
    bots::Difficulty,
    combat::GameMode,
    game::{Arena, ArenaConfig},
    map::ArenaLayout,
    persistence::{ArenaSettings, BotLearning, FileStore},
    protocol::CharacterClass,
    stats::StatsRegistry,
};
use arena_server::{
    autopilot::Autopilot,
    config::configure_server,
    constants::{SAVE_INTERVAL_SECS, SERVER_LOOP_FREQUENCY},
    net::accept_connections_task,
    resources::{ClientMap, FromAcceptChannel, Storage},
    systems::{arena::arena_frame_system, network::*, storage::storage_autosave_system},
};

// ============================================================================
// CLI Argument Parsing
// ============================================================================

#[derive(Parser)]
#[command(author, version, about = "Arena combat host", long_about = None)]
struct Args {
    // Address to bind the QUIC endpoint to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    // Bots to spawn; defaults to the saved settings
    #[arg(long)]
    bots: Option<u32>,

    // easy, medium or hard; defaults to the saved settings
    #[arg(long)]
    difficulty: Option<Difficulty>,

    // practice or pvp; defaults to the saved settings
    #[arg(long)]
    mode: Option<GameMode>,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    // Spawn a host player that hunts bots on its own
    #[arg(long, default_value_t = false)]
    autopilot: bool,

    // Run without accepting network clients
    #[arg(long, default_value_t = false)]
    offline: bool,

    #[arg(long, default_value = "cert.pem")]
    cert: PathBuf,

    #[arg(long, default_value = "key.pem")]
    key: PathBuf,

    // Directory for learning and settings records
    #[arg(long, default_value = "arena-data")]
    data_dir: PathBuf,

    // JSON stat document replacing the built-in tables
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn load_stats(path: Option<&PathBuf>) -> Result<StatsRegistry> {
    let Some(path) = path else {
        return Ok(StatsRegistry::builtin());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let doc: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
    StatsRegistry::from_document(&doc).with_context(|| format!("invalid stat tables in {}", path.display()))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let store = FileStore::new(&args.data_dir);
    let saved = ArenaSettings::load(&store);
    let settings = ArenaSettings {
        mode: args.mode.unwrap_or(saved.mode),
        difficulty: args.difficulty.unwrap_or(saved.difficulty),
        bot_count: args.bots.unwrap_or(saved.bot_count),
        ..saved
    };
    let learning = BotLearning::load(&store, settings.difficulty);
    info!(
        "{:?} arena, {} {:?} bots ({} matches learned)",
        settings.mode, settings.bot_count, settings.difficulty, learning.matches
    );

    let config = ArenaConfig {
        mode: settings.mode,
        difficulty: settings.difficulty,
        seed: args.seed,
        learning,
        ..ArenaConfig::default()
    };
    let layout = ArenaLayout::standard(config.arena_size);
    let mut arena = Arena::new(config, load_stats(args.stats.as_ref())?, layout);
    for n in 0..settings.bot_count {
        let class = CharacterClass::ALL[n as usize % CharacterClass::ALL.len()];
        arena.spawn_bot(class);
    }
    if args.autopilot {
        arena.spawn_player(CharacterClass::A, None);
    }

    // New connections travel to the loop here; each carries its own message queues
    let (to_loop, from_accept) = unbounded_channel();

    if args.offline {
        info!("offline: not accepting clients");
    } else {
        let addr = SocketAddr::new(args.bind, args.port);
        let server_config = configure_server(&args.cert, &args.key)?;
        let endpoint = Endpoint::server(server_config, addr)?;
        info!("quic server listening on {addr}");
        tokio::spawn(accept_connections_task(endpoint, to_loop));
    }

    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(arena)
        .insert_resource(ClientMap::default())
        .insert_resource(FromAcceptChannel::new(from_accept))
        .insert_resource(Storage::new(Box::new(store), settings, SAVE_INTERVAL_SECS))
        .add_systems(
            Update,
            (
                network_accept_connections_system,
                network_client_message_system,
                arena_frame_system,
                storage_autosave_system,
            )
                .chain(),
        );
    if args.autopilot {
        app.insert_resource(Autopilot::default());
    }

    info!("starting arena loop...");

    // Run the app in a loop manually at SERVER_LOOP_FREQUENCY Hz
    let tick_duration = Duration::from_nanos(1_000_000_000 / SERVER_LOOP_FREQUENCY);
    let mut interval = time::interval(tick_duration);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut frame: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("failed to listen for shutdown: {e}");
                }
                break;
            }
        }

        let update_start = Instant::now();
        app.update();
        let update_elapsed = update_start.elapsed();

        if update_elapsed > tick_duration {
            warn!(
                "tick {} took {:.2}ms (exceeded {:.2}ms budget)",
                frame,
                update_elapsed.as_secs_f64() * 1000.0,
                tick_duration.as_secs_f64() * 1000.0
            );
        }

        frame += 1;
    }

    info!("shutting down after {frame} ticks");
    let world = app.world_mut();
    world.resource_scope(|world, mut storage: Mut<Storage>| {
        let mut arena = world.resource_mut::<Arena>();
        storage.finish(&mut arena);
    });
    Ok(())
}
