//! Torus Arena
//!
//! Entity simulation and replication core for a real-time multiplayer arena:
//! a locally driven player, AI roamers and remote proxies on a toroidal
//! world, kept in sync through a keyed broadcast channel.
//!
//! # Features
//!
//! - `metrics_server` - HTTP endpoint serving Prometheus/JSON metrics (enabled by default)

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;

pub use config::ArenaConfig;
pub use game::game_loop::GameLoop;
pub use game::world::{World, WorldBounds, WorldEvent};
pub use net::channel::{MemoryHub, ReplicationChannel};
