//! Tick driver
//!
//! One `step` runs to completion before the next is scheduled:
//! inbound replication, key releases, held input, world update, publish,
//! footprint resolution and drawing. `run` schedules steps on a tokio
//! interval until the shutdown watch flips.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::ArenaConfig;
use crate::game::actions::{KeyAction, PresentationState};
use crate::game::entity::{generate_guest_name, Entity, EntityId};
use crate::game::input_buffer::{apply_input, InputBuffer, InputHandle};
use crate::game::render::RenderSurface;
use crate::game::systems::ai::SteeringController;
use crate::game::world::{World, WorldBounds, WorldEvent, WorldEvents};
use crate::metrics::Metrics;
use crate::net::channel::{ChannelError, ReplicationChannel};
use crate::net::replication::{InboundStats, ReplicationBridge};

/// Called once per world event, after the tick that produced it
pub type ReactionHook = Box<dyn FnMut(&WorldEvent) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum GameLoopError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// What one step did
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    /// Wall-clock seconds since the previous step (0 on the first)
    pub dt: f32,
    pub inbound: InboundStats,
    pub events: WorldEvents,
    pub published: bool,
    pub newly_ready: usize,
}

pub struct GameLoop {
    world: World,
    bridge: ReplicationBridge,
    input: InputBuffer,
    presentation: PresentationState,
    surface: Box<dyn RenderSurface>,
    metrics: Arc<Metrics>,
    reaction: Option<ReactionHook>,
    frame_rate: u32,
    last_tick: Option<Instant>,
}

impl GameLoop {
    pub fn new(
        world: World,
        bridge: ReplicationBridge,
        surface: Box<dyn RenderSurface>,
        metrics: Arc<Metrics>,
        frame_rate: u32,
    ) -> Self {
        Self {
            world,
            bridge,
            input: InputBuffer::new(),
            presentation: PresentationState::new(),
            surface,
            metrics,
            reaction: None,
            frame_rate: frame_rate.max(1),
            last_tick: None,
        }
    }

    /// Builds the local player, roamers and bridge from configuration
    pub fn from_config(
        config: &ArenaConfig,
        channel: Box<dyn ReplicationChannel>,
        surface: Box<dyn RenderSurface>,
        metrics: Arc<Metrics>,
    ) -> Result<Self, GameLoopError> {
        config.validate().map_err(GameLoopError::InvalidConfig)?;

        let bounds = WorldBounds::new(config.world_width, config.world_height);
        let name = config.player_name.clone().unwrap_or_else(generate_guest_name);
        let local = Entity::local_player(EntityId::generate(), name, config.player_asset.clone());
        let local_id = local.id().clone();

        let steering = SteeringController::new(config.heading_bias, config.rng_seed);
        let mut world = World::new(bounds, local, steering);
        for _ in 0..config.ai_roamers {
            world.spawn_roamer(None, &config.roamer_asset);
        }

        let bridge = ReplicationBridge::connect(channel, local_id)?;
        info!(
            "Arena {}x{} ready: local {} ({}), {} roamers, {} Hz",
            bounds.width,
            bounds.height,
            world.local_id(),
            world.local().name(),
            world.roamer_count(),
            config.frame_rate
        );
        Ok(Self::new(world, bridge, surface, metrics, config.frame_rate))
    }

    pub fn with_reaction(mut self, hook: ReactionHook) -> Self {
        self.reaction = Some(hook);
        self
    }

    /// Producer handle for the keyboard collaborator
    pub fn input_handle(&self) -> InputHandle {
        self.input.handle()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access between ticks (setup, tests)
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn presentation(&self) -> &PresentationState {
        &self.presentation
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn step(&mut self) -> TickReport {
        let started = Instant::now();
        let dt = self
            .last_tick
            .map(|last| started.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(started);

        let inbound = self.bridge.apply_pending(&mut self.world);
        self.metrics.record_inbound(&inbound);

        for key in self.input.drain_releases() {
            if let Some(action) = KeyAction::from_key(key) {
                self.presentation.apply(action, self.world.local_mut());
            }
        }

        let input = apply_input(self.input.held(), self.world.local_mut());
        if input.rejected > 0 {
            self.metrics
                .velocity_rejections
                .fetch_add(input.rejected as u64, Ordering::Relaxed);
        }

        let events = self.world.update(dt);

        let published = self.bridge.publish(self.world.local()).is_ok();
        self.metrics.record_publish(published);

        let newly_ready = self.resolve_and_draw();

        for event in &events {
            match event {
                WorldEvent::CollisionStarted { remote_id } => {
                    self.metrics.collisions_started.fetch_add(1, Ordering::Relaxed);
                    debug!("Collision with {} started", remote_id);
                }
                WorldEvent::CollisionEnded { remote_id } => {
                    debug!("Collision with {} ended", remote_id);
                }
                WorldEvent::GoalAssigned { .. } => {
                    self.metrics.goals_assigned.fetch_add(1, Ordering::Relaxed);
                }
            }
            if let Some(hook) = self.reaction.as_mut() {
                hook(event);
            }
        }

        self.update_gauges();
        self.metrics.record_tick_time(started.elapsed());

        let tick = self.world.tick();
        if tick % (self.frame_rate as u64 * 30) == 0 {
            info!(
                "Tick {}: {} remotes, {} roamers, {} colliding",
                tick,
                self.world.remote_count(),
                self.world.roamer_count(),
                self.world.colliding_count()
            );
        }

        TickReport {
            tick,
            dt,
            inbound,
            events,
            published,
            newly_ready,
        }
    }

    /// Reports footprints the surface can resolve, then draws ready entities
    fn resolve_and_draw(&mut self) -> usize {
        let mut newly_ready = 0;
        for (id, asset_id) in self.world.pending_assets() {
            if let Some(bounds) = self.surface.resolve(&asset_id) {
                if self.world.mark_ready(&id, &asset_id, bounds) {
                    newly_ready += 1;
                }
            }
        }

        for view in self.world.render_views().filter(|view| view.ready) {
            self.surface.draw(&view);
        }
        self.surface.present();
        newly_ready
    }

    fn update_gauges(&self) {
        self.metrics
            .remote_entities
            .store(self.world.remote_count() as u64, Ordering::Relaxed);
        self.metrics
            .ai_roamers
            .store(self.world.roamer_count() as u64, Ordering::Relaxed);
        self.metrics
            .colliding_remotes
            .store(self.world.colliding_count() as u64, Ordering::Relaxed);
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate as f64)
    }

    /// Steps once per frame until `shutdown` turns true or its sender drops,
    /// then says goodbye on the channel.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Self {
        let mut ticker = interval(self.tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Tick driver started at {} Hz", self.frame_rate);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.step();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.bridge.shutdown();
        info!("Tick driver for {} stopped after {} ticks", self.world.local_id(), self.world.tick());
        self
    }
}
