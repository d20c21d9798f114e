//! Arena state
//!
//! The world exclusively owns every entity: the local player, remote proxies
//! (created/destroyed by replication) and AI roamers (created locally).
//! All mutation goes through its methods.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::game::constants::world;
use crate::game::entity::{generate_guest_name, Bounds, Entity, EntityId, EntityKind};
use crate::game::render::RenderView;
use crate::game::systems::ai::{Roamer, SteeringController};
use crate::game::systems::{collision, physics};
use crate::util::vec2::Vec2;

/// Toroidal arena extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Inside `[0, width) x [0, height)`
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= 0.0 && p.x < self.width && p.y >= 0.0 && p.y < self.height
    }

    pub fn wrap(&self, p: Vec2) -> Vec2 {
        physics::wrap_position(p, self)
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(world::WIDTH, world::HEIGHT)
    }
}

/// Things that happened during one `World::update`
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// Local player started overlapping a remote (fires once per episode)
    CollisionStarted { remote_id: EntityId },
    /// Overlap with a remote ended, or the remote became unready or left
    CollisionEnded { remote_id: EntityId },
    /// A roamer arrived and got a new goal
    GoalAssigned { roamer_id: EntityId, target: Vec2 },
}

pub type WorldEvents = SmallVec<[WorldEvent; 4]>;

/// Observed state of a remote player, as carried by a replication event
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub name: String,
    pub asset_id: String,
    pub position: Vec2,
    pub heading: f32,
}

/// Result of applying a remote create/update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    /// Asset changed: the proxy is excluded from collisions until re-resolved
    UpdatedAssetChanged,
    /// Id is the local player's own (self-echo)
    IgnoredSelf,
    /// Id belongs to a local AI roamer
    IgnoredConflict,
}

/// Result of applying a remote delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
    IgnoredSelf,
}

/// The arena and everything in it
pub struct World {
    bounds: WorldBounds,
    local: Entity,
    remotes: HashMap<EntityId, Entity>,
    /// Ordered so seeded goal draws replay identically
    roamers: BTreeMap<EntityId, Roamer>,
    /// Remote ids overlapping the local player as of the last update
    colliding: HashSet<EntityId>,
    /// Events raised between updates, delivered by the next `update`
    pending_events: WorldEvents,
    steering: SteeringController,
    tick: u64,
}

impl World {
    pub fn new(bounds: WorldBounds, local: Entity, steering: SteeringController) -> Self {
        debug_assert_eq!(local.kind(), EntityKind::LocalPlayer);
        Self {
            bounds,
            local,
            remotes: HashMap::new(),
            roamers: BTreeMap::new(),
            colliding: HashSet::new(),
            pending_events: WorldEvents::new(),
            steering,
            tick: 0,
        }
    }

    pub fn bounds(&self) -> &WorldBounds {
        &self.bounds
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn local(&self) -> &Entity {
        &self.local
    }

    /// Input and local actions mutate the local player through this
    pub fn local_mut(&mut self) -> &mut Entity {
        &mut self.local
    }

    pub fn local_id(&self) -> &EntityId {
        self.local.id()
    }

    pub fn remote(&self, id: &EntityId) -> Option<&Entity> {
        self.remotes.get(id)
    }

    pub fn remotes(&self) -> impl Iterator<Item = &Entity> {
        self.remotes.values()
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    pub fn roamer(&self, id: &EntityId) -> Option<&Roamer> {
        self.roamers.get(id)
    }

    pub fn roamers(&self) -> impl Iterator<Item = &Roamer> {
        self.roamers.values()
    }

    pub fn roamer_count(&self) -> usize {
        self.roamers.len()
    }

    pub fn is_colliding(&self, remote_id: &EntityId) -> bool {
        self.colliding.contains(remote_id)
    }

    pub fn colliding_count(&self) -> usize {
        self.colliding.len()
    }

    fn id_in_use(&self, id: &EntityId) -> bool {
        self.local.id() == id || self.remotes.contains_key(id) || self.roamers.contains_key(id)
    }

    /// Adds a roamer with a fresh id and random start position
    pub fn spawn_roamer(&mut self, name: Option<String>, asset_id: &str) -> EntityId {
        let id = EntityId::generate();
        let name = name.unwrap_or_else(generate_guest_name);
        let start = self.steering.draw_goal(&self.bounds).target;
        let entity = Entity::ai_roamer(id.clone(), name, asset_id.to_string())
            .with_position(start, &self.bounds);
        self.add_roamer(entity);
        id
    }

    /// Adds an existing AI entity; refused when the id is already taken
    pub fn add_roamer(&mut self, entity: Entity) -> bool {
        if entity.kind() != EntityKind::AiRoamer || self.id_in_use(entity.id()) {
            warn!("Refusing roamer {}: wrong kind or id in use", entity.id());
            return false;
        }
        let roamer = self.steering.spawn(entity, &self.bounds);
        debug!("Roamer {} heading for {:?}", roamer.id(), roamer.goal.target);
        self.roamers.insert(roamer.id().clone(), roamer);
        true
    }

    /// One simulation step. Order: local player, roamers, collisions.
    pub fn update(&mut self, dt: f32) -> WorldEvents {
        let mut events = std::mem::take(&mut self.pending_events);
        self.tick += 1;

        self.local.advance(&self.bounds);

        let local_center = self.local.footprint_center();
        for roamer in self.roamers.values_mut() {
            if let Some(target) = self.steering.update(roamer, local_center, &self.bounds, dt) {
                events.push(WorldEvent::GoalAssigned {
                    roamer_id: roamer.id().clone(),
                    target,
                });
            }
        }

        collision::update_contacts(&self.local, &self.remotes, &mut self.colliding, &mut events);

        events
    }

    /// Creates the proxy if absent, otherwise mutates it in place
    pub fn upsert_remote(&mut self, id: &EntityId, state: RemoteState) -> UpsertOutcome {
        if id == self.local.id() {
            return UpsertOutcome::IgnoredSelf;
        }
        if self.roamers.contains_key(id) {
            warn!("Remote record {} collides with a local roamer id, ignoring", id);
            return UpsertOutcome::IgnoredConflict;
        }

        let bounds = self.bounds;
        match self.remotes.get_mut(id) {
            Some(proxy) => {
                proxy.place(state.position, &bounds);
                proxy.set_heading(state.heading);
                proxy.set_name(state.name);
                if proxy.change_asset(&state.asset_id) {
                    debug!("Remote {} switched asset to {}", id, state.asset_id);
                    UpsertOutcome::UpdatedAssetChanged
                } else {
                    UpsertOutcome::Updated
                }
            }
            None => {
                let mut proxy = Entity::remote_proxy(id.clone(), state.name, state.asset_id)
                    .with_position(state.position, &bounds);
                proxy.set_heading(state.heading);
                debug!("Remote {} ({}) joined", id, proxy.name());
                self.remotes.insert(id.clone(), proxy);
                UpsertOutcome::Created
            }
        }
    }

    pub fn remove_remote(&mut self, id: &EntityId) -> RemoveOutcome {
        if id == self.local.id() {
            return RemoveOutcome::IgnoredSelf;
        }
        if self.colliding.remove(id) {
            self.pending_events.push(WorldEvent::CollisionEnded {
                remote_id: id.clone(),
            });
        }
        match self.remotes.remove(id) {
            Some(proxy) => {
                debug!("Remote {} ({}) left", id, proxy.name());
                RemoveOutcome::Removed
            }
            None => RemoveOutcome::NotFound,
        }
    }

    /// Footprint reported by the rendering collaborator. Ignored when the
    /// entity has since switched to a different asset.
    pub fn mark_ready(&mut self, id: &EntityId, asset_id: &str, bounds: Bounds) -> bool {
        let entity = if self.local.id() == id {
            Some(&mut self.local)
        } else if let Some(proxy) = self.remotes.get_mut(id) {
            Some(proxy)
        } else {
            self.roamers.get_mut(id).map(|r| &mut r.entity)
        };

        match entity {
            Some(entity) if entity.asset_id() == asset_id => entity.mark_ready(bounds),
            _ => false,
        }
    }

    /// Entities waiting for their footprint: (id, asset)
    pub fn pending_assets(&self) -> Vec<(EntityId, String)> {
        self.all_entities()
            .filter(|e| !e.is_ready())
            .map(|e| (e.id().clone(), e.asset_id().to_string()))
            .collect()
    }

    /// Local player first, then remotes, then roamers
    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        std::iter::once(&self.local)
            .chain(self.remotes.values())
            .chain(self.roamers.values().map(|r| &r.entity))
    }

    /// What the rendering surface consumes per entity
    pub fn render_views(&self) -> impl Iterator<Item = RenderView<'_>> {
        self.all_entities().map(RenderView::from_entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::systems::ai::HeadingBias;

    fn create_world() -> World {
        let local = Entity::local_player(
            EntityId::new("local"),
            "Me".to_string(),
            "art/player00.png".to_string(),
        );
        World::new(
            WorldBounds::default(),
            local,
            SteeringController::new(HeadingBias::Inverse, Some(42)),
        )
    }

    fn remote_state(x: f32, y: f32, asset: &str) -> RemoteState {
        RemoteState {
            name: "Other".to_string(),
            asset_id: asset.to_string(),
            position: Vec2::new(x, y),
            heading: 1.0,
        }
    }

    #[test]
    fn test_local_wraps_on_update() {
        let mut world = create_world();
        let bounds = *world.bounds();
        world.local_mut().place(Vec2::new(799.0, 10.0), &bounds);
        for _ in 0..5 {
            world.local_mut().apply_velocity_delta(Vec2::new(1.0, 0.0));
        }
        // Only the first delta fits: 1.0 then 2.0 would hit the bound
        assert_eq!(world.local().velocity(), Vec2::new(1.0, 0.0));

        world.update(0.016);
        assert_eq!(world.local().position(), Vec2::new(0.0, 10.0));
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let mut world = create_world();
        let id = EntityId::new("r1");

        assert_eq!(world.upsert_remote(&id, remote_state(10.0, 20.0, "a.png")), UpsertOutcome::Created);
        assert_eq!(world.upsert_remote(&id, remote_state(30.0, 40.0, "a.png")), UpsertOutcome::Updated);

        let proxy = world.remote(&id).unwrap();
        assert_eq!(proxy.position(), Vec2::new(30.0, 40.0));
        assert_eq!(proxy.heading(), 1.0);
        assert_eq!(proxy.kind(), EntityKind::RemoteProxy);
        assert_eq!(world.remote_count(), 1);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut once = create_world();
        let mut twice = create_world();
        let id = EntityId::new("r1");
        once.upsert_remote(&id, remote_state(1.0, 2.0, "a.png"));
        twice.upsert_remote(&id, remote_state(1.0, 2.0, "a.png"));

        let update = remote_state(50.0, 60.0, "b.png");
        once.upsert_remote(&id, update.clone());
        twice.upsert_remote(&id, update.clone());
        twice.upsert_remote(&id, update);

        let a = once.remote(&id).unwrap();
        let b = twice.remote(&id).unwrap();
        assert_eq!(a.position(), b.position());
        assert_eq!(a.heading(), b.heading());
        assert_eq!(a.asset_id(), b.asset_id());
        assert_eq!(a.is_ready(), b.is_ready());
    }

    #[test]
    fn test_upsert_wraps_remote_position() {
        let mut world = create_world();
        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(-10.0, 510.0, "a.png"));
        assert_eq!(world.remote(&id).unwrap().position(), Vec2::new(790.0, 10.0));
    }

    #[test]
    fn test_self_echo_ignored() {
        let mut world = create_world();
        let local_id = world.local_id().clone();

        assert_eq!(
            world.upsert_remote(&local_id, remote_state(5.0, 5.0, "a.png")),
            UpsertOutcome::IgnoredSelf
        );
        assert_eq!(world.remove_remote(&local_id), RemoveOutcome::IgnoredSelf);
        assert_eq!(world.remote_count(), 0);
        assert_eq!(world.local().position(), Vec2::ZERO);
    }

    #[test]
    fn test_upsert_conflicting_with_roamer_ignored() {
        let mut world = create_world();
        let roamer_id = world.spawn_roamer(None, "art/player04.png");
        assert_eq!(
            world.upsert_remote(&roamer_id, remote_state(5.0, 5.0, "a.png")),
            UpsertOutcome::IgnoredConflict
        );
        assert_eq!(world.remote_count(), 0);
    }

    #[test]
    fn test_remove_remote() {
        let mut world = create_world();
        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(1.0, 2.0, "a.png"));

        assert_eq!(world.remove_remote(&id), RemoveOutcome::Removed);
        assert_eq!(world.remove_remote(&id), RemoveOutcome::NotFound);
        assert!(world.remote(&id).is_none());
    }

    #[test]
    fn test_collision_fires_once_per_episode() {
        let mut world = create_world();
        let local_id = world.local_id().clone();
        world.mark_ready(&local_id, "art/player00.png", Bounds::square(32.0));

        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(400.0, 400.0, "a.png"));
        world.mark_ready(&id, "a.png", Bounds::square(32.0));

        let mut started = 0;
        let mut script = Vec::new();
        script.extend(std::iter::repeat((400.0, 400.0)).take(3)); // apart
        script.extend(std::iter::repeat((10.0, 10.0)).take(7)); // overlapping
        script.extend(std::iter::repeat((400.0, 400.0)).take(2)); // apart
        script.extend(std::iter::repeat((5.0, 5.0)).take(4)); // overlapping again

        for (x, y) in script {
            world.upsert_remote(&id, remote_state(x, y, "a.png"));
            for event in world.update(0.016) {
                if matches!(event, WorldEvent::CollisionStarted { .. }) {
                    started += 1;
                }
            }
        }
        assert_eq!(started, 2);
        assert!(world.is_colliding(&id));
    }

    #[test]
    fn test_asset_change_excludes_from_collisions() {
        let mut world = create_world();
        let local_id = world.local_id().clone();
        world.mark_ready(&local_id, "art/player00.png", Bounds::square(32.0));

        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(10.0, 10.0, "a.png"));
        world.mark_ready(&id, "a.png", Bounds::square(32.0));
        world.update(0.016);
        assert!(world.is_colliding(&id));

        let outcome = world.upsert_remote(&id, remote_state(10.0, 10.0, "b.png"));
        assert_eq!(outcome, UpsertOutcome::UpdatedAssetChanged);
        assert!(!world.remote(&id).unwrap().is_ready());

        let events = world.update(0.016);
        assert!(events.contains(&WorldEvent::CollisionEnded { remote_id: id.clone() }));
        assert!(!world.is_colliding(&id));

        // Stale report for the old asset is ignored
        assert!(!world.mark_ready(&id, "a.png", Bounds::square(32.0)));
        assert!(world.mark_ready(&id, "b.png", Bounds::square(32.0)));

        let events = world.update(0.016);
        assert!(events.contains(&WorldEvent::CollisionStarted { remote_id: id.clone() }));
    }

    #[test]
    fn test_removed_remote_recollides() {
        let mut world = create_world();
        let local_id = world.local_id().clone();
        world.mark_ready(&local_id, "art/player00.png", Bounds::square(32.0));

        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(0.0, 0.0, "a.png"));
        world.mark_ready(&id, "a.png", Bounds::square(32.0));
        world.update(0.016);
        assert!(world.is_colliding(&id));

        world.remove_remote(&id);
        assert!(!world.is_colliding(&id));

        world.upsert_remote(&id, remote_state(0.0, 0.0, "a.png"));
        world.mark_ready(&id, "a.png", Bounds::square(32.0));
        let events = world.update(0.016);
        assert_eq!(
            events.as_slice(),
            &[
                WorldEvent::CollisionEnded { remote_id: id.clone() },
                WorldEvent::CollisionStarted { remote_id: id },
            ]
        );
    }

    #[test]
    fn test_removing_colliding_remote_ends_collision() {
        let mut world = create_world();
        let local_id = world.local_id().clone();
        world.mark_ready(&local_id, "art/player00.png", Bounds::square(32.0));

        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(5.0, 5.0, "a.png"));
        world.mark_ready(&id, "a.png", Bounds::square(32.0));
        let started = world.update(0.016);
        assert!(started.contains(&WorldEvent::CollisionStarted { remote_id: id.clone() }));

        assert_eq!(world.remove_remote(&id), RemoveOutcome::Removed);
        let after_remove = world.update(0.016);
        assert_eq!(
            after_remove.as_slice(),
            &[WorldEvent::CollisionEnded { remote_id: id }]
        );
        assert_eq!(world.colliding_count(), 0);

        // Only one end per episode
        assert!(world.update(0.016).is_empty());
    }

    #[test]
    fn test_removing_non_colliding_remote_is_silent() {
        let mut world = create_world();
        let id = EntityId::new("far");
        world.upsert_remote(&id, remote_state(400.0, 300.0, "a.png"));
        world.remove_remote(&id);
        assert!(world.update(0.016).is_empty());
    }

    #[test]
    fn test_roamers_do_not_trigger_collisions() {
        let mut world = create_world();
        let local_id = world.local_id().clone();
        world.mark_ready(&local_id, "art/player00.png", Bounds::square(32.0));

        let entity = Entity::ai_roamer(
            EntityId::new("bot"),
            "Bot".to_string(),
            "art/player04.png".to_string(),
        );
        assert!(world.add_roamer(entity));
        world.mark_ready(&EntityId::new("bot"), "art/player04.png", Bounds::square(32.0));

        for _ in 0..10 {
            let events = world.update(0.016);
            assert!(!events
                .iter()
                .any(|e| matches!(e, WorldEvent::CollisionStarted { .. })));
        }
    }

    #[test]
    fn test_roamer_ids_are_unique() {
        let mut world = create_world();
        let bot = || {
            Entity::ai_roamer(EntityId::new("bot"), "Bot".to_string(), "x.png".to_string())
        };
        assert!(world.add_roamer(bot()));
        assert!(!world.add_roamer(bot()));

        let clash = Entity::ai_roamer(EntityId::new("local"), "Bot".to_string(), "x.png".to_string());
        assert!(!world.add_roamer(clash));
        assert_eq!(world.roamer_count(), 1);
    }

    #[test]
    fn test_roamers_stay_inside_world() {
        let mut world = create_world();
        for _ in 0..5 {
            world.spawn_roamer(None, "art/player04.png");
        }
        for _ in 0..2_000 {
            world.update(0.016);
            for roamer in world.roamers() {
                assert!(world.bounds().contains(roamer.entity.position()));
                assert!(world.bounds().contains(roamer.goal.target));
            }
        }
    }

    #[test]
    fn test_pending_assets_and_render_views() {
        let mut world = create_world();
        let id = EntityId::new("r1");
        world.upsert_remote(&id, remote_state(1.0, 2.0, "a.png"));

        let pending = world.pending_assets();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0], (EntityId::new("local"), "art/player00.png".to_string()));

        world.mark_ready(&id, "a.png", Bounds::square(16.0));
        assert_eq!(world.pending_assets().len(), 1);

        let ready: Vec<_> = world.render_views().filter(|v| v.ready).collect();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].asset_id, "a.png");
    }
}
