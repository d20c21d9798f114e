//! Entity definitions
//!
//! One `Entity` represents a player in the arena regardless of who drives it:
//! the local player (keyboard), a remote proxy (replication) or an AI roamer
//! (steering controller). The kind decides which path may mutate it.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::constants::entity::{GUEST_NUMBER_RANGE, GUEST_PREFIX, INITIAL_HEADING};
use crate::game::systems::physics;
use crate::game::world::WorldBounds;
use crate::util::vec2::Vec2;

/// Stable entity identifier, also the replication key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Visual footprint, reported by the rendering collaborator once the asset is loaded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn square(size: f32) -> Self {
        Self::new(size, size)
    }

    /// Offset from the top-left corner to the center
    pub fn half_extent(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

/// Who drives an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Driven by this process's input; the only outbound-replicated entity
    LocalPlayer,
    /// Mirror of another process's local player; mutated only by inbound replication
    RemoteProxy,
    /// Locally simulated, never replicated
    AiRoamer,
}

impl EntityKind {
    pub fn replicates_outbound(&self) -> bool {
        matches!(self, EntityKind::LocalPlayer)
    }
}

/// Random display name for players that did not pick one
pub fn generate_guest_name() -> String {
    let number = rand::thread_rng().gen_range(0..GUEST_NUMBER_RANGE);
    format!("{}{}", GUEST_PREFIX, number)
}

/// A player in the arena
#[derive(Debug, Clone)]
pub struct Entity {
    position: Vec2,
    velocity: Vec2,
    heading: f32,
    /// `None` until the asset's footprint is known
    bounds: Option<Bounds>,
    kind: EntityKind,
    id: EntityId,
    name: String,
    asset_id: String,
    /// Velocity changes refused because they would reach MAX_SPEED
    rejected_deltas: u64,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, name: String, asset_id: String) -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            heading: INITIAL_HEADING,
            bounds: None,
            kind,
            id,
            name,
            asset_id,
            rejected_deltas: 0,
        }
    }

    pub fn local_player(id: EntityId, name: String, asset_id: String) -> Self {
        Self::new(id, EntityKind::LocalPlayer, name, asset_id)
    }

    pub fn remote_proxy(id: EntityId, name: String, asset_id: String) -> Self {
        Self::new(id, EntityKind::RemoteProxy, name, asset_id)
    }

    pub fn ai_roamer(id: EntityId, name: String, asset_id: String) -> Self {
        Self::new(id, EntityKind::AiRoamer, name, asset_id)
    }

    /// Builder-style placement, wrapped into the world
    pub fn with_position(mut self, position: Vec2, world: &WorldBounds) -> Self {
        self.place(position, world);
        self
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn is_ready(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn rejected_deltas(&self) -> u64 {
        self.rejected_deltas
    }

    /// Center of the footprint; the top-left corner while the footprint is unknown
    pub fn footprint_center(&self) -> Vec2 {
        match self.bounds {
            Some(bounds) => self.position + bounds.half_extent(),
            None => self.position,
        }
    }

    /// Proposes `velocity + delta`. Accepted only while the result stays
    /// strictly below MAX_SPEED; otherwise velocity is left untouched.
    pub fn apply_velocity_delta(&mut self, delta: Vec2) -> bool {
        let candidate = self.velocity + delta;
        if physics::within_speed_limit(candidate) {
            self.velocity = candidate;
            true
        } else {
            self.rejected_deltas += 1;
            false
        }
    }

    pub fn rotate(&mut self, delta: f32) {
        self.heading += delta;
    }

    /// position += velocity, then wrap both axes into the world
    pub fn advance(&mut self, world: &WorldBounds) {
        self.position = physics::advance(self.position, self.velocity, world);
    }

    /// Moves by `offset` without touching velocity (steering-driven movement)
    pub fn translate(&mut self, offset: Vec2, world: &WorldBounds) {
        self.position = world.wrap(self.position + offset);
    }

    pub fn place(&mut self, position: Vec2, world: &WorldBounds) {
        self.position = world.wrap(position);
    }

    pub fn set_heading(&mut self, heading: f32) {
        self.heading = heading;
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Records the footprint the first time it becomes known.
    /// Returns false (and changes nothing) when already ready.
    pub fn mark_ready(&mut self, bounds: Bounds) -> bool {
        if self.bounds.is_some() {
            return false;
        }
        self.bounds = Some(bounds);
        true
    }

    /// Switches sprite. A different asset invalidates the footprint until
    /// the new one is reported through `mark_ready`.
    pub fn change_asset(&mut self, asset_id: &str) -> bool {
        if self.asset_id == asset_id {
            return false;
        }
        self.asset_id = asset_id.to_string();
        self.bounds = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::entity::MAX_SPEED;

    fn create_entity() -> Entity {
        Entity::local_player(
            EntityId::new("p1"),
            "Tester".to_string(),
            "art/player00.png".to_string(),
        )
    }

    #[test]
    fn test_new_entity_defaults() {
        let e = create_entity();
        assert_eq!(e.position(), Vec2::ZERO);
        assert_eq!(e.velocity(), Vec2::ZERO);
        assert_eq!(e.heading(), INITIAL_HEADING);
        assert!(!e.is_ready());
        assert!(e.kind().replicates_outbound());
    }

    #[test]
    fn test_velocity_delta_accepted_below_bound() {
        let mut e = create_entity();
        assert!(e.apply_velocity_delta(Vec2::new(1.0, 0.0)));
        assert!(e.apply_velocity_delta(Vec2::new(0.5, 0.0)));
        assert_eq!(e.velocity(), Vec2::new(1.5, 0.0));
    }

    #[test]
    fn test_velocity_delta_rejected_in_full() {
        let mut e = create_entity();
        assert!(e.apply_velocity_delta(Vec2::new(1.5, 0.0)));

        // 1.5 + 1.0 = 2.5 would overflow: nothing is applied, not even a clamp
        assert!(!e.apply_velocity_delta(Vec2::new(1.0, 0.0)));
        assert_eq!(e.velocity(), Vec2::new(1.5, 0.0));
        assert_eq!(e.rejected_deltas(), 1);
    }

    #[test]
    fn test_velocity_exactly_at_bound_rejected() {
        let mut e = create_entity();
        assert!(!e.apply_velocity_delta(Vec2::new(MAX_SPEED, 0.0)));
        assert_eq!(e.velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_velocity_bound_holds_over_many_deltas() {
        let mut e = create_entity();
        let deltas = [
            Vec2::new(0.05, 0.0),
            Vec2::new(0.0, -0.05),
            Vec2::new(0.7, 0.3),
            Vec2::new(-0.2, 0.9),
            Vec2::new(3.0, 3.0),
        ];
        for i in 0..500 {
            let before = e.velocity();
            let accepted = e.apply_velocity_delta(deltas[i % deltas.len()]);
            assert!(e.velocity().length() < MAX_SPEED);
            if !accepted {
                assert_eq!(e.velocity(), before);
            }
        }
    }

    #[test]
    fn test_rotate_is_unbounded() {
        let mut e = create_entity();
        for _ in 0..100 {
            e.rotate(0.1);
        }
        assert!((e.heading() - (INITIAL_HEADING + 10.0)).abs() < 1e-3);
    }

    #[test]
    fn test_mark_ready_once() {
        let mut e = create_entity();
        assert!(e.mark_ready(Bounds::square(32.0)));
        assert!(!e.mark_ready(Bounds::square(64.0)));
        assert_eq!(e.bounds(), Some(Bounds::square(32.0)));
    }

    #[test]
    fn test_change_asset_invalidates_footprint() {
        let mut e = create_entity();
        e.mark_ready(Bounds::square(32.0));

        assert!(!e.change_asset("art/player00.png"));
        assert!(e.is_ready());

        assert!(e.change_asset("art/player03.png"));
        assert!(!e.is_ready());
        assert_eq!(e.asset_id(), "art/player03.png");

        // A new readiness cycle starts for the new asset
        assert!(e.mark_ready(Bounds::new(40.0, 24.0)));
    }

    #[test]
    fn test_footprint_center() {
        let world = WorldBounds::default();
        let mut e = create_entity().with_position(Vec2::new(100.0, 50.0), &world);
        assert_eq!(e.footprint_center(), Vec2::new(100.0, 50.0));
        e.mark_ready(Bounds::new(32.0, 16.0));
        assert_eq!(e.footprint_center(), Vec2::new(116.0, 58.0));
    }

    #[test]
    fn test_guest_name_format() {
        let name = generate_guest_name();
        assert!(name.starts_with(GUEST_PREFIX));
        let number: u32 = name[GUEST_PREFIX.len()..].parse().unwrap();
        assert!(number < GUEST_NUMBER_RANGE);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(EntityId::generate(), EntityId::generate());
    }
}
