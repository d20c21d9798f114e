//! Local-vs-remote collision detection
//!
//! Boxes are anchored at the entity position (top-left corner), sized by the
//! reported footprint. Reactions are edge-triggered through the world's
//! colliding set: one `CollisionStarted` per overlap episode.

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;

use crate::game::entity::{Bounds, Entity, EntityId};
use crate::game::world::{WorldEvent, WorldEvents};
use crate::util::vec2::Vec2;

/// Axis-aligned overlap test; touching edges count as overlap
#[inline]
pub fn aabb_overlap(a_pos: Vec2, a_size: Bounds, b_pos: Vec2, b_size: Bounds) -> bool {
    if b_pos.x > a_pos.x + a_size.width {
        return false;
    }
    if a_pos.x > b_pos.x + b_size.width {
        return false;
    }
    if b_pos.y > a_pos.y + a_size.height {
        return false;
    }
    if a_pos.y > b_pos.y + b_size.height {
        return false;
    }
    true
}

/// Both entities must have a known footprint
pub fn detect_collision(a: &Entity, b: &Entity) -> bool {
    match (a.bounds(), b.bounds()) {
        (Some(a_size), Some(b_size)) => aabb_overlap(a.position(), a_size, b.position(), b_size),
        _ => false,
    }
}

/// Ids of remotes currently overlapping `local`, sorted for stable event order
pub fn overlapping_remotes(local: &Entity, remotes: &HashMap<EntityId, Entity>) -> Vec<EntityId> {
    if !local.is_ready() {
        return Vec::new();
    }

    let mut hits: Vec<EntityId> = remotes
        .par_values()
        .filter(|remote| detect_collision(local, remote))
        .map(|remote| remote.id().clone())
        .collect();
    hits.sort_unstable();
    hits
}

/// Refresh the colliding set and emit transitions.
/// Overlap detection runs in parallel, set bookkeeping is sequential.
pub fn update_contacts(
    local: &Entity,
    remotes: &HashMap<EntityId, Entity>,
    colliding: &mut HashSet<EntityId>,
    events: &mut WorldEvents,
) -> usize {
    let hits = overlapping_remotes(local, remotes);

    let mut ended: Vec<EntityId> = colliding
        .iter()
        .filter(|id| hits.binary_search(id).is_err())
        .cloned()
        .collect();
    ended.sort_unstable();
    for remote_id in ended {
        colliding.remove(&remote_id);
        events.push(WorldEvent::CollisionEnded { remote_id });
    }

    let mut started = 0;
    for remote_id in hits {
        if colliding.insert(remote_id.clone()) {
            events.push(WorldEvent::CollisionStarted { remote_id });
            started += 1;
        }
    }
    started
}
