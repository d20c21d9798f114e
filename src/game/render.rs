//! Rendering collaborator seam
//!
//! The surface is a passive observer of simulation state. Its one write path
//! back into the world is footprint resolution, which drives `mark_ready`.

use hashbrown::HashMap;

use crate::game::constants::assets::{self, PLAYER_SPRITE_COUNT, PLAYER_SPRITE_SIZE};
use crate::game::entity::{Bounds, Entity, EntityId, EntityKind};
use crate::util::vec2::Vec2;

/// Per-entity data a surface draws from
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView<'a> {
    pub id: &'a EntityId,
    pub kind: EntityKind,
    pub name: &'a str,
    pub asset_id: &'a str,
    pub position: Vec2,
    pub heading: f32,
    pub ready: bool,
}

impl<'a> RenderView<'a> {
    pub fn from_entity(entity: &'a Entity) -> Self {
        Self {
            id: entity.id(),
            kind: entity.kind(),
            name: entity.name(),
            asset_id: entity.asset_id(),
            position: entity.position(),
            heading: entity.heading(),
            ready: entity.is_ready(),
        }
    }
}

pub trait RenderSurface: Send {
    /// Footprint of an asset, `None` while it is still loading
    fn resolve(&mut self, asset_id: &str) -> Option<Bounds>;

    /// Draws one ready entity
    fn draw(&mut self, view: &RenderView<'_>);

    /// Called once after every draw of a frame
    fn present(&mut self) {}
}

/// Headless surface with a fixed asset-size table.
/// Unknown assets never resolve, so their entities stay out of collisions.
#[derive(Debug, Default)]
pub struct SpriteSheet {
    sizes: HashMap<String, Bounds>,
    frames: u64,
    drawn_last_frame: usize,
    drawn_this_frame: usize,
}

impl SpriteSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `art/player0N.png` at the default sprite size
    pub fn with_player_sprites() -> Self {
        let mut sheet = Self::new();
        for i in 0..PLAYER_SPRITE_COUNT {
            sheet.insert(assets::player_sprite(i), Bounds::square(PLAYER_SPRITE_SIZE));
        }
        sheet
    }

    pub fn insert(&mut self, asset_id: impl Into<String>, bounds: Bounds) {
        self.sizes.insert(asset_id.into(), bounds);
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn drawn_last_frame(&self) -> usize {
        self.drawn_last_frame
    }
}

impl RenderSurface for SpriteSheet {
    fn resolve(&mut self, asset_id: &str) -> Option<Bounds> {
        self.sizes.get(asset_id).copied()
    }

    fn draw(&mut self, view: &RenderView<'_>) {
        debug_assert!(view.ready);
        self.drawn_this_frame += 1;
    }

    fn present(&mut self) {
        self.frames += 1;
        self.drawn_last_frame = std::mem::take(&mut self.drawn_this_frame);
    }
}
