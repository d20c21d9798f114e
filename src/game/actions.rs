//! Discrete key-release actions
//!
//! Background and music are presentation state only; drawing and playback
//! belong to external collaborators that read `PresentationState`.

use tracing::debug;

use crate::game::constants::assets::{self, BACKGROUNDS, MUSIC_TRACKS, PLAYER_SPRITE_COUNT};
use crate::game::entity::Entity;
use crate::game::input_buffer::Key;

/// What a released key asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    CycleBackground,
    SwitchMusic,
    CycleSprite,
}

impl KeyAction {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::CycleBackground => Some(KeyAction::CycleBackground),
            Key::SwitchMusic => Some(KeyAction::SwitchMusic),
            Key::CycleSprite => Some(KeyAction::CycleSprite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresentationState {
    /// `None` until the first cycle; the default canvas background shows
    background: Option<usize>,
    music_track: usize,
    sprite_index: u8,
}

impl PresentationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background(&self) -> Option<&'static str> {
        self.background.map(|i| BACKGROUNDS[i])
    }

    pub fn music(&self) -> &'static str {
        MUSIC_TRACKS[self.music_track]
    }

    pub fn sprite_index(&self) -> u8 {
        self.sprite_index
    }

    /// Applies one action. Sprite cycling switches the local player's asset,
    /// which resets its readiness until the new footprint is reported.
    pub fn apply(&mut self, action: KeyAction, local: &mut Entity) {
        match action {
            KeyAction::CycleBackground => {
                let next = self.background.map_or(0, |i| (i + 1) % BACKGROUNDS.len());
                self.background = Some(next);
                debug!("Background -> {}", BACKGROUNDS[next]);
            }
            KeyAction::SwitchMusic => {
                self.music_track = (self.music_track + 1) % MUSIC_TRACKS.len();
                debug!("Music -> {}", self.music());
            }
            KeyAction::CycleSprite => {
                self.sprite_index = (self.sprite_index + 1) % PLAYER_SPRITE_COUNT;
                let asset = assets::player_sprite(self.sprite_index);
                local.change_asset(&asset);
                debug!("Local sprite -> {}", asset);
            }
        }
    }
}
