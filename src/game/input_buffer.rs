//! Lock-free input buffer between the keyboard collaborator and the tick
//!
//! Held keys are a bitmask in an atomic, polled once per tick. Key releases
//! go through a bounded crossbeam channel and are drained at the start of
//! the next tick, so any number of callbacks may land between two ticks.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::game::constants::input::{ACCEL, RELEASE_QUEUE_CAPACITY, ROT};
use crate::game::entity::Entity;
use crate::util::vec2::Vec2;

/// The fixed set of keys the arena listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Key {
    Left = 0,
    Right = 1,
    Up = 2,
    Down = 3,
    RotateLeft = 4,
    RotateRight = 5,
    CycleBackground = 6,
    SwitchMusic = 7,
    CycleSprite = 8,
    Space = 9,
}

impl Key {
    pub const ALL: [Key; 10] = [
        Key::Left,
        Key::Right,
        Key::Up,
        Key::Down,
        Key::RotateLeft,
        Key::RotateRight,
        Key::CycleBackground,
        Key::SwitchMusic,
        Key::CycleSprite,
        Key::Space,
    ];

    /// Browser-style key codes: arrows, A/D rotate, Q/W/S actions, space
    pub fn from_key_code(code: u32) -> Option<Key> {
        match code {
            37 => Some(Key::Left),
            38 => Some(Key::Up),
            39 => Some(Key::Right),
            40 => Some(Key::Down),
            65 => Some(Key::RotateLeft),
            68 => Some(Key::RotateRight),
            81 => Some(Key::CycleBackground),
            87 => Some(Key::SwitchMusic),
            83 => Some(Key::CycleSprite),
            32 => Some(Key::Space),
            _ => None,
        }
    }

    #[inline]
    fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

/// Snapshot of held keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeySet(u16);

impl KeySet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, key: Key) -> Self {
        self.0 |= key.bit();
        self
    }

    #[inline]
    pub fn is_held(&self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    #[error("Release queue full, {0:?} dropped")]
    Full(Key),
    #[error("Input buffer dropped")]
    Disconnected,
}

/// Owned by the tick driver
pub struct InputBuffer {
    held: Arc<AtomicU16>,
    releases_tx: Sender<Key>,
    releases_rx: Receiver<Key>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::with_capacity(RELEASE_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (releases_tx, releases_rx) = bounded(capacity);
        Self {
            held: Arc::new(AtomicU16::new(0)),
            releases_tx,
            releases_rx,
        }
    }

    /// Handle for the keyboard collaborator; cheap to clone
    pub fn handle(&self) -> InputHandle {
        InputHandle {
            held: Arc::clone(&self.held),
            releases: self.releases_tx.clone(),
        }
    }

    /// Current held keys, read once per tick
    #[inline]
    pub fn held(&self) -> KeySet {
        KeySet(self.held.load(Ordering::Acquire))
    }

    /// All key releases since the last drain, in arrival order
    pub fn drain_releases(&self) -> Vec<Key> {
        self.releases_rx.try_iter().collect()
    }

    #[inline]
    pub fn pending_releases(&self) -> usize {
        self.releases_rx.len()
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side used by the keyboard collaborator
#[derive(Clone)]
pub struct InputHandle {
    held: Arc<AtomicU16>,
    releases: Sender<Key>,
}

impl InputHandle {
    pub fn key_down(&self, key: Key) {
        self.held.fetch_or(key.bit(), Ordering::AcqRel);
    }

    /// Clears the held bit and queues the release for discrete actions
    pub fn key_up(&self, key: Key) -> Result<(), InputBufferError> {
        self.held.fetch_and(!key.bit(), Ordering::AcqRel);
        self.releases.try_send(key).map_err(|e| match e {
            TrySendError::Full(key) => InputBufferError::Full(key),
            TrySendError::Disconnected(_) => InputBufferError::Disconnected,
        })
    }

    pub fn is_held(&self, key: Key) -> bool {
        KeySet(self.held.load(Ordering::Acquire)).is_held(key)
    }
}

/// Result of applying one tick of held input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputOutcome {
    pub accepted: u32,
    pub rejected: u32,
}

/// Applies held directional/rotation keys to the local player.
///
/// Each axis resolves at most one key per tick. With both keys of a pair
/// held the negative direction wins (left over right, up over down,
/// rotate-left over rotate-right).
pub fn apply_input(keys: KeySet, player: &mut Entity) -> InputOutcome {
    let horizontal = if keys.is_held(Key::Left) {
        Some(Vec2::new(-ACCEL, 0.0))
    } else if keys.is_held(Key::Right) {
        Some(Vec2::new(ACCEL, 0.0))
    } else {
        None
    };

    let vertical = if keys.is_held(Key::Up) {
        Some(Vec2::new(0.0, -ACCEL))
    } else if keys.is_held(Key::Down) {
        Some(Vec2::new(0.0, ACCEL))
    } else {
        None
    };

    let mut outcome = InputOutcome::default();
    for delta in [horizontal, vertical].into_iter().flatten() {
        if player.apply_velocity_delta(delta) {
            outcome.accepted += 1;
        } else {
            outcome.rejected += 1;
        }
    }

    if keys.is_held(Key::RotateLeft) {
        player.rotate(-ROT);
    } else if keys.is_held(Key::RotateRight) {
        player.rotate(ROT);
    }

    outcome
}
