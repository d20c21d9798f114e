/// World extent - the arena is a torus of this size
pub mod world {
    /// Arena width in world units
    pub const WIDTH: f32 = 800.0;
    /// Arena height in world units
    pub const HEIGHT: f32 = 500.0;
}

/// Entity constants
pub mod entity {
    /// Velocity magnitude must stay strictly below this
    pub const MAX_SPEED: f32 = 2.0;
    /// Heading every entity starts with (radians)
    pub const INITIAL_HEADING: f32 = 0.1;
    /// Prefix for generated display names
    pub const GUEST_PREFIX: &str = "Guest";
    /// Generated guest names use a number below this
    pub const GUEST_NUMBER_RANGE: u32 = 10_000;
}

/// Local input constants
pub mod input {
    /// Velocity change per tick per held direction key
    pub const ACCEL: f32 = 0.05;
    /// Heading change per tick per held rotation key (radians)
    pub const ROT: f32 = 0.1;
    /// Released-key queue capacity between two ticks
    pub const RELEASE_QUEUE_CAPACITY: usize = 64;
}

/// Steering/AI constants
pub mod steering {
    /// A roamer closer than this to its goal has arrived
    pub const GOAL_DISTANCE_THRESHOLD: f32 = 1.0;
    /// Squared arrival threshold (compared against squared distance)
    pub const GOAL_DISTANCE_THRESHOLD_SQ: f32 = GOAL_DISTANCE_THRESHOLD * GOAL_DISTANCE_THRESHOLD;
    /// Distance per tick while seeking (fixed, not scaled by dt)
    pub const STEP_SIZE: f32 = 1.0;
    /// Roamers within this distance of the local player spin toward it
    pub const PROXIMITY_RADIUS: f32 = 200.0;
    /// Numerator of the inverse heading-bias rate: rate = GAIN / (d + 1)
    pub const INVERSE_BIAS_GAIN: f32 = 2.0;
    /// Divisor of the linear heading-bias rate: rate = d / DIVISOR
    pub const LINEAR_BIAS_DIVISOR: f32 = 1000.0;
}

/// Tick driver constants
pub mod tick {
    /// Default frames per second (one tick per display refresh)
    pub const FRAME_RATE: u32 = 60;
    /// Upper bound accepted from configuration
    pub const MAX_FRAME_RATE: u32 = 240;
}

/// Asset identifiers
pub mod assets {
    /// Default sprite of the local player
    pub const DEFAULT_PLAYER: &str = "art/player00.png";
    /// Default sprite of AI roamers
    pub const DEFAULT_ROAMER: &str = "art/player04.png";
    /// Number of selectable player sprites (art/player00.png .. art/player07.png)
    pub const PLAYER_SPRITE_COUNT: u8 = 8;
    /// Footprint used by the headless sprite sheet for every player sprite
    pub const PLAYER_SPRITE_SIZE: f32 = 32.0;

    /// Asset id of the n-th player sprite
    pub fn player_sprite(index: u8) -> String {
        format!("art/player0{}.png", index % PLAYER_SPRITE_COUNT)
    }

    /// Background images, cycled in this order
    pub const BACKGROUNDS: [&str; 4] = [
        "art/earth-image2.jpg",
        "art/lights-spain.jpg",
        "art/lights-sf.jpg",
        "art/lights-shanghai.jpg",
    ];

    /// Looping music tracks
    pub const MUSIC_TRACKS: [&str; 2] = [
        "mp3/orangefreesounds_magic-bells-music-loop.mp3",
        "mp3/frankum_electronic-music-loop-002-v2.mp3",
    ];

    /// Sound played when a collision starts
    pub const COLLISION_SFX: &str = "mp3/02chirp.mp3";
}

/// Replication constants
pub mod replication {
    /// Keyspace all player records live under
    pub const PLAYERS_KEYSPACE: &str = "players";
}
