//! AI roamer steering
//!
//! Each roamer walks toward a uniformly drawn goal at a fixed step per tick;
//! the measured `dt` is accepted but does not scale the step. On arrival a
//! new goal is drawn. Near the local player the heading spins by the
//! configured `HeadingBias`.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::game::constants::steering::*;
use crate::game::entity::{Entity, EntityId};
use crate::game::world::WorldBounds;
use crate::util::vec2::Vec2;

/// Roaming goal owned by one roamer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub target: Vec2,
}

/// Steering state, derived from the distance to the current goal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringState {
    /// Goal still farther than the arrival threshold
    Seeking,
    /// Within the threshold, a new goal is drawn on this evaluation
    Arrived,
}

/// How strongly a roamer spins when the local player is near
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeadingBias {
    /// rate = 2 / (d + 1): closer spins faster
    #[default]
    Inverse,
    /// rate = d / 1000: farther spins faster
    Linear,
}

impl HeadingBias {
    /// Heading increment for a given center-to-center distance
    pub fn rate(&self, distance: f32) -> f32 {
        if distance >= PROXIMITY_RADIUS {
            return 0.0;
        }
        match self {
            HeadingBias::Inverse => INVERSE_BIAS_GAIN / (distance + 1.0),
            HeadingBias::Linear => distance / LINEAR_BIAS_DIVISOR,
        }
    }
}

impl FromStr for HeadingBias {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inverse" => Ok(HeadingBias::Inverse),
            "linear" => Ok(HeadingBias::Linear),
            other => Err(format!("unknown heading bias '{}'", other)),
        }
    }
}

/// An AI-controlled entity and its goal
#[derive(Debug, Clone)]
pub struct Roamer {
    pub entity: Entity,
    pub goal: Goal,
}

impl Roamer {
    pub fn id(&self) -> &EntityId {
        self.entity.id()
    }

    pub fn state(&self) -> SteeringState {
        let dist_sq = self.entity.position().distance_sq_to(self.goal.target);
        if dist_sq < GOAL_DISTANCE_THRESHOLD_SQ {
            SteeringState::Arrived
        } else {
            SteeringState::Seeking
        }
    }
}

/// Drives every roamer: goal assignment, fixed-step seeking, heading bias
pub struct SteeringController {
    rng: StdRng,
    bias: HeadingBias,
}

impl SteeringController {
    /// Seeded controllers replay the same goal sequence
    pub fn new(bias: HeadingBias, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, bias }
    }

    pub fn bias(&self) -> HeadingBias {
        self.bias
    }

    /// Uniform over the whole world extent
    pub fn draw_goal(&mut self, world: &WorldBounds) -> Goal {
        Goal {
            target: Vec2::new(
                self.rng.gen_range(0.0..world.width),
                self.rng.gen_range(0.0..world.height),
            ),
        }
    }

    /// Wraps an entity into a roamer with its first goal
    pub fn spawn(&mut self, entity: Entity, world: &WorldBounds) -> Roamer {
        let goal = self.draw_goal(world);
        Roamer { entity, goal }
    }

    /// One tick for one roamer.
    ///
    /// `dt` is accepted but not used: the seek step is one unit per tick.
    /// Returns the new target when the roamer arrived and was reassigned;
    /// the roamer does not move on that tick.
    pub fn update(
        &mut self,
        roamer: &mut Roamer,
        local_center: Vec2,
        world: &WorldBounds,
        _dt: f32,
    ) -> Option<Vec2> {
        let reassigned = match roamer.state() {
            SteeringState::Arrived => {
                roamer.goal = self.draw_goal(world);
                Some(roamer.goal.target)
            }
            SteeringState::Seeking => {
                let direction = (roamer.goal.target - roamer.entity.position()).normalize();
                roamer.entity.translate(direction * STEP_SIZE, world);
                None
            }
        };

        let distance = roamer.entity.footprint_center().distance_to(local_center);
        let rate = self.bias.rate(distance);
        if rate != 0.0 {
            roamer.entity.rotate(rate);
        }

        reassigned
    }
}

impl Default for SteeringController {
    fn default() -> Self {
        Self::new(HeadingBias::default(), None)
    }
}
