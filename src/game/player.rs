//! Participant state and spawn placement

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

/// Server-assigned participant identifier. 0 never names a participant.
pub type PlayerId = u32;

/// A point in arena space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Animation/behaviour state of a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerState {
    #[default]
    Standing,
}

/// Authoritative state of one connected participant
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub position: Position,
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub health: f32,
    pub casting_spell_id: u32,
    pub is_casting: bool,
    pub state: PlayerState,
}

impl Participant {
    pub fn new(id: PlayerId, name: String, color: String, position: Position, health: f32) -> Self {
        Self {
            id,
            name,
            color,
            position,
            rotation_x: 0.0,
            rotation_y: 0.0,
            health,
            casting_spell_id: 0,
            is_casting: false,
            state: PlayerState::Standing,
        }
    }
}

/// Random source for participant ids and spawn points.
///
/// Shared by every connection task, so the generator sits behind a mutex.
/// Never held together with a store lock for longer than one draw.
pub struct SpawnArea {
    half_extent: f32,
    height: f32,
    rng: Mutex<ChaCha8Rng>,
}

impl SpawnArea {
    pub fn new(config: &GameConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            half_extent: config.spawn_half_extent,
            height: config.spawn_height,
            rng: Mutex::new(rng),
        }
    }

    /// Uniform point on the spawn square at spawn height
    pub fn random_position(&self) -> Position {
        let mut rng = self.rng.lock();
        Position {
            x: rng.gen_range(-self.half_extent..self.half_extent),
            y: self.height,
            z: rng.gen_range(-self.half_extent..self.half_extent),
        }
    }

    /// Fresh nonzero id
    pub fn random_id(&self) -> PlayerId {
        self.rng.lock().gen_range(1..=PlayerId::MAX)
    }

    /// Whether `position` could have come from [`SpawnArea::random_position`]
    pub fn contains(&self, position: &Position) -> bool {
        let range = -self.half_extent..self.half_extent;
        range.contains(&position.x) && range.contains(&position.z) && position.y == self.height
    }
}
