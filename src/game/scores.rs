//! Score table: kills credited per participant

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use super::PlayerId;

/// One scoreboard row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub score: u32,
}

#[derive(Default)]
pub struct ScoreTable {
    scores: Mutex<HashMap<PlayerId, u32>>,
}

/// Exclusive access for compound updates spanning several stores
pub struct ScoresMut<'a> {
    scores: MutexGuard<'a, HashMap<PlayerId, u32>>,
}

impl ScoresMut<'_> {
    /// Start `id` at zero
    pub fn insert(&mut self, id: PlayerId) {
        self.scores.insert(id, 0);
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<u32> {
        self.scores.remove(&id)
    }

    /// Add one kill to `id`; false if `id` has no entry
    pub fn increment(&mut self, id: PlayerId) -> bool {
        match self.scores.get_mut(&id) {
            Some(score) => {
                *score = score.saturating_add(1);
                true
            }
            None => false,
        }
    }
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> ScoresMut<'_> {
        ScoresMut {
            scores: self.scores.lock(),
        }
    }

    pub fn insert(&self, id: PlayerId) {
        self.lock().insert(id);
    }

    pub fn remove(&self, id: PlayerId) -> Option<u32> {
        self.lock().remove(id)
    }

    pub fn increment(&self, id: PlayerId) -> bool {
        self.lock().increment(id)
    }

    pub fn get(&self, id: PlayerId) -> Option<u32> {
        self.scores.lock().get(&id).copied()
    }

    /// All rows, highest score first, ties by id
    pub fn snapshot(&self) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .scores
            .lock()
            .iter()
            .map(|(&player_id, &score)| ScoreEntry { player_id, score })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.player_id.cmp(&b.player_id)));
        entries
    }
}
